//! Draw State Machine (spec §4.4, C4): the CREATED → OPEN → LOCKED →
//! DRAWING → CALCULATING → PAYING → COMPLETED/CANCELLED lifecycle.

pub mod error;
pub mod repository;
pub mod state_machine;

pub use error::DrawError;
pub use repository::{DrawRepository, InMemoryDrawRepository, PostgresDrawRepository};
pub use state_machine::{next_draw_time, DrawService, SALES_CUTOFF};
