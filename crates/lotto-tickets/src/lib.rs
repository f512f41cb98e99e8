pub mod error;
pub mod intake;
pub mod repository;

pub use error::TicketSaleError;
pub use intake::TicketSaleIntake;
pub use repository::{InMemoryTicketRepository, PostgresTicketRepository, TicketRepository};
