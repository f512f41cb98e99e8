use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lotto_types::Draw;
use uuid::Uuid;

use crate::error::DrawError;

/// Durable access to Draw rows. `transition` is the one method every
/// state-machine operation funnels through: it row-locks the draw,
/// checks the expected status, applies the mutation, and persists the
/// new status in one atomic unit — per spec §4.4, "each transition is a
/// single transactional update" and per spec §5, "per-draw state
/// transitions acquire a row lock on the Draw before reading its
/// status".
#[async_trait]
pub trait DrawRepository: Send + Sync {
    async fn insert(&self, draw: Draw) -> Result<Draw, DrawError>;
    async fn load(&self, draw_id: Uuid) -> Result<Draw, DrawError>;
    async fn next_draw_number(&self, lottery_id: Uuid) -> Result<i64, DrawError>;
    async fn find_open_draw(&self, lottery_id: Uuid, now: DateTime<Utc>) -> Result<Option<Draw>, DrawError>;

    /// Draws in `Open` whose `draw_time` is within the lock-ahead window.
    async fn due_to_lock(&self, now: DateTime<Utc>, lock_ahead: chrono::Duration, limit: u32) -> Result<Vec<Draw>, DrawError>;

    /// Draws in `Locked` whose `draw_time` has passed.
    async fn due_to_execute(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Draw>, DrawError>;

    async fn transition(
        &self,
        draw_id: Uuid,
        expected: lotto_types::DrawStatus,
        mutate: Box<dyn FnOnce(&mut Draw) + Send>,
    ) -> Result<Draw, DrawError>;

    /// Cancels a draw from either `Open` or `Locked` — the two states
    /// spec §4.4's diagram allows an admin cancel from — rejecting any
    /// other current status.
    async fn cancel(&self, draw_id: Uuid) -> Result<Draw, DrawError>;

    async fn increment_ticket_totals(
        &self,
        draw_id: Uuid,
        ticket_count_delta: u32,
        amount_delta: lotto_types::Nano,
    ) -> Result<(), DrawError>;
}

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDrawRepository;
pub use postgres::PostgresDrawRepository;
