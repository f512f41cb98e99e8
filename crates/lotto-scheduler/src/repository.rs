use async_trait::async_trait;
use lotto_types::{Lottery, Nano, PayoutConfig};
use uuid::Uuid;

use crate::error::SchedulerError;

/// Durable access to the entities the scheduler needs beyond what
/// `lotto-draw`/`lotto-ledger` already own: the Lottery configuration
/// row, its PayoutConfig, and a commit-reveal seed vault.
///
/// The seed vault exists because `DrawService::create_draw` hands the
/// plaintext `serverSeed` to its caller exactly once (spec §4.2's
/// commit-reveal: only the hash is persisted on the Draw row at
/// creation). Something has to hold that plaintext until the draw is
/// executed, possibly a full draw cadence later and by a different
/// process — this is that something, grounded in the same
/// at-rest-until-reveal idea as the Draw row's own `server_seed_hash`
/// column.
#[async_trait]
pub trait LotteryRepository: Send + Sync {
    async fn active_lotteries(&self) -> Result<Vec<Lottery>, SchedulerError>;
    async fn lottery(&self, lottery_id: Uuid) -> Result<Option<Lottery>, SchedulerError>;
    async fn payout_config(&self, lottery_id: Uuid) -> Result<Option<PayoutConfig>, SchedulerError>;
    async fn update_accumulated_jackpot(&self, lottery_id: Uuid, amount: Nano) -> Result<(), SchedulerError>;

    /// Commits a freshly generated server seed for a draw that was just
    /// created, keyed by `draw_id`.
    async fn store_seed(&self, draw_id: Uuid, server_seed: &str) -> Result<(), SchedulerError>;

    /// Reveals and removes the committed seed for a draw about to be
    /// executed. Returns `None` if no seed is on file (an integrity
    /// problem the caller must treat as fatal for that draw).
    async fn take_seed(&self, draw_id: Uuid) -> Result<Option<String>, SchedulerError>;
}

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLotteryRepository;
pub use postgres::PostgresLotteryRepository;
