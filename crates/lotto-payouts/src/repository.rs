use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lotto_types::{Currency, Nano, Payout};
use uuid::Uuid;

use crate::error::PayoutError;

/// Durable access to Payout rows (spec §4.7, C7). `due_for_dispatch`
/// implements the FIFO `createdAt` ordering the queue contract requires
/// and gates on `next_attempt_at` so a retried payout waits out its
/// backoff instead of being picked up on the very next tick;
/// `completed_total_since` backs the daily-limit check.
#[async_trait]
pub trait PayoutRepository: Send + Sync {
    async fn insert(&self, payout: Payout) -> Result<Payout, PayoutError>;
    async fn insert_batch(&self, payouts: Vec<Payout>) -> Result<Vec<Payout>, PayoutError>;
    async fn load(&self, payout_id: Uuid) -> Result<Payout, PayoutError>;
    async fn due_for_dispatch(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Payout>, PayoutError>;
    async fn mark_processing(&self, payout_id: Uuid) -> Result<Payout, PayoutError>;
    async fn mark_completed(&self, payout_id: Uuid, tx_hash: &str) -> Result<Payout, PayoutError>;
    async fn mark_retry(
        &self,
        payout_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Payout, PayoutError>;
    async fn mark_failed(&self, payout_id: Uuid, error: &str) -> Result<Payout, PayoutError>;
    async fn in_doubt(&self) -> Result<Vec<Payout>, PayoutError>;
    async fn completed_total_since(
        &self,
        currency: Currency,
        since: DateTime<Utc>,
    ) -> Result<Nano, PayoutError>;
}

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPayoutRepository;
pub use postgres::PostgresPayoutRepository;
