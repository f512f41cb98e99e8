use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lottery::Currency;
use crate::money::Nano;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A claim of funds against the Chain port. `total_amount`/`split_index`/
/// `split_total` are populated only when `queue_payout` split a large
/// prize across several Payouts (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub draw_id: Option<Uuid>,
    pub amount: Nano,
    pub currency: Currency,
    pub recipient_address: String,
    pub status: PayoutStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Earliest time the dispatcher may pick this payout up again.
    /// Set to `created_at` on insert and pushed forward by
    /// `mark_retry`'s exponential backoff (spec §4.7 step 7).
    pub next_attempt_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub total_amount: Option<Nano>,
    pub split_index: Option<u32>,
    pub split_total: Option<u32>,
}

impl Payout {
    pub fn is_split(&self) -> bool {
        self.split_total.map(|t| t > 1).unwrap_or(false)
    }
}
