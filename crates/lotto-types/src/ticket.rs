use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Nano;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Active,
    Won,
    Lost,
    Cancelled,
}

/// Immutable purchase record, with post-draw result fields populated by
/// the calculator once its lottery's draw reaches `Calculating`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub lottery_id: Uuid,
    pub user_id: Uuid,
    pub draw_id: Uuid,
    pub numbers: Vec<u32>,
    pub price: Nano,
    pub status: TicketStatus,
    pub matched_numbers: u32,
    pub prize_amount: Nano,
    pub prize_claimed: bool,
    pub tx_hash: Option<String>,
    pub purchased_at: DateTime<Utc>,
    /// The wallet that paid for this ticket; winnings are paid back to
    /// this address (spec §4.6 records `senderAddress` at intake, §4.7
    /// needs a `recipientAddress` for every Payout — this is where it
    /// comes from for a ticket-backed prize).
    pub recipient_address: String,
}

impl Ticket {
    /// `numbers` must be sorted ascending, distinct, and within range
    /// (spec §8 property 4). Called at construction time so that every
    /// stored Ticket already satisfies the invariant.
    pub fn validate_numbers(numbers: &[u32], count: u32, max: u32) -> Result<(), String> {
        if numbers.len() as u32 != count {
            return Err(format!(
                "expected exactly {} numbers, got {}",
                count,
                numbers.len()
            ));
        }
        for w in numbers.windows(2) {
            if w[0] >= w[1] {
                return Err("numbers must be sorted ascending and distinct".into());
            }
        }
        if let Some(&first) = numbers.first() {
            if first < 1 {
                return Err("numbers must be >= 1".into());
            }
        }
        if let Some(&last) = numbers.last() {
            if last > max {
                return Err(format!("numbers must be <= {}", max));
            }
        }
        Ok(())
    }
}
