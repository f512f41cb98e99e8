use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lottery::Currency;
use crate::money::Nano;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawStatus {
    Created,
    Open,
    Locked,
    Drawing,
    Calculating,
    Paying,
    Completed,
    Cancelled,
}

impl DrawStatus {
    /// Legal forward and retry transitions (spec §4.4). `Created` never
    /// appears as a stored status in this implementation: `create_draw`
    /// persists directly into `Open`, mirroring "initial state is OPEN"
    /// (spec §4.4); the variant is kept for completeness of the diagram.
    pub fn can_transition_to(self, next: DrawStatus) -> bool {
        use DrawStatus::*;
        matches!(
            (self, next),
            (Created, Open)
                | (Open, Locked)
                | (Open, Cancelled)
                | (Locked, Drawing)
                | (Locked, Cancelled)
                | (Drawing, Calculating)
                | (Drawing, Locked)
                | (Calculating, Paying)
                | (Calculating, Locked)
                | (Paying, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DrawStatus::Completed | DrawStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WinnerCounts {
    pub w5: u32,
    pub w4: u32,
    pub w3: u32,
    pub w2: u32,
    pub w1: u32,
}

impl WinnerCounts {
    pub fn total(&self) -> u32 {
        self.w5 + self.w4 + self.w3 + self.w2 + self.w1
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PayoutAmounts {
    pub jackpot_per_winner: Nano,
    pub match4_per_winner: Nano,
    pub match3_per_winner: Nano,
    pub match2_per_winner: Nano,
    pub match1_per_winner: Nano,
}

/// State record for one drawing. Field names follow the consolidated
/// canonical choices recorded in DESIGN.md (`drawn_at`, `total_paid_out`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draw {
    pub id: Uuid,
    pub lottery_id: Uuid,
    pub draw_number: i64,
    pub status: DrawStatus,
    pub currency: Currency,
    pub sales_open_at: DateTime<Utc>,
    pub sales_close_at: DateTime<Utc>,
    pub draw_time: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub drawn_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub server_seed_hash: String,
    pub server_seed: Option<String>,
    pub client_seed: Option<String>,
    pub client_seed_block_number: Option<u64>,
    pub nonce: u64,
    pub winning_numbers: Vec<u32>,
    pub winner_counts: WinnerCounts,
    pub payout_amounts: PayoutAmounts,
    pub total_paid_out: Nano,
    pub total_tickets: u32,
    pub total_collected: Nano,
}

impl Draw {
    /// Only an `Open` draw with sales still open accepts new tickets
    /// (spec §4.4 invariant: "once a draw leaves OPEN, no new ticket may
    /// be attached").
    pub fn is_accepting_purchases(&self, now: DateTime<Utc>) -> bool {
        self.status == DrawStatus::Open && self.sales_close_at > now
    }
}
