use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lottery::Currency;
use crate::money::Nano;

/// The five pools that make up a Fund row. Deliberately a plain struct
/// rather than a map: every pool is named in the spec and accessed by
/// name everywhere, so a `HashMap<Pool, Nano>` would only add an
/// unwrap at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub prize_pool: Nano,
    pub jackpot_pool: Nano,
    pub payout_pool: Nano,
    pub platform_pool: Nano,
    pub reserve_pool: Nano,
}

impl Pools {
    pub const ZERO: Pools = Pools {
        prize_pool: Nano::ZERO,
        jackpot_pool: Nano::ZERO,
        payout_pool: Nano::ZERO,
        platform_pool: Nano::ZERO,
        reserve_pool: Nano::ZERO,
    };

    /// Every pool is >= 0 at rest (spec §3 invariant).
    pub fn all_non_negative(&self) -> bool {
        !self.prize_pool.is_negative()
            && !self.jackpot_pool.is_negative()
            && !self.payout_pool.is_negative()
            && !self.platform_pool.is_negative()
            && !self.reserve_pool.is_negative()
    }
}

/// Which named pool a transaction moved funds from or to, for the
/// `from_pool`/`to_pool` columns of a FundTransaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pool {
    Prize,
    Jackpot,
    Payout,
    Platform,
    Reserve,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundCounters {
    pub total_collected: Nano,
    pub total_paid_out: Nano,
    pub total_to_reserve: Nano,
    pub total_to_jackpot: Nano,
}

impl FundCounters {
    pub const ZERO: FundCounters = FundCounters {
        total_collected: Nano::ZERO,
        total_paid_out: Nano::ZERO,
        total_to_reserve: Nano::ZERO,
        total_to_jackpot: Nano::ZERO,
    };
}

/// The ledger row for one (lottery, currency) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fund {
    pub lottery_id: Uuid,
    pub currency: Currency,
    pub pools: Pools,
    pub counters: FundCounters,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundTransactionType {
    TicketSale,
    PrizePayout,
    JackpotRollover,
    ToReserve,
    FromReserve,
    ManualAdjustment,
}

/// Append-only audit row. `snapshot` is the full Pools state immediately
/// after this move, so replaying the log from zero reproduces current
/// balances (spec §8 property 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundTransaction {
    pub id: Uuid,
    pub lottery_id: Uuid,
    pub currency: Currency,
    pub draw_id: Option<Uuid>,
    pub kind: FundTransactionType,
    pub amount: Nano,
    pub from_pool: Option<Pool>,
    pub to_pool: Option<Pool>,
    pub snapshot: Pools,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
