use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Bps, Nano};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Ton,
    Usdt,
}

impl Currency {
    /// Smallest units per one major unit: 1e9 nanotoken per TON, 1e6
    /// microunit per USDT (spec §9: "rationals are converted to the
    /// currency's smallest unit before any multiplication or division").
    pub fn smallest_units_per_major(self) -> i64 {
        match self {
            Currency::Ton => 1_000_000_000,
            Currency::Usdt => 1_000_000,
        }
    }

    /// The deposit-amount tolerance used by Ticket Sale Intake (spec
    /// §4.6 step 3): 0.01 of the currency's major unit.
    pub fn deposit_tolerance(self) -> Nano {
        Nano(self.smallest_units_per_major() / 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawCadence {
    Hourly,
    Daily,
    Weekly,
}

/// Stable lottery configuration. Mutated only by the admin flow (out of
/// scope here) and by jackpot rollover (`accumulated_jackpot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lottery {
    pub id: Uuid,
    pub slug: String,
    pub active: bool,
    pub numbers_count: u32,
    pub numbers_max: u32,
    pub ticket_price_nano: Nano,
    pub base_jackpot: Nano,
    pub accumulated_jackpot: Nano,
    pub currency: Currency,
    pub cadence: DrawCadence,
    pub draw_hour: u8,
}

impl Lottery {
    pub fn validate(&self) -> Result<(), String> {
        if self.numbers_count < 1 || self.numbers_count > self.numbers_max {
            return Err(format!(
                "numbers_count {} must be within [1, numbers_max={}]",
                self.numbers_count, self.numbers_max
            ));
        }
        if self.ticket_price_nano.0 < 1 {
            return Err("ticket_price_nano must be >= 1".into());
        }
        Ok(())
    }
}

/// Share configuration for one Lottery. All shares are basis points;
/// `match1_fixed` is an absolute per-winner amount, not a share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PayoutConfig {
    pub lottery_id: Uuid,
    pub platform_share: Bps,
    pub prize_share: Bps,
    pub jackpot_share: Bps,
    pub payout_share: Bps,
    pub match4_share: Bps,
    pub match3_share: Bps,
    pub match2_share: Bps,
    pub match1_fixed: Nano,
    pub reserve_share: Bps,
    pub income_share: Bps,
}

impl PayoutConfig {
    /// Checks the four summing invariants from spec §3. Returns the
    /// first violated constraint, if any.
    pub fn validate(&self) -> Result<(), String> {
        let sum = |a: Bps, b: Bps| a.0 as u32 + b.0 as u32;
        if sum(self.platform_share, self.prize_share) != 10_000 {
            return Err("platform_share + prize_share must equal 1.0".into());
        }
        if sum(self.jackpot_share, self.payout_share) != 10_000 {
            return Err("jackpot_share + payout_share must equal 1.0".into());
        }
        let tier_sum =
            self.match4_share.0 as u32 + self.match3_share.0 as u32 + self.match2_share.0 as u32;
        if tier_sum != 10_000 {
            return Err("match4_share + match3_share + match2_share must equal 1.0".into());
        }
        if sum(self.reserve_share, self.income_share) != 10_000 {
            return Err("reserve_share + income_share must equal 1.0".into());
        }
        Ok(())
    }
}
