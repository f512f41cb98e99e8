//! Integer minor-unit money. No floats ever touch a balance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// An amount in the smallest unit of some currency (nanotoken for TON,
/// 6-decimal microunit for USDT). Always non-negative at rest; ledger
/// code is responsible for rejecting operations that would make one
/// negative before it is ever constructed as a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nano(pub i64);

impl Nano {
    pub const ZERO: Nano = Nano(0);

    pub fn checked_add(self, rhs: Nano) -> Option<Nano> {
        self.0.checked_add(rhs.0).map(Nano)
    }

    pub fn checked_sub(self, rhs: Nano) -> Option<Nano> {
        self.0.checked_sub(rhs.0).map(Nano)
    }

    /// `self * numerator / denominator`, rounded toward zero, as the spec's
    /// distribution arithmetic requires (§4.1). Panics on overflow of the
    /// intermediate i128 product, which cannot happen for realistic amounts.
    pub fn mul_div(self, numerator: i64, denominator: i64) -> Nano {
        let product = self.0 as i128 * numerator as i128;
        Nano((product / denominator as i128) as i64)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Nano {
    type Output = Nano;
    fn add(self, rhs: Nano) -> Nano {
        Nano(self.0 + rhs.0)
    }
}

impl Sub for Nano {
    type Output = Nano;
    fn sub(self, rhs: Nano) -> Nano {
        Nano(self.0 - rhs.0)
    }
}

impl fmt::Display for Nano {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A share expressed in basis points out of 10_000, never a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(pub u16);

impl Bps {
    pub const ONE: Bps = Bps(10_000);

    pub fn apply(self, amount: Nano) -> Nano {
        amount.mul_div(self.0 as i64, 10_000)
    }

    pub fn complement(self) -> Bps {
        Bps(10_000 - self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_rounds_toward_zero() {
        assert_eq!(Nano(10).mul_div(1, 3), Nano(3));
        assert_eq!(Nano(-10).mul_div(1, 3), Nano(-3));
    }

    #[test]
    fn bps_apply_is_exact_on_round_numbers() {
        assert_eq!(Bps(5000).apply(Nano(10)), Nano(5));
        assert_eq!(Bps(1500).apply(Nano(5)), Nano(0));
    }

    #[test]
    fn bps_complement() {
        assert_eq!(Bps(5000).complement(), Bps(5000));
        assert_eq!(Bps(9000).complement(), Bps(1000));
    }
}
