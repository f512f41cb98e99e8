//! Winner & Payout Calculator (spec §4.3, C3): matches tickets to
//! winning numbers, computes per-tier payouts, and updates the ledger.

pub mod error;
pub mod matching;

pub use error::CalculatorError;
pub use matching::count_matches;

use std::sync::Arc;

use lotto_ledger::FundLedger;
use lotto_types::{Currency, Nano, PayoutAmounts, PayoutConfig, Pools, TicketStatus, WinnerCounts};
use uuid::Uuid;

/// One ticket's post-draw result, the payload of spec §4.3 step 6
/// (`updateTicketResults`). Persisting these is the caller's job
/// (`lotto-tickets` owns the Ticket table); this crate only computes
/// them.
#[derive(Debug, Clone)]
pub struct TicketResult {
    pub ticket_id: Uuid,
    pub matched_numbers: u32,
    pub prize_amount: Nano,
    pub status: TicketStatus,
}

/// The full output of one calculation pass: everything needed to update
/// tickets and the ledger, and nothing more.
#[derive(Debug, Clone)]
pub struct CalculationResult {
    pub winner_counts: WinnerCounts,
    pub payout_amounts: PayoutAmounts,
    pub to_reserve: Nano,
    pub platform_residue: Nano,
    pub jackpot_rolled_over: bool,
    pub ticket_results: Vec<TicketResult>,
}

/// Divides `pool_amount` among `winners` winners, rounding toward zero.
/// Returns `(per_winner, residue)` where `residue` is what's left after
/// `per_winner * winners` is subtracted — the rounding bias spec §4.3
/// documents as flowing to the platform pool.
fn divide_evenly(pool_amount: Nano, winners: u32) -> (Nano, Nano) {
    if winners == 0 {
        return (Nano::ZERO, Nano::ZERO);
    }
    let per_winner = pool_amount.mul_div(1, winners as i64);
    let distributed = per_winner.mul_div(winners as i64, 1);
    (per_winner, pool_amount - distributed)
}

/// Pure calculation (spec §4.3 steps 1-5; step 6 is represented as data
/// in `ticket_results` rather than performed here). A pure function of
/// its inputs: calling this twice with the same tickets, winning
/// numbers, and fund snapshot returns identical results (spec §8
/// property 7).
pub fn calculate(
    tickets: &[(Uuid, Vec<u32>)],
    winning_numbers: &[u32],
    pools: Pools,
    config: &PayoutConfig,
) -> CalculationResult {
    let mut winner_counts = WinnerCounts::default();
    let mut matches_by_ticket = Vec::with_capacity(tickets.len());
    for (ticket_id, numbers) in tickets {
        let matched = count_matches(numbers, winning_numbers);
        matches_by_ticket.push((*ticket_id, matched));
        match matched {
            5 => winner_counts.w5 += 1,
            4 => winner_counts.w4 += 1,
            3 => winner_counts.w3 += 1,
            2 => winner_counts.w2 += 1,
            1 => winner_counts.w1 += 1,
            _ => {}
        }
    }

    let mut platform_residue = Nano::ZERO;

    let (jackpot_per_winner, jackpot_rolled_over) = if winner_counts.w5 > 0 {
        let (per_winner, residue) = divide_evenly(pools.jackpot_pool, winner_counts.w5);
        platform_residue = platform_residue + residue;
        (per_winner, false)
    } else {
        (Nano::ZERO, true)
    };

    let mut to_reserve = Nano::ZERO;
    let tier = |share: lotto_types::Bps, winners: u32| -> Nano {
        let allocation = share.apply(pools.payout_pool);
        if winners == 0 {
            to_reserve = to_reserve + allocation;
            Nano::ZERO
        } else {
            let (per_winner, residue) = divide_evenly(allocation, winners);
            platform_residue = platform_residue + residue;
            per_winner
        }
    };
    let match4_per_winner = tier(config.match4_share, winner_counts.w4);
    let match3_per_winner = tier(config.match3_share, winner_counts.w3);
    let match2_per_winner = tier(config.match2_share, winner_counts.w2);

    let match1_per_winner = if winner_counts.w1 > 0 {
        config.match1_fixed
    } else {
        Nano::ZERO
    };

    let payout_amounts = PayoutAmounts {
        jackpot_per_winner,
        match4_per_winner,
        match3_per_winner,
        match2_per_winner,
        match1_per_winner,
    };

    let per_winner_for = |matched: u32| -> Nano {
        match matched {
            5 => payout_amounts.jackpot_per_winner,
            4 => payout_amounts.match4_per_winner,
            3 => payout_amounts.match3_per_winner,
            2 => payout_amounts.match2_per_winner,
            1 => payout_amounts.match1_per_winner,
            _ => Nano::ZERO,
        }
    };

    let ticket_results = matches_by_ticket
        .into_iter()
        .map(|(ticket_id, matched)| {
            let prize_amount = per_winner_for(matched);
            let status = if prize_amount.0 > 0 {
                TicketStatus::Won
            } else {
                TicketStatus::Lost
            };
            TicketResult {
                ticket_id,
                matched_numbers: matched,
                prize_amount,
                status,
            }
        })
        .collect();

    CalculationResult {
        winner_counts,
        payout_amounts,
        to_reserve,
        platform_residue,
        jackpot_rolled_over,
        ticket_results,
    }
}

/// Applies a `CalculationResult` to the ledger: debits the jackpot/
/// payout/reserve pools for each tier actually paid, moves zero-winner
/// tier allocations to the reserve pool, credits rounding residue to
/// the platform pool, and records a jackpot rollover counter bump when
/// nobody hit five of five. Idempotence against double-application is
/// the caller's responsibility (skip tickets whose status is no longer
/// `active`, per spec §4.3 step 6) since this crate doesn't own ticket
/// persistence.
pub async fn apply(
    ledger: &FundLedger,
    lottery_id: Uuid,
    currency: Currency,
    draw_id: Uuid,
    result: &CalculationResult,
) -> Result<(), CalculatorError> {
    let wc = &result.winner_counts;
    let pa = &result.payout_amounts;

    if wc.w5 > 0 && pa.jackpot_per_winner.0 > 0 {
        let total = pa.jackpot_per_winner.mul_div(wc.w5 as i64, 1);
        ledger
            .process_payout(lottery_id, currency, total, 5, draw_id, "draw-payout-match5")
            .await?;
    }
    if wc.w4 > 0 && pa.match4_per_winner.0 > 0 {
        let total = pa.match4_per_winner.mul_div(wc.w4 as i64, 1);
        ledger
            .process_payout(lottery_id, currency, total, 4, draw_id, "draw-payout-match4")
            .await?;
    }
    if wc.w3 > 0 && pa.match3_per_winner.0 > 0 {
        let total = pa.match3_per_winner.mul_div(wc.w3 as i64, 1);
        ledger
            .process_payout(lottery_id, currency, total, 3, draw_id, "draw-payout-match3")
            .await?;
    }
    if wc.w2 > 0 && pa.match2_per_winner.0 > 0 {
        let total = pa.match2_per_winner.mul_div(wc.w2 as i64, 1);
        ledger
            .process_payout(lottery_id, currency, total, 2, draw_id, "draw-payout-match2")
            .await?;
    }
    if wc.w1 > 0 && pa.match1_per_winner.0 > 0 {
        let total = pa.match1_per_winner.mul_div(wc.w1 as i64, 1);
        ledger
            .process_payout(lottery_id, currency, total, 1, draw_id, "draw-payout-match1")
            .await?;
    }
    if result.to_reserve.0 > 0 {
        ledger
            .transfer_to_reserve(lottery_id, currency, result.to_reserve, "unclaimed tier allocation")
            .await?;
    }
    if result.jackpot_rolled_over {
        ledger.rollover_jackpot(lottery_id, currency, Nano::ZERO, draw_id).await?;
    }
    ledger
        .credit_platform_residue(lottery_id, currency, result.platform_residue, draw_id)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_types::Bps;

    fn config() -> PayoutConfig {
        PayoutConfig {
            lottery_id: Uuid::new_v4(),
            platform_share: Bps(5000),
            prize_share: Bps(5000),
            jackpot_share: Bps(1500),
            payout_share: Bps(8500),
            match4_share: Bps(6000),
            match3_share: Bps(3000),
            match2_share: Bps(1000),
            match1_fixed: Nano(1),
            reserve_share: Bps(1000),
            income_share: Bps(9000),
        }
    }

    fn pools(jackpot: i64, payout: i64) -> Pools {
        Pools {
            prize_pool: Nano::ZERO,
            jackpot_pool: Nano(jackpot),
            payout_pool: Nano(payout),
            platform_pool: Nano::ZERO,
            reserve_pool: Nano(1000),
        }
    }

    // S2 — rollover scenario (spec §8 S2).
    #[test]
    fn s2_rollover() {
        let tickets = vec![
            (Uuid::new_v4(), vec![1, 2, 3, 10, 11]),
            (Uuid::new_v4(), vec![1, 2, 3, 20, 21]),
        ];
        let winning = vec![1, 2, 3, 40, 41];
        let result = calculate(&tickets, &winning, pools(100, 50), &config());
        assert_eq!(result.winner_counts.w5, 0);
        assert_eq!(result.winner_counts.w3, 2);
        assert_eq!(result.payout_amounts.jackpot_per_winner, Nano::ZERO);
        assert_eq!(result.payout_amounts.match3_per_winner, Nano(7));
        assert!(result.jackpot_rolled_over);
        assert_eq!(result.to_reserve, Nano(30 + 5));
    }

    #[test]
    fn idempotent_on_identical_inputs() {
        let tickets = vec![(Uuid::new_v4(), vec![1, 2, 3, 4, 5])];
        let winning = vec![1, 2, 3, 4, 5];
        let a = calculate(&tickets, &winning, pools(100, 50), &config());
        let b = calculate(&tickets, &winning, pools(100, 50), &config());
        assert_eq!(a.winner_counts.w5, b.winner_counts.w5);
        assert_eq!(a.payout_amounts.jackpot_per_winner, b.payout_amounts.jackpot_per_winner);
    }

    #[test]
    fn zero_tier_winners_flow_to_reserve() {
        let tickets = vec![(Uuid::new_v4(), vec![10, 20, 30, 40, 46])];
        let winning = vec![1, 2, 3, 4, 5];
        let result = calculate(&tickets, &winning, pools(0, 1000), &config());
        assert_eq!(result.winner_counts.total(), 0);
        assert_eq!(result.to_reserve, Nano(1000));
    }
}
