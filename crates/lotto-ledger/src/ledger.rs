use std::sync::Arc;

use chrono::Utc;
use lotto_types::{
    Currency, Fund, FundTransaction, FundTransactionType, Nano, Pool, PayoutConfig, Pools,
};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::repository::FundRepository;

/// The distribution of one ticket-sale amount across all five pools
/// (spec §4.1 distribution arithmetic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleDistribution {
    pub prize_pool: Nano,
    pub jackpot_pool: Nano,
    pub payout_pool: Nano,
    pub platform_pool: Nano,
    pub reserve_pool: Nano,
    pub income: Nano,
}

/// Per-tier payout figures a calculator fetches before mutating the
/// ledger; this is a pure read, never mutates (spec §4.1 op 2).
#[derive(Debug, Clone, Copy)]
pub struct PayoutCalculation {
    pub available_jackpot: Nano,
    pub available_payout: Nano,
    pub available_reserve: Nano,
}

/// Computes the sale distribution for amount `A` against `config`,
/// exactly as spec §4.1 lays out: every division is an integer
/// `mul_div`, and the platform pool absorbs rounding residue by being
/// computed as a subtraction rather than its own share multiplication.
pub fn distribute_sale(amount: Nano, config: &PayoutConfig) -> SaleDistribution {
    let prize = config.prize_share.apply(amount);
    let platform = amount - prize;
    let jackpot = config.jackpot_share.apply(prize);
    let payout = prize - jackpot;
    let reserve = config.reserve_share.apply(platform);
    let income = platform - reserve;
    SaleDistribution {
        prize_pool: prize,
        jackpot_pool: jackpot,
        payout_pool: payout,
        platform_pool: platform,
        reserve_pool: reserve,
        income,
    }
}

/// Which pool a given match tier draws its prize from (spec §4.1 op 3):
/// 5 of 5 pays from the jackpot pool, 1 of 5 is the reserve-funded fixed
/// prize, everything in between comes out of the payout pool.
fn source_pool_for_match_count(match_count: u8) -> Option<Pool> {
    match match_count {
        5 => Some(Pool::Jackpot),
        4 | 3 | 2 => Some(Pool::Payout),
        1 => Some(Pool::Reserve),
        _ => None,
    }
}

/// Durable, transactional Fund Ledger (spec §4.1, C1). Every mutating
/// method commits a Fund update and a FundTransaction audit row as one
/// atomic unit via the underlying `FundRepository`.
pub struct FundLedger {
    repository: Arc<dyn FundRepository>,
}

impl FundLedger {
    pub fn new(repository: Arc<dyn FundRepository>) -> Self {
        FundLedger { repository }
    }

    fn new_transaction(
        fund: &Fund,
        draw_id: Option<Uuid>,
        kind: FundTransactionType,
        amount: Nano,
        from_pool: Option<Pool>,
        to_pool: Option<Pool>,
        reference: Option<String>,
    ) -> FundTransaction {
        FundTransaction {
            id: Uuid::new_v4(),
            lottery_id: fund.lottery_id,
            currency: fund.currency,
            draw_id,
            kind,
            amount,
            from_pool,
            to_pool,
            snapshot: fund.pools,
            reference,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub async fn process_ticket_sale(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        amount: Nano,
        config: &PayoutConfig,
        reference: &str,
    ) -> Result<SaleDistribution, LedgerError> {
        config.validate().map_err(LedgerError::InvalidConfig)?;
        let distribution = distribute_sale(amount, config);
        let reference = reference.to_string();

        self.repository
            .mutate_fund(
                lottery_id,
                currency,
                Box::new(move |fund| {
                    fund.pools.prize_pool = fund.pools.prize_pool + distribution.prize_pool;
                    fund.pools.jackpot_pool = fund.pools.jackpot_pool + distribution.jackpot_pool;
                    fund.pools.payout_pool = fund.pools.payout_pool + distribution.payout_pool;
                    fund.pools.platform_pool = fund.pools.platform_pool + distribution.platform_pool;
                    fund.pools.reserve_pool = fund.pools.reserve_pool + distribution.reserve_pool;
                    fund.counters.total_collected = fund.counters.total_collected + amount;
                    Ok(Self::new_transaction(
                        fund,
                        None,
                        FundTransactionType::TicketSale,
                        amount,
                        None,
                        None,
                        Some(reference.clone()),
                    ))
                }),
            )
            .await?;
        Ok(distribution)
    }

    /// Pure query against the current Fund row; never mutates (spec
    /// §4.1 op 2). Fails with `InsufficientReserve` up front so the
    /// calculator can decide not to proceed before touching tickets.
    pub async fn calculate_draw_payouts(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        match1_winners: u32,
        match1_fixed: Nano,
    ) -> Result<PayoutCalculation, LedgerError> {
        let fund = self.repository.get_or_create_fund(lottery_id, currency).await?;
        let required_reserve = match1_fixed.mul_div(match1_winners as i64, 1);
        if fund.pools.reserve_pool.0 < required_reserve.0 {
            return Err(LedgerError::InsufficientReserve);
        }
        Ok(PayoutCalculation {
            available_jackpot: fund.pools.jackpot_pool,
            available_payout: fund.pools.payout_pool,
            available_reserve: fund.pools.reserve_pool,
        })
    }

    pub async fn process_payout(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        amount: Nano,
        match_count: u8,
        draw_id: Uuid,
        reference: &str,
    ) -> Result<(), LedgerError> {
        let source =
            source_pool_for_match_count(match_count).ok_or_else(|| {
                LedgerError::InvalidConfig(format!("no pool mapped for match_count {match_count}"))
            })?;
        let reference = reference.to_string();

        self.repository
            .mutate_fund(
                lottery_id,
                currency,
                Box::new(move |fund| {
                    let pool_name = match source {
                        Pool::Jackpot => "jackpot",
                        Pool::Payout => "payout",
                        Pool::Reserve => "reserve",
                        _ => unreachable!("process_payout only draws from jackpot/payout/reserve"),
                    };
                    let current = match source {
                        Pool::Jackpot => fund.pools.jackpot_pool,
                        Pool::Payout => fund.pools.payout_pool,
                        Pool::Reserve => fund.pools.reserve_pool,
                        _ => unreachable!(),
                    };
                    let remaining = current
                        .checked_sub(amount)
                        .ok_or(LedgerError::InsufficientPool { pool: pool_name })?;
                    if remaining.is_negative() {
                        return Err(LedgerError::InsufficientPool { pool: pool_name });
                    }
                    match source {
                        Pool::Jackpot => fund.pools.jackpot_pool = remaining,
                        Pool::Payout => fund.pools.payout_pool = remaining,
                        Pool::Reserve => fund.pools.reserve_pool = remaining,
                        _ => unreachable!(),
                    }
                    fund.counters.total_paid_out = fund.counters.total_paid_out + amount;

                    Ok(Self::new_transaction(
                        fund,
                        Some(draw_id),
                        FundTransactionType::PrizePayout,
                        amount,
                        Some(source),
                        None,
                        Some(reference.clone()),
                    ))
                }),
            )
            .await?;
        Ok(())
    }

    /// The amount stays in `jackpot_pool`; only the reporting counter
    /// changes, making the rollover visible without moving money that
    /// never left the pool (spec §9 Open Question: `toJackpot` is a
    /// reporting counter bumped only here).
    pub async fn rollover_jackpot(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        amount: Nano,
        draw_id: Uuid,
    ) -> Result<(), LedgerError> {
        self.repository
            .mutate_fund(
                lottery_id,
                currency,
                Box::new(move |fund| {
                    fund.counters.total_to_jackpot = fund.counters.total_to_jackpot + amount;
                    Ok(Self::new_transaction(
                        fund,
                        Some(draw_id),
                        FundTransactionType::JackpotRollover,
                        amount,
                        None,
                        Some(Pool::Jackpot),
                        None,
                    ))
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn transfer_to_reserve(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        amount: Nano,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let reason = reason.to_string();

        self.repository
            .mutate_fund(
                lottery_id,
                currency,
                Box::new(move |fund| {
                    let remaining = fund
                        .pools
                        .payout_pool
                        .checked_sub(amount)
                        .ok_or(LedgerError::InsufficientPool { pool: "payout" })?;
                    if remaining.is_negative() {
                        return Err(LedgerError::InsufficientPool { pool: "payout" });
                    }
                    fund.pools.payout_pool = remaining;
                    fund.pools.reserve_pool = fund.pools.reserve_pool + amount;
                    fund.counters.total_to_reserve = fund.counters.total_to_reserve + amount;

                    let mut transaction = Self::new_transaction(
                        fund,
                        None,
                        FundTransactionType::ToReserve,
                        amount,
                        Some(Pool::Payout),
                        Some(Pool::Reserve),
                        None,
                    );
                    transaction.note = Some(reason.clone());
                    Ok(transaction)
                }),
            )
            .await?;
        Ok(())
    }

    /// Credits `platform_pool` with a tier's rounding residue (spec §4.3
    /// "Ordering / tie-breaks": divisions round toward zero and the
    /// residue is documented as going to the platform pool). Recorded as
    /// a `manual_adjustment` row since it is not one of the five named
    /// operations in spec §4.1 but the entity model already reserves
    /// this FundTransaction kind for exactly this sort of bookkeeping
    /// credit.
    pub async fn credit_platform_residue(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        amount: Nano,
        draw_id: Uuid,
    ) -> Result<(), LedgerError> {
        if amount.0 == 0 {
            return Ok(());
        }
        self.repository
            .mutate_fund(
                lottery_id,
                currency,
                Box::new(move |fund| {
                    fund.pools.platform_pool = fund.pools.platform_pool + amount;
                    Ok(Self::new_transaction(
                        fund,
                        Some(draw_id),
                        FundTransactionType::ManualAdjustment,
                        amount,
                        None,
                        Some(Pool::Platform),
                        Some("rounding residue".to_string()),
                    ))
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn fund(&self, lottery_id: Uuid, currency: Currency) -> Result<Fund, LedgerError> {
        Ok(self.repository.get_or_create_fund(lottery_id, currency).await?)
    }

    pub async fn transactions(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Vec<FundTransaction>, LedgerError> {
        Ok(self.repository.list_transactions(lottery_id, currency).await?)
    }
}

/// Replays a FundTransaction log from zero and reconstructs per-pool
/// balances, the other half of spec §8 property 2 (the repository
/// itself only has to keep the snapshot; this is the auditor's check).
pub fn replay(transactions: &[FundTransaction]) -> Pools {
    let mut pools = Pools::ZERO;
    for tx in transactions {
        match (tx.from_pool, tx.to_pool) {
            (Some(from), Some(to)) => {
                subtract_from(&mut pools, from, tx.amount);
                add_to(&mut pools, to, tx.amount);
            }
            (Some(from), None) => subtract_from(&mut pools, from, tx.amount),
            (None, Some(to)) => add_to(&mut pools, to, tx.amount),
            (None, None) => {}
        }
    }
    pools
}

fn add_to(pools: &mut Pools, pool: Pool, amount: Nano) {
    match pool {
        Pool::Prize => pools.prize_pool = pools.prize_pool + amount,
        Pool::Jackpot => pools.jackpot_pool = pools.jackpot_pool + amount,
        Pool::Payout => pools.payout_pool = pools.payout_pool + amount,
        Pool::Platform => pools.platform_pool = pools.platform_pool + amount,
        Pool::Reserve => pools.reserve_pool = pools.reserve_pool + amount,
    }
}

fn subtract_from(pools: &mut Pools, pool: Pool, amount: Nano) {
    match pool {
        Pool::Prize => pools.prize_pool = pools.prize_pool - amount,
        Pool::Jackpot => pools.jackpot_pool = pools.jackpot_pool - amount,
        Pool::Payout => pools.payout_pool = pools.payout_pool - amount,
        Pool::Platform => pools.platform_pool = pools.platform_pool - amount,
        Pool::Reserve => pools.reserve_pool = pools.reserve_pool - amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryFundRepository;
    use lotto_types::Bps;

    fn config(lottery_id: Uuid) -> PayoutConfig {
        PayoutConfig {
            lottery_id,
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

    // S1 — sale distribution (spec §8 S1), scaled so 10 units maps to
    // nano amounts large enough not to round away: ticket price 10_000.
    #[tokio::test]
    async fn s1_sale_distribution() {
        let repo = Arc::new(InMemoryFundRepository::new());
        let ledger = FundLedger::new(repo);
        let lottery_id = Uuid::new_v4();
        let cfg = config(lottery_id);
        let dist = ledger
            .process_ticket_sale(lottery_id, Currency::Ton, Nano(10_000), &cfg, "sale-1")
            .await
            .unwrap();
        assert_eq!(dist.prize_pool, Nano(5_000));
        assert_eq!(dist.jackpot_pool, Nano(750));
        assert_eq!(dist.payout_pool, Nano(4_250));
        assert_eq!(dist.platform_pool, Nano(5_000));
        assert_eq!(dist.reserve_pool, Nano(500));

        let fund = ledger.fund(lottery_id, Currency::Ton).await.unwrap();
        assert!(fund.pools.all_non_negative());
        let txs = ledger.transactions(lottery_id, Currency::Ton).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].snapshot.prize_pool, Nano(5_000));
    }

    #[tokio::test]
    async fn insufficient_pool_rejects_payout() {
        let repo = Arc::new(InMemoryFundRepository::new());
        let ledger = FundLedger::new(repo);
        let lottery_id = Uuid::new_v4();
        let draw_id = Uuid::new_v4();
        let err = ledger
            .process_payout(lottery_id, Currency::Ton, Nano(100), 4, draw_id, "p1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPool { pool: "payout" }));
    }

    #[tokio::test]
    async fn share_conservation_property() {
        let repo = Arc::new(InMemoryFundRepository::new());
        let ledger = FundLedger::new(repo);
        let lottery_id = Uuid::new_v4();
        let cfg = config(lottery_id);
        for amount in [1i64, 7, 1000, 123_456] {
            let dist = distribute_sale(Nano(amount), &cfg);
            assert_eq!(dist.prize_pool + dist.platform_pool, Nano(amount));
            assert_eq!(dist.jackpot_pool + dist.payout_pool, dist.prize_pool);
            assert_eq!(dist.reserve_pool + dist.income, dist.platform_pool);
        }
    }

    #[tokio::test]
    async fn replay_reconstructs_balances() {
        let lottery_id = Uuid::new_v4();
        let base = FundTransaction {
            id: Uuid::new_v4(),
            lottery_id,
            currency: Currency::Ton,
            draw_id: None,
            kind: FundTransactionType::ToReserve,
            amount: Nano(200),
            from_pool: Some(Pool::Payout),
            to_pool: Some(Pool::Reserve),
            snapshot: Pools::ZERO,
            reference: None,
            note: None,
            created_at: Utc::now(),
        };
        let mut credit = base.clone();
        credit.kind = FundTransactionType::TicketSale;
        credit.from_pool = None;
        credit.to_pool = Some(Pool::Payout);
        credit.amount = Nano(1000);

        let pools = replay(&[credit, base]);
        assert_eq!(pools.payout_pool, Nano(800));
        assert_eq!(pools.reserve_pool, Nano(200));
    }
}
