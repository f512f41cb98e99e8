use std::sync::Arc;

use chrono::{Duration, Utc};
use lotto_calculator::CalculationResult;
use lotto_chain::Chain;
use lotto_draw::DrawService;
use lotto_ledger::FundLedger;
use lotto_types::{Draw, Lottery, Nano, PayoutConfig, Ticket, TicketStatus};
use uuid::Uuid;

use crate::error::TicketSaleError;
use crate::repository::TicketRepository;

const MIN_TICKETS: usize = 1;
const MAX_TICKETS: usize = 100;
/// Ticket counts at or above this trigger the bulk discount (spec §4.6
/// step 2 / §9 "bulk ticket discount").
const BULK_DISCOUNT_THRESHOLD: usize = 5;
const BULK_DISCOUNT_NUMERATOR: i64 = 95;
const BULK_DISCOUNT_DENOMINATOR: i64 = 100;
/// Deposits must be confirmed within this window (spec §4.6 step 3).
const DEPOSIT_FRESHNESS: Duration = Duration::hours(1);

/// Ticket Sale Intake (spec §4.6, C6). Verifies an on-chain deposit,
/// allocates tickets to the currently open draw, and credits the
/// ledger — all as one logical unit; a failure partway compensates by
/// releasing the tx_hash reservation and deleting any tickets already
/// inserted; so a `AlreadyClaimed` only the guard persists, never a
/// half-sold ticket set.
pub struct TicketSaleIntake {
    tickets: Arc<dyn TicketRepository>,
    chain: Arc<dyn Chain>,
    ledger: Arc<FundLedger>,
    draws: Arc<DrawService>,
}

impl TicketSaleIntake {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        chain: Arc<dyn Chain>,
        ledger: Arc<FundLedger>,
        draws: Arc<DrawService>,
    ) -> Self {
        TicketSaleIntake {
            tickets,
            chain,
            ledger,
            draws,
        }
    }

    /// `expectedNano` for `ticket_count` tickets at `ticket_price`,
    /// including the bulk discount (spec §4.6 step 2): exact integer
    /// arithmetic, `x * 95 / 100`, never floats.
    pub fn expected_amount(ticket_price: Nano, ticket_count: usize) -> Nano {
        let subtotal = ticket_price.mul_div(ticket_count as i64, 1);
        if ticket_count >= BULK_DISCOUNT_THRESHOLD {
            subtotal.mul_div(BULK_DISCOUNT_NUMERATOR, BULK_DISCOUNT_DENOMINATOR)
        } else {
            subtotal
        }
    }

    pub async fn buy_tickets(
        &self,
        user_id: Uuid,
        lottery: &Lottery,
        config: &PayoutConfig,
        numbers: Vec<Vec<u32>>,
        tx_hash: &str,
        sender_address: &str,
        platform_wallet: &str,
    ) -> Result<(Vec<Ticket>, Draw), TicketSaleError> {
        if numbers.len() < MIN_TICKETS || numbers.len() > MAX_TICKETS {
            return Err(TicketSaleError::Validation(format!(
                "ticket count {} must be within [{}, {}]",
                numbers.len(),
                MIN_TICKETS,
                MAX_TICKETS
            )));
        }
        let mut sorted_numbers = Vec::with_capacity(numbers.len());
        for mut picks in numbers {
            picks.sort_unstable();
            Ticket::validate_numbers(&picks, lottery.numbers_count, lottery.numbers_max)
                .map_err(TicketSaleError::Validation)?;
            sorted_numbers.push(picks);
        }
        let ticket_count = sorted_numbers.len();
        let expected = Self::expected_amount(lottery.ticket_price_nano, ticket_count);

        self.tickets.reserve_tx_hash(tx_hash).await?;

        let result = self
            .complete_purchase(
                user_id,
                lottery,
                config,
                sorted_numbers,
                tx_hash,
                sender_address,
                platform_wallet,
                expected,
            )
            .await;

        if result.is_err() {
            self.tickets.release_tx_hash(tx_hash).await.ok();
        }
        result
    }

    /// Runs after `reserve_tx_hash` has already claimed the hash. Tickets
    /// are inserted before the ledger credit and draw total update, so
    /// that if either of those later steps fails we can compensate by
    /// deleting the rows we just wrote — there is no shared transaction
    /// spanning `lotto-tickets`, `lotto-ledger` and `lotto-draw`, so this
    /// ordering is what keeps a failed purchase from leaving a ledger
    /// credit with no matching tickets.
    #[allow(clippy::too_many_arguments)]
    async fn complete_purchase(
        &self,
        user_id: Uuid,
        lottery: &Lottery,
        config: &PayoutConfig,
        sorted_numbers: Vec<Vec<u32>>,
        tx_hash: &str,
        sender_address: &str,
        platform_wallet: &str,
        expected: Nano,
    ) -> Result<(Vec<Ticket>, Draw), TicketSaleError> {
        let deposit = self
            .chain
            .fetch_transaction(tx_hash, platform_wallet, Some(sender_address))
            .await?;

        if !deposit.confirmed {
            return Err(TicketSaleError::DepositRejected("transaction not confirmed".into()));
        }
        let tolerance = lottery.currency.deposit_tolerance();
        if deposit.amount.checked_sub(expected).map(|d| d.0 < -tolerance.0).unwrap_or(true) {
            return Err(TicketSaleError::DepositRejected(format!(
                "deposit {} below expected {} (tolerance {})",
                deposit.amount, expected, tolerance
            )));
        }
        let age = Utc::now().timestamp() - deposit.timestamp_unix;
        if age < 0 || age > DEPOSIT_FRESHNESS.num_seconds() {
            return Err(TicketSaleError::DepositRejected("deposit outside freshness window".into()));
        }

        let draw = self
            .draws
            .find_open_draw(lottery.id)
            .await?
            .ok_or(TicketSaleError::NoOpenDraw)?;

        let now = Utc::now();
        let ticket_count = sorted_numbers.len() as i64;
        let price_per_ticket = Nano(expected.0 / ticket_count.max(1));
        let mut tickets = Vec::with_capacity(sorted_numbers.len());
        for (index, picks) in sorted_numbers.into_iter().enumerate() {
            tickets.push(Ticket {
                id: Uuid::new_v4(),
                lottery_id: lottery.id,
                user_id,
                draw_id: draw.id,
                numbers: picks,
                price: price_per_ticket,
                status: TicketStatus::Active,
                matched_numbers: 0,
                prize_amount: Nano::ZERO,
                prize_claimed: false,
                tx_hash: if index == 0 { Some(tx_hash.to_string()) } else { None },
                purchased_at: now,
                recipient_address: sender_address.to_string(),
            });
        }

        let inserted = self.tickets.insert_tickets(tickets).await?;
        let ticket_ids: Vec<Uuid> = inserted.iter().map(|t| t.id).collect();

        if let Err(err) = self
            .ledger
            .process_ticket_sale(lottery.id, lottery.currency, expected, config, tx_hash)
            .await
        {
            self.tickets.delete_tickets(&ticket_ids).await.ok();
            return Err(err.into());
        }

        if let Err(err) = self
            .draws
            .record_ticket_sale(draw.id, inserted.len() as u32, expected)
            .await
        {
            self.tickets.delete_tickets(&ticket_ids).await.ok();
            return Err(err.into());
        }

        Ok((inserted, draw))
    }

    pub async fn tickets_for_draw(&self, draw_id: Uuid) -> Result<Vec<Ticket>, TicketSaleError> {
        self.tickets.tickets_for_draw(draw_id).await
    }

    /// Persists a calculator's per-ticket results (spec §4.3 step 6).
    /// Skips tickets whose status is no longer `active`, which is what
    /// makes re-running a calculation for the same draw idempotent
    /// (spec §8 property 7).
    pub async fn persist_calculation(&self, calculation: &CalculationResult) -> Result<(), TicketSaleError> {
        for result in &calculation.ticket_results {
            self.tickets
                .update_result(result.ticket_id, result.matched_numbers, result.prize_amount, result.status)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_chain::{FetchedTransaction, MockChain};
    use lotto_draw::InMemoryDrawRepository;
    use lotto_ledger::InMemoryFundRepository;
    use lotto_types::{Bps, DrawCadence};

    fn lottery(id: Uuid) -> Lottery {
        Lottery {
            id,
            slug: "daily-5-36".into(),
            active: true,
            numbers_count: 5,
            numbers_max: 36,
            ticket_price_nano: Nano(1_000_000_000),
            base_jackpot: Nano(500_000_000_000),
            accumulated_jackpot: Nano(500_000_000_000),
            currency: lotto_types::Currency::Ton,
            cadence: DrawCadence::Daily,
            draw_hour: 20,
        }
    }

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

    async fn setup() -> (TicketSaleIntake, Arc<MockChain>, Lottery, Draw) {
        let tickets: Arc<dyn TicketRepository> = Arc::new(crate::repository::InMemoryTicketRepository::new());
        let chain = Arc::new(MockChain::new());
        let ledger = Arc::new(FundLedger::new(Arc::new(InMemoryFundRepository::new())));
        let draws = Arc::new(DrawService::new(Arc::new(InMemoryDrawRepository::new())));

        let lottery = lottery(Uuid::new_v4());
        let draw_time = Utc::now() + Duration::hours(1);
        let (draw, _server_seed) = draws.create_draw(&lottery, draw_time).await.unwrap();

        let intake = TicketSaleIntake::new(tickets, chain.clone() as Arc<dyn Chain>, ledger, draws);
        (intake, chain, lottery, draw)
    }

    fn confirmed_deposit(amount: Nano, sender: &str, recipient: &str) -> FetchedTransaction {
        FetchedTransaction {
            amount,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            timestamp_unix: Utc::now().timestamp(),
            logical_time: 1,
            confirmed: true,
        }
    }

    // S3 — bulk discount (spec §8 S3): 7 tickets at 1 TON with 95%
    // bulk pricing expects a deposit of 6.65 TON; a deposit of 6.64
    // passes (tolerance 0.01), 6.62 is rejected, 7.00 passes.
    #[test]
    fn s3_expected_amount_applies_bulk_discount() {
        let expected = TicketSaleIntake::expected_amount(Nano(1_000_000_000), 7);
        assert_eq!(expected, Nano(6_650_000_000));
    }

    #[tokio::test]
    async fn s3_deposit_at_lower_tolerance_bound_passes() {
        let (intake, chain, lottery, _draw) = setup().await;
        let cfg = config(lottery.id);
        let numbers: Vec<Vec<u32>> = (0..7).map(|i| vec![1 + i, 2 + i, 3 + i, 4 + i, 5 + i]).collect();
        chain.seed_transaction("tx-ok", confirmed_deposit(Nano(6_640_000_000), "sender", "platform"));
        let (tickets, _draw) = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, numbers, "tx-ok", "sender", "platform")
            .await
            .unwrap();
        assert_eq!(tickets.len(), 7);
    }

    #[tokio::test]
    async fn s3_deposit_below_tolerance_is_rejected() {
        let (intake, chain, lottery, _draw) = setup().await;
        let cfg = config(lottery.id);
        let numbers: Vec<Vec<u32>> = (0..7).map(|i| vec![1 + i, 2 + i, 3 + i, 4 + i, 5 + i]).collect();
        chain.seed_transaction("tx-low", confirmed_deposit(Nano(6_620_000_000), "sender", "platform"));
        let err = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, numbers, "tx-low", "sender", "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, TicketSaleError::DepositRejected(_)));
    }

    #[tokio::test]
    async fn s3_excess_deposit_is_accepted() {
        let (intake, chain, lottery, _draw) = setup().await;
        let cfg = config(lottery.id);
        let numbers: Vec<Vec<u32>> = (0..7).map(|i| vec![1 + i, 2 + i, 3 + i, 4 + i, 5 + i]).collect();
        chain.seed_transaction("tx-excess", confirmed_deposit(Nano(7_000_000_000), "sender", "platform"));
        let (tickets, _draw) = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, numbers, "tx-excess", "sender", "platform")
            .await
            .unwrap();
        assert_eq!(tickets.len(), 7);
    }

    // S4 — double spend (spec §8 S4): a second purchase against an
    // already-claimed tx_hash fails with AlreadyClaimed, leaving the
    // first purchase's tickets untouched.
    #[tokio::test]
    async fn s4_double_spend_is_rejected_on_reuse() {
        let (intake, chain, lottery, _draw) = setup().await;
        let cfg = config(lottery.id);
        chain.seed_transaction("tx-dup", confirmed_deposit(Nano(1_000_000_000), "sender", "platform"));
        let (first, _) = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, vec![vec![1, 2, 3, 4, 5]], "tx-dup", "sender", "platform")
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let err = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, vec![vec![6, 7, 8, 9, 10]], "tx-dup", "sender", "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, TicketSaleError::AlreadyClaimed(_)));
    }

    #[tokio::test]
    async fn rejects_picks_outside_numbers_max() {
        let (intake, chain, lottery, _draw) = setup().await;
        let cfg = config(lottery.id);
        chain.seed_transaction("tx-bad", confirmed_deposit(Nano(1_000_000_000), "sender", "platform"));
        let err = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, vec![vec![1, 2, 3, 4, 99]], "tx-bad", "sender", "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, TicketSaleError::Validation(_)));
    }

    #[tokio::test]
    async fn no_open_draw_is_rejected() {
        let (intake, chain, lottery, draw) = setup().await;
        let cfg = config(lottery.id);
        let draws = Arc::new(DrawService::new(Arc::new(InMemoryDrawRepository::new())));
        // Use a fresh DrawService with no draws registered instead of
        // reusing `intake`'s, so find_open_draw has nothing to return.
        let tickets: Arc<dyn TicketRepository> = Arc::new(crate::repository::InMemoryTicketRepository::new());
        let ledger = Arc::new(FundLedger::new(Arc::new(InMemoryFundRepository::new())));
        let intake = TicketSaleIntake::new(tickets, chain.clone() as Arc<dyn Chain>, ledger, draws);
        let _ = draw;
        chain.seed_transaction("tx-none", confirmed_deposit(Nano(1_000_000_000), "sender", "platform"));
        let err = intake
            .buy_tickets(Uuid::new_v4(), &lottery, &cfg, vec![vec![1, 2, 3, 4, 5]], "tx-none", "sender", "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, TicketSaleError::NoOpenDraw));
    }
}
