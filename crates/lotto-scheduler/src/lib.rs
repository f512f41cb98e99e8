//! Scheduler (spec §4.5, C5): the clock-driven orchestrator that moves
//! draws through the state machine declared by `lotto-draw`, invoking
//! `lotto-rng`, `lotto-calculator`, `lotto-tickets`, and `lotto-payouts`
//! at each step, then creates the next draw once one completes.

pub mod error;
pub mod repository;

pub use error::SchedulerError;
pub use repository::{InMemoryLotteryRepository, LotteryRepository, PostgresLotteryRepository};

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use lotto_chain::Chain;
use lotto_draw::DrawService;
use lotto_ledger::FundLedger;
use lotto_payouts::PayoutQueue;
use lotto_tickets::TicketRepository;
use lotto_types::Draw;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Tunables for the tick loop (spec §6 `SCHEDULER_TICK_INTERVAL_MS`,
/// `SCHEDULER_BATCH_SIZE`).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_interval: StdDuration,
    pub batch_size: u32,
}

impl SchedulerConfig {
    pub fn defaults() -> Self {
        SchedulerConfig {
            tick_interval: StdDuration::from_secs(30),
            batch_size: 20,
        }
    }
}

/// What one `tick()` call accomplished, logged at the end of every
/// iteration of `run()`.
#[derive(Debug, Default, Clone)]
pub struct TickSummary {
    pub locked: u32,
    pub cancelled_for_no_tickets: u32,
    pub executed: u32,
    pub failed: u32,
    pub halted: u32,
}

/// Orchestrates the lock → draw → calculate → pay → advance pipeline
/// across every active lottery. A single `Scheduler` is meant to run as
/// one long-lived task per process (spec §5: "exactly one scheduler
/// instance runs the tick loop at a time").
pub struct Scheduler {
    lotteries: Arc<dyn LotteryRepository>,
    draws: Arc<DrawService>,
    ledger: Arc<FundLedger>,
    tickets: Arc<dyn TicketRepository>,
    payouts: Arc<PayoutQueue>,
    chain: Arc<dyn Chain>,
    config: SchedulerConfig,
    tick_lock: AsyncMutex<()>,
    /// Lotteries whose last tick hit a fatal (non-retryable) error,
    /// excluded from further processing until an operator clears them
    /// (spec §4.5/§7: an Integrity failure halts, it does not retry
    /// forever).
    halted: StdMutex<HashSet<Uuid>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lotteries: Arc<dyn LotteryRepository>,
        draws: Arc<DrawService>,
        ledger: Arc<FundLedger>,
        tickets: Arc<dyn TicketRepository>,
        payouts: Arc<PayoutQueue>,
        chain: Arc<dyn Chain>,
        config: SchedulerConfig,
    ) -> Self {
        Scheduler {
            lotteries,
            draws,
            ledger,
            tickets,
            payouts,
            chain,
            config,
            tick_lock: AsyncMutex::new(()),
            halted: StdMutex::new(HashSet::new()),
        }
    }

    pub fn is_halted(&self, lottery_id: Uuid) -> bool {
        self.halted.lock().unwrap().contains(&lottery_id)
    }

    /// Clears an integrity halt so the next tick retries the lottery.
    /// Operator action, not automatic — a halt means something needs a
    /// human look first.
    pub fn clear_halt(&self, lottery_id: Uuid) {
        self.halted.lock().unwrap().remove(&lottery_id);
    }

    fn halt(&self, lottery_id: Uuid) {
        self.halted.lock().unwrap().insert(lottery_id);
    }

    /// One full pass: lock draws whose sales window closed, then
    /// execute draws whose draw time has arrived. Guarded by
    /// `tick_lock` so overlapping calls (e.g. a slow tick still running
    /// when the interval elapses again) never race each other.
    pub async fn tick(&self) -> TickSummary {
        let _guard = self.tick_lock.lock().await;
        let mut summary = TickSummary::default();
        self.check_and_lock_draws(&mut summary).await;
        self.check_and_execute_draws(&mut summary).await;
        summary
    }

    async fn check_and_lock_draws(&self, summary: &mut TickSummary) {
        let due = match self.draws.due_to_lock(self.config.batch_size).await {
            Ok(due) => due,
            Err(e) => {
                error!("failed to list draws due to lock: {e}");
                return;
            }
        };
        for draw in due {
            if draw.total_tickets == 0 {
                match self.draws.cancel_draw(draw.id).await {
                    Ok(_) => {
                        summary.cancelled_for_no_tickets += 1;
                        info!(draw_id = %draw.id, "cancelled draw with no tickets sold");
                    }
                    Err(e) => warn!(draw_id = %draw.id, "failed to cancel empty draw: {e}"),
                }
                continue;
            }
            match self.draws.lock_draw(draw.id).await {
                Ok(_) => summary.locked += 1,
                Err(e) => warn!(draw_id = %draw.id, "failed to lock draw: {e}"),
            }
        }
    }

    async fn check_and_execute_draws(&self, summary: &mut TickSummary) {
        let due = match self.draws.due_to_execute(self.config.batch_size).await {
            Ok(due) => due,
            Err(e) => {
                error!("failed to list draws due to execute: {e}");
                return;
            }
        };
        for draw in due {
            if self.is_halted(draw.lottery_id) {
                continue;
            }
            match self.execute_draw(&draw).await {
                Ok(()) => {
                    summary.executed += 1;
                    if let Err(e) = self.create_next_draw(draw.lottery_id, draw.draw_time).await {
                        warn!(lottery_id = %draw.lottery_id, "failed to schedule next draw: {e}");
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(draw_id = %draw.id, "draw execution failed: {e}");
                    if e.is_fatal() {
                        summary.halted += 1;
                        self.halt(draw.lottery_id);
                        error!(lottery_id = %draw.lottery_id, "lottery halted after integrity failure");
                    }
                }
            }
        }
    }

    /// Drawing → Calculating → Paying → Completed, per spec §4.5 steps
    /// 2-4. Reverts the draw to `Locked` on a failure inside drawing or
    /// calculating so the next tick can retry, unless the failure is
    /// itself fatal (seed mismatch, non-retryable persistence error).
    async fn execute_draw(&self, draw: &Draw) -> Result<(), SchedulerError> {
        let lottery = self
            .lotteries
            .lottery(draw.lottery_id)
            .await?
            .ok_or(SchedulerError::LotteryNotFound(draw.lottery_id))?;
        let config = self
            .lotteries
            .payout_config(draw.lottery_id)
            .await?
            .ok_or(SchedulerError::ConfigNotFound(draw.lottery_id))?;

        let server_seed = match self.lotteries.take_seed(draw.id).await? {
            Some(seed) => seed,
            None => return Err(SchedulerError::MissingSeed(draw.id)),
        };

        if let Err(e) = self.draws.begin_drawing(draw.id, &server_seed).await {
            return Err(e.into());
        }

        let (client_seed, block_number) = match lotto_rng::get_client_seed(self.chain.as_ref()).await {
            Ok(pair) => pair,
            Err(e) => {
                self.draws.fail_drawing(draw.id).await.ok();
                return Err(e.into());
            }
        };

        let winning_numbers = match lotto_rng::generate_numbers(
            &server_seed,
            &client_seed,
            draw.nonce,
            lottery.numbers_count,
            lottery.numbers_max,
        ) {
            Ok(numbers) => numbers,
            Err(e) => {
                self.draws.fail_drawing(draw.id).await.ok();
                return Err(e.into());
            }
        };

        self.draws
            .finish_drawing(draw.id, winning_numbers.clone(), client_seed, block_number)
            .await?;

        let tickets = match self.tickets.tickets_for_draw(draw.id).await {
            Ok(tickets) => tickets,
            Err(e) => {
                self.draws.fail_calculating(draw.id).await.ok();
                return Err(e.into());
            }
        };
        let ticket_inputs: Vec<(Uuid, Vec<u32>)> = tickets.iter().map(|t| (t.id, t.numbers.clone())).collect();

        let fund = match self.ledger.fund(draw.lottery_id, draw.currency).await {
            Ok(fund) => fund,
            Err(e) => {
                self.draws.fail_calculating(draw.id).await.ok();
                return Err(e.into());
            }
        };

        let result = lotto_calculator::calculate(&ticket_inputs, &winning_numbers, fund.pools, &config);

        if let Err(e) = lotto_calculator::apply(&self.ledger, draw.lottery_id, draw.currency, draw.id, &result).await
        {
            self.draws.fail_calculating(draw.id).await.ok();
            return Err(e.into());
        }

        let total_paid_out = result
            .ticket_results
            .iter()
            .map(|r| r.prize_amount)
            .fold(lotto_types::Nano::ZERO, |acc, n| acc + n);

        self.draws
            .finish_calculating(draw.id, result.winner_counts, result.payout_amounts, total_paid_out)
            .await?;

        let completed_at = chrono::Utc::now();
        let deadline = lotto_payouts::claim_deadline(completed_at);
        for ticket_result in &result.ticket_results {
            if ticket_result.prize_amount.0 == 0 {
                continue;
            }
            let ticket = tickets.iter().find(|t| t.id == ticket_result.ticket_id);
            let ticket = match ticket {
                Some(t) => t,
                None => continue,
            };
            self.tickets
                .update_result(
                    ticket.id,
                    ticket_result.matched_numbers,
                    ticket_result.prize_amount,
                    ticket_result.status,
                )
                .await?;
            self.payouts
                .queue_payout(
                    ticket.user_id,
                    Some(ticket.id),
                    Some(draw.id),
                    ticket_result.prize_amount,
                    draw.currency,
                    &ticket.recipient_address,
                    Some(deadline),
                )
                .await?;
        }
        for ticket_result in &result.ticket_results {
            if ticket_result.prize_amount.0 > 0 {
                continue;
            }
            self.tickets
                .update_result(
                    ticket_result.ticket_id,
                    ticket_result.matched_numbers,
                    ticket_result.prize_amount,
                    ticket_result.status,
                )
                .await?;
        }

        self.draws.complete_draw(draw.id).await?;
        Ok(())
    }

    /// Rolls the accumulated jackpot forward from the current pool
    /// balance, creates the next draw, and commits its server seed to
    /// the vault — spec §4.5 step 5.
    async fn create_next_draw(&self, lottery_id: Uuid, previous_draw_time: chrono::DateTime<chrono::Utc>) -> Result<(), SchedulerError> {
        let lottery = self
            .lotteries
            .lottery(lottery_id)
            .await?
            .ok_or(SchedulerError::LotteryNotFound(lottery_id))?;
        if !lottery.active {
            return Ok(());
        }

        let fund = self.ledger.fund(lottery_id, lottery.currency).await?;
        self.lotteries
            .update_accumulated_jackpot(lottery_id, fund.pools.jackpot_pool)
            .await?;

        let mut lottery = lottery;
        lottery.accumulated_jackpot = fund.pools.jackpot_pool;

        let next_time = lotto_draw::next_draw_time(lottery.cadence, previous_draw_time);
        let (draw, server_seed) = self.draws.create_draw(&lottery, next_time).await?;
        self.lotteries.store_seed(draw.id, &server_seed).await?;
        info!(lottery_id = %lottery_id, draw_id = %draw.id, draw_time = %next_time, "scheduled next draw");
        Ok(())
    }

    /// Runs `tick()` on a fixed interval until `cancel_token` fires,
    /// mirroring the sleep/cancel race a long-lived watcher elsewhere
    /// in this codebase already uses.
    pub async fn run(&self, cancel_token: CancellationToken) {
        info!("scheduler starting");
        loop {
            if cancel_token.is_cancelled() {
                info!("scheduler received cancellation");
                break;
            }

            let summary = self.tick().await;
            if summary.executed > 0 || summary.locked > 0 || summary.failed > 0 {
                info!(
                    locked = summary.locked,
                    cancelled = summary.cancelled_for_no_tickets,
                    executed = summary.executed,
                    failed = summary.failed,
                    halted = summary.halted,
                    "scheduler tick complete"
                );
            }

            tokio::select! {
                _ = sleep(self.config.tick_interval) => continue,
                _ = cancel_token.cancelled() => {
                    info!("scheduler cancelled during sleep");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lotto_chain::MockChain;
    use lotto_draw::InMemoryDrawRepository;
    use lotto_ledger::InMemoryFundRepository;
    use lotto_payouts::{InMemoryPayoutRepository, PayoutLimits};
    use lotto_tickets::InMemoryTicketRepository;
    use lotto_types::{Bps, Currency, DrawCadence, DrawStatus, Lottery, Nano, PayoutConfig, Ticket, TicketStatus};

    fn lottery(id: Uuid) -> Lottery {
        Lottery {
            id,
            slug: "daily-5-36".into(),
            active: true,
            numbers_count: 5,
            numbers_max: 36,
            ticket_price_nano: Nano(2_500_000),
            base_jackpot: Nano(500_000_000_000),
            accumulated_jackpot: Nano(500_000_000_000),
            currency: Currency::Ton,
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

    async fn setup() -> (Scheduler, Uuid, Uuid) {
        let lottery_repo = Arc::new(InMemoryLotteryRepository::new());
        let lottery_id = Uuid::new_v4();
        let l = lottery(lottery_id);
        lottery_repo.seed_lottery(l.clone(), config(lottery_id));

        let draw_repo = Arc::new(InMemoryDrawRepository::new());
        let draws = Arc::new(DrawService::new(draw_repo));

        let fund_repo = Arc::new(InMemoryFundRepository::new());
        let ledger = Arc::new(FundLedger::new(fund_repo));

        let tickets: Arc<dyn TicketRepository> = Arc::new(InMemoryTicketRepository::new());

        let payout_repo = Arc::new(InMemoryPayoutRepository::new());
        let payouts = Arc::new(PayoutQueue::new(payout_repo, PayoutLimits::defaults()));

        let chain: Arc<dyn Chain> = Arc::new(MockChain::new());

        let draw_time = Utc::now() - Duration::minutes(1);
        let (draw, server_seed) = draws.create_draw(&l, draw_time).await.unwrap();
        lottery_repo.store_seed(draw.id, &server_seed).await.unwrap();

        ledger
            .process_ticket_sale(
                lottery_id,
                Currency::Ton,
                Nano(2_500_000),
                &config(lottery_id),
                "ticket-sale-1",
            )
            .await
            .unwrap();

        let ticket = Ticket {
            id: Uuid::new_v4(),
            lottery_id,
            user_id: Uuid::new_v4(),
            draw_id: draw.id,
            numbers: vec![1, 2, 3, 4, 5],
            price: Nano(2_500_000),
            status: TicketStatus::Active,
            matched_numbers: 0,
            prize_amount: Nano::ZERO,
            prize_claimed: false,
            tx_hash: Some("tx-1".into()),
            purchased_at: Utc::now(),
            recipient_address: "EQ-winner".into(),
        };
        tickets.insert_tickets(vec![ticket]).await.unwrap();
        draws.record_ticket_sale(draw.id, 1, Nano(2_500_000)).await.unwrap();
        draws.lock_draw(draw.id).await.unwrap();

        let scheduler = Scheduler::new(
            lottery_repo,
            draws,
            ledger,
            tickets,
            payouts,
            chain,
            SchedulerConfig::defaults(),
        );
        (scheduler, lottery_id, draw.id)
    }

    #[tokio::test]
    async fn full_tick_executes_and_schedules_next_draw() {
        let (scheduler, lottery_id, draw_id) = setup().await;
        let summary = scheduler.tick().await;
        assert_eq!(summary.executed, 1);
        assert!(!scheduler.is_halted(lottery_id));

        let draw = scheduler.draws.load(draw_id).await.unwrap();
        assert_eq!(draw.status, DrawStatus::Completed);
    }

    #[tokio::test]
    async fn missing_seed_halts_the_lottery() {
        let (scheduler, lottery_id, draw_id) = setup().await;
        scheduler.lotteries.take_seed(draw_id).await.unwrap();
        let summary = scheduler.tick().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.halted, 1);
        assert!(scheduler.is_halted(lottery_id));
    }

    #[tokio::test]
    async fn draws_due_to_lock_with_no_tickets_are_cancelled() {
        let lottery_repo = Arc::new(InMemoryLotteryRepository::new());
        let lottery_id = Uuid::new_v4();
        let l = lottery(lottery_id);
        lottery_repo.seed_lottery(l.clone(), config(lottery_id));

        let draw_repo = Arc::new(InMemoryDrawRepository::new());
        let draws = Arc::new(DrawService::new(draw_repo));
        let draw_time = Utc::now() + Duration::minutes(1);
        let (draw, server_seed) = draws.create_draw(&l, draw_time).await.unwrap();
        lottery_repo.store_seed(draw.id, &server_seed).await.unwrap();

        let fund_repo = Arc::new(InMemoryFundRepository::new());
        let ledger = Arc::new(FundLedger::new(fund_repo));
        let tickets: Arc<dyn TicketRepository> = Arc::new(InMemoryTicketRepository::new());
        let payout_repo = Arc::new(InMemoryPayoutRepository::new());
        let payouts = Arc::new(PayoutQueue::new(payout_repo, PayoutLimits::defaults()));
        let chain: Arc<dyn Chain> = Arc::new(MockChain::new());

        let scheduler = Scheduler::new(
            lottery_repo,
            draws,
            ledger,
            tickets,
            payouts,
            chain,
            SchedulerConfig::defaults(),
        );
        let summary = scheduler.tick().await;
        assert_eq!(summary.cancelled_for_no_tickets, 1);

        let draw = scheduler.draws.load(draw.id).await.unwrap();
        assert_eq!(draw.status, DrawStatus::Cancelled);
    }
}
