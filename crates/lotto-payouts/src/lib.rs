//! Payout Queue & Dispatcher (spec §4.7, C7): splits, retries,
//! daily-limits, and dispatches TON/Jetton payouts, reconciling tx
//! hashes after a restart.

pub mod error;
pub mod repository;

pub use error::PayoutError;
pub use repository::{InMemoryPayoutRepository, PayoutRepository, PostgresPayoutRepository};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lotto_chain::Chain;
use lotto_types::{Currency, Nano, Payout, PayoutStatus};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// The teacher's `is_claimable` 90-day window (spec §9 supplemental
/// feature: unclaimed prizes should not stay payable forever). Not
/// named by spec.md's Payout model, but doesn't contradict any
/// Non-goal, so `queue_payout` enforces it when a caller supplies a
/// claim deadline.
pub const CLAIM_WINDOW: ChronoDuration = ChronoDuration::days(90);

pub fn claim_deadline(draw_completed_at: DateTime<Utc>) -> DateTime<Utc> {
    draw_completed_at + CLAIM_WINDOW
}

/// Per-currency limits driving `queue_payout`'s split decision and the
/// dispatcher's daily cap (spec §6's `PAYOUT_*` environment controls).
#[derive(Debug, Clone, Copy)]
pub struct PayoutLimits {
    pub max_single_ton: Nano,
    pub max_single_usdt: Nano,
    pub daily_limit_ton: Nano,
    pub daily_limit_usdt: Nano,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl PayoutLimits {
    pub fn max_single(&self, currency: Currency) -> Nano {
        match currency {
            Currency::Ton => self.max_single_ton,
            Currency::Usdt => self.max_single_usdt,
        }
    }

    pub fn daily_limit(&self, currency: Currency) -> Nano {
        match currency {
            Currency::Ton => self.daily_limit_ton,
            Currency::Usdt => self.daily_limit_usdt,
        }
    }

    /// The spec §6 documented defaults, expressed in each currency's
    /// smallest unit: `PAYOUT_MAX_SINGLE_AMOUNT_TON=50`,
    /// `_USDT=250`, `PAYOUT_MAX_DAILY_TOTAL_TON=500`, `_USDT=2500`,
    /// `PAYOUT_MAX_ATTEMPTS=3`, `PAYOUT_RETRY_DELAY_MS=60000`.
    pub fn defaults() -> Self {
        PayoutLimits {
            max_single_ton: Nano(50 * Currency::Ton.smallest_units_per_major()),
            max_single_usdt: Nano(250 * Currency::Usdt.smallest_units_per_major()),
            daily_limit_ton: Nano(500 * Currency::Ton.smallest_units_per_major()),
            daily_limit_usdt: Nano(2_500 * Currency::Usdt.smallest_units_per_major()),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(60),
        }
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Queues a prize claim as one or more `Payout` rows (spec §4.7 queue
/// contract).
pub struct PayoutQueue {
    repository: Arc<dyn PayoutRepository>,
    limits: PayoutLimits,
}

impl PayoutQueue {
    pub fn new(repository: Arc<dyn PayoutRepository>, limits: PayoutLimits) -> Self {
        PayoutQueue { repository, limits }
    }

    /// Divides `amount` into `splits` shares whose sum is exactly
    /// `amount`: the first `amount % splits` shares receive one extra
    /// smallest unit (spec §8 scenario S6 accepts "equivalent partition
    /// whose integer-nanoton sum equals [total] exactly").
    fn split_amount(amount: Nano, splits: u32) -> Vec<Nano> {
        let base = amount.0 / splits as i64;
        let remainder = (amount.0 % splits as i64) as u32;
        (0..splits)
            .map(|i| Nano(base + if i < remainder { 1 } else { 0 }))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn queue_payout(
        &self,
        user_id: Uuid,
        ticket_id: Option<Uuid>,
        draw_id: Option<Uuid>,
        amount: Nano,
        currency: Currency,
        recipient: &str,
        claim_deadline: Option<DateTime<Utc>>,
    ) -> Result<Vec<Payout>, PayoutError> {
        let now = Utc::now();
        if let Some(deadline) = claim_deadline {
            if now > deadline {
                return Err(PayoutError::ClaimExpired);
            }
        }

        let max_single = self.limits.max_single(currency);
        let base = |amount: Nano, split_index: Option<u32>, split_total: Option<u32>, total_amount: Option<Nano>| Payout {
            id: Uuid::new_v4(),
            user_id,
            ticket_id,
            draw_id,
            amount,
            currency,
            recipient_address: recipient.to_string(),
            status: PayoutStatus::Pending,
            attempts: 0,
            max_attempts: self.limits.max_attempts,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            processed_at: None,
            completed_at: None,
            tx_hash: None,
            total_amount,
            split_index,
            split_total,
        };

        if max_single.0 > 0 && amount.0 > max_single.0 {
            let splits = ceil_div(amount.0, max_single.0) as u32;
            let shares = Self::split_amount(amount, splits);
            let payouts = shares
                .into_iter()
                .enumerate()
                .map(|(i, share)| base(share, Some(i as u32 + 1), Some(splits), Some(amount)))
                .collect();
            Ok(self.repository.insert_batch(payouts).await?)
        } else {
            Ok(vec![self.repository.insert(base(amount, None, None, None)).await?])
        }
    }
}

/// Counts of what one dispatcher tick did, for the scheduler-style
/// summary log line (spec §9 "one line per tick summarizing work
/// done").
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchSummary {
    pub completed: u32,
    pub retried: u32,
    pub failed: u32,
    pub skipped_daily_limit: u32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub promoted: u32,
    pub reverted: u32,
}

/// The on-chain address payouts in USDT move through. TON payouts need
/// no extra configuration beyond the recipient address.
#[derive(Debug, Clone)]
pub struct JettonConfig {
    pub usdt_master_address: String,
}

/// Runs on a timer (spec §4.7 Dispatcher). Holds the platform wallet's
/// per-process mutex for the duration of a tick so that submissions
/// stay serialised against its advancing seqno (spec §5 "per-wallet
/// payout submission holds a process-local mutex").
pub struct Dispatcher {
    repository: Arc<dyn PayoutRepository>,
    chain: Arc<dyn Chain>,
    limits: PayoutLimits,
    jetton: JettonConfig,
    wallet_lock: AsyncMutex<()>,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Exponential backoff off `retry_base_delay` (spec §4.7 step 7:
/// "Retries are spaced with exponential backoff"): attempt 1 waits one
/// base delay, attempt 2 waits two, attempt 3 waits four, and so on.
fn backoff_delay(base: Duration, attempts_used: u32) -> ChronoDuration {
    let factor = 1u32 << attempts_used.saturating_sub(1).min(16);
    ChronoDuration::from_std(base.saturating_mul(factor)).unwrap_or(ChronoDuration::zero())
}

impl Dispatcher {
    pub fn new(
        repository: Arc<dyn PayoutRepository>,
        chain: Arc<dyn Chain>,
        limits: PayoutLimits,
        jetton: JettonConfig,
    ) -> Self {
        Dispatcher {
            repository,
            chain,
            limits,
            jetton,
            wallet_lock: AsyncMutex::new(()),
        }
    }

    /// One dispatcher tick: selects up to `batch_size` pending Payouts
    /// FIFO by `created_at` (spec §4.7 step 1), applies the daily limit
    /// (step 2), and submits each serially under the wallet mutex
    /// (steps 3-7).
    pub async fn tick(&self, batch_size: u32) -> Result<DispatchSummary, PayoutError> {
        let due = self.repository.due_for_dispatch(Utc::now(), batch_size).await?;
        let mut summary = DispatchSummary::default();
        let _guard = self.wallet_lock.lock().await;

        for payout in due {
            let limit = self.limits.daily_limit(payout.currency);
            let already = self
                .repository
                .completed_total_since(payout.currency, start_of_day(Utc::now()))
                .await?;
            let would_total = already.checked_add(payout.amount);
            if limit.0 > 0 && would_total.map(|t| t.0 > limit.0).unwrap_or(true) {
                summary.skipped_daily_limit += 1;
                tracing::warn!(payout_id = %payout.id, currency = ?payout.currency, "payout skipped: daily limit");
                continue;
            }

            self.repository.mark_processing(payout.id).await?;
            match self.submit(&payout).await {
                Ok(tx_hash) => {
                    self.repository.mark_completed(payout.id, &tx_hash).await?;
                    summary.completed += 1;
                    tracing::info!(payout_id = %payout.id, %tx_hash, "payout completed");
                }
                Err(err) => {
                    let attempts_used = payout.attempts + 1;
                    if attempts_used < payout.max_attempts {
                        let next_attempt_at =
                            Utc::now() + backoff_delay(self.limits.retry_base_delay, attempts_used);
                        self.repository
                            .mark_retry(payout.id, &err.to_string(), next_attempt_at)
                            .await?;
                        summary.retried += 1;
                        tracing::warn!(payout_id = %payout.id, error = %err, attempts = attempts_used, next_attempt_at = %next_attempt_at, "payout retry scheduled");
                    } else {
                        self.repository.mark_failed(payout.id, &err.to_string()).await?;
                        summary.failed += 1;
                        tracing::error!(payout_id = %payout.id, error = %err, "payout failed permanently");
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn submit(&self, payout: &Payout) -> Result<String, PayoutError> {
        let result = match payout.currency {
            Currency::Ton => self.chain.send_ton(&payout.recipient_address, payout.amount, None).await?,
            Currency::Usdt => {
                self.chain
                    .send_jetton(
                        &self.jetton.usdt_master_address,
                        &payout.recipient_address,
                        payout.amount,
                        Nano::ZERO,
                        None,
                    )
                    .await?
            }
        };
        Ok(result.tx_hash)
    }

    /// Reconciles `processing` Payouts observed after a restart (spec
    /// §4.7 Idempotence): if the Chain port can retrieve a transaction
    /// matching `(recipient, amount)` within `within` of now, the
    /// Payout is promoted to `completed`; otherwise it returns to
    /// `pending` so the next tick retries it.
    pub async fn reconcile_in_doubt(&self, within: ChronoDuration) -> Result<ReconcileSummary, PayoutError> {
        let in_doubt = self.repository.in_doubt().await?;
        let mut summary = ReconcileSummary::default();
        let since = Utc::now() - within;
        for payout in in_doubt {
            let found = self
                .chain
                .find_recent_transaction(&payout.recipient_address, payout.amount, since)
                .await?;
            match found {
                Some(tx_hash) => {
                    self.repository.mark_completed(payout.id, &tx_hash).await?;
                    summary.promoted += 1;
                }
                None => {
                    self.repository
                        .mark_retry(
                            payout.id,
                            "in-doubt after restart: no matching on-chain tx",
                            Utc::now(),
                        )
                        .await?;
                    summary.reverted += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_chain::MockChain;

    fn limits() -> PayoutLimits {
        PayoutLimits {
            max_single_ton: Nano(50_000_000_000),
            max_single_usdt: Nano(250_000_000),
            daily_limit_ton: Nano(500_000_000_000),
            daily_limit_usdt: Nano(2_500_000_000),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(60),
        }
    }

    // S6 — payout split (spec §8 S6): 130 TON at single-max 50 TON
    // splits into 3 shares summing exactly to 130 TON.
    #[tokio::test]
    async fn s6_split_sums_exactly() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let queue = PayoutQueue::new(repo.clone(), limits());
        let amount = Nano(130_000_000_000);
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, amount, Currency::Ton, "addr", None)
            .await
            .unwrap();
        assert_eq!(payouts.len(), 3);
        let sum: i64 = payouts.iter().map(|p| p.amount.0).sum();
        assert_eq!(sum, amount.0);
        assert!(payouts.iter().all(|p| p.split_total == Some(3)));
        assert!(payouts.iter().all(|p| p.total_amount == Some(amount)));
        for p in &payouts {
            assert!(p.amount.0 <= 50_000_000_000);
        }
    }

    #[tokio::test]
    async fn small_amount_is_not_split() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let queue = PayoutQueue::new(repo, limits());
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000_000_000), Currency::Ton, "addr", None)
            .await
            .unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].split_total, None);
    }

    #[tokio::test]
    async fn expired_claim_is_rejected() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let queue = PayoutQueue::new(repo, limits());
        let past_deadline = Utc::now() - ChronoDuration::days(1);
        let err = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1), Currency::Ton, "addr", Some(past_deadline))
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::ClaimExpired));
    }

    // S7 — retry (spec §8 S7): a 429 on first submission becomes
    // pending again with attempts=1; after max_attempts it fails.
    #[tokio::test]
    async fn s7_retry_then_fail_after_max_attempts() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let mut my_limits = limits();
        my_limits.max_attempts = 2;
        my_limits.retry_base_delay = Duration::from_secs(0);
        let queue = PayoutQueue::new(repo.clone(), my_limits);
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr", None)
            .await
            .unwrap();
        let payout_id = payouts[0].id;

        let dispatcher = Dispatcher::new(
            repo.clone(),
            chain.clone(),
            my_limits,
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );

        chain.queue_send_failure("429 Too Many Requests");
        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.retried, 1);
        let after_first = repo.load(payout_id).await.unwrap();
        assert_eq!(after_first.status, PayoutStatus::Pending);
        assert_eq!(after_first.attempts, 1);
        assert!(after_first.last_error.as_deref().unwrap().contains("429"));

        chain.queue_send_failure("429 Too Many Requests");
        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.failed, 1);
        let after_second = repo.load(payout_id).await.unwrap();
        assert_eq!(after_second.status, PayoutStatus::Failed);
        assert_eq!(after_second.attempts, 2);
    }

    // A retried payout waits out its backoff instead of being retried
    // on the very next tick (spec §4.7 step 7).
    #[tokio::test]
    async fn retry_waits_for_backoff_before_next_tick() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let mut my_limits = limits();
        my_limits.max_attempts = 3;
        my_limits.retry_base_delay = Duration::from_secs(60);
        let queue = PayoutQueue::new(repo.clone(), my_limits);
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr", None)
            .await
            .unwrap();
        let payout_id = payouts[0].id;

        let dispatcher = Dispatcher::new(
            repo.clone(),
            chain.clone(),
            my_limits,
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );

        chain.queue_send_failure("503 Service Unavailable");
        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.retried, 1);
        let after_first = repo.load(payout_id).await.unwrap();
        assert!(after_first.next_attempt_at > Utc::now());

        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.retried, 0);
        assert_eq!(summary.completed, 0);
    }

    #[tokio::test]
    async fn successful_dispatch_completes() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let queue = PayoutQueue::new(repo.clone(), limits());
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr", None)
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(
            repo.clone(),
            chain,
            limits(),
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );
        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.completed, 1);
        let after = repo.load(payouts[0].id).await.unwrap();
        assert_eq!(after.status, PayoutStatus::Completed);
        assert!(after.tx_hash.is_some());
    }

    #[tokio::test]
    async fn daily_limit_skips_excess_payout() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let mut tight_limits = limits();
        tight_limits.daily_limit_ton = Nano(500);
        let queue = PayoutQueue::new(repo.clone(), tight_limits);
        queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr", None)
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(
            repo,
            chain,
            tight_limits,
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );
        let summary = dispatcher.tick(10).await.unwrap();
        assert_eq!(summary.skipped_daily_limit, 1);
        assert_eq!(summary.completed, 0);
    }

    #[tokio::test]
    async fn reconcile_promotes_matching_in_doubt_payout() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let queue = PayoutQueue::new(repo.clone(), limits());
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr-2", None)
            .await
            .unwrap();
        repo.mark_processing(payouts[0].id).await.unwrap();
        chain.seed_sent("addr-2", Nano(1_000), "landed-tx", Utc::now());

        let dispatcher = Dispatcher::new(
            repo.clone(),
            chain,
            limits(),
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );
        let summary = dispatcher.reconcile_in_doubt(ChronoDuration::minutes(10)).await.unwrap();
        assert_eq!(summary.promoted, 1);
        let after = repo.load(payouts[0].id).await.unwrap();
        assert_eq!(after.status, PayoutStatus::Completed);
        assert_eq!(after.tx_hash.as_deref(), Some("landed-tx"));
    }

    #[tokio::test]
    async fn reconcile_reverts_unmatched_in_doubt_payout() {
        let repo = Arc::new(InMemoryPayoutRepository::new());
        let chain = Arc::new(MockChain::new());
        let queue = PayoutQueue::new(repo.clone(), limits());
        let payouts = queue
            .queue_payout(Uuid::new_v4(), None, None, Nano(1_000), Currency::Ton, "addr-3", None)
            .await
            .unwrap();
        repo.mark_processing(payouts[0].id).await.unwrap();

        let dispatcher = Dispatcher::new(
            repo.clone(),
            chain,
            limits(),
            JettonConfig { usdt_master_address: "jetton-master".into() },
        );
        let summary = dispatcher.reconcile_in_doubt(ChronoDuration::minutes(10)).await.unwrap();
        assert_eq!(summary.reverted, 1);
        let after = repo.load(payouts[0].id).await.unwrap();
        assert_eq!(after.status, PayoutStatus::Pending);
    }
}
