//! Process configuration (spec §6). Loaded once in `main` from the
//! environment and handed to every subsystem as an `Arc<Config>` rather
//! than read ad hoc from `std::env` at each call site.

use std::time::Duration;

use anyhow::{Context, Result};
use lotto_types::Nano;
use lotto_payouts::{JettonConfig, PayoutLimits};
use lotto_scheduler::SchedulerConfig;

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Everything `main` needs to wire the service together. Constructed
/// once and shared by reference, not a global singleton.
pub struct Config {
    pub database_url: String,
    pub ton_network: String,
    pub platform_wallet_secret_path: String,
    pub scheduler: SchedulerConfig,
    pub payout_limits: PayoutLimits,
    pub jetton: JettonConfig,
}

impl Config {
    /// Fails fast with a descriptive error on any missing required
    /// variable; everything else falls back to spec §6's documented
    /// defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = env_var("DATABASE_URL")?;
        let ton_network = std::env::var("TON_NETWORK").unwrap_or_else(|_| "mainnet".to_string());
        let platform_wallet_secret_path = env_var("PLATFORM_WALLET_SECRET_PATH")?;
        let usdt_master_address = env_var("USDT_MASTER_ADDRESS")?;

        let tick_interval_ms: u64 = env_or("SCHEDULER_TICK_INTERVAL_MS", 30_000);
        let batch_size: u32 = env_or("SCHEDULER_BATCH_SIZE", 20);

        // Spec §6 documents these four limits in major units (50/250
        // TON/USDT single, 500/2500 daily); `PayoutLimits::defaults()`
        // is the one place that converts them to smallest units, so an
        // unset env var falls back to it instead of re-deriving its own
        // (easy to get wrong by an order of magnitude) magic numbers.
        let defaults = PayoutLimits::defaults();
        let max_attempts: u32 = env_or("PAYOUT_MAX_ATTEMPTS", defaults.max_attempts);
        let retry_base_delay_ms: u64 =
            env_or("PAYOUT_RETRY_DELAY_MS", defaults.retry_base_delay.as_millis() as u64);
        let max_single_ton: i64 = env_or("PAYOUT_MAX_SINGLE_AMOUNT_TON", defaults.max_single_ton.0);
        let max_single_usdt: i64 = env_or("PAYOUT_MAX_SINGLE_AMOUNT_USDT", defaults.max_single_usdt.0);
        let daily_limit_ton: i64 = env_or("PAYOUT_MAX_DAILY_TOTAL_TON", defaults.daily_limit_ton.0);
        let daily_limit_usdt: i64 = env_or("PAYOUT_MAX_DAILY_TOTAL_USDT", defaults.daily_limit_usdt.0);

        Ok(Config {
            database_url,
            ton_network,
            platform_wallet_secret_path,
            scheduler: SchedulerConfig {
                tick_interval: Duration::from_millis(tick_interval_ms),
                batch_size,
            },
            payout_limits: PayoutLimits {
                max_single_ton: Nano(max_single_ton),
                max_single_usdt: Nano(max_single_usdt),
                daily_limit_ton: Nano(daily_limit_ton),
                daily_limit_usdt: Nano(daily_limit_usdt),
                max_attempts,
                retry_base_delay: Duration::from_millis(retry_base_delay_ms),
            },
            jetton: JettonConfig {
                usdt_master_address,
            },
        })
    }
}
