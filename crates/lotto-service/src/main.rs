//! Process entrypoint: loads configuration, wires every component
//! against a shared Postgres pool, and runs the scheduler and payout
//! dispatcher loops until a shutdown signal arrives.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lotto_chain::Chain;
use lotto_draw::{DrawService, PostgresDrawRepository};
use lotto_ledger::{FundLedger, PostgresFundRepository};
use lotto_payouts::{Dispatcher, PayoutQueue, PostgresPayoutRepository};
use lotto_scheduler::{LotteryRepository, PostgresLotteryRepository, Scheduler};
use lotto_tickets::{PostgresTicketRepository, TicketRepository};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// How long a graceful shutdown waits for in-flight work (draw
/// execution, payout dispatch) to finish before the process exits
/// anyway (spec §5).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env().context("loading configuration")?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connecting to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;

    // TODO: replace with the real TON RPC client once that transport
    // lands; every port call below is exercised against the mock in
    // every crate's own test suite.
    let chain: Arc<dyn Chain> = Arc::new(lotto_chain::MockChain::new());

    let lotteries: Arc<dyn LotteryRepository> = Arc::new(PostgresLotteryRepository::new(pool.clone()));
    let draws = Arc::new(DrawService::new(Arc::new(PostgresDrawRepository::new(pool.clone()))));
    let ledger = Arc::new(FundLedger::new(Arc::new(PostgresFundRepository::new(pool.clone()))));
    let tickets: Arc<dyn TicketRepository> = Arc::new(PostgresTicketRepository::new(pool.clone()));
    let payout_repository = Arc::new(PostgresPayoutRepository::new(pool.clone()));
    let payouts = Arc::new(PayoutQueue::new(payout_repository.clone(), config.payout_limits));
    let dispatcher = Arc::new(Dispatcher::new(
        payout_repository,
        chain.clone(),
        config.payout_limits,
        config.jetton.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        lotteries,
        draws,
        ledger,
        tickets,
        payouts,
        chain,
        config.scheduler,
    ));

    let cancel_token = CancellationToken::new();

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move { scheduler.run(cancel_token).await })
    };

    let dispatcher_task = {
        let dispatcher = dispatcher.clone();
        let cancel_token = cancel_token.clone();
        let tick_interval = config.scheduler.tick_interval;
        tokio::spawn(async move {
            loop {
                if cancel_token.is_cancelled() {
                    break;
                }
                if let Err(e) = dispatcher.tick(20).await {
                    tracing::error!("payout dispatch tick failed: {e}");
                }
                tokio::select! {
                    _ = tokio::time::sleep(tick_interval) => continue,
                    _ = cancel_token.cancelled() => break,
                }
            }
        })
    };

    tokio::signal::ctrl_c().await.context("listening for shutdown signal")?;
    info!("shutdown signal received, cancelling background tasks");
    cancel_token.cancel();

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = scheduler_task.await;
        let _ = dispatcher_task.await;
    })
    .await;

    info!("shutdown complete");
    Ok(())
}
