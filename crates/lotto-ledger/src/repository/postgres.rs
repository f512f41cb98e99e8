use async_trait::async_trait;
use chrono::Utc;
use lotto_types::{Currency, Fund, FundCounters, FundTransaction, FundTransactionType, Pools};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::FundRepository;
use crate::error::LedgerError;
use crate::retry;

fn currency_code(currency: Currency) -> &'static str {
    match currency {
        Currency::Ton => "TON",
        Currency::Usdt => "USDT",
    }
}

fn parse_currency(code: &str) -> Currency {
    match code {
        "USDT" => Currency::Usdt,
        _ => Currency::Ton,
    }
}

fn kind_code(kind: FundTransactionType) -> &'static str {
    match kind {
        FundTransactionType::TicketSale => "ticket_sale",
        FundTransactionType::PrizePayout => "prize_payout",
        FundTransactionType::JackpotRollover => "jackpot_rollover",
        FundTransactionType::ToReserve => "to_reserve",
        FundTransactionType::FromReserve => "from_reserve",
        FundTransactionType::ManualAdjustment => "manual_adjustment",
    }
}

fn row_to_fund(row: &sqlx::postgres::PgRow) -> Result<Fund, sqlx::Error> {
    Ok(Fund {
        lottery_id: row.try_get("lottery_id")?,
        currency: parse_currency(row.try_get::<String, _>("currency")?.as_str()),
        pools: Pools {
            prize_pool: lotto_types::Nano(row.try_get("prize_pool")?),
            jackpot_pool: lotto_types::Nano(row.try_get("jackpot_pool")?),
            payout_pool: lotto_types::Nano(row.try_get("payout_pool")?),
            platform_pool: lotto_types::Nano(row.try_get("platform_pool")?),
            reserve_pool: lotto_types::Nano(row.try_get("reserve_pool")?),
        },
        counters: FundCounters {
            total_collected: lotto_types::Nano(row.try_get("total_collected")?),
            total_paid_out: lotto_types::Nano(row.try_get("total_paid_out")?),
            total_to_reserve: lotto_types::Nano(row.try_get("total_to_reserve")?),
            total_to_jackpot: lotto_types::Nano(row.try_get("total_to_jackpot")?),
        },
        updated_at: row.try_get("updated_at")?,
    })
}

/// `sqlx`-backed implementation over the `lottery_fund` / `fund_transaction`
/// tables declared in `migrations/`.
pub struct PostgresFundRepository {
    pool: PgPool,
}

impl PostgresFundRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresFundRepository { pool }
    }
}

#[async_trait]
impl FundRepository for PostgresFundRepository {
    async fn get_or_create_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Fund, sqlx::Error> {
        let code = currency_code(currency);
        let row = sqlx::query(
            r#"
            INSERT INTO lottery_fund (lottery_id, currency, prize_pool, jackpot_pool,
                payout_pool, platform_pool, reserve_pool, total_collected, total_paid_out,
                total_to_reserve, total_to_jackpot, updated_at)
            VALUES ($1, $2, 0, 0, 0, 0, 0, 0, 0, 0, 0, now())
            ON CONFLICT (lottery_id, currency) DO UPDATE SET lottery_id = EXCLUDED.lottery_id
            RETURNING lottery_id, currency, prize_pool, jackpot_pool, payout_pool,
                platform_pool, reserve_pool, total_collected, total_paid_out,
                total_to_reserve, total_to_jackpot, updated_at
            "#,
        )
        .bind(lottery_id)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        row_to_fund(&row)
    }

    /// Locks the `(lottery_id, currency)` row with `SELECT ... FOR
    /// UPDATE`, creating it first if absent, runs `mutate` against the
    /// locked value, and writes the post-mutation `Fund` plus the
    /// returned `FundTransaction` before releasing the lock on commit —
    /// mirroring `lotto-draw`'s `transition`. Retries the whole
    /// transaction on a retryable SQLSTATE, which is why `mutate` can be
    /// invoked more than once and must be a pure function of the `Fund`
    /// it is handed.
    async fn mutate_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        mutate: Box<dyn Fn(&mut Fund) -> Result<FundTransaction, LedgerError> + Send>,
    ) -> Result<Fund, LedgerError> {
        let code = currency_code(currency);
        let mut attempt: u32 = 0;
        loop {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await?;

            let locked: Result<sqlx::postgres::PgRow, sqlx::Error> = async {
                sqlx::query(
                    r#"
                    INSERT INTO lottery_fund (lottery_id, currency, prize_pool, jackpot_pool,
                        payout_pool, platform_pool, reserve_pool, total_collected,
                        total_paid_out, total_to_reserve, total_to_jackpot, updated_at)
                    VALUES ($1, $2, 0, 0, 0, 0, 0, 0, 0, 0, 0, now())
                    ON CONFLICT (lottery_id, currency) DO NOTHING
                    "#,
                )
                .bind(lottery_id)
                .bind(code)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    SELECT lottery_id, currency, prize_pool, jackpot_pool, payout_pool,
                        platform_pool, reserve_pool, total_collected, total_paid_out,
                        total_to_reserve, total_to_jackpot, updated_at
                    FROM lottery_fund WHERE lottery_id = $1 AND currency = $2
                    FOR UPDATE
                    "#,
                )
                .bind(lottery_id)
                .bind(code)
                .fetch_one(&mut *tx)
                .await
            }
            .await;

            let row = match locked {
                Ok(row) => row,
                Err(err) => {
                    tx.rollback().await.ok();
                    attempt += 1;
                    if attempt >= retry::MAX_RETRY_ATTEMPTS || !retry::is_retryable(&err) {
                        return Err(err.into());
                    }
                    tokio::time::sleep(retry::backoff_delay(attempt)).await;
                    continue;
                }
            };

            let mut fund = match row_to_fund(&row) {
                Ok(fund) => fund,
                Err(err) => {
                    tx.rollback().await.ok();
                    return Err(err.into());
                }
            };

            let transaction = match mutate(&mut fund) {
                Ok(transaction) => transaction,
                Err(err) => {
                    tx.rollback().await.ok();
                    return Err(err);
                }
            };
            fund.updated_at = Utc::now();

            let write: Result<(), sqlx::Error> = async {
                sqlx::query(
                    r#"
                    UPDATE lottery_fund SET
                        prize_pool = $3, jackpot_pool = $4, payout_pool = $5,
                        platform_pool = $6, reserve_pool = $7,
                        total_collected = $8, total_paid_out = $9,
                        total_to_reserve = $10, total_to_jackpot = $11,
                        updated_at = $12
                    WHERE lottery_id = $1 AND currency = $2
                    "#,
                )
                .bind(lottery_id)
                .bind(code)
                .bind(fund.pools.prize_pool.0)
                .bind(fund.pools.jackpot_pool.0)
                .bind(fund.pools.payout_pool.0)
                .bind(fund.pools.platform_pool.0)
                .bind(fund.pools.reserve_pool.0)
                .bind(fund.counters.total_collected.0)
                .bind(fund.counters.total_paid_out.0)
                .bind(fund.counters.total_to_reserve.0)
                .bind(fund.counters.total_to_jackpot.0)
                .bind(fund.updated_at)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO fund_transaction (id, lottery_id, currency, draw_id, type, amount,
                        from_pool, to_pool, snapshot_prize_pool, snapshot_jackpot_pool,
                        snapshot_payout_pool, snapshot_platform_pool, snapshot_reserve_pool,
                        reference, note, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(transaction.id)
                .bind(transaction.lottery_id)
                .bind(currency_code(transaction.currency))
                .bind(transaction.draw_id)
                .bind(kind_code(transaction.kind))
                .bind(transaction.amount.0)
                .bind(transaction.from_pool.map(|p| format!("{:?}", p)))
                .bind(transaction.to_pool.map(|p| format!("{:?}", p)))
                .bind(transaction.snapshot.prize_pool.0)
                .bind(transaction.snapshot.jackpot_pool.0)
                .bind(transaction.snapshot.payout_pool.0)
                .bind(transaction.snapshot.platform_pool.0)
                .bind(transaction.snapshot.reserve_pool.0)
                .bind(&transaction.reference)
                .bind(&transaction.note)
                .bind(transaction.created_at)
                .execute(&mut *tx)
                .await?;

                Ok(())
            }
            .await;

            match write {
                Ok(()) => {
                    tx.commit().await?;
                    return Ok(fund);
                }
                Err(err) => {
                    tx.rollback().await.ok();
                    attempt += 1;
                    if attempt >= retry::MAX_RETRY_ATTEMPTS || !retry::is_retryable(&err) {
                        return Err(err.into());
                    }
                    tokio::time::sleep(retry::backoff_delay(attempt)).await;
                    continue;
                }
            }
        }
    }

    async fn list_transactions(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Vec<FundTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, lottery_id, currency, draw_id, type, amount,
                snapshot_prize_pool, snapshot_jackpot_pool, snapshot_payout_pool,
                snapshot_platform_pool, snapshot_reserve_pool, reference, note, created_at
            FROM fund_transaction
            WHERE lottery_id = $1 AND currency = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(lottery_id)
        .bind(currency_code(currency))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FundTransaction {
                    id: row.try_get("id")?,
                    lottery_id: row.try_get("lottery_id")?,
                    currency: parse_currency(row.try_get::<String, _>("currency")?.as_str()),
                    draw_id: row.try_get("draw_id")?,
                    kind: match row.try_get::<String, _>("type")?.as_str() {
                        "prize_payout" => FundTransactionType::PrizePayout,
                        "jackpot_rollover" => FundTransactionType::JackpotRollover,
                        "to_reserve" => FundTransactionType::ToReserve,
                        "from_reserve" => FundTransactionType::FromReserve,
                        "manual_adjustment" => FundTransactionType::ManualAdjustment,
                        _ => FundTransactionType::TicketSale,
                    },
                    amount: lotto_types::Nano(row.try_get("amount")?),
                    from_pool: None,
                    to_pool: None,
                    snapshot: Pools {
                        prize_pool: lotto_types::Nano(row.try_get("snapshot_prize_pool")?),
                        jackpot_pool: lotto_types::Nano(row.try_get("snapshot_jackpot_pool")?),
                        payout_pool: lotto_types::Nano(row.try_get("snapshot_payout_pool")?),
                        platform_pool: lotto_types::Nano(row.try_get("snapshot_platform_pool")?),
                        reserve_pool: lotto_types::Nano(row.try_get("snapshot_reserve_pool")?),
                    },
                    reference: row.try_get("reference")?,
                    note: row.try_get("note")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
