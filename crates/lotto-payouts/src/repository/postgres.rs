use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lotto_types::{Currency, Nano, Payout, PayoutStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::PayoutRepository;
use crate::error::PayoutError;

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

fn status_code(status: PayoutStatus) -> &'static str {
    match status {
        PayoutStatus::Pending => "pending",
        PayoutStatus::Processing => "processing",
        PayoutStatus::Completed => "completed",
        PayoutStatus::Failed => "failed",
    }
}

fn parse_status(code: &str) -> PayoutStatus {
    match code {
        "processing" => PayoutStatus::Processing,
        "completed" => PayoutStatus::Completed,
        "failed" => PayoutStatus::Failed,
        _ => PayoutStatus::Pending,
    }
}

fn row_to_payout(row: &sqlx::postgres::PgRow) -> Result<Payout, sqlx::Error> {
    Ok(Payout {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        ticket_id: row.try_get("ticket_id")?,
        draw_id: row.try_get("draw_id")?,
        amount: Nano(row.try_get("amount")?),
        currency: parse_currency(row.try_get::<String, _>("currency")?.as_str()),
        recipient_address: row.try_get("recipient_address")?,
        status: parse_status(row.try_get::<String, _>("status")?.as_str()),
        attempts: row.try_get::<i32, _>("attempts")? as u32,
        max_attempts: row.try_get::<i32, _>("max_attempts")? as u32,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
        completed_at: row.try_get("completed_at")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        tx_hash: row.try_get("tx_hash")?,
        total_amount: row.try_get::<Option<i64>, _>("total_amount")?.map(Nano),
        split_index: row.try_get::<Option<i32>, _>("split_index")?.map(|v| v as u32),
        split_total: row.try_get::<Option<i32>, _>("split_total")?.map(|v| v as u32),
    })
}

/// `sqlx`-backed implementation over the `payout` table.
pub struct PostgresPayoutRepository {
    pool: PgPool,
}

impl PostgresPayoutRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresPayoutRepository { pool }
    }
}

#[async_trait]
impl PayoutRepository for PostgresPayoutRepository {
    async fn insert(&self, payout: Payout) -> Result<Payout, PayoutError> {
        let row = sqlx::query(
            r#"
            INSERT INTO payout (id, user_id, ticket_id, draw_id, amount, currency,
                recipient_address, status, attempts, max_attempts, created_at,
                next_attempt_at, total_amount, split_index, split_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(payout.id)
        .bind(payout.user_id)
        .bind(payout.ticket_id)
        .bind(payout.draw_id)
        .bind(payout.amount.0)
        .bind(currency_code(payout.currency))
        .bind(&payout.recipient_address)
        .bind(status_code(payout.status))
        .bind(payout.attempts as i32)
        .bind(payout.max_attempts as i32)
        .bind(payout.created_at)
        .bind(payout.next_attempt_at)
        .bind(payout.total_amount.map(|n| n.0))
        .bind(payout.split_index.map(|v| v as i32))
        .bind(payout.split_total.map(|v| v as i32))
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_payout(&row)?)
    }

    async fn insert_batch(&self, payouts: Vec<Payout>) -> Result<Vec<Payout>, PayoutError> {
        let mut inserted = Vec::with_capacity(payouts.len());
        for payout in payouts {
            inserted.push(self.insert(payout).await?);
        }
        Ok(inserted)
    }

    async fn load(&self, payout_id: Uuid) -> Result<Payout, PayoutError> {
        let row = sqlx::query("SELECT * FROM payout WHERE id = $1")
            .bind(payout_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PayoutError::NotFound(payout_id))?;
        Ok(row_to_payout(&row)?)
    }

    async fn due_for_dispatch(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Payout>, PayoutError> {
        let rows = sqlx::query(
            "SELECT * FROM payout WHERE status = 'pending' AND attempts < max_attempts \
             AND next_attempt_at <= $1 ORDER BY created_at ASC LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(row_to_payout)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn mark_processing(&self, payout_id: Uuid) -> Result<Payout, PayoutError> {
        let row = sqlx::query(
            r#"
            UPDATE payout SET status = 'processing', attempts = attempts + 1, processed_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payout_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PayoutError::NotFound(payout_id))?;
        Ok(row_to_payout(&row)?)
    }

    async fn mark_completed(&self, payout_id: Uuid, tx_hash: &str) -> Result<Payout, PayoutError> {
        let row = sqlx::query(
            r#"
            UPDATE payout SET status = 'completed', tx_hash = $2, completed_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payout_id)
        .bind(tx_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PayoutError::NotFound(payout_id))?;
        Ok(row_to_payout(&row)?)
    }

    async fn mark_retry(
        &self,
        payout_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Payout, PayoutError> {
        let row = sqlx::query(
            "UPDATE payout SET status = 'pending', last_error = $2, next_attempt_at = $3 \
             WHERE id = $1 RETURNING *",
        )
        .bind(payout_id)
        .bind(error)
        .bind(next_attempt_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PayoutError::NotFound(payout_id))?;
        Ok(row_to_payout(&row)?)
    }

    async fn mark_failed(&self, payout_id: Uuid, error: &str) -> Result<Payout, PayoutError> {
        let row = sqlx::query(
            "UPDATE payout SET status = 'failed', last_error = $2 WHERE id = $1 RETURNING *",
        )
        .bind(payout_id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PayoutError::NotFound(payout_id))?;
        Ok(row_to_payout(&row)?)
    }

    async fn in_doubt(&self) -> Result<Vec<Payout>, PayoutError> {
        let rows = sqlx::query("SELECT * FROM payout WHERE status = 'processing'")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(row_to_payout)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn completed_total_since(
        &self,
        currency: Currency,
        since: DateTime<Utc>,
    ) -> Result<Nano, PayoutError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM payout \
             WHERE currency = $1 AND status = 'completed' AND completed_at >= $2",
        )
        .bind(currency_code(currency))
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(Nano(row.try_get("total")?))
    }
}
