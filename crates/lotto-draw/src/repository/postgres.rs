use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lotto_types::{
    Currency, Draw, DrawStatus, Nano, PayoutAmounts, WinnerCounts,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::DrawRepository;
use crate::error::DrawError;

fn status_code(status: DrawStatus) -> &'static str {
    match status {
        DrawStatus::Created => "created",
        DrawStatus::Open => "open",
        DrawStatus::Locked => "locked",
        DrawStatus::Drawing => "drawing",
        DrawStatus::Calculating => "calculating",
        DrawStatus::Paying => "paying",
        DrawStatus::Completed => "completed",
        DrawStatus::Cancelled => "cancelled",
    }
}

fn parse_status(code: &str) -> DrawStatus {
    match code {
        "created" => DrawStatus::Created,
        "open" => DrawStatus::Open,
        "locked" => DrawStatus::Locked,
        "drawing" => DrawStatus::Drawing,
        "calculating" => DrawStatus::Calculating,
        "paying" => DrawStatus::Paying,
        "completed" => DrawStatus::Completed,
        _ => DrawStatus::Cancelled,
    }
}

fn row_to_draw(row: &sqlx::postgres::PgRow) -> Result<Draw, sqlx::Error> {
    let currency_code: String = row.try_get("currency")?;
    Ok(Draw {
        id: row.try_get("id")?,
        lottery_id: row.try_get("lottery_id")?,
        draw_number: row.try_get("draw_number")?,
        status: parse_status(row.try_get::<String, _>("status")?.as_str()),
        currency: if currency_code == "USDT" { Currency::Usdt } else { Currency::Ton },
        sales_open_at: row.try_get("sales_open_at")?,
        sales_close_at: row.try_get("sales_close_at")?,
        draw_time: row.try_get("draw_time")?,
        locked_at: row.try_get("locked_at")?,
        drawn_at: row.try_get("drawn_at")?,
        completed_at: row.try_get("completed_at")?,
        server_seed_hash: row.try_get("server_seed_hash")?,
        server_seed: row.try_get("server_seed")?,
        client_seed: row.try_get("client_seed")?,
        client_seed_block_number: row
            .try_get::<Option<i64>, _>("client_seed_block_number")?
            .map(|v| v as u64),
        nonce: row.try_get::<i64, _>("nonce")? as u64,
        winning_numbers: row
            .try_get::<Vec<i32>, _>("winning_numbers")?
            .into_iter()
            .map(|n| n as u32)
            .collect(),
        winner_counts: WinnerCounts {
            w5: row.try_get::<i32, _>("winners_5")? as u32,
            w4: row.try_get::<i32, _>("winners_4")? as u32,
            w3: row.try_get::<i32, _>("winners_3")? as u32,
            w2: row.try_get::<i32, _>("winners_2")? as u32,
            w1: row.try_get::<i32, _>("winners_1")? as u32,
        },
        payout_amounts: PayoutAmounts {
            jackpot_per_winner: Nano(row.try_get("payout_5")?),
            match4_per_winner: Nano(row.try_get("payout_4")?),
            match3_per_winner: Nano(row.try_get("payout_3")?),
            match2_per_winner: Nano(row.try_get("payout_2")?),
            match1_per_winner: Nano(row.try_get("payout_1")?),
        },
        total_paid_out: Nano(row.try_get("total_paid_out")?),
        total_tickets: row.try_get::<i32, _>("total_tickets")? as u32,
        total_collected: Nano(row.try_get("total_collected")?),
    })
}

/// `sqlx`-backed implementation over the `draw` table.
pub struct PostgresDrawRepository {
    pool: PgPool,
}

impl PostgresDrawRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresDrawRepository { pool }
    }
}

#[async_trait]
impl DrawRepository for PostgresDrawRepository {
    async fn insert(&self, draw: Draw) -> Result<Draw, DrawError> {
        let currency = if draw.currency == Currency::Usdt { "USDT" } else { "TON" };
        let winning: Vec<i32> = draw.winning_numbers.iter().map(|&n| n as i32).collect();
        let row = sqlx::query(
            r#"
            INSERT INTO draw (id, lottery_id, draw_number, status, currency, sales_open_at,
                sales_close_at, draw_time, server_seed_hash, nonce, winning_numbers,
                winners_5, winners_4, winners_3, winners_2, winners_1,
                payout_5, payout_4, payout_3, payout_2, payout_1,
                total_paid_out, total_tickets, total_collected)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0)
            RETURNING *
            "#,
        )
        .bind(draw.id)
        .bind(draw.lottery_id)
        .bind(draw.draw_number)
        .bind(status_code(draw.status))
        .bind(currency)
        .bind(draw.sales_open_at)
        .bind(draw.sales_close_at)
        .bind(draw.draw_time)
        .bind(&draw.server_seed_hash)
        .bind(draw.nonce as i64)
        .bind(winning)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_draw(&row)?)
    }

    async fn load(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        let row = sqlx::query("SELECT * FROM draw WHERE id = $1")
            .bind(draw_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DrawError::NotFound(draw_id))?;
        Ok(row_to_draw(&row)?)
    }

    async fn next_draw_number(&self, lottery_id: Uuid) -> Result<i64, DrawError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(draw_number), 0) + 1 AS next FROM draw WHERE lottery_id = $1",
        )
        .bind(lottery_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("next")?)
    }

    async fn find_open_draw(&self, lottery_id: Uuid, now: DateTime<Utc>) -> Result<Option<Draw>, DrawError> {
        let row = sqlx::query(
            "SELECT * FROM draw WHERE lottery_id = $1 AND status = 'open' AND sales_close_at > $2 LIMIT 1",
        )
        .bind(lottery_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_draw(&r)).transpose()?)
    }

    async fn due_to_lock(&self, now: DateTime<Utc>, lock_ahead: Duration, limit: u32) -> Result<Vec<Draw>, DrawError> {
        let rows = sqlx::query(
            "SELECT * FROM draw WHERE status = 'open' AND draw_time <= $1 ORDER BY draw_time ASC LIMIT $2",
        )
        .bind(now + lock_ahead)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_draw).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn due_to_execute(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Draw>, DrawError> {
        let rows = sqlx::query(
            "SELECT * FROM draw WHERE status = 'locked' AND draw_time <= $1 ORDER BY draw_time ASC LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_draw).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn transition(
        &self,
        draw_id: Uuid,
        expected: DrawStatus,
        mutate: Box<dyn FnOnce(&mut Draw) + Send>,
    ) -> Result<Draw, DrawError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM draw WHERE id = $1 FOR UPDATE")
            .bind(draw_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DrawError::NotFound(draw_id))?;
        let mut draw = row_to_draw(&row)?;
        if draw.status != expected {
            return Err(DrawError::WrongState {
                draw_id,
                expected,
                actual: draw.status,
            });
        }
        mutate(&mut draw);

        let winning: Vec<i32> = draw.winning_numbers.iter().map(|&n| n as i32).collect();
        sqlx::query(
            r#"
            UPDATE draw SET
                status = $2, locked_at = $3, drawn_at = $4, completed_at = $5,
                server_seed = $6, client_seed = $7, client_seed_block_number = $8,
                nonce = $9, winning_numbers = $10,
                winners_5 = $11, winners_4 = $12, winners_3 = $13, winners_2 = $14, winners_1 = $15,
                payout_5 = $16, payout_4 = $17, payout_3 = $18, payout_2 = $19, payout_1 = $20,
                total_paid_out = $21
            WHERE id = $1
            "#,
        )
        .bind(draw.id)
        .bind(status_code(draw.status))
        .bind(draw.locked_at)
        .bind(draw.drawn_at)
        .bind(draw.completed_at)
        .bind(&draw.server_seed)
        .bind(&draw.client_seed)
        .bind(draw.client_seed_block_number.map(|v| v as i64))
        .bind(draw.nonce as i64)
        .bind(winning)
        .bind(draw.winner_counts.w5 as i32)
        .bind(draw.winner_counts.w4 as i32)
        .bind(draw.winner_counts.w3 as i32)
        .bind(draw.winner_counts.w2 as i32)
        .bind(draw.winner_counts.w1 as i32)
        .bind(draw.payout_amounts.jackpot_per_winner.0)
        .bind(draw.payout_amounts.match4_per_winner.0)
        .bind(draw.payout_amounts.match3_per_winner.0)
        .bind(draw.payout_amounts.match2_per_winner.0)
        .bind(draw.payout_amounts.match1_per_winner.0)
        .bind(draw.total_paid_out.0)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(draw)
    }

    async fn cancel(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM draw WHERE id = $1 FOR UPDATE")
            .bind(draw_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DrawError::NotFound(draw_id))?;
        let draw = row_to_draw(&row)?;
        if !matches!(draw.status, DrawStatus::Open | DrawStatus::Locked) {
            return Err(DrawError::WrongState {
                draw_id,
                expected: DrawStatus::Open,
                actual: draw.status,
            });
        }
        sqlx::query("UPDATE draw SET status = 'cancelled' WHERE id = $1")
            .bind(draw_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Draw {
            status: DrawStatus::Cancelled,
            ..draw
        })
    }

    async fn increment_ticket_totals(
        &self,
        draw_id: Uuid,
        ticket_count_delta: u32,
        amount_delta: Nano,
    ) -> Result<(), DrawError> {
        sqlx::query(
            "UPDATE draw SET total_tickets = total_tickets + $2, total_collected = total_collected + $3 WHERE id = $1",
        )
        .bind(draw_id)
        .bind(ticket_count_delta as i32)
        .bind(amount_delta.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
