use async_trait::async_trait;
use lotto_types::{Bps, Currency, DrawCadence, Lottery, Nano, PayoutConfig};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::LotteryRepository;
use crate::error::SchedulerError;

fn parse_currency(code: &str) -> Currency {
    match code {
        "USDT" => Currency::Usdt,
        _ => Currency::Ton,
    }
}

fn parse_cadence(code: &str) -> DrawCadence {
    match code {
        "hourly" => DrawCadence::Hourly,
        "weekly" => DrawCadence::Weekly,
        _ => DrawCadence::Daily,
    }
}

fn row_to_lottery(row: &sqlx::postgres::PgRow) -> Result<Lottery, sqlx::Error> {
    Ok(Lottery {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        active: row.try_get("active")?,
        numbers_count: row.try_get::<i32, _>("numbers_count")? as u32,
        numbers_max: row.try_get::<i32, _>("numbers_max")? as u32,
        ticket_price_nano: Nano(row.try_get("ticket_price_nano")?),
        base_jackpot: Nano(row.try_get("base_jackpot")?),
        accumulated_jackpot: Nano(row.try_get("accumulated_jackpot")?),
        currency: parse_currency(row.try_get::<String, _>("currency")?.as_str()),
        cadence: parse_cadence(row.try_get::<String, _>("cadence")?.as_str()),
        draw_hour: row.try_get::<i32, _>("draw_hour")? as u8,
    })
}

fn row_to_payout_config(row: &sqlx::postgres::PgRow) -> Result<PayoutConfig, sqlx::Error> {
    Ok(PayoutConfig {
        lottery_id: row.try_get("lottery_id")?,
        platform_share: Bps(row.try_get::<i32, _>("platform_share_bps")? as u16),
        prize_share: Bps(row.try_get::<i32, _>("prize_share_bps")? as u16),
        jackpot_share: Bps(row.try_get::<i32, _>("jackpot_share_bps")? as u16),
        payout_share: Bps(row.try_get::<i32, _>("payout_share_bps")? as u16),
        match4_share: Bps(row.try_get::<i32, _>("match4_share_bps")? as u16),
        match3_share: Bps(row.try_get::<i32, _>("match3_share_bps")? as u16),
        match2_share: Bps(row.try_get::<i32, _>("match2_share_bps")? as u16),
        match1_fixed: Nano(row.try_get("match1_fixed")?),
        reserve_share: Bps(row.try_get::<i32, _>("reserve_share_bps")? as u16),
        income_share: Bps(row.try_get::<i32, _>("income_share_bps")? as u16),
    })
}

/// `sqlx`-backed implementation over the `lottery`, `payout_config`, and
/// `draw_seed` tables declared in `migrations/`. `draw_seed` is a small
/// addition beyond the core schema sketched in spec §6: it holds the
/// plaintext server seed between `createDraw` and `executeDraw`, which
/// spec.md's data model doesn't name a home for.
pub struct PostgresLotteryRepository {
    pool: PgPool,
}

impl PostgresLotteryRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresLotteryRepository { pool }
    }
}

#[async_trait]
impl LotteryRepository for PostgresLotteryRepository {
    async fn active_lotteries(&self) -> Result<Vec<Lottery>, SchedulerError> {
        let rows = sqlx::query("SELECT * FROM lottery WHERE active = true")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(row_to_lottery)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn lottery(&self, lottery_id: Uuid) -> Result<Option<Lottery>, SchedulerError> {
        let row = sqlx::query("SELECT * FROM lottery WHERE id = $1")
            .bind(lottery_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_lottery(&r)).transpose()?)
    }

    async fn payout_config(&self, lottery_id: Uuid) -> Result<Option<PayoutConfig>, SchedulerError> {
        let row = sqlx::query("SELECT * FROM payout_config WHERE lottery_id = $1")
            .bind(lottery_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_payout_config(&r)).transpose()?)
    }

    async fn update_accumulated_jackpot(&self, lottery_id: Uuid, amount: Nano) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE lottery SET accumulated_jackpot = $2 WHERE id = $1")
            .bind(lottery_id)
            .bind(amount.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_seed(&self, draw_id: Uuid, server_seed: &str) -> Result<(), SchedulerError> {
        sqlx::query("INSERT INTO draw_seed (draw_id, server_seed) VALUES ($1, $2)")
            .bind(draw_id)
            .bind(server_seed)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn take_seed(&self, draw_id: Uuid) -> Result<Option<String>, SchedulerError> {
        let row = sqlx::query("DELETE FROM draw_seed WHERE draw_id = $1 RETURNING server_seed")
            .bind(draw_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<String, _>("server_seed")).transpose()?)
    }
}
