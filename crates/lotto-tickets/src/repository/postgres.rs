use async_trait::async_trait;
use chrono::Utc;
use lotto_types::{Nano, Ticket, TicketStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::TicketRepository;
use crate::error::TicketSaleError;

fn status_code(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Active => "active",
        TicketStatus::Won => "won",
        TicketStatus::Lost => "lost",
        TicketStatus::Cancelled => "cancelled",
    }
}

fn parse_status(code: &str) -> TicketStatus {
    match code {
        "won" => TicketStatus::Won,
        "lost" => TicketStatus::Lost,
        "cancelled" => TicketStatus::Cancelled,
        _ => TicketStatus::Active,
    }
}

fn row_to_ticket(row: &sqlx::postgres::PgRow) -> Result<Ticket, sqlx::Error> {
    Ok(Ticket {
        id: row.try_get("id")?,
        lottery_id: row.try_get("lottery_id")?,
        user_id: row.try_get("user_id")?,
        draw_id: row.try_get("draw_id")?,
        numbers: row
            .try_get::<Vec<i32>, _>("numbers")?
            .into_iter()
            .map(|n| n as u32)
            .collect(),
        price: Nano(row.try_get("price")?),
        status: parse_status(row.try_get::<String, _>("status")?.as_str()),
        matched_numbers: row.try_get::<i32, _>("matched_numbers")? as u32,
        prize_amount: Nano(row.try_get("prize_amount")?),
        prize_claimed: row.try_get("prize_claimed")?,
        tx_hash: row.try_get("tx_hash")?,
        purchased_at: row.try_get("purchased_at")?,
        recipient_address: row.try_get("recipient_address")?,
    })
}

/// `sqlx`-backed implementation over the `ticket` table and a
/// `used_tx_hash` guard table enforcing the double-spend check ahead of
/// ticket insertion.
pub struct PostgresTicketRepository {
    pool: PgPool,
}

impl PostgresTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresTicketRepository { pool }
    }
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    async fn reserve_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError> {
        let result = sqlx::query("INSERT INTO used_tx_hash (tx_hash, created_at) VALUES ($1, $2)")
            .bind(tx_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(TicketSaleError::AlreadyClaimed(tx_hash.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError> {
        sqlx::query("DELETE FROM used_tx_hash WHERE tx_hash = $1")
            .bind(tx_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_tickets(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, TicketSaleError> {
        let mut inserted = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let currency_price = ticket.price.0;
            let numbers: Vec<i32> = ticket.numbers.iter().map(|&n| n as i32).collect();
            sqlx::query(
                r#"
                INSERT INTO ticket (id, lottery_id, user_id, draw_id, numbers, price, status,
                    matched_numbers, prize_amount, prize_claimed, tx_hash, purchased_at,
                    recipient_address)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, false, $8, $9, $10)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.lottery_id)
            .bind(ticket.user_id)
            .bind(ticket.draw_id)
            .bind(numbers)
            .bind(currency_price)
            .bind(status_code(ticket.status))
            .bind(&ticket.tx_hash)
            .bind(ticket.purchased_at)
            .bind(&ticket.recipient_address)
            .execute(&self.pool)
            .await?;
            inserted.push(ticket);
        }
        Ok(inserted)
    }

    async fn delete_tickets(&self, ticket_ids: &[Uuid]) -> Result<(), TicketSaleError> {
        sqlx::query("DELETE FROM ticket WHERE id = ANY($1)")
            .bind(ticket_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn tickets_for_draw(&self, draw_id: Uuid) -> Result<Vec<Ticket>, TicketSaleError> {
        let rows = sqlx::query("SELECT * FROM ticket WHERE draw_id = $1")
            .bind(draw_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(row_to_ticket)
            .collect::<Result<_, _>>()
            .map_err(TicketSaleError::Persistence)?)
    }

    async fn update_result(
        &self,
        ticket_id: Uuid,
        matched_numbers: u32,
        prize_amount: Nano,
        status: TicketStatus,
    ) -> Result<(), TicketSaleError> {
        sqlx::query(
            r#"
            UPDATE ticket SET matched_numbers = $2, prize_amount = $3, status = $4
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(ticket_id)
        .bind(matched_numbers as i32)
        .bind(prize_amount.0)
        .bind(status_code(status))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
