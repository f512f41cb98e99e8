use async_trait::async_trait;
use lotto_types::{Ticket, TicketStatus};
use uuid::Uuid;

use crate::error::TicketSaleError;

/// Durable access to Ticket rows. `reserve_tx_hash` is the double-spend
/// guard from spec §4.6 step 3/7: it is a single atomic insert against
/// the unique `tx_hash` constraint, so two concurrent `buy_tickets`
/// calls with the same hash can never both succeed (spec §8 scenario
/// S4).
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn reserve_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError>;
    async fn release_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError>;
    async fn insert_tickets(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, TicketSaleError>;
    async fn delete_tickets(&self, ticket_ids: &[Uuid]) -> Result<(), TicketSaleError>;
    async fn tickets_for_draw(&self, draw_id: Uuid) -> Result<Vec<Ticket>, TicketSaleError>;
    async fn update_result(
        &self,
        ticket_id: Uuid,
        matched_numbers: u32,
        prize_amount: lotto_types::Nano,
        status: TicketStatus,
    ) -> Result<(), TicketSaleError>;
}

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryTicketRepository;
pub use postgres::PostgresTicketRepository;
