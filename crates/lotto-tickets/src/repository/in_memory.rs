use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use lotto_types::{Nano, Ticket, TicketStatus};
use uuid::Uuid;

use super::TicketRepository;
use crate::error::TicketSaleError;

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tx_hashes: Mutex<HashSet<String>>,
    tickets: Mutex<HashMap<Uuid, Ticket>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn reserve_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError> {
        let mut hashes = self.tx_hashes.lock().unwrap();
        if !hashes.insert(tx_hash.to_string()) {
            return Err(TicketSaleError::AlreadyClaimed(tx_hash.to_string()));
        }
        Ok(())
    }

    async fn release_tx_hash(&self, tx_hash: &str) -> Result<(), TicketSaleError> {
        self.tx_hashes.lock().unwrap().remove(tx_hash);
        Ok(())
    }

    async fn insert_tickets(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, TicketSaleError> {
        let mut store = self.tickets.lock().unwrap();
        for ticket in &tickets {
            store.insert(ticket.id, ticket.clone());
        }
        Ok(tickets)
    }

    async fn delete_tickets(&self, ticket_ids: &[Uuid]) -> Result<(), TicketSaleError> {
        let mut store = self.tickets.lock().unwrap();
        for id in ticket_ids {
            store.remove(id);
        }
        Ok(())
    }

    async fn tickets_for_draw(&self, draw_id: Uuid) -> Result<Vec<Ticket>, TicketSaleError> {
        let store = self.tickets.lock().unwrap();
        Ok(store.values().filter(|t| t.draw_id == draw_id).cloned().collect())
    }

    async fn update_result(
        &self,
        ticket_id: Uuid,
        matched_numbers: u32,
        prize_amount: Nano,
        status: TicketStatus,
    ) -> Result<(), TicketSaleError> {
        let mut store = self.tickets.lock().unwrap();
        if let Some(ticket) = store.get_mut(&ticket_id) {
            if ticket.status != TicketStatus::Active {
                return Ok(());
            }
            ticket.matched_numbers = matched_numbers;
            ticket.prize_amount = prize_amount;
            ticket.status = status;
        }
        Ok(())
    }
}
