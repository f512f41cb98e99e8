use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lotto_types::{Currency, Nano, Payout, PayoutStatus};
use uuid::Uuid;

use super::PayoutRepository;
use crate::error::PayoutError;

#[derive(Default)]
pub struct InMemoryPayoutRepository {
    payouts: Mutex<HashMap<Uuid, Payout>>,
}

impl InMemoryPayoutRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutRepository for InMemoryPayoutRepository {
    async fn insert(&self, payout: Payout) -> Result<Payout, PayoutError> {
        self.payouts.lock().unwrap().insert(payout.id, payout.clone());
        Ok(payout)
    }

    async fn insert_batch(&self, payouts: Vec<Payout>) -> Result<Vec<Payout>, PayoutError> {
        let mut store = self.payouts.lock().unwrap();
        for payout in &payouts {
            store.insert(payout.id, payout.clone());
        }
        Ok(payouts)
    }

    async fn load(&self, payout_id: Uuid) -> Result<Payout, PayoutError> {
        self.payouts
            .lock()
            .unwrap()
            .get(&payout_id)
            .cloned()
            .ok_or(PayoutError::NotFound(payout_id))
    }

    async fn due_for_dispatch(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Payout>, PayoutError> {
        let store = self.payouts.lock().unwrap();
        let mut pending: Vec<Payout> = store
            .values()
            .filter(|p| {
                p.status == PayoutStatus::Pending
                    && p.attempts < p.max_attempts
                    && p.next_attempt_at <= now
            })
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_processing(&self, payout_id: Uuid) -> Result<Payout, PayoutError> {
        let mut store = self.payouts.lock().unwrap();
        let payout = store.get_mut(&payout_id).ok_or(PayoutError::NotFound(payout_id))?;
        payout.status = PayoutStatus::Processing;
        payout.attempts += 1;
        payout.processed_at = Some(Utc::now());
        Ok(payout.clone())
    }

    async fn mark_completed(&self, payout_id: Uuid, tx_hash: &str) -> Result<Payout, PayoutError> {
        let mut store = self.payouts.lock().unwrap();
        let payout = store.get_mut(&payout_id).ok_or(PayoutError::NotFound(payout_id))?;
        payout.status = PayoutStatus::Completed;
        payout.tx_hash = Some(tx_hash.to_string());
        payout.completed_at = Some(Utc::now());
        Ok(payout.clone())
    }

    async fn mark_retry(
        &self,
        payout_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Payout, PayoutError> {
        let mut store = self.payouts.lock().unwrap();
        let payout = store.get_mut(&payout_id).ok_or(PayoutError::NotFound(payout_id))?;
        payout.status = PayoutStatus::Pending;
        payout.last_error = Some(error.to_string());
        payout.next_attempt_at = next_attempt_at;
        Ok(payout.clone())
    }

    async fn mark_failed(&self, payout_id: Uuid, error: &str) -> Result<Payout, PayoutError> {
        let mut store = self.payouts.lock().unwrap();
        let payout = store.get_mut(&payout_id).ok_or(PayoutError::NotFound(payout_id))?;
        payout.status = PayoutStatus::Failed;
        payout.last_error = Some(error.to_string());
        Ok(payout.clone())
    }

    async fn in_doubt(&self) -> Result<Vec<Payout>, PayoutError> {
        let store = self.payouts.lock().unwrap();
        Ok(store
            .values()
            .filter(|p| p.status == PayoutStatus::Processing)
            .cloned()
            .collect())
    }

    async fn completed_total_since(
        &self,
        currency: Currency,
        since: DateTime<Utc>,
    ) -> Result<Nano, PayoutError> {
        let store = self.payouts.lock().unwrap();
        let total = store
            .values()
            .filter(|p| {
                p.currency == currency
                    && p.status == PayoutStatus::Completed
                    && p.completed_at.map(|c| c >= since).unwrap_or(false)
            })
            .fold(Nano::ZERO, |acc, p| acc + p.amount);
        Ok(total)
    }
}
