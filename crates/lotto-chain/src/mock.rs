use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lotto_types::Nano;

use crate::{Chain, ChainError, FetchedTransaction, LatestBlock, SendResult};

struct SentRecord {
    recipient: String,
    amount: Nano,
    tx_hash: String,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    transactions: HashMap<String, FetchedTransaction>,
    balances: HashMap<String, Nano>,
    seqno: u32,
    next_send_outcomes: Vec<Result<(), String>>,
    sent: Vec<SentRecord>,
}

/// Deterministic stand-in for a live TON RPC client. Tests seed known
/// transactions via `seed_transaction` and can queue up send failures via
/// `queue_send_failure` to exercise the dispatcher's retry path without a
/// real network.
pub struct MockChain {
    inner: Mutex<Inner>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        MockChain {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn seed_transaction(&self, tx_hash: impl Into<String>, tx: FetchedTransaction) {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .insert(tx_hash.into(), tx);
    }

    pub fn seed_balance(&self, address: impl Into<String>, amount: Nano) {
        self.inner.lock().unwrap().balances.insert(address.into(), amount);
    }

    /// Queues the next N `send_ton`/`send_jetton` calls to fail transiently
    /// with the given message before succeeding.
    pub fn queue_send_failure(&self, message: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .next_send_outcomes
            .push(Err(message.into()));
    }

    /// Directly records a send as having happened, for tests that need
    /// to simulate a submission that landed on chain without going
    /// through `send_ton`/`send_jetton` (e.g. a restart-reconciliation
    /// scenario).
    pub fn seed_sent(&self, recipient: impl Into<String>, amount: Nano, tx_hash: impl Into<String>, at: DateTime<Utc>) {
        self.inner.lock().unwrap().sent.push(SentRecord {
            recipient: recipient.into(),
            amount,
            tx_hash: tx_hash.into(),
            at,
        });
    }
}

#[async_trait]
impl Chain for MockChain {
    async fn fetch_transaction(
        &self,
        tx_hash: &str,
        expected_recipient: &str,
        sender: Option<&str>,
    ) -> Result<FetchedTransaction, ChainError> {
        let inner = self.inner.lock().unwrap();
        let tx = inner
            .transactions
            .get(tx_hash)
            .ok_or_else(|| ChainError::Permanent(format!("unknown tx_hash {tx_hash}")))?;
        if tx.recipient != expected_recipient {
            return Err(ChainError::Permanent("recipient mismatch".into()));
        }
        if let Some(sender) = sender {
            if tx.sender != sender {
                return Err(ChainError::Permanent("sender mismatch".into()));
            }
        }
        Ok(tx.clone())
    }

    async fn send_ton(
        &self,
        to: &str,
        amount_nano: Nano,
        _body: Option<&str>,
    ) -> Result<SendResult, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.next_send_outcomes.is_empty() {
            let outcome = inner.next_send_outcomes.remove(0);
            if let Err(message) = outcome {
                return Err(ChainError::Transient(message));
            }
        }
        inner.seqno += 1;
        let tx_hash = format!("mock-tx-{}", inner.seqno);
        inner.sent.push(SentRecord {
            recipient: to.to_string(),
            amount: amount_nano,
            tx_hash: tx_hash.clone(),
            at: Utc::now(),
        });
        Ok(SendResult {
            ok: true,
            seqno: inner.seqno,
            tx_hash,
        })
    }

    async fn send_jetton(
        &self,
        _jetton_master: &str,
        to: &str,
        units: Nano,
        _forward_ton: Nano,
        body: Option<&str>,
    ) -> Result<SendResult, ChainError> {
        self.send_ton(to, units, body).await
    }

    async fn get_balance(&self, address: &str) -> Result<Nano, ChainError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .balances
            .get(address)
            .copied()
            .unwrap_or(Nano::ZERO))
    }

    async fn latest_block(&self) -> Result<LatestBlock, ChainError> {
        Ok(LatestBlock {
            hash: [0u8; 32],
            number: 1,
        })
    }

    async fn find_recent_transaction(
        &self,
        recipient: &str,
        amount: Nano,
        since: DateTime<Utc>,
    ) -> Result<Option<String>, ChainError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sent
            .iter()
            .rev()
            .find(|r| r.recipient == recipient && r.amount == amount && r.at >= since)
            .map(|r| r.tx_hash.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn fetch_unknown_tx_is_permanent_error() {
        let chain = MockChain::new();
        let err = chain
            .fetch_transaction("nope", "platform", None)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn find_recent_transaction_matches_prior_send() {
        let chain = MockChain::new();
        let before = Utc::now();
        let sent = chain.send_ton("recipient-1", Nano(500), None).await.unwrap();
        let found = chain
            .find_recent_transaction("recipient-1", Nano(500), before)
            .await
            .unwrap();
        assert_eq!(found, Some(sent.tx_hash));
        let not_found = chain
            .find_recent_transaction("recipient-1", Nano(999), before)
            .await
            .unwrap();
        assert_eq!(not_found, None);
    }

    #[tokio::test]
    async fn queued_failure_then_success() {
        let chain = MockChain::new();
        chain.queue_send_failure("429 too many requests");
        let err = chain
            .send_ton("addr", Nano(1), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        let ok = chain.send_ton("addr", Nano(1), None).await.unwrap();
        assert!(ok.ok);
        assert_eq!(ok.seqno, 1);
    }

    #[tokio::test]
    async fn seeded_transaction_round_trips() {
        let chain = MockChain::new();
        chain.seed_transaction(
            "abc",
            FetchedTransaction {
                amount: Nano(1_000_000_000),
                sender: "sender".into(),
                recipient: "platform".into(),
                timestamp_unix: Utc::now().timestamp(),
                logical_time: 1,
                confirmed: true,
            },
        );
        let tx = chain
            .fetch_transaction("abc", "platform", Some("sender"))
            .await
            .unwrap();
        assert_eq!(tx.amount, Nano(1_000_000_000));
    }
}
