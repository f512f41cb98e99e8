//! The `Chain` port (spec §6): the only way the core touches a
//! blockchain. Its HTTP/JSON transport is plumbing out of scope here;
//! this crate defines the contract and a deterministic in-memory mock
//! used by every other crate's tests.

use async_trait::async_trait;
use lotto_types::Nano;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transient chain failure: {0}")]
    Transient(String),
    #[error("permanent chain failure: {0}")]
    Permanent(String),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTransaction {
    pub amount: Nano,
    pub sender: String,
    pub recipient: String,
    pub timestamp_unix: i64,
    pub logical_time: u64,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub ok: bool,
    pub seqno: u32,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlock {
    pub hash: [u8; 32],
    pub number: u64,
}

/// Everything the core needs from a blockchain, expressed as ports so
/// that none of the components depend on a concrete RPC client.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn fetch_transaction(
        &self,
        tx_hash: &str,
        expected_recipient: &str,
        sender: Option<&str>,
    ) -> Result<FetchedTransaction, ChainError>;

    async fn send_ton(
        &self,
        to: &str,
        amount_nano: Nano,
        body: Option<&str>,
    ) -> Result<SendResult, ChainError>;

    async fn send_jetton(
        &self,
        jetton_master: &str,
        to: &str,
        units: Nano,
        forward_ton: Nano,
        body: Option<&str>,
    ) -> Result<SendResult, ChainError>;

    async fn get_balance(&self, address: &str) -> Result<Nano, ChainError>;

    async fn latest_block(&self) -> Result<LatestBlock, ChainError>;

    /// Looks for a transaction already on chain matching (recipient,
    /// amount) submitted since `since`, returning its hash if found.
    /// Used by the payout dispatcher to reconcile a `processing` Payout
    /// observed after a restart (spec §4.7 "Idempotence"): the original
    /// submission may have landed on chain even though the process
    /// never saw the response.
    async fn find_recent_transaction(
        &self,
        recipient: &str,
        amount: Nano,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<String>, ChainError>;
}

pub mod mock;
pub use mock::MockChain;
