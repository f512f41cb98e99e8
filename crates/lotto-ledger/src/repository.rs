use async_trait::async_trait;
use lotto_types::{Currency, Fund, FundTransaction};
use uuid::Uuid;

use crate::error::LedgerError;

/// Durable access to Fund rows and the FundTransaction log.
///
/// `mutate_fund` is the only mutating entry point: it locks the
/// `(lottery_id, currency)` row, hands the locked, freshly-read `Fund`
/// to `mutate`, and persists the post-mutation `Fund` plus the
/// `FundTransaction` the closure returns as one atomic unit (spec §4.1
/// "all mutating ops wrap Fund read, balance check, Fund update, and
/// FundTransaction insert in one transaction"). `mutate` may be invoked
/// more than once if the surrounding transaction has to retry, so it
/// must be a pure function of the `Fund` it is given.
#[async_trait]
pub trait FundRepository: Send + Sync {
    async fn get_or_create_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Fund, sqlx::Error>;

    async fn mutate_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        mutate: Box<dyn Fn(&mut Fund) -> Result<FundTransaction, LedgerError> + Send>,
    ) -> Result<Fund, LedgerError>;

    async fn list_transactions(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Vec<FundTransaction>, sqlx::Error>;
}

pub mod postgres;
pub mod in_memory;

pub use in_memory::InMemoryFundRepository;
pub use postgres::PostgresFundRepository;
