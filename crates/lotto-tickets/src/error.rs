use lotto_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketSaleError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("no open draw accepting purchases for this lottery")]
    NoOpenDraw,
    #[error("transaction already used: {0}")]
    AlreadyClaimed(String),
    #[error("deposit verification failed: {0}")]
    DepositRejected(String),
    #[error(transparent)]
    Chain(#[from] lotto_chain::ChainError),
    #[error(transparent)]
    Ledger(#[from] lotto_ledger::LedgerError),
    #[error(transparent)]
    Draw(#[from] lotto_draw::DrawError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<TicketSaleError> for CoreError {
    fn from(err: TicketSaleError) -> CoreError {
        match err {
            TicketSaleError::Validation(msg) => CoreError::Validation(msg),
            TicketSaleError::NoOpenDraw => CoreError::State(err.to_string()),
            TicketSaleError::AlreadyClaimed(_) => CoreError::Conflict(err.to_string()),
            TicketSaleError::DepositRejected(msg) => CoreError::Validation(msg),
            TicketSaleError::Chain(e) if e.is_retryable() => CoreError::TransientExternal(e.to_string()),
            TicketSaleError::Chain(e) => CoreError::PermanentExternal(e.to_string()),
            TicketSaleError::Ledger(e) => e.into(),
            TicketSaleError::Draw(e) => e.into(),
            TicketSaleError::Persistence(source) => CoreError::TransientExternal(source.to_string()),
        }
    }
}
