use lotto_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient reserve pool")]
    InsufficientReserve,
    #[error("insufficient {pool} pool")]
    InsufficientPool { pool: &'static str },
    #[error("invalid payout config: {0}")]
    InvalidConfig(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> CoreError {
        match err {
            LedgerError::InsufficientReserve | LedgerError::InsufficientPool { .. } => {
                CoreError::InsufficientFunds(err.to_string())
            }
            LedgerError::InvalidConfig(msg) => CoreError::Validation(msg),
            LedgerError::Persistence(source) if crate::retry::is_retryable(&source) => {
                CoreError::TransientExternal(source.to_string())
            }
            LedgerError::Persistence(source) => CoreError::Integrity(source.to_string()),
        }
    }
}
