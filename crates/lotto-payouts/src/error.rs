use lotto_chain::ChainError;
use lotto_types::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("payout {0} not found")]
    NotFound(Uuid),
    #[error("payout {payout_id} is in status {status:?}, expected pending or processing")]
    WrongState { payout_id: Uuid, status: lotto_types::PayoutStatus },
    #[error("daily limit exceeded for {currency:?}: {requested} would exceed {limit}")]
    DailyLimitExceeded {
        currency: lotto_types::Currency,
        requested: lotto_types::Nano,
        limit: lotto_types::Nano,
    },
    #[error("ticket claim window has expired")]
    ClaimExpired,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Persistence(#[from] sqlx::Error),
}

impl From<PayoutError> for CoreError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::NotFound(id) => CoreError::State(format!("payout {id} not found")),
            PayoutError::WrongState { .. } => CoreError::State(err.to_string()),
            PayoutError::DailyLimitExceeded { .. } => CoreError::Conflict(err.to_string()),
            PayoutError::ClaimExpired => CoreError::Validation(err.to_string()),
            PayoutError::Chain(ref chain_err) => {
                if chain_err.is_retryable() {
                    CoreError::TransientExternal(err.to_string())
                } else {
                    CoreError::PermanentExternal(err.to_string())
                }
            }
            PayoutError::Persistence(_) => CoreError::TransientExternal(err.to_string()),
        }
    }
}
