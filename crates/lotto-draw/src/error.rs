use lotto_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("draw {draw_id} is in state {actual:?}, expected {expected:?}")]
    WrongState {
        draw_id: uuid::Uuid,
        expected: lotto_types::DrawStatus,
        actual: lotto_types::DrawStatus,
    },
    #[error("draw {0} not found")]
    NotFound(uuid::Uuid),
    #[error("server seed does not match committed hash")]
    SeedMismatch,
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<DrawError> for CoreError {
    fn from(err: DrawError) -> CoreError {
        match err {
            DrawError::WrongState { .. } => CoreError::State(err.to_string()),
            DrawError::NotFound(_) => CoreError::Validation(err.to_string()),
            DrawError::SeedMismatch => CoreError::Integrity(err.to_string()),
            DrawError::Persistence(_) => CoreError::TransientExternal(err.to_string()),
        }
    }
}
