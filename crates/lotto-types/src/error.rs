//! Shared error taxonomy. Every component crate defines its own
//! `thiserror` enum and converts into this one at its public boundary so
//! callers reason about one set of kinds regardless of which component
//! raised the error.

use thiserror::Error;

/// The seven kinds of failure a core operation can surface.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("state: {0}")]
    State(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("transient external failure: {0}")]
    TransientExternal(String),

    #[error("permanent external failure: {0}")]
    PermanentExternal(String),

    #[error("integrity violation: {0}")]
    Integrity(String),
}

impl CoreError {
    /// Integrity violations are the only kind that must halt further
    /// mutation of the affected lottery (spec §7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Integrity(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::TransientExternal(_))
    }
}
