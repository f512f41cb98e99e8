use lotto_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error(transparent)]
    Ledger(#[from] lotto_ledger::LedgerError),
}

impl From<CalculatorError> for CoreError {
    fn from(err: CalculatorError) -> CoreError {
        match err {
            CalculatorError::Ledger(e) => e.into(),
        }
    }
}
