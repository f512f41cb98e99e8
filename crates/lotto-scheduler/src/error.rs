use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("lottery {0} not found")]
    LotteryNotFound(Uuid),
    #[error("payout config for lottery {0} not found")]
    ConfigNotFound(Uuid),
    #[error("no committed server seed on file for draw {0}")]
    MissingSeed(Uuid),
    #[error(transparent)]
    Draw(#[from] lotto_draw::DrawError),
    #[error(transparent)]
    Ledger(#[from] lotto_ledger::LedgerError),
    #[error(transparent)]
    Calculator(#[from] lotto_calculator::CalculatorError),
    #[error(transparent)]
    Rng(#[from] lotto_rng::RngError),
    #[error(transparent)]
    Ticket(#[from] lotto_tickets::TicketSaleError),
    #[error(transparent)]
    Payout(#[from] lotto_payouts::PayoutError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl SchedulerError {
    /// Mirrors each wrapped error's Integrity classification (spec §7)
    /// without consuming it into a `CoreError` — the scheduler only
    /// needs a yes/no to decide whether to halt the lottery rather than
    /// retry it next tick.
    pub fn is_fatal(&self) -> bool {
        match self {
            SchedulerError::MissingSeed(_) => true,
            SchedulerError::Draw(lotto_draw::DrawError::SeedMismatch) => true,
            SchedulerError::Ledger(lotto_ledger::LedgerError::Persistence(e)) => {
                !lotto_ledger::retry::is_retryable(e)
            }
            SchedulerError::Calculator(lotto_calculator::CalculatorError::Ledger(
                lotto_ledger::LedgerError::Persistence(e),
            )) => !lotto_ledger::retry::is_retryable(e),
            SchedulerError::Rng(lotto_rng::RngError::InvalidParameters(_)) => true,
            _ => false,
        }
    }
}
