//! Fund Ledger (spec §4.1, C1): durable, transactional pool balances
//! per (lottery, currency), with an append-only audit log.

pub mod error;
pub mod ledger;
pub mod repository;
pub mod retry;

pub use error::LedgerError;
pub use ledger::{distribute_sale, replay, FundLedger, PayoutCalculation, SaleDistribution};
pub use repository::{FundRepository, InMemoryFundRepository, PostgresFundRepository};
