//! Shared domain types for the lottery core: money, entities, and the
//! error taxonomy every other crate in the workspace builds on.

pub mod draw;
pub mod error;
pub mod fund;
pub mod lottery;
pub mod money;
pub mod payout;
pub mod ticket;

pub use draw::{Draw, DrawStatus, PayoutAmounts, WinnerCounts};
pub use error::CoreError;
pub use fund::{Fund, FundCounters, FundTransaction, FundTransactionType, Pool, Pools};
pub use lottery::{Currency, DrawCadence, Lottery, PayoutConfig};
pub use money::{Bps, Nano};
pub use payout::{Payout, PayoutStatus};
pub use ticket::{Ticket, TicketStatus};
