//! Snapshot of the types surface used by steps and repositories.
//! Prefer importing from this module instead of individual tree nodes when
//! writing business steps or repository adapters.

pub use super::delinquency::{
    DelinquencyAction, DelinquencyActionKind, DelinquencyActionRequest,
};
pub use super::financial_event::{EventDates, FinancialEvent};
pub use super::ids::{LoanId, OwnerId, TransferExternalId, TransferId};
pub use super::loan::{Loan, LoanStatus, LoanSummary};
pub use super::transfer::{
    BalanceSnapshot, LoanOwnerMapping, OPEN_ENDED, OwnershipTransfer,
    TransferStatus, TransferSubStatus,
};
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
