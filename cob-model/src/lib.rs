//! Core data model definitions shared across the close-of-business crates.
#![allow(missing_docs)]

pub use ::chrono;
pub use ::rust_decimal;

pub mod delinquency;
pub mod error;
pub mod financial_event;
pub mod ids;
pub mod loan;
pub mod prelude;
pub mod transfer;

pub use delinquency::{
    DelinquencyAction, DelinquencyActionKind, DelinquencyActionRequest,
};
pub use error::{ModelError, Result as ModelResult};
pub use financial_event::{
    ChargeEvent, EventDates, FinancialEvent, FinancialEventKind,
    TermVariationEvent, TransactionEvent,
};
pub use ids::{
    DelinquencyActionId, LoanId, OwnerId, TransferExternalId, TransferId,
};
pub use loan::{Loan, LoanStatus, LoanSummary};
pub use transfer::{
    BalanceSnapshot, LoanOwnerMapping, OPEN_ENDED, OwnershipTransfer,
    TransferStatus, TransferSubStatus,
};
