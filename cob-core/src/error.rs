use std::fmt;

use cob_model::LoanId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::delinquency::DelinquencyValidationError;

#[derive(Error, Debug, Clone)]
pub enum CobError {
    /// Bad input to a call; fatal to that call only.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] DelinquencyValidationError),

    /// Records contradict each other or an invariant would be broken.
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// Repository or I/O failure. A later cycle retries the account.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account {loan_id} is locked by {owner}")]
    Locked { loan_id: LoanId, owner: String },

    #[error("Step {step} timed out after {after_ms} ms")]
    Timeout { step: String, after_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CobError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CobError::Validation(_) => ErrorKind::Validation,
            CobError::InconsistentState(_) => ErrorKind::InconsistentState,
            CobError::Transient(_) => ErrorKind::Transient,
            CobError::NotFound(_) => ErrorKind::NotFound,
            CobError::Locked { .. } => ErrorKind::Locked,
            CobError::Timeout { .. } => ErrorKind::Timeout,
            CobError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether a later cycle may succeed without anyone changing data.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::Locked | ErrorKind::Timeout
        )
    }
}

/// Classification of a [`CobError`] as recorded in cycle reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Validation,
    InconsistentState,
    Transient,
    NotFound,
    Locked,
    Timeout,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Validation => "validation",
            ErrorKind::InconsistentState => "inconsistent_state",
            ErrorKind::Transient => "transient",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Locked => "locked",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, CobError>;
