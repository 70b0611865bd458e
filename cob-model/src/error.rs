use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown {kind} code: {value}")]
    UnknownCode { kind: &'static str, value: String },

    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
