use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ModelError;
use crate::ids::{DelinquencyActionId, LoanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DelinquencyActionKind {
    Pause,
    Resume,
}

impl DelinquencyActionKind {
    pub fn code(&self) -> &'static str {
        match self {
            DelinquencyActionKind::Pause => "PAUSE",
            DelinquencyActionKind::Resume => "RESUME",
        }
    }
}

impl fmt::Display for DelinquencyActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DelinquencyActionKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PAUSE" => Ok(DelinquencyActionKind::Pause),
            "RESUME" => Ok(DelinquencyActionKind::Resume),
            _ => Err(ModelError::UnknownCode {
                kind: "delinquency action",
                value: s.to_string(),
            }),
        }
    }
}

/// A stored pause or resume of delinquency aging on a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelinquencyAction {
    pub id: Option<DelinquencyActionId>,
    pub loan_id: LoanId,
    pub action: DelinquencyActionKind,
    pub start_date: NaiveDate,
    /// Always `None` for a resume.
    pub end_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DelinquencyAction {
    pub fn pause(loan_id: LoanId, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: None,
            loan_id,
            action: DelinquencyActionKind::Pause,
            start_date: start,
            end_date: Some(end),
            created_at: None,
        }
    }

    pub fn resume(loan_id: LoanId, start: NaiveDate) -> Self {
        Self {
            id: None,
            loan_id,
            action: DelinquencyActionKind::Resume,
            start_date: start,
            end_date: None,
            created_at: None,
        }
    }
}

/// Unvalidated input for a new delinquency action. Every field may be
/// missing; the validator reports which one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct DelinquencyActionRequest {
    pub action: Option<DelinquencyActionKind>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DelinquencyActionRequest {
    pub fn pause(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            action: Some(DelinquencyActionKind::Pause),
            start_date: Some(start),
            end_date: Some(end),
        }
    }

    pub fn resume(start: NaiveDate) -> Self {
        Self {
            action: Some(DelinquencyActionKind::Resume),
            start_date: Some(start),
            end_date: None,
        }
    }
}
