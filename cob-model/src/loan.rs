use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::ModelError;
use crate::ids::LoanId;

/// Lifecycle status of a loan account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum LoanStatus {
    Submitted,
    Approved,
    Active,
    Overpaid,
    ClosedObligationsMet,
    ClosedWrittenOff,
    Rejected,
    Withdrawn,
}

impl LoanStatus {
    pub fn code(&self) -> &'static str {
        match self {
            LoanStatus::Submitted => "SUBMITTED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Overpaid => "OVERPAID",
            LoanStatus::ClosedObligationsMet => "CLOSED_OBLIGATIONS_MET",
            LoanStatus::ClosedWrittenOff => "CLOSED_WRITTEN_OFF",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Active)
    }

    /// Accounts the daily cycle still has to advance.
    pub fn is_cob_eligible(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overpaid)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LoanStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(LoanStatus::Submitted),
            "APPROVED" => Ok(LoanStatus::Approved),
            "ACTIVE" => Ok(LoanStatus::Active),
            "OVERPAID" => Ok(LoanStatus::Overpaid),
            "CLOSED_OBLIGATIONS_MET" => Ok(LoanStatus::ClosedObligationsMet),
            "CLOSED_WRITTEN_OFF" => Ok(LoanStatus::ClosedWrittenOff),
            "REJECTED" => Ok(LoanStatus::Rejected),
            "WITHDRAWN" => Ok(LoanStatus::Withdrawn),
            other => Err(ModelError::UnknownCode {
                kind: "loan status",
                value: other.to_string(),
            }),
        }
    }
}

/// Outstanding balances of a loan. Absent components count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoanSummary {
    pub principal_outstanding: Option<Decimal>,
    pub interest_outstanding: Option<Decimal>,
    pub fee_charges_outstanding: Option<Decimal>,
    pub penalty_charges_outstanding: Option<Decimal>,
}

impl LoanSummary {
    pub fn principal(&self) -> Decimal {
        self.principal_outstanding.unwrap_or_default()
    }

    pub fn interest(&self) -> Decimal {
        self.interest_outstanding.unwrap_or_default()
    }

    pub fn fees(&self) -> Decimal {
        self.fee_charges_outstanding.unwrap_or_default()
    }

    pub fn penalties(&self) -> Decimal {
        self.penalty_charges_outstanding.unwrap_or_default()
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.principal() + self.interest() + self.fees() + self.penalties()
    }
}

/// The slice of a loan account the close-of-business engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loan {
    pub id: LoanId,
    pub external_id: Option<String>,
    pub status: LoanStatus,
    pub currency: String,
    pub disbursement_date: Option<NaiveDate>,
    pub summary: LoanSummary,
    pub total_overpaid: Option<Decimal>,
    /// Most recent business date the daily cycle completed for.
    pub last_closed_business_date: Option<NaiveDate>,
}

impl Loan {
    pub fn new(id: LoanId, status: LoanStatus, currency: &str) -> Self {
        Self {
            id,
            external_id: None,
            status,
            currency: currency.to_string(),
            disbursement_date: None,
            summary: LoanSummary::default(),
            total_overpaid: None,
            last_closed_business_date: None,
        }
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.summary.total_outstanding()
    }

    pub fn overpaid(&self) -> Decimal {
        self.total_overpaid.unwrap_or_default()
    }

    /// True when the cycle for `date` has already run to completion.
    pub fn is_closed_for(&self, date: NaiveDate) -> bool {
        self.last_closed_business_date
            .is_some_and(|closed| closed >= date)
    }
}
