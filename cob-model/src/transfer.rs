use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::ModelError;
use crate::ids::{LoanId, OwnerId, TransferExternalId, TransferId};
use crate::loan::Loan;

/// Effective-to value of a transfer that is still in effect.
pub const OPEN_ENDED: NaiveDate = match NaiveDate::from_ymd_opt(9999, 12, 31) {
    Some(date) => date,
    None => panic!("9999-12-31 is a valid date"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransferStatus {
    Pending,
    Active,
    Buyback,
    Cancelled,
    Declined,
}

impl TransferStatus {
    pub fn code(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Active => "ACTIVE",
            TransferStatus::Buyback => "BUYBACK",
            TransferStatus::Cancelled => "CANCELLED",
            TransferStatus::Declined => "DECLINED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TransferStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransferStatus::Pending),
            "ACTIVE" => Ok(TransferStatus::Active),
            "BUYBACK" => Ok(TransferStatus::Buyback),
            "CANCELLED" => Ok(TransferStatus::Cancelled),
            "DECLINED" => Ok(TransferStatus::Declined),
            other => Err(ModelError::UnknownCode {
                kind: "transfer status",
                value: other.to_string(),
            }),
        }
    }
}

/// Reason code attached to a terminal transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransferSubStatus {
    BalanceZero,
    BalanceNegative,
    Unsold,
    SamedayTransfers,
    UserRequest,
}

impl TransferSubStatus {
    pub fn code(&self) -> &'static str {
        match self {
            TransferSubStatus::BalanceZero => "BALANCE_ZERO",
            TransferSubStatus::BalanceNegative => "BALANCE_NEGATIVE",
            TransferSubStatus::Unsold => "UNSOLD",
            TransferSubStatus::SamedayTransfers => "SAMEDAY_TRANSFERS",
            TransferSubStatus::UserRequest => "USER_REQUEST",
        }
    }
}

impl fmt::Display for TransferSubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Loan balances captured at the moment ownership changes hands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BalanceSnapshot {
    pub total_outstanding: Decimal,
    pub principal_outstanding: Decimal,
    pub interest_outstanding: Decimal,
    pub fee_outstanding: Decimal,
    pub penalty_outstanding: Decimal,
    pub overpayment: Decimal,
}

impl BalanceSnapshot {
    pub fn of(loan: &Loan) -> Self {
        let summary = &loan.summary;
        Self {
            total_outstanding: summary.total_outstanding(),
            principal_outstanding: summary.principal(),
            interest_outstanding: summary.interest(),
            fee_outstanding: summary.fees(),
            penalty_outstanding: summary.penalties(),
            overpayment: loan.overpaid(),
        }
    }
}

/// One record in the ownership history of a loan.
///
/// Records are never deleted. A record stops being in effect when its
/// `effective_date_to` is moved off [`OPEN_ENDED`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnershipTransfer {
    /// `None` until the repository stores the record.
    pub id: Option<TransferId>,
    pub owner: OwnerId,
    pub external_id: TransferExternalId,
    pub loan_id: LoanId,
    pub status: TransferStatus,
    pub sub_status: Option<TransferSubStatus>,
    pub settlement_date: NaiveDate,
    pub effective_date_from: NaiveDate,
    pub effective_date_to: NaiveDate,
    pub purchase_price_ratio: Decimal,
    pub snapshot: Option<BalanceSnapshot>,
}

impl OwnershipTransfer {
    /// A new, not yet stored record that carries over the identity fields
    /// of `self` (owner, external id, loan and price ratio).
    pub fn derive(
        &self,
        status: TransferStatus,
        sub_status: Option<TransferSubStatus>,
        settlement_date: NaiveDate,
        effective_date_from: NaiveDate,
        effective_date_to: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            owner: self.owner.clone(),
            external_id: self.external_id.clone(),
            loan_id: self.loan_id,
            status,
            sub_status,
            settlement_date,
            effective_date_from,
            effective_date_to,
            purchase_price_ratio: self.purchase_price_ratio,
            snapshot: None,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.effective_date_to == OPEN_ENDED
    }

    pub fn is_active_open_ended(&self) -> bool {
        self.status == TransferStatus::Active && self.is_open_ended()
    }
}

/// Which ACTIVE transfer currently holds a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanOwnerMapping {
    pub loan_id: LoanId,
    pub transfer_id: TransferId,
    pub owner: OwnerId,
    pub start_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::{LoanStatus, LoanSummary};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn snapshot_defaults_missing_balances_to_zero() {
        let mut loan = Loan::new(LoanId(3), LoanStatus::Active, "EUR");
        loan.summary = LoanSummary {
            principal_outstanding: Some(dec!(250)),
            interest_outstanding: Some(dec!(12.5)),
            ..LoanSummary::default()
        };

        let snapshot = BalanceSnapshot::of(&loan);
        assert_eq!(snapshot.total_outstanding, dec!(262.5));
        assert_eq!(snapshot.fee_outstanding, Decimal::ZERO);
        assert_eq!(snapshot.penalty_outstanding, Decimal::ZERO);
        assert_eq!(snapshot.overpayment, Decimal::ZERO);
    }

    #[test]
    fn derive_keeps_identity_fields_and_drops_storage_state() {
        let pending = OwnershipTransfer {
            id: Some(TransferId(9)),
            owner: OwnerId::new("owner-1"),
            external_id: TransferExternalId::new("ext-1"),
            loan_id: LoanId(4),
            status: TransferStatus::Pending,
            sub_status: None,
            settlement_date: date(2024, 1, 10),
            effective_date_from: date(2024, 1, 5),
            effective_date_to: OPEN_ENDED,
            purchase_price_ratio: dec!(1.05),
            snapshot: Some(BalanceSnapshot::default()),
        };

        let today = date(2024, 1, 10);
        let declined = pending.derive(
            TransferStatus::Declined,
            Some(TransferSubStatus::BalanceZero),
            today,
            today,
            today,
        );

        assert_eq!(declined.id, None);
        assert_eq!(declined.snapshot, None);
        assert_eq!(declined.owner, pending.owner);
        assert_eq!(declined.external_id, pending.external_id);
        assert_eq!(declined.purchase_price_ratio, dec!(1.05));
        assert!(!declined.is_open_ended());
        assert!(!pending.is_active_open_ended());
    }

    #[test]
    fn status_parsing_rejects_unknown_codes() {
        assert_eq!("BUYBACK".parse(), Ok(TransferStatus::Buyback));
        assert!("SOLD".parse::<TransferStatus>().is_err());
    }
}
