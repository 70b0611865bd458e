//! Ownership transfer transitions for one loan on one business date.
//!
//! Upstream bookings leave PENDING (sale) and BUYBACK records settling on a
//! given date. On that date the machine turns them into their terminal
//! records:
//!
//! | today's records      | outcome                                       |
//! |----------------------|-----------------------------------------------|
//! | none                 | nothing                                       |
//! | PENDING              | ACTIVE from tomorrow, or DECLINED if no balance |
//! | BUYBACK              | ACTIVE closed, or CANCELLED/UNSOLD if unsold  |
//! | PENDING then BUYBACK | both CANCELLED/SAMEDAY_TRANSFERS              |
//!
//! Source records are closed by moving their effective-to date to the
//! business date; nothing is deleted.

use chrono::{Days, NaiveDate};
use cob_model::{
    BalanceSnapshot, Loan, LoanOwnerMapping, OPEN_ENDED, OwnershipTransfer,
    TransferStatus, TransferSubStatus,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::cob::events::CobEventPayload;
use crate::domain::cob::store::AccountTransaction;
use crate::error::{CobError, Result};

use super::repository::{LoanOwnerMappingRepository, TransferRepository};

/// Statuses the machine picks up on their settlement date.
pub const TRIGGER_STATUSES: [TransferStatus; 2] =
    [TransferStatus::Pending, TransferStatus::Buyback];

/// What today's records ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferIntent {
    Nothing,
    Sale(OwnershipTransfer),
    Buyback(OwnershipTransfer),
    SameDay {
        pending: OwnershipTransfer,
        buyback: OwnershipTransfer,
    },
}

impl TransferIntent {
    /// Classify today's PENDING/BUYBACK records, ordered by record id.
    pub fn classify(mut transfers: Vec<OwnershipTransfer>) -> Result<Self> {
        match transfers.len() {
            0 => Ok(TransferIntent::Nothing),
            1 => {
                let transfer = transfers.remove(0);
                match transfer.status {
                    TransferStatus::Pending => {
                        Ok(TransferIntent::Sale(transfer))
                    }
                    TransferStatus::Buyback => {
                        Ok(TransferIntent::Buyback(transfer))
                    }
                    other => Err(CobError::InconsistentState(format!(
                        "Illegal transfer found. Expected PENDING or \
                         BUYBACK, found: {other}"
                    ))),
                }
            }
            2 => {
                let buyback = transfers.remove(1);
                let pending = transfers.remove(0);
                if pending.status == TransferStatus::Pending
                    && buyback.status == TransferStatus::Buyback
                {
                    Ok(TransferIntent::SameDay { pending, buyback })
                } else {
                    Err(CobError::InconsistentState(format!(
                        "Illegal transfer found. Expected PENDING and \
                         BUYBACK, found: {} and {}",
                        pending.status, buyback.status
                    )))
                }
            }
            n => Err(CobError::InconsistentState(format!(
                "Illegal transfer found. Expected at most PENDING and \
                 BUYBACK, found {n} transfers"
            ))),
        }
    }
}

/// Decides and persists ownership transfer transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipTransferStateMachine;

impl OwnershipTransferStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Read today's records through `tx` and apply the transition.
    pub async fn execute(
        &self,
        tx: &dyn AccountTransaction,
        loan: &Loan,
        business_date: NaiveDate,
    ) -> Result<Vec<CobEventPayload>> {
        let pending = tx
            .transfers()
            .find_by_loan_and_date_and_status_in(
                loan.id,
                business_date,
                &TRIGGER_STATUSES,
            )
            .await?;
        self.decide(
            tx.transfers(),
            tx.owner_mappings(),
            loan,
            business_date,
            pending,
        )
        .await
    }

    /// Apply the transition asked for by `pending_transfers_for_today` and
    /// return the events describing it.
    pub async fn decide(
        &self,
        transfers: &dyn TransferRepository,
        mappings: &dyn LoanOwnerMappingRepository,
        loan: &Loan,
        settlement_date: NaiveDate,
        pending_transfers_for_today: Vec<OwnershipTransfer>,
    ) -> Result<Vec<CobEventPayload>> {
        let intent = TransferIntent::classify(pending_transfers_for_today)?;
        debug!(
            loan_id = %loan.id,
            %settlement_date,
            intent = intent_name(&intent),
            "ownership transfer decision"
        );

        match intent {
            TransferIntent::Nothing => Ok(Vec::new()),
            TransferIntent::SameDay { pending, buyback } => {
                let mut events = Vec::with_capacity(2);
                for transfer in [pending, buyback] {
                    let mirror = transfer.derive(
                        TransferStatus::Cancelled,
                        Some(TransferSubStatus::SamedayTransfers),
                        settlement_date,
                        settlement_date,
                        settlement_date,
                    );
                    transfers.save(close(transfer, settlement_date)).await?;
                    let mirror = transfers.save(mirror).await?;
                    events.push(CobEventPayload::OwnershipTransferred {
                        transfer: mirror,
                    });
                }
                Ok(events)
            }
            TransferIntent::Sale(pending) => {
                self.sell(transfers, mappings, loan, settlement_date, pending)
                    .await
            }
            TransferIntent::Buyback(buyback) => {
                self.buy_back(
                    transfers,
                    mappings,
                    loan,
                    settlement_date,
                    buyback,
                )
                .await
            }
        }
    }

    async fn sell(
        &self,
        transfers: &dyn TransferRepository,
        mappings: &dyn LoanOwnerMappingRepository,
        loan: &Loan,
        today: NaiveDate,
        pending: OwnershipTransfer,
    ) -> Result<Vec<CobEventPayload>> {
        if loan.total_outstanding() <= Decimal::ZERO {
            let sub_status = if loan.overpaid() > Decimal::ZERO {
                TransferSubStatus::BalanceNegative
            } else {
                TransferSubStatus::BalanceZero
            };
            let declined = pending.derive(
                TransferStatus::Declined,
                Some(sub_status),
                today,
                today,
                today,
            );
            transfers.save(close(pending, today)).await?;
            let declined = transfers.save(declined).await?;
            return Ok(vec![CobEventPayload::OwnershipTransferred {
                transfer: declined,
            }]);
        }

        if let Some(existing) = transfers
            .find_active_open_ended(loan.id, &pending.owner)
            .await?
        {
            return Err(CobError::InconsistentState(format!(
                "loan {} is already owned by {} through transfer {}",
                loan.id,
                existing.owner,
                existing.id.map(|id| id.to_string()).unwrap_or_default()
            )));
        }

        let starts_on = today.checked_add_days(Days::new(1)).ok_or_else(|| {
            CobError::InvalidArgument(format!("no day after {today}"))
        })?;
        let snapshot = BalanceSnapshot::of(loan);
        let mut active = pending.derive(
            TransferStatus::Active,
            None,
            today,
            starts_on,
            OPEN_ENDED,
        );
        active.snapshot = Some(snapshot.clone());

        transfers.save(close(pending, today)).await?;
        let active = transfers.save(active).await?;
        let transfer_id = active.id.ok_or_else(|| {
            CobError::Transient("saved transfer has no id".into())
        })?;
        mappings
            .save_mapping(LoanOwnerMapping {
                loan_id: loan.id,
                transfer_id,
                owner: active.owner.clone(),
                start_date: starts_on,
            })
            .await?;

        let owner = active.owner.clone();
        Ok(vec![
            CobEventPayload::OwnershipTransferred { transfer: active },
            CobEventPayload::AccountSnapshotChanged {
                loan_id: loan.id,
                owner,
                snapshot,
            },
        ])
    }

    async fn buy_back(
        &self,
        transfers: &dyn TransferRepository,
        mappings: &dyn LoanOwnerMappingRepository,
        loan: &Loan,
        today: NaiveDate,
        buyback: OwnershipTransfer,
    ) -> Result<Vec<CobEventPayload>> {
        let active = transfers
            .find_active_open_ended(loan.id, &buyback.owner)
            .await?;

        let Some(active) = active else {
            let cancelled = buyback.derive(
                TransferStatus::Cancelled,
                Some(TransferSubStatus::Unsold),
                today,
                today,
                today,
            );
            transfers.save(close(buyback, today)).await?;
            let cancelled = transfers.save(cancelled).await?;
            return Ok(vec![CobEventPayload::OwnershipTransferred {
                transfer: cancelled,
            }]);
        };

        let active_id = active.id.ok_or_else(|| {
            CobError::InconsistentState(format!(
                "active transfer of loan {} has no id",
                loan.id
            ))
        })?;
        transfers.save(close(active, today)).await?;

        let snapshot = BalanceSnapshot::of(loan);
        let mut closed = close(buyback, today);
        closed.snapshot = Some(snapshot.clone());
        let closed = transfers.save(closed).await?;
        mappings.delete_mapping(loan.id, active_id).await?;

        let owner = closed.owner.clone();
        Ok(vec![
            CobEventPayload::OwnershipTransferred { transfer: closed },
            CobEventPayload::AccountSnapshotChanged {
                loan_id: loan.id,
                owner,
                snapshot,
            },
        ])
    }
}

fn close(
    mut transfer: OwnershipTransfer,
    today: NaiveDate,
) -> OwnershipTransfer {
    transfer.effective_date_to = today;
    transfer
}

fn intent_name(intent: &TransferIntent) -> &'static str {
    match intent {
        TransferIntent::Nothing => "nothing",
        TransferIntent::Sale(_) => "sale",
        TransferIntent::Buyback(_) => "buyback",
        TransferIntent::SameDay { .. } => "same_day",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cob_model::{LoanId, OwnerId, TransferExternalId, TransferId};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn record(id: i64, status: TransferStatus) -> OwnershipTransfer {
        OwnershipTransfer {
            id: Some(TransferId(id)),
            owner: OwnerId::new("owner"),
            external_id: TransferExternalId::new("ext"),
            loan_id: LoanId(1),
            status,
            sub_status: None,
            settlement_date: day(10),
            effective_date_from: day(1),
            effective_date_to: OPEN_ENDED,
            purchase_price_ratio: Decimal::ONE,
            snapshot: None,
        }
    }

    #[test]
    fn classify_accepts_pending_then_buyback() {
        let intent = TransferIntent::classify(vec![
            record(1, TransferStatus::Pending),
            record(2, TransferStatus::Buyback),
        ])
        .unwrap();
        assert!(matches!(intent, TransferIntent::SameDay { .. }));
    }

    #[test]
    fn classify_rejects_buyback_before_pending() {
        let err = TransferIntent::classify(vec![
            record(1, TransferStatus::Buyback),
            record(2, TransferStatus::Pending),
        ])
        .unwrap_err();
        assert!(matches!(err, CobError::InconsistentState(_)));
    }

    #[test]
    fn classify_names_the_illegal_combination() {
        let err = TransferIntent::classify(vec![
            record(1, TransferStatus::Pending),
            record(2, TransferStatus::Active),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Inconsistent state: Illegal transfer found. Expected PENDING \
             and BUYBACK, found: PENDING and ACTIVE"
        );
    }

    #[test]
    fn classify_rejects_more_than_two_records() {
        let err = TransferIntent::classify(vec![
            record(1, TransferStatus::Pending),
            record(2, TransferStatus::Buyback),
            record(3, TransferStatus::Pending),
        ])
        .unwrap_err();
        assert!(matches!(err, CobError::InconsistentState(_)));
    }

    #[test]
    fn classify_single_records() {
        assert!(matches!(
            TransferIntent::classify(vec![record(4, TransferStatus::Pending)]),
            Ok(TransferIntent::Sale(_))
        ));
        assert!(matches!(
            TransferIntent::classify(vec![record(4, TransferStatus::Buyback)]),
            Ok(TransferIntent::Buyback(_))
        ));
        assert_eq!(
            TransferIntent::classify(Vec::new()).unwrap(),
            TransferIntent::Nothing
        );
    }
}
