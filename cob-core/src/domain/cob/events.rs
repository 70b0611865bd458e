use async_trait::async_trait;
use chrono::NaiveDate;
use cob_model::{
    BalanceSnapshot, DelinquencyAction, LoanId, OwnerId, OwnershipTransfer,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Metadata envelope attached to every close-of-business event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub correlation_id: Uuid,
    pub idempotency_key: String,
    pub loan_id: LoanId,
    pub business_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl EventMeta {
    pub fn new(
        correlation_id: Option<Uuid>,
        loan_id: LoanId,
        business_date: NaiveDate,
        idempotency_key: impl Into<String>,
        step: Option<String>,
    ) -> Self {
        let correlation_id = correlation_id.unwrap_or_else(Uuid::now_v7);
        Self {
            version: 1,
            correlation_id,
            idempotency_key: idempotency_key.into(),
            loan_id,
            business_date,
            step,
        }
    }
}

/// Domain event payload produced by business steps and services.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CobEventPayload {
    /// A transfer record reached a new terminal or active state.
    OwnershipTransferred { transfer: OwnershipTransfer },
    /// The balances reported for the current owner changed hands.
    AccountSnapshotChanged {
        loan_id: LoanId,
        owner: OwnerId,
        snapshot: BalanceSnapshot,
    },
    DelinquencyPauseChanged { action: DelinquencyAction },
}

impl CobEventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            CobEventPayload::OwnershipTransferred { .. } => {
                "ownership_transferred"
            }
            CobEventPayload::AccountSnapshotChanged { .. } => {
                "account_snapshot_changed"
            }
            CobEventPayload::DelinquencyPauseChanged { .. } => {
                "delinquency_pause_changed"
            }
        }
    }
}

/// Fully qualified domain event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CobEvent {
    pub meta: EventMeta,
    pub payload: CobEventPayload,
}

impl CobEvent {
    /// Event emitted by `step` while closing `loan_id` on `business_date`.
    /// `sequence` numbers the events of one step so redeliveries of the
    /// same outcome share an idempotency key.
    pub fn from_step(
        cycle_id: Uuid,
        loan_id: LoanId,
        business_date: NaiveDate,
        step: &str,
        sequence: usize,
        payload: CobEventPayload,
    ) -> Self {
        let key = format!(
            "{loan_id}:{business_date}:{step}:{sequence}:{}",
            payload.name()
        );
        Self {
            meta: EventMeta::new(
                Some(cycle_id),
                loan_id,
                business_date,
                key,
                Some(step.to_string()),
            ),
            payload,
        }
    }
}

/// Lifecycle notifications for a close-of-business cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleEventPayload {
    Started {
        pages: usize,
        accounts: usize,
    },
    PageCompleted {
        index: usize,
        succeeded: usize,
        failed: usize,
    },
    Completed {
        processed: usize,
        failed: usize,
        cancelled: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CycleEvent {
    pub cycle_id: Uuid,
    pub business_date: NaiveDate,
    pub payload: CycleEventPayload,
}

/// Receives domain events. Delivery is fire-and-forget from the
/// engine's point of view.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish(&self, event: CobEvent) -> Result<()>;
}

#[async_trait]
pub trait CycleEventPublisher: Send + Sync {
    async fn publish_cycle(&self, event: CycleEvent) -> Result<()>;
}
