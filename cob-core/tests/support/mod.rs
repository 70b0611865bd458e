#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cob_core::domain::cob::{
    BusinessStep, CloseOfBusinessDriver, CobEvent, FixedBusinessDate,
    InMemoryAccountLockRepository, InMemoryCobStore, InProcCobEventBus,
    PipelineConfig, StepContext, StepOutcome, StepPipeline,
};
use cob_core::{CobError, Result};
use cob_model::chrono::NaiveDate;
use cob_model::rust_decimal::Decimal;
use cob_model::{
    Loan, LoanId, LoanStatus, OPEN_ENDED, OwnerId, OwnershipTransfer,
    TransferExternalId, TransferStatus, TransferSubStatus,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub fn day(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, d).expect("valid date")
}

/// Active loan disbursed on 1 January with `principal` outstanding.
pub fn loan(id: i64, principal: Decimal) -> Loan {
    let mut loan = Loan::new(LoanId(id), LoanStatus::Active, "USD");
    loan.disbursement_date = Some(day(1, 1));
    loan.summary.principal_outstanding = Some(principal);
    loan
}

pub fn transfer(
    loan_id: i64,
    owner: &str,
    status: TransferStatus,
    settlement_date: NaiveDate,
) -> OwnershipTransfer {
    OwnershipTransfer {
        id: None,
        owner: OwnerId::new(owner),
        external_id: TransferExternalId::new(format!("{owner}-{loan_id}")),
        loan_id: LoanId(loan_id),
        status,
        sub_status: None,
        settlement_date,
        effective_date_from: settlement_date,
        effective_date_to: OPEN_ENDED,
        purchase_price_ratio: Decimal::ONE,
        snapshot: None,
    }
}

/// Small, deterministic sizing for tests.
pub fn config() -> PipelineConfig {
    PipelineConfig {
        page_size: 2,
        max_parallel_pages: 2,
        max_parallel_accounts: 2,
        step_timeout_ms: 5_000,
        event_bus_capacity: 256,
    }
}

/// In-memory wiring of a whole close-of-business deployment.
#[derive(Debug)]
pub struct Harness {
    pub store: Arc<InMemoryCobStore>,
    pub locks: Arc<InMemoryAccountLockRepository>,
    pub bus: Arc<InProcCobEventBus>,
    pub dates: Arc<FixedBusinessDate>,
}

impl Harness {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            store: Arc::new(InMemoryCobStore::new()),
            locks: Arc::new(InMemoryAccountLockRepository::new()),
            bus: Arc::new(InProcCobEventBus::from_config(&config())),
            dates: Arc::new(FixedBusinessDate::new(today)),
        }
    }

    pub async fn seed(&self, loans: impl IntoIterator<Item = Loan>) {
        for loan in loans {
            self.store.insert_loan(loan).await;
        }
    }

    /// Store a transfer the way an upstream booking would.
    pub async fn book(
        &self,
        loan_id: i64,
        owner: &str,
        status: TransferStatus,
        settlement_date: NaiveDate,
    ) -> OwnershipTransfer {
        self.store
            .insert_transfer(transfer(loan_id, owner, status, settlement_date))
            .await
    }

    pub fn pipeline(&self, config: PipelineConfig) -> StepPipeline {
        StepPipeline::new(
            self.store.clone(),
            self.store.clone(),
            self.locks.clone(),
            self.bus.clone(),
            config,
        )
        .with_cycle_events(self.bus.clone())
    }

    pub fn driver(
        &self,
        config: PipelineConfig,
        steps: Vec<Arc<dyn BusinessStep>>,
    ) -> CloseOfBusinessDriver {
        CloseOfBusinessDriver::new(
            self.pipeline(config),
            self.store.clone(),
            self.dates.clone(),
            steps,
        )
    }
}

/// Every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<CobEvent>) -> Vec<CobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Remembers the order in which it saw accounts.
#[derive(Debug, Default)]
pub struct RecordingStep {
    pub seen: Mutex<Vec<LoanId>>,
}

impl RecordingStep {
    pub fn seen(&self) -> Vec<LoanId> {
        self.seen.lock().expect("recording lock").clone()
    }
}

#[async_trait]
impl BusinessStep for RecordingStep {
    fn enum_styled_name(&self) -> &'static str {
        "RECORD"
    }

    fn human_readable_name(&self) -> &'static str {
        "Record visited accounts"
    }

    async fn apply(
        &self,
        _ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        self.seen.lock().expect("recording lock").push(loan.id);
        Ok(StepOutcome::unchanged(loan))
    }
}

/// Writes a declined transfer through the account transaction and emits
/// one event for it.
#[derive(Debug, Default)]
pub struct WritingStep;

#[async_trait]
impl BusinessStep for WritingStep {
    fn enum_styled_name(&self) -> &'static str {
        "WRITE_MARKER"
    }

    fn human_readable_name(&self) -> &'static str {
        "Write marker transfer"
    }

    async fn apply(
        &self,
        ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        let mut marker = transfer(
            loan.id.get(),
            "marker",
            TransferStatus::Declined,
            ctx.business_date,
        );
        marker.sub_status = Some(TransferSubStatus::UserRequest);
        marker.effective_date_to = ctx.business_date;
        let saved = ctx.tx.transfers().save(marker).await?;
        Ok(StepOutcome::with_events(
            loan,
            vec![
                cob_core::domain::cob::CobEventPayload::OwnershipTransferred {
                    transfer: saved,
                },
            ],
        ))
    }
}

/// Fails for the listed accounts.
#[derive(Debug, Default)]
pub struct FailingStep {
    pub fail_for: HashSet<LoanId>,
}

impl FailingStep {
    pub fn for_accounts(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            fail_for: ids.into_iter().map(LoanId).collect(),
        }
    }
}

#[async_trait]
impl BusinessStep for FailingStep {
    fn enum_styled_name(&self) -> &'static str {
        "FAIL_SOME"
    }

    fn human_readable_name(&self) -> &'static str {
        "Fail selected accounts"
    }

    async fn apply(
        &self,
        _ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        if self.fail_for.contains(&loan.id) {
            return Err(CobError::InconsistentState(format!(
                "account {} refused",
                loan.id
            )));
        }
        Ok(StepOutcome::unchanged(loan))
    }
}

/// Sleeps longer than any test timeout for the listed accounts.
#[derive(Debug, Default)]
pub struct SlowStep {
    pub slow_for: HashSet<LoanId>,
}

impl SlowStep {
    pub fn for_accounts(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            slow_for: ids.into_iter().map(LoanId).collect(),
        }
    }
}

#[async_trait]
impl BusinessStep for SlowStep {
    fn enum_styled_name(&self) -> &'static str {
        "SLOW"
    }

    fn human_readable_name(&self) -> &'static str {
        "Slow step"
    }

    async fn apply(
        &self,
        _ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        if self.slow_for.contains(&loan.id) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(StepOutcome::unchanged(loan))
    }
}

/// Cancels the cycle while working on the first account it sees.
#[derive(Debug)]
pub struct CancellingStep {
    pub token: CancellationToken,
}

#[async_trait]
impl BusinessStep for CancellingStep {
    fn enum_styled_name(&self) -> &'static str {
        "CANCEL"
    }

    fn human_readable_name(&self) -> &'static str {
        "Cancel the cycle"
    }

    async fn apply(
        &self,
        _ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        self.token.cancel();
        Ok(StepOutcome::unchanged(loan))
    }
}
