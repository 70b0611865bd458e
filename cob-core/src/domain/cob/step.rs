use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use cob_model::Loan;
use uuid::Uuid;

use crate::Result;

use super::events::CobEventPayload;
use super::store::AccountTransaction;

/// What a step sees while it runs for one account.
pub struct StepContext<'a> {
    pub cycle_id: Uuid,
    /// The business date being closed.
    pub business_date: NaiveDate,
    /// Unit of work for the account. Everything written through it commits
    /// or rolls back together with the other steps of the account.
    pub tx: &'a dyn AccountTransaction,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("cycle_id", &self.cycle_id)
            .field("business_date", &self.business_date)
            .finish_non_exhaustive()
    }
}

/// Result of a step: the (possibly updated) account and the events to
/// publish once the step has succeeded.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub loan: Loan,
    pub events: Vec<CobEventPayload>,
}

impl StepOutcome {
    pub fn unchanged(loan: Loan) -> Self {
        Self {
            loan,
            events: Vec::new(),
        }
    }

    pub fn with_events(loan: Loan, events: Vec<CobEventPayload>) -> Self {
        Self { loan, events }
    }
}

/// One unit of daily work applied to every account.
#[async_trait]
pub trait BusinessStep: Send + Sync {
    /// Stable identifier, e.g. `EXTERNAL_ASSET_OWNER_TRANSFER`.
    fn enum_styled_name(&self) -> &'static str;

    fn human_readable_name(&self) -> &'static str;

    async fn apply(
        &self,
        ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome>;
}
