use async_trait::async_trait;
use cob_model::Loan;

use crate::Result;
use crate::domain::cob::step::{BusinessStep, StepContext, StepOutcome};

use super::state_machine::OwnershipTransferStateMachine;

/// Settles the external asset owner transfers due on the business date.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipTransferStep {
    machine: OwnershipTransferStateMachine,
}

impl OwnershipTransferStep {
    pub const ENUM_STYLED_NAME: &'static str = "EXTERNAL_ASSET_OWNER_TRANSFER";
    pub const HUMAN_READABLE_NAME: &'static str =
        "Execute external asset owner transfer";

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusinessStep for OwnershipTransferStep {
    fn enum_styled_name(&self) -> &'static str {
        Self::ENUM_STYLED_NAME
    }

    fn human_readable_name(&self) -> &'static str {
        Self::HUMAN_READABLE_NAME
    }

    async fn apply(
        &self,
        ctx: &StepContext<'_>,
        loan: Loan,
    ) -> Result<StepOutcome> {
        let events = self
            .machine
            .execute(ctx.tx, &loan, ctx.business_date)
            .await?;
        Ok(StepOutcome::with_events(loan, events))
    }
}
