use std::{any::type_name_of_val, fmt, sync::Arc};

use cob_model::{DelinquencyAction, DelinquencyActionRequest, Loan};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::Result;
use crate::domain::cob::business_date::BusinessDateSource;
use crate::domain::cob::events::{
    CobEvent, CobEventPayload, EventMeta, EventNotifier,
};

use super::repository::DelinquencyActionRepository;
use super::validator::validate;

/// Creates delinquency pause/resume actions for a loan.
#[derive(Clone)]
pub struct DelinquencyActionService<R>
where
    R: DelinquencyActionRepository + ?Sized,
{
    repository: Arc<R>,
    notifier: Arc<dyn EventNotifier>,
    business_dates: Arc<dyn BusinessDateSource>,
}

impl<R> fmt::Debug for DelinquencyActionService<R>
where
    R: DelinquencyActionRepository + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelinquencyActionService")
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .field("notifier", &type_name_of_val(self.notifier.as_ref()))
            .field(
                "business_dates",
                &type_name_of_val(self.business_dates.as_ref()),
            )
            .finish()
    }
}

impl<R> DelinquencyActionService<R>
where
    R: DelinquencyActionRepository + ?Sized,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<dyn EventNotifier>,
        business_dates: Arc<dyn BusinessDateSource>,
    ) -> Self {
        Self {
            repository,
            notifier,
            business_dates,
        }
    }

    /// Validate `request` against the loan's history and store it.
    #[instrument(
        name = "delinquency.create_action",
        skip(self, loan, request),
        fields(loan_id = %loan.id),
        err
    )]
    pub async fn create_action(
        &self,
        loan: &Loan,
        request: &DelinquencyActionRequest,
    ) -> Result<DelinquencyAction> {
        let business_date = self.business_dates.today();
        let history = self.repository.history(loan.id).await?;
        let action = validate(loan, request, &history, business_date)?;
        let saved = self.repository.save(action).await?;

        debug!(
            action = %saved.action,
            start = %saved.start_date,
            end = ?saved.end_date,
            "delinquency action stored"
        );

        let key = format!(
            "{}:delinquency:{}",
            loan.id,
            saved.id.map(|id| id.0).unwrap_or_default()
        );
        let event = CobEvent {
            meta: EventMeta::new(
                Some(Uuid::now_v7()),
                loan.id,
                business_date,
                key,
                None,
            ),
            payload: CobEventPayload::DelinquencyPauseChanged {
                action: saved.clone(),
            },
        };
        if let Err(err) = self.notifier.publish(event).await {
            warn!(error = %err, "failed to publish delinquency event");
        }

        Ok(saved)
    }

    /// Effective pauses currently recorded for the loan.
    pub async fn effective_pauses(
        &self,
        loan: &Loan,
    ) -> Result<Vec<super::EffectivePause>> {
        let history = self.repository.history(loan.id).await?;
        Ok(super::effective_pauses(&history))
    }
}
