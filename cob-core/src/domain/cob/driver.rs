use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::{Days, NaiveDate};
use cob_model::LoanId;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{CobError, Result};

use super::business_date::BusinessDateSource;
use super::lock::LockOwner;
use super::partition::partition;
use super::pipeline::{CycleContext, StepList, StepPipeline};
use super::report::CycleReport;
use super::step::BusinessStep;
use super::store::AccountLoader;

/// Entry points that start close-of-business cycles.
#[derive(Clone)]
pub struct CloseOfBusinessDriver {
    pipeline: StepPipeline,
    loader: Arc<dyn AccountLoader>,
    business_dates: Arc<dyn BusinessDateSource>,
    steps: StepList,
}

impl fmt::Debug for CloseOfBusinessDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<&str> =
            self.steps.iter().map(|step| step.enum_styled_name()).collect();
        f.debug_struct("CloseOfBusinessDriver")
            .field("pipeline", &self.pipeline)
            .field(
                "business_dates",
                &type_name_of_val(self.business_dates.as_ref()),
            )
            .field("steps", &steps)
            .finish()
    }
}

impl CloseOfBusinessDriver {
    pub fn new(
        pipeline: StepPipeline,
        loader: Arc<dyn AccountLoader>,
        business_dates: Arc<dyn BusinessDateSource>,
        steps: Vec<Arc<dyn BusinessStep>>,
    ) -> Self {
        Self {
            pipeline,
            loader,
            business_dates,
            steps: steps.into(),
        }
    }

    pub fn steps(&self) -> &[Arc<dyn BusinessStep>] {
        &self.steps
    }

    /// Close the current business date for every eligible account.
    #[instrument(name = "cob.run_cycle", skip_all, err)]
    pub async fn run_cycle(
        &self,
        cancel: CancellationToken,
    ) -> Result<CycleReport> {
        let business_date = self.business_dates.today();
        self.close_date(business_date, cancel).await
    }

    /// Close the named accounts, catching each one up from its last
    /// closed business date to the current one. Returns one report per
    /// business date run.
    #[instrument(name = "cob.run_inline", skip_all, fields(accounts = ids.len()), err)]
    pub async fn run_inline(
        &self,
        ids: &[LoanId],
        cancel: CancellationToken,
    ) -> Result<Vec<CycleReport>> {
        self.ensure_steps()?;
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let today = self.business_dates.today();
        let mut first = today;
        for id in &ids {
            let loan = self.loader.load(*id).await?;
            if let Some(closed) = loan.last_closed_business_date {
                first = first.min(next_day(closed)?);
            }
        }

        let mut reports = Vec::new();
        for business_date in first.iter_days().take_while(|day| *day <= today) {
            if cancel.is_cancelled() {
                break;
            }
            let ctx = CycleContext::new(
                business_date,
                LockOwner::InlineProcessing,
                cancel.clone(),
            );
            reports.push(
                self.pipeline
                    .run_accounts(&ids, self.steps.clone(), &ctx)
                    .await?,
            );
        }
        Ok(reports)
    }

    /// Run one cycle per business date from the day after the oldest last
    /// closed date up to and including the current business date.
    #[instrument(name = "cob.catch_up", skip_all, err)]
    pub async fn catch_up(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<CycleReport>> {
        self.ensure_steps()?;
        let today = self.business_dates.today();
        let first = match self.loader.oldest_closed_business_date().await? {
            Some(closed) => next_day(closed)?.min(today),
            None => today,
        };
        info!(from = %first, to = %today, "catching up close of business");

        let mut reports = Vec::new();
        for business_date in first.iter_days().take_while(|day| *day <= today) {
            if cancel.is_cancelled() {
                break;
            }
            reports.push(self.close_date(business_date, cancel.clone()).await?);
        }
        Ok(reports)
    }

    async fn close_date(
        &self,
        business_date: NaiveDate,
        cancel: CancellationToken,
    ) -> Result<CycleReport> {
        self.ensure_steps()?;
        let ids = self.loader.eligible_ids().await?;
        let pages = partition(&ids, self.pipeline.config().page_size)?;
        let ctx =
            CycleContext::new(business_date, LockOwner::ChunkProcessing, cancel);
        self.pipeline.run(&pages, self.steps.clone(), &ctx).await
    }

    fn ensure_steps(&self) -> Result<()> {
        if self.steps.is_empty() {
            Err(CobError::Configuration("no business steps configured".into()))
        } else {
            Ok(())
        }
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| CobError::InvalidArgument(format!("no day after {date}")))
}
