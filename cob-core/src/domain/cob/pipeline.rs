//! Runs the ordered business steps over every account of every page.
//!
//! Pages are handed to a bounded pool of tokio tasks. Inside a page,
//! accounts run concurrently up to `max_parallel_accounts`, while the steps
//! of one account always run one after the other in list order. Each
//! account gets its own transaction: either every step's writes commit or
//! none do. A failing account is recorded and the cycle moves on.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::{any::type_name_of_val, fmt};

use chrono::NaiveDate;
use cob_model::{Loan, LoanId};
use futures::{StreamExt, stream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, info, info_span, warn};
use uuid::Uuid;

use crate::error::{CobError, Result};

use super::config::PipelineConfig;
use super::events::{
    CobEvent, CycleEvent, CycleEventPayload, CycleEventPublisher,
    EventNotifier,
};
use super::lock::{AccountLockRepository, LockOwner};
use super::partition::{Page, partition};
use super::report::{
    AccountFailure, AccountOutcome, AccountResult, CycleReport, PageFailure,
    PageReport,
};
use super::step::{BusinessStep, StepContext};
use super::store::{AccountLoader, AccountStore, AccountTransaction};

/// Ordered business steps shared by every page task.
pub type StepList = Arc<[Arc<dyn BusinessStep>]>;

/// Identity and controls of one cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    /// The business date being closed.
    pub business_date: NaiveDate,
    pub lock_owner: LockOwner,
    /// Stops new pages and accounts from starting. Accounts already
    /// running finish their transaction.
    pub cancel: CancellationToken,
}

impl CycleContext {
    pub fn new(
        business_date: NaiveDate,
        lock_owner: LockOwner,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cycle_id: Uuid::now_v7(),
            business_date,
            lock_owner,
            cancel,
        }
    }
}

#[derive(Debug)]
struct PageWork {
    page: Page,
    /// Explicit members; `None` lists the range through the loader.
    ids: Option<Vec<LoanId>>,
}

#[derive(Debug)]
struct AccountRun {
    result: AccountResult,
    failure: Option<AccountFailure>,
}

impl AccountRun {
    fn done(loan_id: LoanId, outcome: AccountOutcome, events: usize) -> Self {
        Self {
            result: AccountResult {
                loan_id,
                outcome,
                events_published: events,
            },
            failure: None,
        }
    }

    fn failed(
        loan_id: LoanId,
        step: Option<&str>,
        error: &CobError,
        events: usize,
    ) -> Self {
        Self {
            result: AccountResult {
                loan_id,
                outcome: AccountOutcome::Failed,
                events_published: events,
            },
            failure: Some(AccountFailure::new(loan_id, step, error)),
        }
    }
}

/// Executes business steps per account with transactional isolation.
#[derive(Clone)]
pub struct StepPipeline {
    loader: Arc<dyn AccountLoader>,
    store: Arc<dyn AccountStore>,
    locks: Arc<dyn AccountLockRepository>,
    notifier: Arc<dyn EventNotifier>,
    cycle_events: Option<Arc<dyn CycleEventPublisher>>,
    config: PipelineConfig,
}

impl fmt::Debug for StepPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepPipeline")
            .field("loader", &type_name_of_val(self.loader.as_ref()))
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("locks", &type_name_of_val(self.locks.as_ref()))
            .field("notifier", &type_name_of_val(self.notifier.as_ref()))
            .field("cycle_events", &self.cycle_events.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl StepPipeline {
    pub fn new(
        loader: Arc<dyn AccountLoader>,
        store: Arc<dyn AccountStore>,
        locks: Arc<dyn AccountLockRepository>,
        notifier: Arc<dyn EventNotifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            loader,
            store,
            locks,
            notifier,
            cycle_events: None,
            config,
        }
    }

    pub fn with_cycle_events(
        mut self,
        publisher: Arc<dyn CycleEventPublisher>,
    ) -> Self {
        self.cycle_events = Some(publisher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `steps` over every eligible account inside `pages`.
    pub async fn run(
        &self,
        pages: &[Page],
        steps: StepList,
        ctx: &CycleContext,
    ) -> Result<CycleReport> {
        let work = pages
            .iter()
            .map(|page| PageWork {
                page: *page,
                ids: None,
            })
            .collect();
        self.execute(work, steps, ctx).await
    }

    /// Run `steps` over exactly the accounts in `ids` (distinct,
    /// ascending), paged with the configured page size.
    pub async fn run_accounts(
        &self,
        ids: &[LoanId],
        steps: StepList,
        ctx: &CycleContext,
    ) -> Result<CycleReport> {
        let pages = partition(ids, self.config.page_size)?;
        let work = pages
            .into_iter()
            .zip(ids.chunks(self.config.page_size))
            .map(|(page, members)| PageWork {
                page,
                ids: Some(members.to_vec()),
            })
            .collect();
        self.execute(work, steps, ctx).await
    }

    async fn execute(
        &self,
        work: Vec<PageWork>,
        steps: StepList,
        ctx: &CycleContext,
    ) -> Result<CycleReport> {
        if steps.is_empty() {
            return Err(CobError::Configuration(
                "no business steps configured".into(),
            ));
        }
        self.config.validate()?;

        let span = info_span!(
            "cob.cycle",
            cycle_id = %ctx.cycle_id,
            business_date = %ctx.business_date,
            owner = %ctx.lock_owner,
            pages = work.len()
        );
        self.execute_pages(work, steps, ctx).instrument(span).await
    }

    async fn execute_pages(
        &self,
        work: Vec<PageWork>,
        steps: StepList,
        ctx: &CycleContext,
    ) -> Result<CycleReport> {
        let accounts: usize = work.iter().map(|item| item.page.count).sum();
        let mut report =
            CycleReport::new(ctx.cycle_id, ctx.business_date, work.len());
        info!(
            accounts,
            steps = steps.len(),
            "close of business cycle started"
        );
        self.publish_cycle(
            ctx,
            CycleEventPayload::Started {
                pages: work.len(),
                accounts,
            },
        )
        .await;

        let permits = Arc::new(Semaphore::new(self.config.max_parallel_pages));
        let mut tasks = JoinSet::new();
        let mut started = BTreeSet::new();
        let mut pending = work.into_iter();

        while let Some(item) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.skipped_pages.push(item.page.index);
                report
                    .skipped_pages
                    .extend(pending.by_ref().map(|rest| rest.page.index));
                break;
            };

            started.insert(item.page.index);
            let pipeline = self.clone();
            let steps = Arc::clone(&steps);
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let index = item.page.index;
                (index, pipeline.run_page(item, &steps, &ctx).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, page)) => {
                    started.remove(&index);
                    self.publish_cycle(
                        ctx,
                        CycleEventPayload::PageCompleted {
                            index,
                            succeeded: page.succeeded(),
                            failed: page.failures.len(),
                        },
                    )
                    .await;
                    report.absorb(page);
                }
                Err(err) => {
                    warn!(error = %err, "page task ended abnormally");
                }
            }
        }

        // Pages whose task panicked never reported back.
        for index in started {
            report.page_failures.push(PageFailure {
                index,
                kind: crate::error::ErrorKind::Transient,
                message: "page task aborted".into(),
            });
        }

        report.finish(ctx.cancel.is_cancelled());
        info!(
            processed = report.processed(),
            succeeded = report.count(AccountOutcome::Succeeded),
            already_closed = report.count(AccountOutcome::AlreadyClosed),
            failed = report.failures.len(),
            page_failures = report.page_failures.len(),
            cancelled = report.cancelled,
            "close of business cycle finished"
        );
        self.publish_cycle(
            ctx,
            CycleEventPayload::Completed {
                processed: report.processed(),
                failed: report.failures.len(),
                cancelled: report.cancelled,
            },
        )
        .await;

        Ok(report)
    }

    async fn run_page(
        &self,
        work: PageWork,
        steps: &[Arc<dyn BusinessStep>],
        ctx: &CycleContext,
    ) -> PageReport {
        let page = work.page;
        let span = info_span!(
            "cob.page",
            index = page.index,
            min_id = %page.min_id,
            max_id = %page.max_id
        );

        async move {
            let ids = match work.ids {
                Some(ids) => ids,
                None => match self
                    .loader
                    .ids_in_range(page.min_id, page.max_id)
                    .await
                {
                    Ok(ids) => ids,
                    Err(err) => {
                        warn!(error = %err, "could not list page accounts");
                        return PageReport {
                            failure: Some(PageFailure {
                                index: page.index,
                                kind: err.kind(),
                                message: err.to_string(),
                            }),
                            ..PageReport::default()
                        };
                    }
                },
            };
            if ids.len() != page.count {
                debug!(
                    expected = page.count,
                    found = ids.len(),
                    "page membership changed since partitioning"
                );
            }

            let runs: Vec<AccountRun> = stream::iter(ids)
                .map(|loan_id| self.process_account(loan_id, steps, ctx))
                .buffer_unordered(self.config.max_parallel_accounts)
                .collect()
                .await;

            let mut report = PageReport::default();
            for run in runs {
                report.accounts.push(run.result);
                report.failures.extend(run.failure);
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn process_account(
        &self,
        loan_id: LoanId,
        steps: &[Arc<dyn BusinessStep>],
        ctx: &CycleContext,
    ) -> AccountRun {
        if ctx.cancel.is_cancelled() {
            return AccountRun::done(loan_id, AccountOutcome::Skipped, 0);
        }

        let span = debug_span!("cob.account", loan_id = %loan_id);
        async move {
            if let Err(err) = self
                .locks
                .acquire(loan_id, ctx.lock_owner, ctx.business_date)
                .await
            {
                warn!(error = %err, "account lock not acquired");
                return AccountRun::failed(loan_id, None, &err, 0);
            }

            let loan = match self.loader.load(loan_id).await {
                Ok(loan) => loan,
                Err(err) => {
                    return self.fail(loan_id, None, err, 0, ctx).await;
                }
            };
            if loan.is_closed_for(ctx.business_date) {
                self.release(loan_id, ctx).await;
                return AccountRun::done(
                    loan_id,
                    AccountOutcome::AlreadyClosed,
                    0,
                );
            }
            if !loan.status.is_cob_eligible() {
                self.release(loan_id, ctx).await;
                return AccountRun::done(loan_id, AccountOutcome::Ineligible, 0);
            }

            let tx = match self.store.begin(loan_id).await {
                Ok(tx) => tx,
                Err(err) => {
                    return self.fail(loan_id, None, err, 0, ctx).await;
                }
            };

            let (applied, published) =
                self.apply_steps(tx.as_ref(), loan, steps, ctx).await;
            if let Err((step, err)) = applied {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return self.fail(loan_id, Some(step), err, published, ctx).await;
            }

            if let Err(err) = tx.mark_closed(ctx.business_date).await {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return self.fail(loan_id, None, err, published, ctx).await;
            }
            if let Err(err) = tx.commit().await {
                return self.fail(loan_id, None, err, published, ctx).await;
            }

            self.release(loan_id, ctx).await;
            debug!(events = published, "account closed");
            AccountRun::done(loan_id, AccountOutcome::Succeeded, published)
        }
        .instrument(span)
        .await
    }

    /// Apply every step in order. Stops at the first failing step and
    /// reports its name. Events of successful steps are published as soon
    /// as the step returns.
    async fn apply_steps(
        &self,
        tx: &dyn AccountTransaction,
        mut loan: Loan,
        steps: &[Arc<dyn BusinessStep>],
        ctx: &CycleContext,
    ) -> (std::result::Result<Loan, (&'static str, CobError)>, usize) {
        let mut published = 0;
        let timeout = self.config.step_timeout();

        for step in steps {
            let name = step.enum_styled_name();
            let step_ctx = StepContext {
                cycle_id: ctx.cycle_id,
                business_date: ctx.business_date,
                tx,
            };

            let outcome =
                match tokio::time::timeout(timeout, step.apply(&step_ctx, loan))
                    .await
                {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(err)) => return (Err((name, err)), published),
                    Err(_) => {
                        let err = CobError::Timeout {
                            step: name.to_string(),
                            after_ms: self.config.step_timeout_ms,
                        };
                        return (Err((name, err)), published);
                    }
                };

            for (sequence, payload) in outcome.events.into_iter().enumerate() {
                let event = CobEvent::from_step(
                    ctx.cycle_id,
                    tx.loan_id(),
                    ctx.business_date,
                    name,
                    sequence,
                    payload,
                );
                match self.notifier.publish(event).await {
                    Ok(()) => published += 1,
                    Err(err) => {
                        warn!(step = name, error = %err, "event not published")
                    }
                }
            }
            loan = outcome.loan;
        }

        (Ok(loan), published)
    }

    async fn fail(
        &self,
        loan_id: LoanId,
        step: Option<&str>,
        err: CobError,
        published: usize,
        ctx: &CycleContext,
    ) -> AccountRun {
        warn!(
            step = step.unwrap_or("-"),
            kind = %err.kind(),
            error = %err,
            "account failed"
        );
        if let Err(lock_err) = self
            .locks
            .record_failure(loan_id, ctx.lock_owner, err.to_string())
            .await
        {
            warn!(error = %lock_err, "could not record failure on lock");
        }
        AccountRun::failed(loan_id, step, &err, published)
    }

    async fn release(&self, loan_id: LoanId, ctx: &CycleContext) {
        if let Err(err) = self.locks.release(loan_id, ctx.lock_owner).await {
            warn!(error = %err, "could not release account lock");
        }
    }

    async fn publish_cycle(&self, ctx: &CycleContext, payload: CycleEventPayload) {
        let Some(publisher) = &self.cycle_events else {
            return;
        };
        let event = CycleEvent {
            cycle_id: ctx.cycle_id,
            business_date: ctx.business_date,
            payload,
        };
        if let Err(err) = publisher.publish_cycle(event).await {
            warn!(error = %err, "cycle event not published");
        }
    }
}
