mod support;

use std::sync::Arc;

use cob_core::domain::cob::{
    AccountLockRepository, AccountOutcome, BusinessStep, CycleContext,
    CycleEventPayload, LockOwner, PipelineConfig, StepList,
};
use cob_core::{CobError, ErrorKind};
use cob_model::rust_decimal::Decimal;
use cob_model::{Loan, LoanId, LoanStatus};
use tokio_util::sync::CancellationToken;

use support::{
    CancellingStep, FailingStep, Harness, RecordingStep, SlowStep,
    WritingStep, config, day, drain, loan,
};

fn balance() -> Decimal {
    Decimal::new(1_000, 0)
}

async fn seeded(ids: std::ops::RangeInclusive<i64>) -> Harness {
    let harness = Harness::new(day(3, 5));
    harness.seed(ids.map(|id| loan(id, balance()))).await;
    harness
}

#[tokio::test]
async fn failing_account_rolls_back_while_others_commit() {
    let harness = seeded(1..=5).await;
    let mut events = harness.bus.subscribe();
    let driver = harness.driver(
        config(),
        vec![
            Arc::new(WritingStep),
            Arc::new(FailingStep::for_accounts([3])),
        ],
    );

    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    assert_eq!(report.count(AccountOutcome::Succeeded), 4);
    assert_eq!(report.outcome_of(LoanId(3)), Some(AccountOutcome::Failed));
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.loan_id, LoanId(3));
    assert_eq!(failure.step.as_deref(), Some("FAIL_SOME"));
    assert_eq!(failure.kind, ErrorKind::InconsistentState);

    // Writes of the step that succeeded before the failure are discarded.
    assert!(harness.store.transfers_for(LoanId(3)).await.is_empty());
    assert_eq!(harness.store.transfers_for(LoanId(1)).await.len(), 1);

    let failed = harness.store.loan(LoanId(3)).await.expect("loan 3");
    assert_eq!(failed.last_closed_business_date, None);
    let closed = harness.store.loan(LoanId(4)).await.expect("loan 4");
    assert_eq!(closed.last_closed_business_date, Some(day(3, 5)));

    // Events already published for the failed account stay published.
    let published = drain(&mut events);
    assert_eq!(published.len(), 5);
    assert!(published.iter().any(|event| event.meta.loan_id == LoanId(3)));

    let lock = harness
        .locks
        .find(LoanId(3))
        .await
        .expect("lock lookup")
        .expect("failed lock kept");
    assert_eq!(lock.owner, LockOwner::ChunkProcessing);
    assert!(lock.error.is_some());
    assert_eq!(harness.locks.held().await.len(), 1);
}

#[tokio::test]
async fn every_eligible_account_is_visited_once() {
    let harness = seeded(1..=7).await;
    let mut closed = Loan::new(LoanId(8), LoanStatus::ClosedObligationsMet, "USD");
    closed.disbursement_date = Some(day(1, 1));
    harness.seed([closed]).await;

    let recorder = Arc::new(RecordingStep::default());
    let steps: Vec<Arc<dyn BusinessStep>> = vec![recorder.clone()];
    let driver = harness.driver(config(), steps);
    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    assert_eq!(report.pages, 4);
    assert!(report.is_clean());
    let mut seen = recorder.seen();
    seen.sort();
    assert_eq!(seen, (1..=7).map(LoanId).collect::<Vec<_>>());
    assert_eq!(report.outcome_of(LoanId(8)), None);
}

#[tokio::test]
async fn empty_step_list_is_a_configuration_error() {
    let harness = seeded(1..=2).await;
    let driver = harness.driver(config(), Vec::new());

    let err = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect_err("no steps");
    assert!(matches!(err, CobError::Configuration(_)));

    let untouched = harness.store.loan(LoanId(1)).await.expect("loan 1");
    assert_eq!(untouched.last_closed_business_date, None);
}

#[tokio::test]
async fn zero_sized_pool_is_rejected() {
    let harness = seeded(1..=2).await;
    let driver = harness.driver(
        PipelineConfig {
            max_parallel_accounts: 0,
            ..config()
        },
        vec![Arc::new(RecordingStep::default())],
    );

    let err = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect_err("invalid config");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn slow_step_times_out_for_that_account_only() {
    let harness = seeded(1..=3).await;
    let driver = harness.driver(
        PipelineConfig {
            step_timeout_ms: 50,
            ..config()
        },
        vec![Arc::new(SlowStep::for_accounts([2]))],
    );

    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    assert_eq!(report.outcome_of(LoanId(2)), Some(AccountOutcome::Failed));
    assert_eq!(report.failures[0].kind, ErrorKind::Timeout);
    assert_eq!(report.failures[0].step.as_deref(), Some("SLOW"));
    assert_eq!(report.count(AccountOutcome::Succeeded), 2);
}

#[tokio::test]
async fn account_locked_by_another_run_is_reported() {
    let harness = seeded(1..=3).await;
    harness
        .locks
        .acquire(LoanId(2), LockOwner::InlineProcessing, day(3, 5))
        .await
        .expect("lock placed");

    let driver =
        harness.driver(config(), vec![Arc::new(RecordingStep::default())]);
    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    assert_eq!(report.outcome_of(LoanId(2)), Some(AccountOutcome::Failed));
    assert_eq!(report.failures[0].kind, ErrorKind::Locked);
    assert_eq!(report.failures[0].step, None);

    let lock = harness
        .locks
        .find(LoanId(2))
        .await
        .expect("lock lookup")
        .expect("foreign lock untouched");
    assert_eq!(lock.owner, LockOwner::InlineProcessing);
    assert_eq!(lock.error, None);
}

#[tokio::test]
async fn cancellation_stops_new_pages() {
    let harness = seeded(1..=4).await;
    let token = CancellationToken::new();
    let driver = harness.driver(
        PipelineConfig {
            page_size: 1,
            max_parallel_pages: 1,
            max_parallel_accounts: 1,
            ..config()
        },
        vec![Arc::new(CancellingStep {
            token: token.clone(),
        })],
    );

    let report = driver.run_cycle(token).await.expect("cycle runs");

    assert!(report.cancelled);
    assert_eq!(report.outcome_of(LoanId(1)), Some(AccountOutcome::Succeeded));
    assert_eq!(report.skipped_pages, vec![1, 2, 3]);
    assert_eq!(report.processed(), 1);

    let untouched = harness.store.loan(LoanId(2)).await.expect("loan 2");
    assert_eq!(untouched.last_closed_business_date, None);
}

#[tokio::test]
async fn second_cycle_for_same_date_changes_nothing() {
    let harness = seeded(1..=5).await;
    let mut events = harness.bus.subscribe();
    let driver = harness.driver(config(), vec![Arc::new(WritingStep)]);

    let first = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("first cycle");
    assert_eq!(first.count(AccountOutcome::Succeeded), 5);
    assert_eq!(drain(&mut events).len(), 5);

    let second = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("second cycle");
    assert_eq!(second.count(AccountOutcome::AlreadyClosed), 5);
    assert_eq!(second.events_published(), 0);
    assert!(drain(&mut events).is_empty());
    assert_eq!(harness.store.transfers_for(LoanId(1)).await.len(), 1);
}

#[tokio::test]
async fn step_events_carry_stable_idempotency_keys() {
    let harness = seeded(1..=1).await;
    let mut events = harness.bus.subscribe();
    let driver = harness.driver(config(), vec![Arc::new(WritingStep)]);

    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    let published = drain(&mut events);
    assert_eq!(published.len(), 1);
    let meta = &published[0].meta;
    assert_eq!(meta.correlation_id, report.cycle_id);
    assert_eq!(meta.step.as_deref(), Some("WRITE_MARKER"));
    assert_eq!(
        meta.idempotency_key,
        "1:2024-03-05:WRITE_MARKER:0:ownership_transferred"
    );
}

#[tokio::test]
async fn cycle_lifecycle_events_bracket_the_pages() {
    let harness = seeded(1..=5).await;
    let mut cycles = harness.bus.subscribe_cycles();
    let driver =
        harness.driver(config(), vec![Arc::new(RecordingStep::default())]);

    let report = driver
        .run_cycle(CancellationToken::new())
        .await
        .expect("cycle runs");

    let mut received = Vec::new();
    while let Ok(event) = cycles.try_recv() {
        assert_eq!(event.cycle_id, report.cycle_id);
        received.push(event.payload);
    }
    assert_eq!(
        received.first(),
        Some(&CycleEventPayload::Started {
            pages: 3,
            accounts: 5
        })
    );
    assert_eq!(
        received.last(),
        Some(&CycleEventPayload::Completed {
            processed: 5,
            failed: 0,
            cancelled: false
        })
    );
    let pages = received
        .iter()
        .filter(|payload| {
            matches!(payload, CycleEventPayload::PageCompleted { .. })
        })
        .count();
    assert_eq!(pages, 3);
}

#[tokio::test]
async fn explicit_accounts_skip_ineligible_ones() {
    let harness = seeded(1..=2).await;
    harness
        .seed([Loan::new(LoanId(9), LoanStatus::Submitted, "USD")])
        .await;
    let pipeline = harness.pipeline(config());
    let recorder = Arc::new(RecordingStep::default());
    let steps: StepList =
        Arc::from(vec![recorder.clone() as Arc<dyn BusinessStep>]);
    let ctx = CycleContext::new(
        day(3, 5),
        LockOwner::InlineProcessing,
        CancellationToken::new(),
    );

    let report = pipeline
        .run_accounts(&[LoanId(1), LoanId(9)], steps, &ctx)
        .await
        .expect("run accounts");

    assert_eq!(report.outcome_of(LoanId(1)), Some(AccountOutcome::Succeeded));
    assert_eq!(report.outcome_of(LoanId(9)), Some(AccountOutcome::Ineligible));
    assert_eq!(report.outcome_of(LoanId(2)), None);
    assert_eq!(recorder.seen(), vec![LoanId(1)]);
    assert!(harness.locks.held().await.is_empty());
}

#[tokio::test]
async fn inline_run_catches_up_named_accounts() {
    let harness = Harness::new(day(3, 5));
    let mut behind = loan(1, balance());
    behind.last_closed_business_date = Some(day(3, 3));
    let mut current = loan(2, balance());
    current.last_closed_business_date = Some(day(3, 4));
    harness.seed([behind, current, loan(3, balance())]).await;

    let driver =
        harness.driver(config(), vec![Arc::new(RecordingStep::default())]);
    let reports = driver
        .run_inline(&[LoanId(2), LoanId(1), LoanId(1)], CancellationToken::new())
        .await
        .expect("inline run");

    let dates: Vec<_> = reports.iter().map(|r| r.business_date).collect();
    assert_eq!(dates, vec![day(3, 4), day(3, 5)]);
    assert_eq!(
        reports[0].outcome_of(LoanId(2)),
        Some(AccountOutcome::AlreadyClosed)
    );
    assert_eq!(
        reports[0].outcome_of(LoanId(1)),
        Some(AccountOutcome::Succeeded)
    );
    assert_eq!(reports[0].outcome_of(LoanId(3)), None);

    for id in [1, 2] {
        let loan = harness.store.loan(LoanId(id)).await.expect("loan");
        assert_eq!(loan.last_closed_business_date, Some(day(3, 5)));
    }
    let untouched = harness.store.loan(LoanId(3)).await.expect("loan 3");
    assert_eq!(untouched.last_closed_business_date, None);
}

#[tokio::test]
async fn inline_run_rejects_unknown_accounts() {
    let harness = seeded(1..=1).await;
    let driver =
        harness.driver(config(), vec![Arc::new(RecordingStep::default())]);

    let err = driver
        .run_inline(&[LoanId(1), LoanId(42)], CancellationToken::new())
        .await
        .expect_err("unknown loan");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn catch_up_closes_every_missed_date() {
    let harness = Harness::new(day(3, 5));
    let mut oldest = loan(1, balance());
    oldest.last_closed_business_date = Some(day(3, 2));
    let mut recent = loan(2, balance());
    recent.last_closed_business_date = Some(day(3, 4));
    harness.seed([oldest, recent, loan(3, balance())]).await;

    let driver =
        harness.driver(config(), vec![Arc::new(RecordingStep::default())]);
    let reports = driver
        .catch_up(CancellationToken::new())
        .await
        .expect("catch up");

    let dates: Vec<_> = reports.iter().map(|r| r.business_date).collect();
    assert_eq!(dates, vec![day(3, 3), day(3, 4), day(3, 5)]);
    assert_eq!(
        reports[0].outcome_of(LoanId(2)),
        Some(AccountOutcome::AlreadyClosed)
    );
    for id in 1..=3 {
        let loan = harness.store.loan(LoanId(id)).await.expect("loan");
        assert_eq!(loan.last_closed_business_date, Some(day(3, 5)));
    }
}
