use chrono::NaiveDate;
use cob_model::LoanId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CobError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountOutcome {
    /// Every step ran and the account was committed.
    Succeeded,
    /// The account was closed for this date by an earlier run.
    AlreadyClosed,
    /// The account's status keeps it out of the daily cycle.
    Ineligible,
    Failed,
    /// Not started because the cycle was cancelled.
    Skipped,
}

/// Why one account did not close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFailure {
    pub loan_id: LoanId,
    /// `None` when the failure happened outside a step (lock, load, commit).
    pub step: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl AccountFailure {
    pub fn new(loan_id: LoanId, step: Option<&str>, error: &CobError) -> Self {
        Self {
            loan_id,
            step: step.map(str::to_string),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// A page whose accounts could not even be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResult {
    pub loan_id: LoanId,
    pub outcome: AccountOutcome,
    pub events_published: usize,
}

/// Summary of one close-of-business cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub business_date: NaiveDate,
    pub pages: usize,
    /// Per-account outcomes ordered by loan id.
    pub accounts: Vec<AccountResult>,
    pub failures: Vec<AccountFailure>,
    pub page_failures: Vec<PageFailure>,
    /// Pages never started because the cycle was cancelled.
    pub skipped_pages: Vec<usize>,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn new(cycle_id: Uuid, business_date: NaiveDate, pages: usize) -> Self {
        Self {
            cycle_id,
            business_date,
            pages,
            accounts: Vec::new(),
            failures: Vec::new(),
            page_failures: Vec::new(),
            skipped_pages: Vec::new(),
            cancelled: false,
        }
    }

    /// Accounts the cycle actually attempted.
    pub fn processed(&self) -> usize {
        self.accounts
            .iter()
            .filter(|result| result.outcome != AccountOutcome::Skipped)
            .count()
    }

    pub fn count(&self, outcome: AccountOutcome) -> usize {
        self.accounts
            .iter()
            .filter(|result| result.outcome == outcome)
            .count()
    }

    pub fn outcome_of(&self, loan_id: LoanId) -> Option<AccountOutcome> {
        self.accounts
            .iter()
            .find(|result| result.loan_id == loan_id)
            .map(|result| result.outcome)
    }

    pub fn events_published(&self) -> usize {
        self.accounts
            .iter()
            .map(|result| result.events_published)
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.page_failures.is_empty()
    }

    pub(crate) fn absorb(&mut self, page: PageReport) {
        self.accounts.extend(page.accounts);
        self.failures.extend(page.failures);
        self.page_failures.extend(page.failure);
    }

    pub(crate) fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.accounts.sort_by_key(|result| result.loan_id);
        self.failures.sort_by_key(|failure| failure.loan_id);
        self.page_failures.sort_by_key(|failure| failure.index);
        self.skipped_pages.sort_unstable();
    }
}

/// Outcome of a single page, merged into the [`CycleReport`].
#[derive(Debug, Default)]
pub(crate) struct PageReport {
    pub accounts: Vec<AccountResult>,
    pub failures: Vec<AccountFailure>,
    pub failure: Option<PageFailure>,
}

impl PageReport {
    pub fn succeeded(&self) -> usize {
        self.accounts
            .iter()
            .filter(|result| result.outcome == AccountOutcome::Succeeded)
            .count()
    }
}
