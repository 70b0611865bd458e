use chrono::NaiveDate;
use cob_model::{
    DelinquencyAction, DelinquencyActionKind, DelinquencyActionRequest, Loan,
};
use thiserror::Error;

use super::effective::effective_pauses;

/// Business-rule violations for delinquency pause/resume actions.
///
/// Each variant maps to a stable machine-readable [`code`](Self::code) and
/// the request [`field`](Self::field) it concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelinquencyValidationError {
    #[error("Delinquency action is missing")]
    MissingAction,

    #[error("Delinquency actions can be created only for active loans.")]
    LoanNotActive,

    #[error("The parameter `startDate` is mandatory")]
    PauseStartDateMissing,

    #[error("The parameter `endDate` is mandatory")]
    PauseEndDateMissing,

    #[error("The parameter `startDate` is mandatory")]
    ResumeStartDateMissing,

    #[error("Delinquency pause period must be at least one day")]
    PausePeriodTooShort,

    #[error("Start date of pause period must be after first disbursal date")]
    PauseBeforeDisbursement,

    #[error("Delinquency pause period cannot overlap with another pause period")]
    Overlapping,

    #[error(
        "Start date of the Resume Delinquency action must be the current business date"
    )]
    ResumeStartNotBusinessDate,

    #[error("Resume Delinquency action can not have end date")]
    ResumeHasEndDate,

    #[error("There is an existing Resume Delinquency Action on this date")]
    DuplicateResume,

    #[error(
        "Resume Delinquency Action can only be created during an active pause"
    )]
    ResumeOutsidePause,
}

impl DelinquencyValidationError {
    pub fn code(&self) -> &'static str {
        use DelinquencyValidationError::*;
        match self {
            MissingAction => "loan-delinquency-action-missing-action",
            LoanNotActive => "loan-delinquency-action-invalid-loan-state",
            PauseStartDateMissing => {
                "loan-delinquency-action-pause-startDate-cannot-be-blank"
            }
            PauseEndDateMissing => {
                "loan-delinquency-action-pause-endDate-cannot-be-blank"
            }
            ResumeStartDateMissing => {
                "loan-delinquency-action-resume-startDate-cannot-be-blank"
            }
            PausePeriodTooShort => {
                "loan-delinquency-action-invalid-start-date-and-end-date"
            }
            PauseBeforeDisbursement | ResumeStartNotBusinessDate => {
                "loan-delinquency-action-invalid-start-date"
            }
            Overlapping => "loan-delinquency-action-overlapping",
            ResumeHasEndDate => {
                "loan-delinquency-action-resume-should-have-no-end-date"
            }
            DuplicateResume => "loan-delinquency-action-resume-should-be-unique",
            ResumeOutsidePause => {
                "loan-delinquency-action-resume-should-be-on-pause"
            }
        }
    }

    pub fn field(&self) -> &'static str {
        use DelinquencyValidationError::*;
        match self {
            MissingAction => "action",
            LoanNotActive => "loanId",
            PauseEndDateMissing | PausePeriodTooShort | ResumeHasEndDate => {
                "endDate"
            }
            PauseStartDateMissing
            | ResumeStartDateMissing
            | PauseBeforeDisbursement
            | Overlapping
            | ResumeStartNotBusinessDate
            | DuplicateResume
            | ResumeOutsidePause => "startDate",
        }
    }
}

type Validated =
    std::result::Result<DelinquencyAction, DelinquencyValidationError>;

/// Check a requested pause or resume against the loan and its action
/// history, returning the action ready to be stored.
pub fn validate(
    loan: &Loan,
    request: &DelinquencyActionRequest,
    history: &[DelinquencyAction],
    business_date: NaiveDate,
) -> Validated {
    let Some(action) = request.action else {
        return Err(DelinquencyValidationError::MissingAction);
    };
    if !loan.status.is_active() {
        return Err(DelinquencyValidationError::LoanNotActive);
    }

    match action {
        DelinquencyActionKind::Pause => validate_pause(loan, request, history),
        DelinquencyActionKind::Resume => {
            validate_resume(loan, request, history, business_date)
        }
    }
}

fn validate_pause(
    loan: &Loan,
    request: &DelinquencyActionRequest,
    history: &[DelinquencyAction],
) -> Validated {
    let start = request
        .start_date
        .ok_or(DelinquencyValidationError::PauseStartDateMissing)?;
    let end = request
        .end_date
        .ok_or(DelinquencyValidationError::PauseEndDateMissing)?;

    if end <= start {
        return Err(DelinquencyValidationError::PausePeriodTooShort);
    }
    if let Some(disbursed) = loan.disbursement_date
        && start < disbursed
    {
        return Err(DelinquencyValidationError::PauseBeforeDisbursement);
    }
    if effective_pauses(history)
        .iter()
        .any(|pause| pause.overlaps(start, end))
    {
        return Err(DelinquencyValidationError::Overlapping);
    }

    Ok(DelinquencyAction::pause(loan.id, start, end))
}

fn validate_resume(
    loan: &Loan,
    request: &DelinquencyActionRequest,
    history: &[DelinquencyAction],
    business_date: NaiveDate,
) -> Validated {
    let start = request
        .start_date
        .ok_or(DelinquencyValidationError::ResumeStartDateMissing)?;

    if start != business_date {
        return Err(DelinquencyValidationError::ResumeStartNotBusinessDate);
    }
    if request.end_date.is_some() {
        return Err(DelinquencyValidationError::ResumeHasEndDate);
    }
    if history.iter().any(|existing| {
        existing.action == DelinquencyActionKind::Resume
            && existing.start_date == start
    }) {
        return Err(DelinquencyValidationError::DuplicateResume);
    }
    if !effective_pauses(history)
        .iter()
        .any(|pause| pause.covers(start))
    {
        return Err(DelinquencyValidationError::ResumeOutsidePause);
    }

    Ok(DelinquencyAction::resume(loan.id, start))
}
