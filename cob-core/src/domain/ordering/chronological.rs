use std::cmp::Ordering;

use cob_model::FinancialEvent;

/// Chronological order of two financial events.
///
/// Effective date first, then submission date, then creation timestamp.
/// A missing submission date or timestamp sorts before any present one.
/// Events of different kinds with identical keys compare equal.
pub fn compare(a: &FinancialEvent, b: &FinancialEvent) -> Ordering {
    a.effective_date()
        .cmp(&b.effective_date())
        .then_with(|| a.submitted_on().cmp(&b.submitted_on()))
        .then_with(|| a.created_at().cmp(&b.created_at()))
}

/// [`compare`] with full ties broken by kind (term variation, charge,
/// transaction), record id, amount and type label. Events that still tie
/// are identical, so every permutation sorts to the same sequence.
pub fn compare_canonical(a: &FinancialEvent, b: &FinancialEvent) -> Ordering {
    compare(a, b)
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| a.record_id().cmp(&b.record_id()))
        .then_with(|| a.amount().cmp(&b.amount()))
        .then_with(|| a.type_label().cmp(b.type_label()))
}

pub fn sort_chronologically(events: &mut [FinancialEvent]) {
    events.sort_by(compare_canonical);
}
