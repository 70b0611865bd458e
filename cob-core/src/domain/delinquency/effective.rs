use chrono::NaiveDate;
use cob_model::{DelinquencyAction, DelinquencyActionKind};
use serde::{Deserialize, Serialize};

/// A pause as it actually applies once resumes are taken into account.
/// The interval is half-open: `start` is paused, `end` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePause {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EffectivePause {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// True when the candidate ends strictly inside this pause, starts
    /// strictly inside it, or matches it exactly. Touching intervals do not
    /// overlap, and neither does a candidate that encloses this pause or
    /// shares only one of its bounds.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let ends_inside = self.start < end && end < self.end;
        let starts_inside = self.start < start && start < self.end;
        ends_inside || starts_inside || (start == self.start && end == self.end)
    }
}

/// Pauses from `history` cut short by the earliest resume that falls
/// inside them, ordered by start date. Pauses resumed on their first day
/// are dropped.
pub fn effective_pauses(history: &[DelinquencyAction]) -> Vec<EffectivePause> {
    let resumes: Vec<NaiveDate> = history
        .iter()
        .filter(|action| action.action == DelinquencyActionKind::Resume)
        .map(|action| action.start_date)
        .collect();

    let mut pauses: Vec<EffectivePause> = history
        .iter()
        .filter(|action| action.action == DelinquencyActionKind::Pause)
        .filter_map(|pause| {
            let end = pause.end_date?;
            let resumed_on = resumes
                .iter()
                .copied()
                .filter(|date| pause.start_date <= *date && *date < end)
                .min();
            let end = resumed_on.unwrap_or(end);
            (pause.start_date < end).then_some(EffectivePause {
                start: pause.start_date,
                end,
            })
        })
        .collect();

    pauses.sort_by_key(|pause| (pause.start, pause.end));
    pauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use cob_model::LoanId;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn resume_inside_pause_shortens_it() {
        let history = vec![
            DelinquencyAction::pause(LoanId(1), day(15), day(22)),
            DelinquencyAction::resume(LoanId(1), day(17)),
        ];

        assert_eq!(
            effective_pauses(&history),
            vec![EffectivePause {
                start: day(15),
                end: day(17),
            }]
        );
    }

    #[test]
    fn resume_outside_pause_is_ignored() {
        let history = vec![
            DelinquencyAction::resume(LoanId(1), day(25)),
            DelinquencyAction::pause(LoanId(1), day(10), day(20)),
            DelinquencyAction::pause(LoanId(1), day(1), day(5)),
        ];

        let pauses = effective_pauses(&history);
        assert_eq!(pauses.len(), 2);
        assert_eq!(pauses[0].start, day(1));
        assert_eq!(pauses[1].end, day(20));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let pause = EffectivePause {
            start: day(10),
            end: day(20),
        };
        assert!(!pause.overlaps(day(20), day(25)));
        assert!(!pause.overlaps(day(5), day(10)));
        assert!(pause.overlaps(day(15), day(25)));
        assert!(pause.overlaps(day(10), day(20)));
        assert!(pause.overlaps(day(12), day(18)));
    }

    #[test]
    fn enclosing_or_shared_bound_candidates_do_not_overlap() {
        let pause = EffectivePause {
            start: day(10),
            end: day(20),
        };
        assert!(!pause.overlaps(day(5), day(25)));
        assert!(!pause.overlaps(day(10), day(25)));
        assert!(!pause.overlaps(day(5), day(20)));
    }

    #[test]
    fn covers_is_half_open() {
        let pause = EffectivePause {
            start: day(10),
            end: day(20),
        };
        assert!(pause.covers(day(10)));
        assert!(pause.covers(day(19)));
        assert!(!pause.covers(day(20)));
    }
}
