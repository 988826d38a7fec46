// src/readiness.rs
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::session::{DraftBatch, SessionEntry};
use crate::session_validation::SessionValidator;
use crate::time_utils::{parse_date, DurationInfo, DATE_FORMAT};

/// Verdict for a whole draft batch, computed right before persisting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub ready_for_submission: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub session_count: usize,
    pub duration_info: DurationInfo,
    pub conflict_analysis: ConflictAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictPair {
    /// Positions in the scanned list: existing sessions first, then drafts.
    pub first_index: usize,
    pub second_index: usize,
    pub first_time: String,
    pub second_time: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictAnalysis {
    pub has_conflicts: bool,
    pub conflict_count: usize,
    pub conflicts: Vec<ConflictPair>,
}

/// Runs every batch-level check and merges the results.
///
/// Errors block submission, warnings never do. Draft-to-draft and
/// draft-to-existing overlaps surface through the per-session pass; the
/// all-pairs scan additionally reports conflicts among stored sessions.
pub fn assess_readiness(
    validator: &SessionValidator,
    batch: &DraftBatch,
    existing: &[SessionEntry],
    today: NaiveDate,
) -> Readiness {
    let drafts = &batch.sessions;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if drafts.is_empty() {
        errors.push("No sessions to submit".to_string());
    } else {
        let limit = validator.check_daily_limit(existing.len(), drafts.len());
        if !limit.within_limit {
            errors.push(limit.message);
        }

        for (index, session_errors) in validator.validate_drafts(drafts, existing) {
            for error in session_errors {
                errors.push(format!("Session {}: {}", index + 1, error));
            }
        }

        if let Some(batch_date) = parse_date(&batch.date) {
            for (index, draft) in drafts.iter().enumerate() {
                let Some(entry_date) = draft.date.as_deref() else {
                    continue;
                };
                if parse_date(entry_date).is_some_and(|d| d != batch_date) {
                    errors.push(format!(
                        "Session {}: {}",
                        index + 1,
                        date_mismatch_message(entry_date, &batch.date)
                    ));
                }
            }
        }
    }

    match parse_date(&batch.date) {
        Some(date) => warnings.extend(date_warnings(validator, date, batch.weekend_override, today)),
        None => errors.push("Invalid date format".to_string()),
    }

    let mut scanned: Vec<SessionEntry> = existing.to_vec();
    scanned.extend(drafts.iter().cloned());
    let conflict_analysis = scan_conflicts(validator, &scanned);
    for pair in &conflict_analysis.conflicts {
        if pair.second_index < existing.len() {
            errors.push(format!("Time conflict: {}", pair.details));
        }
    }

    let duration_info = DurationInfo::from_pairs(drafts.iter().map(|s| (s.start_str(), s.end_str())));

    let readiness = Readiness {
        ready_for_submission: errors.is_empty(),
        errors,
        warnings,
        session_count: drafts.len(),
        duration_info,
        conflict_analysis,
    };
    info!(
        "Readiness for {} on {}: ready={} errors={} warnings={}",
        batch.doctor_id,
        batch.date,
        readiness.ready_for_submission,
        readiness.errors.len(),
        readiness.warnings.len()
    );
    readiness
}

/// A session is always stored under the draft date, so it must carry the same one.
pub fn date_mismatch_message(entry_date: &str, batch_date: &str) -> String {
    format!(
        "Session date {} does not match the draft date {}",
        entry_date.trim(),
        batch_date
    )
}

/// Past, weekend and far-future notices for a scheduling date.
pub fn date_warnings(
    validator: &SessionValidator,
    date: NaiveDate,
    weekend_override: bool,
    today: NaiveDate,
) -> Vec<String> {
    let rules = validator.rules();
    let mut warnings = Vec::new();

    if date < today {
        warnings.push(format!(
            "Scheduling for past date ({})",
            date.format(DATE_FORMAT)
        ));
    }
    if rules.is_weekend(date) && !weekend_override {
        warnings.push(format!(
            "Selected date is a weekend ({}). Weekend override may be required.",
            date.format("%A")
        ));
    }
    let days_ahead = (date - today).num_days();
    if days_ahead > rules.future_date_warning_days {
        warnings.push(format!("Scheduling very far in future ({} days)", days_ahead));
    }
    warnings
}

/// Symmetric all-pairs scan. Pairs where either side has unreadable times
/// are left to per-session validation.
pub fn scan_conflicts(validator: &SessionValidator, sessions: &[SessionEntry]) -> ConflictAnalysis {
    let mut conflicts = Vec::new();
    for (i, first) in sessions.iter().enumerate() {
        let Ok(first_span) = first.clock_span() else {
            continue;
        };
        for (j, second) in sessions.iter().enumerate().skip(i + 1) {
            if second.clock_span().is_err() {
                continue;
            }
            let check = validator.check_overlap(first, std::slice::from_ref(second));
            if let Some(details) = check.conflicts.into_iter().next() {
                conflicts.push(ConflictPair {
                    first_index: i,
                    second_index: j,
                    first_time: first_span.label(),
                    second_time: format!("{}-{}", second.start_str(), second.end_str()),
                    details,
                });
            }
        }
    }
    ConflictAnalysis {
        has_conflicts: !conflicts.is_empty(),
        conflict_count: conflicts.len(),
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleRules;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn session(start: &str, end: &str, scribe: &str, patient: i64) -> SessionEntry {
        SessionEntry::new("2025-07-28", start, end, scribe, patient)
    }

    fn batch(sessions: Vec<SessionEntry>) -> DraftBatch {
        let mut batch = DraftBatch::new("DOC001", d("2025-07-28"));
        batch.sessions = sessions;
        batch
    }

    fn validator() -> SessionValidator {
        SessionValidator::new(ScheduleRules::default())
    }

    const TODAY: &str = "2025-07-21";

    #[test]
    fn two_clean_sessions_are_ready() {
        let drafts = batch(vec![
            session("09:00", "12:00", "Alice", 12345),
            session("14:00", "17:00", "Bob", 67890),
        ]);
        let readiness = assess_readiness(&validator(), &drafts, &[], d(TODAY));
        assert!(readiness.ready_for_submission, "{:?}", readiness.errors);
        assert!(readiness.warnings.is_empty());
        assert_eq!(readiness.session_count, 2);
        assert_eq!(readiness.duration_info.total_hours, dec!(6));
        assert_eq!(readiness.duration_info.formatted, "6:00");
        assert!(!readiness.conflict_analysis.has_conflicts);
    }

    #[test]
    fn empty_batch_is_not_ready() {
        let readiness = assess_readiness(&validator(), &batch(Vec::new()), &[], d(TODAY));
        assert!(!readiness.ready_for_submission);
        assert_eq!(readiness.errors, vec!["No sessions to submit"]);
        assert_eq!(readiness.duration_info, DurationInfo::empty());
    }

    #[test]
    fn third_session_breaks_daily_limit() {
        let drafts = batch(vec![
            session("09:00", "12:00", "Alice", 12345),
            session("14:00", "17:00", "Bob", 67890),
            session("17:00", "18:00", "Carol", 11111),
        ]);
        let readiness = assess_readiness(&validator(), &drafts, &[], d(TODAY));
        assert!(!readiness.ready_for_submission);
        assert_eq!(
            readiness.errors,
            vec!["Cannot exceed 2 sessions per day. Currently have 0 submitted + 3 draft = 3 total"]
        );
    }

    #[test]
    fn per_session_errors_are_prefixed_with_position() {
        let drafts = batch(vec![
            session("09:00", "12:00", "Alice", 12345),
            session("11:00", "13:00", "Bob", 0),
        ]);
        let readiness = assess_readiness(&validator(), &drafts, &[], d(TODAY));
        assert_eq!(readiness.errors, vec!["Session 2: Patient number cannot be zero"]);
        // the all-pairs scan still sees the overlap
        assert_eq!(readiness.conflict_analysis.conflict_count, 1);
    }

    #[test]
    fn draft_overlap_is_reported_once() {
        let existing = vec![session("09:00", "12:00", "Alice", 12345).with_submission_id("SUB_1")];
        let drafts = batch(vec![session("10:00", "11:00", "Carol", 11111)]);
        let readiness = assess_readiness(&validator(), &drafts, &existing, d(TODAY));
        assert_eq!(
            readiness.errors,
            vec!["Session 1: Overlaps with existing session 09:00-12:00 (Scribe: Alice, Patient: 12345)"]
        );
        let pair = &readiness.conflict_analysis.conflicts[0];
        assert_eq!((pair.first_index, pair.second_index), (0, 1));
        assert_eq!(pair.first_time, "09:00-12:00");
        assert_eq!(pair.second_time, "10:00-11:00");
    }

    #[test]
    fn all_pairs_scan_catches_conflicts_among_stored_sessions() {
        let existing = vec![
            session("09:00", "11:00", "Alice", 1).with_submission_id("SUB_1"),
            session("10:00", "12:00", "Bob", 2).with_submission_id("SUB_2"),
        ];
        let drafts = batch(vec![session("14:00", "15:00", "Carol", 3)]);
        let rules = ScheduleRules {
            max_sessions_per_day: 3,
            ..ScheduleRules::default()
        };
        let readiness = assess_readiness(&SessionValidator::new(rules), &drafts, &existing, d(TODAY));
        assert!(!readiness.ready_for_submission);
        assert_eq!(
            readiness.errors,
            vec!["Time conflict: Overlaps with existing session 10:00-12:00 (Scribe: Bob, Patient: 2)"]
        );
    }

    #[test]
    fn date_warnings_do_not_block() {
        let mut drafts = batch(vec![SessionEntry::new("2025-07-26", "09:00", "12:00", "Alice", 12345)]);
        drafts.date = "2025-07-26".to_string();
        let readiness = assess_readiness(&validator(), &drafts, &[], d("2025-07-30"));
        assert!(readiness.ready_for_submission);
        assert_eq!(
            readiness.warnings,
            vec![
                "Scheduling for past date (2025-07-26)",
                "Selected date is a weekend (Saturday). Weekend override may be required.",
            ]
        );

        drafts.weekend_override = true;
        let readiness = assess_readiness(&validator(), &drafts, &[], d("2025-07-30"));
        assert_eq!(readiness.warnings, vec!["Scheduling for past date (2025-07-26)"]);
    }

    #[test]
    fn far_future_date_warns() {
        let warnings = date_warnings(&validator(), d("2026-08-03"), false, d("2025-07-28"));
        assert_eq!(warnings, vec!["Scheduling very far in future (371 days)"]);
        assert!(date_warnings(&validator(), d("2026-07-28"), false, d("2025-07-28")).is_empty());
    }

    #[test]
    fn session_dated_elsewhere_blocks_the_batch() {
        let drafts = batch(vec![
            session("09:00", "12:00", "Alice", 12345),
            SessionEntry::new("2025-07-29", "14:00", "17:00", "Bob", 67890),
        ]);
        let readiness = assess_readiness(&validator(), &drafts, &[], d(TODAY));
        assert!(!readiness.ready_for_submission);
        assert_eq!(
            readiness.errors,
            vec!["Session 2: Session date 2025-07-29 does not match the draft date 2025-07-28"]
        );
    }

    #[test]
    fn unparsable_batch_date_is_an_error() {
        let mut drafts = batch(vec![session("09:00", "12:00", "Alice", 12345)]);
        drafts.date = "next monday".to_string();
        let readiness = assess_readiness(&validator(), &drafts, &[], d(TODAY));
        assert_eq!(readiness.errors, vec!["Invalid date format"]);
    }
}
