// src/session_validation_tests.rs

#[cfg(test)]
mod tests {
    use crate::config::ScheduleRules;
    use crate::session::{PatientNumber, SessionEntry};
    use crate::session_validation::*;

    // Helper to create a complete, valid session on the reference Monday
    fn create_test_session(start: &str, end: &str, scribe: &str, patient: i64) -> SessionEntry {
        SessionEntry::new("2025-07-28", start, end, scribe, patient)
    }

    fn validator() -> SessionValidator {
        SessionValidator::new(ScheduleRules::default())
    }

    // --- validate: presence ---

    #[test]
    fn test_validate_complete_session_is_valid() {
        let result = validator().validate(&create_test_session("09:00", "12:00", "Alice", 12345));
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let session = SessionEntry {
            date: Some("2025-07-28".into()),
            start_time: Some("   ".into()),
            ..SessionEntry::default()
        };
        let errors = validator().validate(&session).errors();
        assert_eq!(
            errors,
            vec![
                "Start Time is required",
                "End Time is required",
                "Scribe Name is required",
                "Patient number is required and cannot be empty",
            ]
        );
    }

    #[test]
    fn test_validate_presence_failure_skips_later_checks() {
        let mut session = create_test_session("12:00", "09:00", "A", 12345);
        session.date = None;
        let issues = validator().validate(&session).issues;
        assert_eq!(issues, vec![SessionIssue::MissingField { label: "Date" }]);
    }

    // --- validate: date and time ---

    #[test]
    fn test_validate_bad_date_short_circuits() {
        let mut session = create_test_session("12:00", "09:00", "A", 0);
        session.patient_number = Some(PatientNumber::Text("abc".into()));
        session.date = Some("28/07/2025".into());
        let issues = validator().validate(&session).issues;
        assert_eq!(issues, vec![SessionIssue::InvalidDateFormat]);
        assert_eq!(issues[0].kind(), IssueKind::Format);
    }

    #[test]
    fn test_validate_bad_time_format() {
        let issues = validator().validate(&create_test_session("9am", "12:00", "Alice", 1)).issues;
        assert_eq!(issues, vec![SessionIssue::InvalidTimeFormat]);
    }

    #[test]
    fn test_validate_end_before_start_is_rejected_not_wrapped() {
        let errors = validator().validate(&create_test_session("22:00", "01:00", "Alice", 1)).errors();
        assert_eq!(errors, vec!["End time must be after start time"]);
    }

    #[test]
    fn test_validate_equal_start_and_end_is_rejected() {
        let issues = validator().validate(&create_test_session("10:00", "10:00", "Alice", 1)).issues;
        assert_eq!(issues, vec![SessionIssue::InvalidTimeOrder]);
    }

    #[test]
    fn test_duration_bounds_at_defaults() {
        let v = validator();
        assert!(v.validate(&create_test_session("09:00", "09:30", "Alice", 1)).is_valid());
        assert!(v.validate(&create_test_session("09:00", "17:00", "Alice", 1)).is_valid());

        let too_short = v.validate(&create_test_session("09:00", "09:29", "Alice", 1));
        assert_eq!(too_short.errors(), vec!["Session must be at least 30 minutes"]);

        let too_long = v.validate(&create_test_session("09:00", "17:01", "Alice", 1));
        assert_eq!(too_long.errors(), vec!["Session cannot exceed 480 minutes (8 hours)"]);
    }

    #[test]
    fn test_validate_accumulates_independent_failures() {
        let errors = validator().validate(&create_test_session("09:00", "09:10", "A", 1_000_000)).errors();
        assert_eq!(
            errors,
            vec![
                "Session must be at least 30 minutes",
                "Scribe name must be at least 2 characters",
                "Patient number must be between 1 and 999999",
            ]
        );
    }

    // --- validate: scribe and patient ---

    #[test]
    fn test_scribe_name_bounds_use_trimmed_length() {
        let v = validator();
        assert!(!v.validate(&create_test_session("09:00", "10:00", " B ", 1)).is_valid());
        assert!(v.validate(&create_test_session("09:00", "10:00", " Bo ", 1)).is_valid());
        let long_name = "x".repeat(51);
        let errors = v.validate(&create_test_session("09:00", "10:00", &long_name, 1)).errors();
        assert_eq!(errors, vec!["Scribe name cannot exceed 50 characters"]);
    }

    #[test]
    fn test_patient_number_edge_cases_are_distinct() {
        let v = validator();
        let zero = v.validate(&create_test_session("09:00", "10:00", "Alice", 0)).issues;
        let out_of_range = v.validate(&create_test_session("09:00", "10:00", "Alice", 1_000_000)).issues;
        let mut empty_session = create_test_session("09:00", "10:00", "Alice", 1);
        empty_session.patient_number = Some(PatientNumber::Text(String::new()));
        let empty = v.validate(&empty_session).issues;

        assert_eq!(zero, vec![SessionIssue::PatientNumberZero]);
        assert_eq!(
            out_of_range,
            vec![SessionIssue::PatientNumberOutOfRange { min: 1, max: 999_999 }]
        );
        assert_eq!(empty, vec![SessionIssue::PatientNumberMissing]);
        assert_ne!(zero[0].to_string(), out_of_range[0].to_string());
        assert_ne!(zero[0].to_string(), empty[0].to_string());
    }

    #[test]
    fn test_patient_number_text_forms() {
        let v = validator();
        let mut session = create_test_session("09:00", "10:00", "Alice", 1);

        session.patient_number = Some(PatientNumber::Text(" 4711 ".into()));
        assert!(v.validate(&session).is_valid());

        session.patient_number = Some(PatientNumber::Text("000".into()));
        assert_eq!(v.validate(&session).issues, vec![SessionIssue::PatientNumberZero]);

        session.patient_number = Some(PatientNumber::Text("12a".into()));
        assert_eq!(
            v.validate(&session).errors(),
            vec!["Patient number must be a valid number"]
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let v = validator();
        let session = create_test_session("09:00", "09:10", "A", 0);
        let first = v.validate(&session);
        let second = v.validate(&session);
        assert_eq!(first, second);
    }

    // --- check_overlap ---

    #[test]
    fn test_overlap_is_symmetric() {
        let v = validator();
        let pairs = [
            (("09:00", "11:00"), ("10:00", "12:00")),
            (("09:00", "10:00"), ("10:00", "11:00")),
            (("09:00", "17:00"), ("12:00", "13:00")),
            (("09:00", "10:00"), ("10:30", "11:00")),
        ];
        for ((a_start, a_end), (b_start, b_end)) in pairs {
            let a = create_test_session(a_start, a_end, "Alice", 1);
            let b = create_test_session(b_start, b_end, "Bob", 2);
            let ab = v.check_overlap(&a, std::slice::from_ref(&b)).has_overlap;
            let ba = v.check_overlap(&b, std::slice::from_ref(&a)).has_overlap;
            assert_eq!(ab, ba, "asymmetric for {:?} vs {:?}", (a_start, a_end), (b_start, b_end));
        }
    }

    #[test]
    fn test_back_to_back_sessions_do_not_conflict() {
        let first = create_test_session("09:00", "10:00", "Alice", 1);
        let second = create_test_session("10:00", "11:00", "Bob", 2);
        let result = validator().check_overlap(&second, &[first]);
        assert!(!result.has_overlap);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_half_open_overlap() {
        let v = validator();
        let existing = [create_test_session("09:00", "11:00", "Alice", 12345)];
        let result = v.check_overlap(&create_test_session("10:00", "12:00", "Bob", 2), &existing);
        assert!(result.has_overlap);
        assert_eq!(
            result.conflicts,
            vec!["Overlaps with existing session 09:00-11:00 (Scribe: Alice, Patient: 12345)"]
        );

        let existing = [create_test_session("09:00", "10:00", "Alice", 1)];
        let result = v.check_overlap(&create_test_session("10:30", "11:00", "Bob", 2), &existing);
        assert!(!result.has_overlap);
    }

    #[test]
    fn test_overlap_skips_same_submission_id() {
        let stored = create_test_session("09:00", "12:00", "Alice", 1).with_submission_id("SUB_A");
        let edited = create_test_session("10:00", "12:00", "Alice", 1).with_submission_id("SUB_A");
        assert!(!validator().check_overlap(&edited, &[stored.clone()]).has_overlap);

        let other = create_test_session("10:00", "12:00", "Bob", 2).with_submission_id("SUB_B");
        assert!(validator().check_overlap(&other, &[stored]).has_overlap);
    }

    #[test]
    fn test_overlap_reports_one_message_per_conflict() {
        let existing = [
            create_test_session("08:00", "10:00", "Alice", 1),
            create_test_session("10:00", "11:00", "Dan", 4),
            create_test_session("11:30", "13:00", "Bob", 2),
        ];
        let result = validator().check_overlap(&create_test_session("09:00", "12:00", "Eve", 3), &existing);
        assert_eq!(result.conflicts.len(), 3);
    }

    #[test]
    fn test_overlap_skips_malformed_existing_entry() {
        let existing = [
            create_test_session("nine", "10:00", "Alice", 1),
            create_test_session("14:00", "15:00", "Bob", 2),
        ];
        let result = validator().check_overlap(&create_test_session("09:00", "12:00", "Eve", 3), &existing);
        assert!(!result.has_overlap);
    }

    #[test]
    fn test_overlap_fails_on_malformed_candidate() {
        let existing = [create_test_session("14:00", "15:00", "Bob", 2)];
        let result = validator().check_overlap(&create_test_session("9", "12:00", "Eve", 3), &existing);
        assert!(result.has_overlap);
        assert_eq!(result.conflicts, vec![INVALID_CANDIDATE_TIME]);
    }

    #[test]
    fn test_overlap_against_nothing_is_clear() {
        let result = validator().check_overlap(&create_test_session("9", "12:00", "Eve", 3), &[]);
        assert!(!result.has_overlap);
    }

    // --- check_daily_limit ---

    #[test]
    fn test_daily_limit_boundary() {
        let v = validator();
        assert!(v.check_daily_limit(1, 1).within_limit);
        assert!(v.check_daily_limit(0, 2).within_limit);

        let over = v.check_daily_limit(2, 1);
        assert!(!over.within_limit);
        assert_eq!(
            over.message,
            "Cannot exceed 2 sessions per day. Currently have 2 submitted + 1 draft = 3 total"
        );
    }

    #[test]
    fn test_daily_limit_follows_configuration() {
        let v = SessionValidator::new(ScheduleRules {
            max_sessions_per_day: 3,
            ..ScheduleRules::default()
        });
        assert!(v.check_daily_limit(2, 1).within_limit);
        assert!(!v.check_daily_limit(2, 2).within_limit);
    }

    // --- validate_drafts ---

    #[test]
    fn test_validate_drafts_checks_earlier_drafts_only() {
        let drafts = vec![
            create_test_session("09:00", "12:00", "Alice", 1),
            create_test_session("11:00", "13:00", "Bob", 2),
        ];
        let results = validator().validate_drafts(&drafts, &[]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
        assert_eq!(
            results[0].1,
            vec!["Overlaps with existing session 09:00-12:00 (Scribe: Alice, Patient: 1)"]
        );
    }

    #[test]
    fn test_validate_drafts_skips_overlap_for_invalid_session() {
        let existing = vec![create_test_session("09:00", "12:00", "Alice", 1)];
        let drafts = vec![create_test_session("10:00", "11:00", "B", 2)];
        let results = validator().validate_drafts(&drafts, &existing);
        assert_eq!(results, vec![(0, vec!["Scribe name must be at least 2 characters".to_string()])]);
    }
}
