// src/session_validation.rs
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ScheduleRules;
use crate::session::{PatientNumber, SessionEntry};
use crate::time_utils::{parse_date, ClockSpan, TimeError};

// --- Validation Structures ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    Validation,
    Format,
}

/// Field-level problems with a single session. Always collected, never thrown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionIssue {
    #[error("{label} is required")]
    MissingField { label: &'static str },
    #[error("Patient number is required and cannot be empty")]
    PatientNumberMissing,
    #[error("Patient number cannot be zero")]
    PatientNumberZero,
    #[error("Invalid date format. Use YYYY-MM-DD")]
    InvalidDateFormat,
    #[error("Invalid time format. Use HH:MM")]
    InvalidTimeFormat,
    #[error("End time must be after start time")]
    InvalidTimeOrder,
    #[error("Session must be at least {min_minutes} minutes")]
    TooShort { min_minutes: i64, actual_minutes: i64 },
    #[error("Session cannot exceed {max_minutes} minutes ({max_hours} hours)")]
    TooLong {
        max_minutes: i64,
        max_hours: i64,
        actual_minutes: i64,
    },
    #[error("Scribe name must be at least {min} characters")]
    ScribeNameTooShort { min: usize },
    #[error("Scribe name cannot exceed {max} characters")]
    ScribeNameTooLong { max: usize },
    #[error("Patient number must be between {min} and {max}")]
    PatientNumberOutOfRange { min: i64, max: i64 },
    #[error("Patient number must be a valid number")]
    PatientNumberNotNumeric,
}

impl SessionIssue {
    pub fn kind(&self) -> IssueKind {
        match self {
            SessionIssue::InvalidDateFormat
            | SessionIssue::InvalidTimeFormat
            | SessionIssue::PatientNumberNotNumeric => IssueKind::Format,
            _ => IssueKind::Validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionValidation {
    pub issues: Vec<SessionIssue>,
}

impl SessionValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapCheck {
    pub has_overlap: bool,
    pub conflicts: Vec<String>,
}

impl OverlapCheck {
    fn clear() -> Self {
        Self {
            has_overlap: false,
            conflicts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLimitCheck {
    pub within_limit: bool,
    pub message: String,
}

pub const INVALID_CANDIDATE_TIME: &str = "Invalid time format in new session";

// --- Validator ---

/// Applies [`ScheduleRules`] to individual sessions and small session sets.
#[derive(Debug, Clone, Default)]
pub struct SessionValidator {
    rules: ScheduleRules,
}

impl SessionValidator {
    pub fn new(rules: ScheduleRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScheduleRules {
        &self.rules
    }

    /// Checks one session. Presence problems are reported for every field
    /// before anything else runs; a bad date stops the remaining checks.
    pub fn validate(&self, session: &SessionEntry) -> SessionValidation {
        let mut issues = Vec::new();

        let text_fields: [(&Option<String>, &'static str); 4] = [
            (&session.date, "Date"),
            (&session.start_time, "Start Time"),
            (&session.end_time, "End Time"),
            (&session.scribe_name, "Scribe Name"),
        ];
        for (value, label) in text_fields {
            if is_blank(value) {
                issues.push(SessionIssue::MissingField { label });
            }
        }
        match &session.patient_number {
            None => issues.push(SessionIssue::PatientNumberMissing),
            Some(PatientNumber::Text(text)) if text.trim().is_empty() => {
                issues.push(SessionIssue::PatientNumberMissing)
            }
            Some(PatientNumber::Number(0)) => issues.push(SessionIssue::PatientNumberZero),
            Some(_) => {}
        }
        if !issues.is_empty() {
            return SessionValidation { issues };
        }

        if parse_date(session.date.as_deref().unwrap_or_default()).is_none() {
            issues.push(SessionIssue::InvalidDateFormat);
            return SessionValidation { issues };
        }

        issues.extend(self.validate_times(session.start_str(), session.end_str()));
        issues.extend(self.validate_scribe_name(session.scribe_str()));
        if let Some(patient) = &session.patient_number {
            issues.extend(self.validate_patient_number(patient));
        }

        SessionValidation { issues }
    }

    /// Strict order check followed by both duration bounds.
    pub fn validate_times(&self, start: &str, end: &str) -> Vec<SessionIssue> {
        let span = match ClockSpan::parse_ordered(start, end) {
            Ok(span) => span,
            Err(TimeError::InvalidTimeOrder { .. }) => return vec![SessionIssue::InvalidTimeOrder],
            Err(_) => return vec![SessionIssue::InvalidTimeFormat],
        };

        let minutes = span.minutes();
        let mut issues = Vec::new();
        if minutes < self.rules.min_session_duration_minutes {
            issues.push(SessionIssue::TooShort {
                min_minutes: self.rules.min_session_duration_minutes,
                actual_minutes: minutes,
            });
        }
        if minutes > self.rules.max_session_duration_minutes {
            issues.push(SessionIssue::TooLong {
                max_minutes: self.rules.max_session_duration_minutes,
                max_hours: self.rules.max_session_duration_minutes / 60,
                actual_minutes: minutes,
            });
        }
        issues
    }

    pub fn validate_scribe_name(&self, name: &str) -> Vec<SessionIssue> {
        let length = name.trim().chars().count();
        if length < self.rules.scribe_name_min_length {
            vec![SessionIssue::ScribeNameTooShort {
                min: self.rules.scribe_name_min_length,
            }]
        } else if length > self.rules.scribe_name_max_length {
            vec![SessionIssue::ScribeNameTooLong {
                max: self.rules.scribe_name_max_length,
            }]
        } else {
            Vec::new()
        }
    }

    pub fn validate_patient_number(&self, patient: &PatientNumber) -> Vec<SessionIssue> {
        let number = match patient {
            PatientNumber::Number(n) => *n,
            PatientNumber::Text(text) => match text.trim().parse::<i64>() {
                Ok(n) => n,
                Err(_) => return vec![SessionIssue::PatientNumberNotNumeric],
            },
        };
        if number == 0 {
            return vec![SessionIssue::PatientNumberZero];
        }
        if number < self.rules.patient_number_min || number > self.rules.patient_number_max {
            return vec![SessionIssue::PatientNumberOutOfRange {
                min: self.rules.patient_number_min,
                max: self.rules.patient_number_max,
            }];
        }
        Vec::new()
    }

    /// Compares `candidate` against every entry in `existing`, skipping the
    /// entry that shares its submission id.
    pub fn check_overlap(&self, candidate: &SessionEntry, existing: &[SessionEntry]) -> OverlapCheck {
        if existing.is_empty() {
            return OverlapCheck::clear();
        }

        let candidate_span = match candidate.clock_span() {
            Ok(span) => span,
            Err(_) => {
                return OverlapCheck {
                    has_overlap: true,
                    conflicts: vec![INVALID_CANDIDATE_TIME.to_string()],
                }
            }
        };

        let mut conflicts = Vec::new();
        for other in existing {
            if candidate.same_submission(other) {
                continue;
            }
            let other_span = match other.clock_span() {
                Ok(span) => span,
                Err(e) => {
                    debug!("Skipping existing session with unreadable times: {}", e);
                    continue;
                }
            };
            if candidate_span.overlaps(&other_span) {
                conflicts.push(format!(
                    "Overlaps with existing session {}-{} (Scribe: {}, Patient: {})",
                    other.start_str(),
                    other.end_str(),
                    other.scribe_str(),
                    other.patient_label()
                ));
            }
        }

        OverlapCheck {
            has_overlap: !conflicts.is_empty(),
            conflicts,
        }
    }

    /// Call with the candidate already counted in `draft_count`.
    pub fn check_daily_limit(&self, existing_count: usize, draft_count: usize) -> DailyLimitCheck {
        let max = self.rules.max_sessions_per_day;
        let total = existing_count + draft_count;
        if total > max {
            DailyLimitCheck {
                within_limit: false,
                message: format!(
                    "Cannot exceed {} sessions per day. Currently have {} submitted + {} draft = {} total",
                    max, existing_count, draft_count, total
                ),
            }
        } else {
            DailyLimitCheck {
                within_limit: true,
                message: String::new(),
            }
        }
    }

    /// Per-draft errors keyed by batch position. Each valid draft is
    /// overlap-checked against the drafts before it and all existing sessions.
    pub fn validate_drafts(
        &self,
        drafts: &[SessionEntry],
        existing: &[SessionEntry],
    ) -> Vec<(usize, Vec<String>)> {
        let mut results = Vec::new();
        for (index, draft) in drafts.iter().enumerate() {
            let validation = self.validate(draft);
            let mut errors = validation.errors();
            if validation.is_valid() {
                let mut neighbours: Vec<SessionEntry> = drafts[..index].to_vec();
                neighbours.extend(existing.iter().cloned());
                let overlap = self.check_overlap(draft, &neighbours);
                errors.extend(overlap.conflicts);
            }
            if !errors.is_empty() {
                results.push((index, errors));
            }
        }
        results
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
