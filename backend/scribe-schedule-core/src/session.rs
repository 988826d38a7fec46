// src/session.rs
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time_utils::{normalise_hhmm, parse_date, parse_hhmm, ClockSpan, TimeError, DATE_FORMAT};

/// Patient number as entered: forms send text, JSON clients may send a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatientNumber {
    Number(i64),
    Text(String),
}

impl fmt::Display for PatientNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientNumber::Number(n) => write!(f, "{}", n),
            PatientNumber::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

impl From<i64> for PatientNumber {
    fn from(value: i64) -> Self {
        PatientNumber::Number(value)
    }
}

impl From<i32> for PatientNumber {
    fn from(value: i32) -> Self {
        PatientNumber::Number(i64::from(value))
    }
}

impl From<u32> for PatientNumber {
    fn from(value: u32) -> Self {
        PatientNumber::Number(i64::from(value))
    }
}

impl From<&str> for PatientNumber {
    fn from(value: &str) -> Self {
        PatientNumber::Text(value.to_string())
    }
}

/// A session as entered or as loaded back from storage.
///
/// Fields stay in their wire shape so that validation can report every
/// problem with a half-filled entry instead of failing on the first one.
/// A missing `submission_id` marks a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub scribe_name: Option<String>,
    #[serde(default)]
    pub patient_number: Option<PatientNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl SessionEntry {
    pub fn new(
        date: &str,
        start_time: &str,
        end_time: &str,
        scribe_name: &str,
        patient_number: impl Into<PatientNumber>,
    ) -> Self {
        Self {
            date: Some(date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            scribe_name: Some(scribe_name.to_string()),
            patient_number: Some(patient_number.into()),
            submission_id: None,
        }
    }

    pub fn with_submission_id(mut self, submission_id: &str) -> Self {
        self.submission_id = Some(submission_id.to_string());
        self
    }

    pub fn is_draft(&self) -> bool {
        self.submission_id.is_none()
    }

    pub fn start_str(&self) -> &str {
        self.start_time.as_deref().unwrap_or("")
    }

    pub fn end_str(&self) -> &str {
        self.end_time.as_deref().unwrap_or("")
    }

    pub fn scribe_str(&self) -> &str {
        self.scribe_name.as_deref().unwrap_or("")
    }

    pub fn patient_label(&self) -> String {
        self.patient_number
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    /// Format-checked times, order not enforced.
    pub fn clock_span(&self) -> Result<ClockSpan, TimeError> {
        ClockSpan::parse(self.start_str(), self.end_str())
    }

    pub fn same_submission(&self, other: &SessionEntry) -> bool {
        matches!(
            (&self.submission_id, &other.submission_id),
            (Some(a), Some(b)) if a == b
        )
    }
}

/// Ordered, not yet persisted sessions for one doctor and day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftBatch {
    pub doctor_id: String,
    /// `YYYY-MM-DD`; kept as text so a bad date is reported, not rejected.
    pub date: String,
    #[serde(default)]
    pub weekend_override: bool,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

impl DraftBatch {
    pub fn new(doctor_id: &str, date: NaiveDate) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            weekend_override: false,
            sessions: Vec::new(),
        }
    }

    pub fn with_weekend_override(mut self, weekend_override: bool) -> Self {
        self.weekend_override = weekend_override;
        self
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn remove(&mut self, index: usize) -> Option<SessionEntry> {
        if index < self.sessions.len() {
            Some(self.sessions.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Display order: by start time, malformed times last.
    pub fn sorted_by_start(&self) -> Vec<&SessionEntry> {
        let mut sorted: Vec<&SessionEntry> = self.sessions.iter().collect();
        sorted.sort_by_key(|s| match parse_hhmm(s.start_str()) {
            Ok(start) => (0, Some(start)),
            Err(_) => (1, None),
        });
        sorted
    }
}

/// A persisted session. Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub scribe_name: String,
    pub patient_number: u32,
    pub submitted_by: String,
    pub submitted_time: String,
}

pub const SUBMISSION_COLUMNS: [&str; 10] = [
    "submission_id",
    "doctor_id",
    "doctor_name",
    "date",
    "start_time",
    "end_time",
    "scribe_name",
    "patient_number",
    "submitted_by",
    "submitted_time",
];

impl SubmissionRecord {
    pub fn clock_span(&self) -> Result<ClockSpan, TimeError> {
        ClockSpan::parse(&self.start_time, &self.end_time)
    }

    /// Lenient duration; malformed times count as zero.
    pub fn duration_minutes(&self) -> i64 {
        self.clock_span().map(|s| s.minutes()).unwrap_or(0)
    }
}

impl From<&SubmissionRecord> for SessionEntry {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            date: Some(record.date.format(DATE_FORMAT).to_string()),
            start_time: Some(record.start_time.clone()),
            end_time: Some(record.end_time.clone()),
            scribe_name: Some(record.scribe_name.clone()),
            patient_number: Some(PatientNumber::Number(i64::from(record.patient_number))),
            submission_id: Some(record.submission_id.clone()),
        }
    }
}

/// Editable fields of a stored session; `None` leaves the value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub scribe_name: Option<String>,
    #[serde(default)]
    pub patient_number: Option<u32>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.scribe_name.is_none()
            && self.patient_number.is_none()
    }

    /// Edited times are stored as `HH:MM`, the same as on submit.
    pub fn apply_to(&self, record: &mut SubmissionRecord) {
        if let Some(start) = &self.start_time {
            record.start_time = normalise_hhmm(start);
        }
        if let Some(end) = &self.end_time {
            record.end_time = normalise_hhmm(end);
        }
        if let Some(scribe) = &self.scribe_name {
            record.scribe_name = scribe.trim().to_string();
        }
        if let Some(patient) = self.patient_number {
            record.patient_number = patient;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, start: &str, end: &str) -> SubmissionRecord {
        SubmissionRecord {
            submission_id: id.to_string(),
            doctor_id: "DOC001".to_string(),
            doctor_name: "Clinic | Ann | Lee".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 7, 28).unwrap(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            scribe_name: "Alice".to_string(),
            patient_number: 12345,
            submitted_by: "jsmith".to_string(),
            submitted_time: "2025-07-20 10:00:00".to_string(),
        }
    }

    #[test]
    fn stored_record_converts_to_non_draft_entry() {
        let entry = SessionEntry::from(&record("SUB_1", "09:00", "12:00"));
        assert!(!entry.is_draft());
        assert_eq!(entry.date.as_deref(), Some("2025-07-28"));
        assert_eq!(entry.patient_label(), "12345");
    }

    #[test]
    fn patient_number_accepts_text_or_number_in_json() {
        let from_number: SessionEntry =
            serde_json::from_str(r#"{"date":"2025-07-28","patient_number":42}"#).unwrap();
        let from_text: SessionEntry =
            serde_json::from_str(r#"{"date":"2025-07-28","patient_number":"42"}"#).unwrap();
        assert_eq!(from_number.patient_number, Some(PatientNumber::Number(42)));
        assert_eq!(from_text.patient_number, Some(PatientNumber::Text("42".into())));
        assert!(from_text.start_time.is_none());
    }

    #[test]
    fn draft_batch_sorts_by_start_for_display() {
        let mut batch = DraftBatch::new("DOC001", NaiveDate::from_ymd_opt(2025, 7, 28).unwrap());
        batch.sessions.push(SessionEntry::new("2025-07-28", "14:00", "17:00", "Bob", 2));
        batch.sessions.push(SessionEntry::new("2025-07-28", "bad", "17:00", "Eve", 3));
        batch.sessions.push(SessionEntry::new("2025-07-28", "09:00", "12:00", "Alice", 1));
        let order: Vec<&str> = batch.sorted_by_start().iter().map(|s| s.scribe_str()).collect();
        assert_eq!(order, vec!["Alice", "Bob", "Eve"]);
        assert_eq!(batch.sessions[0].scribe_str(), "Bob");
        assert!(batch.remove(5).is_none());
        assert_eq!(batch.remove(0).map(|s| s.scribe_name), Some(Some("Bob".to_string())));
    }

    #[test]
    fn update_only_touches_provided_fields() {
        let mut stored = record("SUB_1", "09:00", "12:00");
        let update = SessionUpdate {
            end_time: Some("11:00".into()),
            scribe_name: Some("  Carol ".into()),
            ..SessionUpdate::default()
        };
        update.apply_to(&mut stored);
        assert_eq!(stored.start_time, "09:00");
        assert_eq!(stored.end_time, "11:00");
        assert_eq!(stored.scribe_name, "Carol");
        assert_eq!(stored.patient_number, 12345);
        assert!(SessionUpdate::default().is_empty());
    }

    #[test]
    fn update_pads_edited_times() {
        let mut stored = record("SUB_1", "10:00", "12:00");
        let update = SessionUpdate {
            start_time: Some("9:00".into()),
            end_time: Some(" 11:30".into()),
            ..SessionUpdate::default()
        };
        update.apply_to(&mut stored);
        assert_eq!(stored.start_time, "09:00");
        assert_eq!(stored.end_time, "11:30");
    }

    #[test]
    fn same_submission_requires_both_ids() {
        let a = SessionEntry::new("2025-07-28", "09:00", "10:00", "Al", 1).with_submission_id("X");
        let b = SessionEntry::new("2025-07-28", "09:00", "10:00", "Al", 1);
        assert!(a.same_submission(&a.clone()));
        assert!(!a.same_submission(&b));
        assert!(!b.same_submission(&b.clone()));
    }
}
