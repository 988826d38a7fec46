// src/scheduling_service.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analytics::{aggregate, MonthlyAnalytics};
use crate::config::ScheduleRules;
use crate::monthly_report::{build_monthly_report, write_report_csv, MonthlyReport};
use crate::readiness::{assess_readiness, date_mismatch_message, Readiness};
use crate::roster::{Doctor, Roster};
use crate::session::{DraftBatch, SessionEntry, SessionUpdate, SubmissionRecord};
use crate::session_validation::SessionValidator;
use crate::submission_store::{format_timestamp, generate_submission_id, StoreError, SubmissionStore};
use crate::time_utils::{minutes_to_hours, normalise_hhmm, parse_hhmm, ReportMonth};

pub const WEEKEND_ENTRY_REFUSED: &str =
    "Weekends are OFF by default. Click \"Override Weekend\" to add sessions.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftAdmission {
    pub accepted: bool,
    pub errors: Vec<String>,
}

impl DraftAdmission {
    fn accepted() -> Self {
        Self {
            accepted: true,
            errors: Vec::new(),
        }
    }

    fn refused(errors: Vec<String>) -> Self {
        Self {
            accepted: false,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted {
        records: Vec<SubmissionRecord>,
        readiness: Readiness,
    },
    Rejected {
        readiness: Readiness,
    },
    /// Nothing was stored; the cause has been logged.
    StoreFailed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated { record: SubmissionRecord },
    NotFound,
    Rejected { errors: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub total_sessions: usize,
    pub total_hours: Decimal,
    pub sessions: Vec<SubmissionRecord>,
}

/// Entry, submission, editing and reporting over one submission store.
pub struct SchedulingService<S: SubmissionStore> {
    store: S,
    validator: SessionValidator,
    roster: Roster,
}

impl<S: SubmissionStore> SchedulingService<S> {
    pub fn new(store: S, rules: ScheduleRules, roster: Roster) -> Self {
        Self {
            store,
            validator: SessionValidator::new(rules),
            roster,
        }
    }

    pub fn rules(&self) -> &ScheduleRules {
        self.validator.rules()
    }

    pub fn validator(&self) -> &SessionValidator {
        &self.validator
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_submissions(
        &self,
        doctor_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        self.store.load_submissions(doctor_id, date)
    }

    pub fn existing_sessions(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<SessionEntry>, StoreError> {
        let records = self.store.load_submissions(Some(doctor_id), Some(date))?;
        Ok(records.iter().map(SessionEntry::from).collect())
    }

    fn existing_for_batch(&self, batch: &DraftBatch) -> Result<Vec<SessionEntry>, StoreError> {
        match batch.parsed_date() {
            Some(date) => self.existing_sessions(&batch.doctor_id, date),
            None => Ok(Vec::new()),
        }
    }

    /// Entry-time gate for a single session. The batch only grows when every
    /// check passes.
    pub fn add_draft(&self, batch: &mut DraftBatch, mut entry: SessionEntry) -> Result<DraftAdmission, StoreError> {
        if let Some(date) = batch.parsed_date() {
            if self.rules().is_weekend(date) && !batch.weekend_override {
                warn!("Refused weekend entry for {} on {}", batch.doctor_id, batch.date);
                return Ok(DraftAdmission::refused(vec![WEEKEND_ENTRY_REFUSED.to_string()]));
            }
        }

        let entry_date = entry.date.as_deref().unwrap_or_default().trim().to_string();
        if entry_date.is_empty() {
            entry.date = Some(batch.date.clone());
        } else if entry_date != batch.date {
            return Ok(DraftAdmission::refused(vec![date_mismatch_message(&entry_date, &batch.date)]));
        }

        let validation = self.validator.validate(&entry);
        if !validation.is_valid() {
            warn!(
                "Draft session for {} on {} failed validation: {:?}",
                batch.doctor_id,
                batch.date,
                validation.errors()
            );
            return Ok(DraftAdmission::refused(validation.errors()));
        }

        let existing = self.existing_for_batch(batch)?;
        let mut neighbours = existing.clone();
        neighbours.extend(batch.sessions.iter().cloned());

        let mut errors = self.validator.check_overlap(&entry, &neighbours).conflicts;
        let limit = self.validator.check_daily_limit(existing.len(), batch.len() + 1);
        if !limit.within_limit {
            errors.push(limit.message);
        }
        if !errors.is_empty() {
            warn!("Draft session for {} on {} refused: {:?}", batch.doctor_id, batch.date, errors);
            return Ok(DraftAdmission::refused(errors));
        }

        batch.sessions.push(entry);
        info!("Draft batch for {} on {} now holds {} sessions", batch.doctor_id, batch.date, batch.len());
        Ok(DraftAdmission::accepted())
    }

    pub fn remove_draft(&self, batch: &mut DraftBatch, index: usize) -> Option<SessionEntry> {
        let removed = batch.remove(index);
        if removed.is_none() {
            warn!("No draft at position {} for {} on {}", index, batch.doctor_id, batch.date);
        }
        removed
    }

    pub fn assess(&self, batch: &DraftBatch, today: NaiveDate) -> Result<Readiness, StoreError> {
        let existing = self.existing_for_batch(batch)?;
        Ok(assess_readiness(&self.validator, batch, &existing, today))
    }

    /// All-or-nothing submission of the draft batch. The batch is cleared only
    /// after the store accepted every record.
    pub fn submit(
        &mut self,
        batch: &mut DraftBatch,
        doctor: &Doctor,
        submitted_by: &str,
        now: NaiveDateTime,
    ) -> SubmitOutcome {
        let mut readiness = match self.assess(batch, now.date()) {
            Ok(readiness) => readiness,
            Err(e) => {
                error!("Could not load existing sessions for {}: {}", batch.doctor_id, e);
                return SubmitOutcome::StoreFailed {
                    message: e.to_string(),
                };
            }
        };
        if !readiness.ready_for_submission {
            warn!(
                "Submission for {} on {} blocked: {:?}",
                batch.doctor_id, batch.date, readiness.errors
            );
            return SubmitOutcome::Rejected { readiness };
        }
        // readiness guarantees a parseable date and well-formed sessions
        let Some(date) = batch.parsed_date() else {
            return SubmitOutcome::Rejected { readiness };
        };

        let submitted_time = format_timestamp(now);
        let mut records = Vec::with_capacity(batch.len());
        for entry in batch.sorted_by_start() {
            let patient_label = entry.patient_label();
            let Ok(patient_number) = patient_label.parse::<u32>() else {
                let message = format!("Patient number {} cannot be stored", patient_label);
                warn!("Submission for {} on {} blocked: {}", batch.doctor_id, batch.date, message);
                readiness.ready_for_submission = false;
                readiness.errors.push(message);
                return SubmitOutcome::Rejected { readiness };
            };
            records.push(SubmissionRecord {
                submission_id: unique_submission_id(now, &records),
                doctor_id: doctor.doctor_id.clone(),
                doctor_name: doctor.display_name(),
                date,
                start_time: normalise_hhmm(entry.start_str()),
                end_time: normalise_hhmm(entry.end_str()),
                scribe_name: entry.scribe_str().trim().to_string(),
                patient_number,
                submitted_by: submitted_by.to_string(),
                submitted_time: submitted_time.clone(),
            });
        }

        match self.store.append_submissions(&records) {
            Ok(()) => {
                info!("Submitted {} sessions for {} on {}", records.len(), doctor.doctor_id, batch.date);
                batch.clear();
                SubmitOutcome::Submitted { records, readiness }
            }
            Err(e) => {
                error!("Failed to store submissions for {} on {}: {}", doctor.doctor_id, batch.date, e);
                SubmitOutcome::StoreFailed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Re-validates the edited session against its stored neighbours before
    /// writing. `submitted_time` is refreshed on success.
    pub fn update_session(
        &mut self,
        submission_id: &str,
        update: &SessionUpdate,
        now: NaiveDateTime,
    ) -> Result<UpdateOutcome, StoreError> {
        let all = self.store.load_submissions(None, None)?;
        let Some(stored) = all.iter().find(|r| r.submission_id == submission_id) else {
            warn!("Submission {} not found", submission_id);
            return Ok(UpdateOutcome::NotFound);
        };

        let mut merged = stored.clone();
        update.apply_to(&mut merged);
        let candidate = SessionEntry::from(&merged);

        let mut errors = self.validator.validate(&candidate).errors();
        if errors.is_empty() {
            let neighbours: Vec<SessionEntry> = all
                .iter()
                .filter(|r| r.doctor_id == merged.doctor_id && r.date == merged.date)
                .map(SessionEntry::from)
                .collect();
            errors.extend(self.validator.check_overlap(&candidate, &neighbours).conflicts);
        }
        if !errors.is_empty() {
            warn!("Update of {} rejected: {:?}", submission_id, errors);
            return Ok(UpdateOutcome::Rejected { errors });
        }

        if !self.store.update_submission(submission_id, update, now)? {
            return Ok(UpdateOutcome::NotFound);
        }
        merged.submitted_time = format_timestamp(now);
        Ok(UpdateOutcome::Updated { record: merged })
    }

    pub fn delete_session(&mut self, submission_id: &str) -> Result<bool, StoreError> {
        self.store.delete_submission(submission_id)
    }

    pub fn day_summary(&self, doctor_id: &str, date: NaiveDate) -> Result<DaySummary, StoreError> {
        let mut sessions = self.store.load_submissions(Some(doctor_id), Some(date))?;
        sessions.sort_by_key(|s| match parse_hhmm(&s.start_time) {
            Ok(start) => (0, Some(start)),
            Err(_) => (1, None),
        });
        let minutes: i64 = sessions.iter().map(|s| s.duration_minutes()).sum();
        Ok(DaySummary {
            doctor_id: doctor_id.to_string(),
            date,
            total_sessions: sessions.len(),
            total_hours: minutes_to_hours(minutes).round_dp(2),
            sessions,
        })
    }

    pub fn month_analytics(&self, month: ReportMonth, doctor_id: Option<&str>) -> Result<MonthlyAnalytics, StoreError> {
        let records = self.store.load_submissions(doctor_id, None)?;
        Ok(aggregate(&records, month, self.rules()))
    }

    /// One report per roster doctor, plus any doctor that only appears in the
    /// stored submissions.
    pub fn monthly_reports(&self, month: ReportMonth) -> Result<Vec<MonthlyReport>, StoreError> {
        let records = self.store.load_submissions(None, None)?;

        let mut doctors: Vec<(String, String)> = self
            .roster
            .doctors()
            .iter()
            .map(|d| (d.doctor_id.clone(), d.short_name()))
            .collect();
        let unlisted: BTreeMap<&str, &str> = records
            .iter()
            .filter(|r| month.contains(r.date) && self.roster.find(&r.doctor_id).is_none())
            .map(|r| (r.doctor_id.as_str(), r.doctor_name.as_str()))
            .collect();
        doctors.extend(unlisted.into_iter().map(|(id, name)| (id.to_string(), name.to_string())));

        Ok(doctors
            .iter()
            .map(|(id, name)| build_monthly_report(id, name, &records, month, self.rules()))
            .collect())
    }

    pub fn monthly_report(&self, month: ReportMonth, doctor_id: &str) -> Result<Option<MonthlyReport>, StoreError> {
        Ok(self
            .monthly_reports(month)?
            .into_iter()
            .find(|r| r.doctor_id == doctor_id))
    }

    pub fn export_reports(&self, month: ReportMonth, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let reports = self.monthly_reports(month)?;
        let mut written = Vec::with_capacity(reports.len());
        for report in &reports {
            written.push(write_report_csv(report, month, dir)?);
        }
        info!("Exported {} reports for {} to {:?}", written.len(), month, dir);
        Ok(written)
    }
}

fn unique_submission_id(now: NaiveDateTime, taken: &[SubmissionRecord]) -> String {
    loop {
        let id = generate_submission_id(now);
        if !taken.iter().any(|r| r.submission_id == id) {
            return id;
        }
    }
}
