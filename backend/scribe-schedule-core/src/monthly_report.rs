// src/monthly_report.rs
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScheduleRules;
use crate::session::SubmissionRecord;
use crate::submission_store::{io_context, StoreError};
use crate::time_utils::{format_hours_label, minutes_to_hours, parse_hhmm, ReportMonth};

/// One spreadsheet cell. Off flags stay boolean for the sheet writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportCell {
    Flag(bool),
    Text(String),
}

impl fmt::Display for ReportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportCell::Flag(true) => write!(f, "TRUE"),
            ReportCell::Flag(false) => write!(f, "FALSE"),
            ReportCell::Text(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotValues {
    pub off: bool,
    pub start_time: String,
    pub end_time: String,
    pub total: String,
}

impl SlotValues {
    fn off(placeholder: &str) -> Self {
        Self {
            off: true,
            start_time: placeholder.to_string(),
            end_time: placeholder.to_string(),
            total: placeholder.to_string(),
        }
    }

    fn active(record: &SubmissionRecord) -> Self {
        Self {
            off: false,
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            total: format_hours_label(minutes_to_hours(record.duration_minutes())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub date_label: String,
    pub day_name: String,
    pub slots: Vec<SlotValues>,
    pub daily_total: String,
    pub scribes: String,
    pub patient_numbers: String,
}

impl ReportRow {
    pub fn cells(&self) -> Vec<ReportCell> {
        let mut cells = vec![
            ReportCell::Text(self.date_label.clone()),
            ReportCell::Text(self.day_name.clone()),
        ];
        for slot in &self.slots {
            cells.push(ReportCell::Flag(slot.off));
            cells.push(ReportCell::Text(slot.start_time.clone()));
            cells.push(ReportCell::Text(slot.end_time.clone()));
            cells.push(ReportCell::Text(slot.total.clone()));
        }
        cells.push(ReportCell::Text(self.daily_total.clone()));
        cells.push(ReportCell::Text(self.scribes.clone()));
        cells.push(ReportCell::Text(self.patient_numbers.clone()));
        cells
    }
}

/// Calendar-shaped report for one doctor and month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    pub doctor_id: String,
    pub doctor_name: String,
    pub month_label: String,
    pub monthly_total_hours: Decimal,
    pub monthly_total_label: String,
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
    /// Days whose sessions did not all fit in the slot columns.
    pub warnings: Vec<String>,
}

impl MonthlyReport {
    pub fn grid(&self) -> Vec<Vec<ReportCell>> {
        self.rows.iter().map(|row| row.cells()).collect()
    }
}

pub fn report_headers(slots: usize) -> Vec<String> {
    let mut headers = vec!["Date".to_string(), "Day".to_string()];
    for _ in 0..slots {
        headers.extend(
            ["Off Session", "Start Time", "End Time", "Session Total"]
                .iter()
                .map(|h| h.to_string()),
        );
    }
    headers.extend(
        ["DAILY TOTAL HOURS", "Scribes", "Patient Nos"]
            .iter()
            .map(|h| h.to_string()),
    );
    headers
}

/// `1-Jul-25`
pub fn date_label(date: NaiveDate) -> String {
    format!("{}-{}", date.day(), date.format("%b-%y"))
}

/// Places a day's sessions into `slots` columns.
///
/// A lone session goes to the first slot when it starts at or before
/// `cutoff` (or its start cannot be read) and to the second otherwise.
/// Several sessions fill the slots in start-time order; anything past the
/// last slot is dropped and must be flagged by the caller.
pub fn place_sessions<'a>(
    day_sessions: &[&'a SubmissionRecord],
    slots: usize,
    cutoff: NaiveTime,
) -> Vec<Option<&'a SubmissionRecord>> {
    let mut placed: Vec<Option<&SubmissionRecord>> = vec![None; slots];
    if slots == 0 {
        return placed;
    }
    match day_sessions {
        [] => {}
        [only] => {
            let index = match parse_hhmm(&only.start_time) {
                Ok(start) if start > cutoff && slots > 1 => 1,
                _ => 0,
            };
            placed[index] = Some(*only);
        }
        several => {
            let mut ordered: Vec<&SubmissionRecord> = several.to_vec();
            ordered.sort_by_key(|r| match parse_hhmm(&r.start_time) {
                Ok(start) => (0, Some(start)),
                Err(_) => (1, None),
            });
            for (slot, record) in placed.iter_mut().zip(ordered) {
                *slot = Some(record);
            }
        }
    }
    placed
}

pub fn build_row(date: NaiveDate, day_sessions: &[&SubmissionRecord], rules: &ScheduleRules) -> ReportRow {
    let placeholder = rules.off_session_placeholder.as_str();
    let placed = place_sessions(day_sessions, rules.max_sessions_per_day, rules.morning_cutoff_time);

    let active: Vec<&SubmissionRecord> = placed.iter().flatten().copied().collect();
    let slots = placed
        .iter()
        .map(|slot| match slot {
            Some(record) => SlotValues::active(record),
            None => SlotValues::off(placeholder),
        })
        .collect();

    let active_minutes: i64 = active.iter().map(|r| r.duration_minutes()).sum();
    let (scribes, patient_numbers) = if active.is_empty() {
        (placeholder.to_string(), placeholder.to_string())
    } else {
        (
            active.iter().map(|r| r.scribe_name.as_str()).collect::<Vec<_>>().join(", "),
            active
                .iter()
                .map(|r| format!("#{}", r.patient_number))
                .collect::<Vec<_>>()
                .join(", "),
        )
    };

    ReportRow {
        date,
        date_label: date_label(date),
        day_name: date.format("%A").to_string(),
        slots,
        daily_total: format_hours_label(minutes_to_hours(active_minutes)),
        scribes,
        patient_numbers,
    }
}

/// Builds one row per calendar day of `month` from a single doctor's records.
pub fn build_monthly_report(
    doctor_id: &str,
    doctor_name: &str,
    records: &[SubmissionRecord],
    month: ReportMonth,
    rules: &ScheduleRules,
) -> MonthlyReport {
    let in_month: Vec<&SubmissionRecord> = records
        .iter()
        .filter(|r| r.doctor_id == doctor_id && month.contains(r.date))
        .collect();

    let mut rows = Vec::with_capacity(month.num_days() as usize);
    let mut warnings = Vec::new();
    for date in month.days() {
        let day_sessions: Vec<&SubmissionRecord> =
            in_month.iter().copied().filter(|r| r.date == date).collect();
        if day_sessions.len() > rules.max_sessions_per_day {
            let message = format!(
                "{}: {} sessions recorded, only the first {} are shown",
                date, day_sessions.len(), rules.max_sessions_per_day
            );
            warn!("Report for {}: {}", doctor_id, message);
            warnings.push(message);
        }
        rows.push(build_row(date, &day_sessions, rules));
    }

    // Same rule as the day cells: an end before the start wraps past midnight.
    let total_hours = minutes_to_hours(in_month.iter().map(|r| r.duration_minutes()).sum()).round_dp(2);

    MonthlyReport {
        doctor_id: doctor_id.to_string(),
        doctor_name: doctor_name.to_string(),
        month_label: month.label(),
        monthly_total_hours: total_hours,
        monthly_total_label: format_hours_label(total_hours),
        headers: report_headers(rules.max_sessions_per_day),
        rows,
        warnings,
    }
}

pub fn report_file_name(month: ReportMonth, doctor_id: &str) -> String {
    format!("{}_{}.csv", month.file_label(), doctor_id)
}

/// Writes a title row, the header row and the day rows to `dir`.
pub fn write_report_csv(report: &MonthlyReport, month: ReportMonth, dir: &Path) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir).map_err(|e| io_context(e, format!("creating {}", dir.display())))?;
    let path = dir.join(report_file_name(month, &report.doctor_id));

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&path)?;
    writer.write_record([
        report.month_label.as_str(),
        report.doctor_name.as_str(),
        report.monthly_total_label.as_str(),
    ])?;
    writer.write_record(&report.headers)?;
    for row in &report.rows {
        writer.write_record(row.cells().iter().map(|c| c.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| io_context(e, format!("flushing {}", path.display())))?;

    info!("Exported {} report for {} to {}", report.month_label, report.doctor_id, path.display());
    Ok(path)
}
