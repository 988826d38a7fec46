// src/submission_store.rs
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::session::{SessionUpdate, SubmissionRecord, SUBMISSION_COLUMNS};
use crate::time_utils::TIMESTAMP_FORMAT;

// --- Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("CSV processing error")]
    Csv(#[from] csv::Error),

    #[error("Submissions file {path:?} is missing columns: {missing:?}")]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("Invalid submission record: {0}")]
    InvalidRecord(String),
}

// Helper to create context-aware IO errors
pub fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> StoreError {
    StoreError::Io {
        source: source.into(),
        context: context.into(),
    }
}

// --- Store contract ---

/// Whole-batch persistence for submitted sessions.
pub trait SubmissionStore {
    fn load_submissions(
        &self,
        doctor_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<SubmissionRecord>, StoreError>;

    /// Appends all records or none of them.
    fn append_submissions(&mut self, records: &[SubmissionRecord]) -> Result<(), StoreError>;

    /// Returns `false` when no record carries `submission_id`.
    fn update_submission(
        &mut self,
        submission_id: &str,
        update: &SessionUpdate,
        refreshed_at: NaiveDateTime,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when no record carries `submission_id`.
    fn delete_submission(&mut self, submission_id: &str) -> Result<bool, StoreError>;
}

/// `SUB_<YYYYMMDD>_<HHMMSS>_<6 hex>`
pub fn generate_submission_id(now: NaiveDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
    format!("SUB_{}_{:06X}", now.format("%Y%m%d_%H%M%S"), suffix)
}

pub fn format_timestamp(now: NaiveDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

fn matches_filter(record: &SubmissionRecord, doctor_id: Option<&str>, date: Option<NaiveDate>) -> bool {
    doctor_id.map_or(true, |id| record.doctor_id == id) && date.map_or(true, |d| record.date == d)
}

fn check_new_records(existing: &[SubmissionRecord], records: &[SubmissionRecord]) -> Result<(), StoreError> {
    let mut seen: BTreeSet<&str> = existing.iter().map(|r| r.submission_id.as_str()).collect();
    for record in records {
        if record.submission_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord("empty submission_id".into()));
        }
        if !seen.insert(record.submission_id.as_str()) {
            return Err(StoreError::InvalidRecord(format!(
                "duplicate submission_id {}",
                record.submission_id
            )));
        }
    }
    Ok(())
}

// --- CSV backend ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_submissions: usize,
    pub unique_doctors: usize,
    pub date_range: Option<DateRange>,
    pub file_size_kb: Decimal,
}

/// Flat-file store. Every write rewrites the whole file.
#[derive(Debug, Clone)]
pub struct CsvSubmissionStore {
    path: PathBuf,
}

impl CsvSubmissionStore {
    /// Opens the store, creating the file with its header row when absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        store.ensure_file_exists()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_file_exists(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create submissions directory: {:?}", parent))
            })?;
        }
        self.write_all(&[])?;
        info!("Created submissions file {:?}", self.path);
        Ok(())
    }

    /// Reads every well-formed row; malformed rows are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<SubmissionRecord>, StoreError> {
        let file = File::open(&self.path)
            .map_err(|e| io_context(e, format!("Failed to open submissions file: {:?}", self.path)))?;
        let mut reader = csv::Reader::from_reader(file);

        let missing = missing_columns(reader.headers()?);
        if !missing.is_empty() {
            return Err(StoreError::MissingColumns {
                path: self.path.clone(),
                missing,
            });
        }

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<SubmissionRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed row {} in {:?}: {}", line + 2, self.path, e),
            }
        }
        debug!("Loaded {} submissions from {:?}", records.len(), self.path);
        Ok(records)
    }

    fn write_all(&self, records: &[SubmissionRecord]) -> Result<(), StoreError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        writer.write_record(SUBMISSION_COLUMNS)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer
            .flush()
            .map_err(|e| io_context(e, format!("Failed to write submissions file: {:?}", self.path)))
    }

    /// `Ok(true)` when the header row carries every expected column.
    pub fn validate_structure(&self) -> Result<bool, StoreError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let missing = missing_columns(reader.headers()?);
        if !missing.is_empty() {
            warn!("Submissions file {:?} is missing columns {:?}", self.path, missing);
        }
        Ok(missing.is_empty())
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.read_all()?;
        let size = fs::metadata(&self.path)
            .map_err(|e| io_context(e, format!("Failed to read metadata: {:?}", self.path)))?
            .len();

        let doctors: BTreeSet<&str> = records.iter().map(|r| r.doctor_id.as_str()).collect();
        let earliest = records.iter().map(|r| r.date).min();
        let latest = records.iter().map(|r| r.date).max();

        Ok(StoreStats {
            total_submissions: records.len(),
            unique_doctors: doctors.len(),
            date_range: earliest.zip(latest).map(|(earliest, latest)| DateRange { earliest, latest }),
            file_size_kb: (Decimal::from(size) / Decimal::from(1024)).round_dp(2),
        })
    }
}

fn missing_columns(headers: &csv::StringRecord) -> Vec<String> {
    SUBMISSION_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h.trim() == **column))
        .map(|column| column.to_string())
        .collect()
}

impl SubmissionStore for CsvSubmissionStore {
    fn load_submissions(
        &self,
        doctor_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let records = self.read_all()?;
        Ok(records
            .into_iter()
            .filter(|r| matches_filter(r, doctor_id, date))
            .collect())
    }

    fn append_submissions(&mut self, records: &[SubmissionRecord]) -> Result<(), StoreError> {
        let mut all = self.read_all()?;
        check_new_records(&all, records)?;
        all.extend_from_slice(records);
        self.write_all(&all).map_err(|e| {
            error!("Failed to append {} submissions to {:?}: {}", records.len(), self.path, e);
            e
        })?;
        info!("Appended {} submissions to {:?}", records.len(), self.path);
        Ok(())
    }

    fn update_submission(
        &mut self,
        submission_id: &str,
        update: &SessionUpdate,
        refreshed_at: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut all = self.read_all()?;
        let Some(record) = all.iter_mut().find(|r| r.submission_id == submission_id) else {
            warn!("Submission {} not found for update", submission_id);
            return Ok(false);
        };
        update.apply_to(record);
        record.submitted_time = format_timestamp(refreshed_at);
        self.write_all(&all)?;
        info!("Updated submission {}", submission_id);
        Ok(true)
    }

    fn delete_submission(&mut self, submission_id: &str) -> Result<bool, StoreError> {
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|r| r.submission_id != submission_id);
        if all.len() == before {
            warn!("Submission {} not found for deletion", submission_id);
            return Ok(false);
        }
        self.write_all(&all)?;
        info!("Deleted submission {}", submission_id);
        Ok(true)
    }
}

// --- In-memory backend ---

/// Same contract as the CSV store, kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubmissionStore {
    records: Vec<SubmissionRecord>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SubmissionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn load_submissions(
        &self,
        doctor_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| matches_filter(r, doctor_id, date))
            .cloned()
            .collect())
    }

    fn append_submissions(&mut self, records: &[SubmissionRecord]) -> Result<(), StoreError> {
        check_new_records(&self.records, records)?;
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn update_submission(
        &mut self,
        submission_id: &str,
        update: &SessionUpdate,
        refreshed_at: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        match self.records.iter_mut().find(|r| r.submission_id == submission_id) {
            Some(record) => {
                update.apply_to(record);
                record.submitted_time = format_timestamp(refreshed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_submission(&mut self, submission_id: &str) -> Result<bool, StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.submission_id != submission_id);
        Ok(self.records.len() != before)
    }
}
