// src/config.rs
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::time_utils::{parse_hhmm, TIME_FORMAT};

//=============================================================================
// Errors
//=============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

//=============================================================================
// Scheduling rules
//=============================================================================

/// Business rule constants. Every field can be overridden with the upper-case
/// environment variable of the same name, e.g. `MAX_SESSIONS_PER_DAY=3`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleRules {
    #[serde(default = "default_min_session_duration_minutes")]
    pub min_session_duration_minutes: i64,
    #[serde(default = "default_max_session_duration_minutes")]
    pub max_session_duration_minutes: i64,
    #[serde(default = "default_max_sessions_per_day")]
    pub max_sessions_per_day: usize,
    /// Monday = 0
    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<u8>,
    #[serde(
        default = "default_morning_cutoff_time",
        deserialize_with = "deserialize_hhmm",
        serialize_with = "serialize_hhmm"
    )]
    pub morning_cutoff_time: NaiveTime,
    #[serde(default = "default_scribe_name_min_length")]
    pub scribe_name_min_length: usize,
    #[serde(default = "default_scribe_name_max_length")]
    pub scribe_name_max_length: usize,
    #[serde(default = "default_patient_number_min")]
    pub patient_number_min: i64,
    #[serde(default = "default_patient_number_max")]
    pub patient_number_max: i64,
    #[serde(default = "default_off_session_placeholder")]
    pub off_session_placeholder: String,
    #[serde(default = "default_future_date_warning_days")]
    pub future_date_warning_days: i64,
}

fn default_min_session_duration_minutes() -> i64 {
    30
}
fn default_max_session_duration_minutes() -> i64 {
    480
}
fn default_max_sessions_per_day() -> usize {
    2
}
fn default_weekend_days() -> Vec<u8> {
    vec![5, 6]
}
fn default_morning_cutoff_time() -> NaiveTime {
    NaiveTime::from_hms_opt(11, 59, 0).unwrap_or(NaiveTime::MIN)
}
fn default_scribe_name_min_length() -> usize {
    2
}
fn default_scribe_name_max_length() -> usize {
    50
}
fn default_patient_number_min() -> i64 {
    1
}
fn default_patient_number_max() -> i64 {
    999_999
}
fn default_off_session_placeholder() -> String {
    "-".to_string()
}
fn default_future_date_warning_days() -> i64 {
    365
}

fn deserialize_hhmm<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_hhmm(&raw).map_err(serde::de::Error::custom)
}

fn serialize_hhmm<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self {
            min_session_duration_minutes: default_min_session_duration_minutes(),
            max_session_duration_minutes: default_max_session_duration_minutes(),
            max_sessions_per_day: default_max_sessions_per_day(),
            weekend_days: default_weekend_days(),
            morning_cutoff_time: default_morning_cutoff_time(),
            scribe_name_min_length: default_scribe_name_min_length(),
            scribe_name_max_length: default_scribe_name_max_length(),
            patient_number_min: default_patient_number_min(),
            patient_number_max: default_patient_number_max(),
            off_session_placeholder: default_off_session_placeholder(),
            future_date_warning_days: default_future_date_warning_days(),
        }
    }
}

impl ScheduleRules {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let rules = envy::from_env::<ScheduleRules>()?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_session_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "MIN_SESSION_DURATION_MINUTES must be positive".into(),
            ));
        }
        if self.min_session_duration_minutes >= self.max_session_duration_minutes {
            return Err(ConfigError::Invalid(format!(
                "MIN_SESSION_DURATION_MINUTES ({}) must be below MAX_SESSION_DURATION_MINUTES ({})",
                self.min_session_duration_minutes, self.max_session_duration_minutes
            )));
        }
        if self.max_sessions_per_day < 1 {
            return Err(ConfigError::Invalid(
                "MAX_SESSIONS_PER_DAY must be at least 1".into(),
            ));
        }
        if let Some(day) = self.weekend_days.iter().find(|d| **d > 6) {
            return Err(ConfigError::Invalid(format!(
                "WEEKEND_DAYS entry {} is outside 0 (Monday) ..= 6 (Sunday)",
                day
            )));
        }
        if self.scribe_name_min_length > self.scribe_name_max_length {
            return Err(ConfigError::Invalid(
                "SCRIBE_NAME_MIN_LENGTH exceeds SCRIBE_NAME_MAX_LENGTH".into(),
            ));
        }
        if self.patient_number_min < 1 || self.patient_number_min > self.patient_number_max {
            return Err(ConfigError::Invalid(format!(
                "Patient number bounds [{}, {}] are invalid",
                self.patient_number_min, self.patient_number_max
            )));
        }
        if self.patient_number_max > i64::from(u32::MAX) {
            return Err(ConfigError::Invalid(format!(
                "PATIENT_NUMBER_MAX ({}) exceeds the stored maximum {}",
                self.patient_number_max,
                u32::MAX
            )));
        }
        if self.off_session_placeholder.is_empty() {
            return Err(ConfigError::Invalid(
                "OFF_SESSION_PLACEHOLDER must not be empty".into(),
            ));
        }
        if self.future_date_warning_days < 0 {
            return Err(ConfigError::Invalid(
                "FUTURE_DATE_WARNING_DAYS must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        let index = date.weekday().num_days_from_monday() as u8;
        self.weekend_days.contains(&index)
    }
}

//=============================================================================
// Application settings
//=============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_submissions_file")]
    pub submissions_file: PathBuf,
    #[serde(default = "default_doctors_file")]
    pub doctors_file: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_submitted_by")]
    pub submitted_by: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_submissions_file() -> PathBuf {
    PathBuf::from("data/submissions.csv")
}
fn default_doctors_file() -> PathBuf {
    PathBuf::from("data/doctors.csv")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    3000
}
fn default_submitted_by() -> String {
    "jsmith".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Ok(envy::from_env::<AppConfig>()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
