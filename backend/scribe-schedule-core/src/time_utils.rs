// src/time_utils.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TIME_FORMAT: &str = "%H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time format '{value}'. Use HH:MM")]
    InvalidTimeFormat { value: String },
    #[error("End time {end} must be after start time {start}")]
    InvalidTimeOrder { start: NaiveTime, end: NaiveTime },
    #[error("Invalid month '{value}'. Use YYYY-MM")]
    InvalidMonth { value: String },
}

/// Parses a wall-clock `HH:MM` string.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, TimeError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| {
        TimeError::InvalidTimeFormat {
            value: value.to_string(),
        }
    })
}

/// `9:00` becomes `09:00`; unreadable values are only trimmed.
pub fn normalise_hhmm(value: &str) -> String {
    parse_hhmm(value)
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|_| value.trim().to_string())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn minutes_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Duration between two `HH:MM` strings in minutes.
///
/// An end before the start is read as falling on the following day. Only this
/// helper is lenient; session validation rejects such pairs outright.
pub fn duration_minutes(start: &str, end: &str) -> Result<i64, TimeError> {
    Ok(ClockSpan::parse(start, end)?.minutes())
}

/// A start/end pair of wall-clock times, parsed once and compared by minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ClockSpan {
    /// Checks the format of both ends only; the order is not enforced.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Ok(Self {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    /// Strict variant used by validation: the end must come after the start.
    pub fn parse_ordered(start: &str, end: &str) -> Result<Self, TimeError> {
        let span = Self::parse(start, end)?;
        if span.end <= span.start {
            return Err(TimeError::InvalidTimeOrder {
                start: span.start,
                end: span.end,
            });
        }
        Ok(span)
    }

    pub fn start_minute(&self) -> i64 {
        minutes_of_day(self.start)
    }

    pub fn end_minute(&self) -> i64 {
        minutes_of_day(self.end)
    }

    /// Lenient length in minutes, wrapping past midnight.
    pub fn minutes(&self) -> i64 {
        let raw = self.end_minute() - self.start_minute();
        if raw < 0 {
            raw + MINUTES_PER_DAY
        } else {
            raw
        }
    }

    /// Half-open `[start, end)` intersection test.
    pub fn overlaps(&self, other: &ClockSpan) -> bool {
        self.start_minute() < other.end_minute() && other.start_minute() < self.end_minute()
    }

    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }
}

pub fn minutes_to_hours(minutes: i64) -> Decimal {
    Decimal::from(minutes) / dec!(60)
}

/// `6.0h` style label used in report cells.
pub fn format_hours_label(hours: Decimal) -> String {
    format!("{:.1}h", hours.round_dp(1))
}

/// `H:MM` label, e.g. `6:00` for 360 minutes.
pub fn format_hours_minutes(total_minutes: i64) -> String {
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// Totals over a set of sessions. Only well-formed, strictly ordered spans count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationInfo {
    pub total_minutes: i64,
    pub total_hours: Decimal,
    pub formatted: String,
    pub average_session_minutes: i64,
    pub valid_sessions: usize,
}

impl DurationInfo {
    pub fn empty() -> Self {
        Self {
            total_minutes: 0,
            total_hours: dec!(0.0),
            formatted: format_hours_minutes(0),
            average_session_minutes: 0,
            valid_sessions: 0,
        }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut total_minutes = 0;
        let mut valid_sessions = 0usize;
        for (start, end) in pairs {
            if let Ok(span) = ClockSpan::parse_ordered(start, end) {
                total_minutes += span.minutes();
                valid_sessions += 1;
            }
        }
        if valid_sessions == 0 {
            return Self::empty();
        }
        Self {
            total_minutes,
            total_hours: minutes_to_hours(total_minutes).round_dp(2),
            formatted: format_hours_minutes(total_minutes),
            average_session_minutes: total_minutes / valid_sessions as i64,
            valid_sessions,
        }
    }
}

/// A calendar month used to scope analytics and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, TimeError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(TimeError::InvalidMonth {
                value: format!("{}-{:02}", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// Parses `YYYY-MM`.
    pub fn parse(value: &str) -> Result<Self, TimeError> {
        let invalid = || TimeError::InvalidMonth {
            value: value.to_string(),
        };
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn num_days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first_day();
        (0..self.num_days()).map(move |offset| first + Duration::days(i64::from(offset)))
    }

    /// `July 2025`
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    /// `July_2025`, used in export file names.
    pub fn file_label(&self) -> String {
        self.first_day().format("%B_%Y").to_string()
    }
}

impl std::fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}
