// src/analytics.rs
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::config::ScheduleRules;
use crate::session::SubmissionRecord;
use crate::time_utils::{minutes_to_hours, ReportMonth};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub session_count: usize,
    pub hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorTotal {
    pub session_count: usize,
    pub hours: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayStatus {
    HasSessions,
    WeekendOff,
    WeekdayOff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub session_count: usize,
    pub hours: Decimal,
    pub is_weekend: bool,
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub weekday: String,
    pub session_count: usize,
}

/// Month-level rollup over stored sessions. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyAnalytics {
    pub month: String,
    pub total_sessions: usize,
    pub total_hours: Decimal,
    pub weekend_sessions: usize,
    pub weekday_sessions: usize,
    pub average_session_minutes: Decimal,
    pub days_with_sessions: usize,
    pub days_without_sessions: usize,
    pub busiest_day: Option<DayTotal>,
    pub most_hours_day: Option<DayTotal>,
    pub daily: Vec<DayTotal>,
    pub doctor_breakdown: BTreeMap<String, DoctorTotal>,
    pub weekday_breakdown: Vec<WeekdayCount>,
    pub calendar: Vec<CalendarDay>,
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Reduces `records` that fall inside `month`. Records outside the month are
/// ignored; malformed times count as zero minutes. Ties for busiest and
/// most-hours day go to the earliest date.
pub fn aggregate(records: &[SubmissionRecord], month: ReportMonth, rules: &ScheduleRules) -> MonthlyAnalytics {
    let in_month: Vec<&SubmissionRecord> = records.iter().filter(|r| month.contains(r.date)).collect();

    let mut total_minutes = 0i64;
    let mut weekend_sessions = 0usize;
    let mut per_day: BTreeMap<NaiveDate, (usize, i64)> = BTreeMap::new();
    let mut per_doctor: BTreeMap<String, (usize, i64)> = BTreeMap::new();
    let mut per_weekday = [0usize; 7];

    for record in &in_month {
        let minutes = record.duration_minutes();
        total_minutes += minutes;
        if rules.is_weekend(record.date) {
            weekend_sessions += 1;
        }

        let day = per_day.entry(record.date).or_insert((0, 0));
        day.0 += 1;
        day.1 += minutes;

        let doctor = per_doctor.entry(record.doctor_name.clone()).or_insert((0, 0));
        doctor.0 += 1;
        doctor.1 += minutes;

        per_weekday[record.date.weekday().num_days_from_monday() as usize] += 1;
    }

    let daily: Vec<DayTotal> = per_day
        .iter()
        .map(|(date, (count, minutes))| DayTotal {
            date: *date,
            session_count: *count,
            hours: minutes_to_hours(*minutes).round_dp(2),
        })
        .collect();

    let mut busiest_day: Option<&DayTotal> = None;
    let mut most_hours_day: Option<&DayTotal> = None;
    for day in &daily {
        if busiest_day.map_or(true, |b| day.session_count > b.session_count) {
            busiest_day = Some(day);
        }
        if most_hours_day.map_or(true, |m| day.hours > m.hours) {
            most_hours_day = Some(day);
        }
    }

    let total_sessions = in_month.len();
    let average_session_minutes = if total_sessions == 0 {
        dec!(0)
    } else {
        (Decimal::from(total_minutes) / Decimal::from(total_sessions)).round_dp(1)
    };

    let calendar = month
        .days()
        .map(|date| {
            let (session_count, minutes) = per_day.get(&date).copied().unwrap_or((0, 0));
            let is_weekend = rules.is_weekend(date);
            let status = if session_count > 0 {
                DayStatus::HasSessions
            } else if is_weekend {
                DayStatus::WeekendOff
            } else {
                DayStatus::WeekdayOff
            };
            CalendarDay {
                date,
                session_count,
                hours: minutes_to_hours(minutes).round_dp(1),
                is_weekend,
                status,
            }
        })
        .collect();

    MonthlyAnalytics {
        month: month.to_string(),
        total_sessions,
        total_hours: minutes_to_hours(total_minutes).round_dp(2),
        weekend_sessions,
        weekday_sessions: total_sessions - weekend_sessions,
        average_session_minutes,
        days_with_sessions: per_day.len(),
        days_without_sessions: month.num_days() as usize - per_day.len(),
        busiest_day: busiest_day.cloned(),
        most_hours_day: most_hours_day.cloned(),
        doctor_breakdown: per_doctor
            .into_iter()
            .map(|(name, (count, minutes))| {
                (
                    name,
                    DoctorTotal {
                        session_count: count,
                        hours: minutes_to_hours(minutes).round_dp(2),
                    },
                )
            })
            .collect(),
        weekday_breakdown: WEEK
            .iter()
            .map(|day| WeekdayCount {
                weekday: weekday_name(*day).to_string(),
                session_count: per_weekday[day.num_days_from_monday() as usize],
            })
            .collect(),
        daily,
        calendar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn july() -> ReportMonth {
        ReportMonth::parse("2025-07").unwrap()
    }

    fn record(doctor: &str, date: &str, start: &str, end: &str) -> SubmissionRecord {
        SubmissionRecord {
            submission_id: format!("SUB_{}_{}", date, start),
            doctor_id: doctor.to_string(),
            doctor_name: format!("Clinic | {} | Doe", doctor),
            date: d(date),
            start_time: start.to_string(),
            end_time: end.to_string(),
            scribe_name: "Alice".to_string(),
            patient_number: 1,
            submitted_by: "jsmith".to_string(),
            submitted_time: "2025-07-01 08:00:00".to_string(),
        }
    }

    #[test]
    fn empty_input_yields_zeroed_analytics() {
        let analytics = aggregate(&[], july(), &ScheduleRules::default());
        assert_eq!(analytics.total_sessions, 0);
        assert_eq!(analytics.total_hours, Decimal::ZERO);
        assert_eq!(analytics.average_session_minutes, Decimal::ZERO);
        assert_eq!(analytics.days_with_sessions, 0);
        assert_eq!(analytics.days_without_sessions, 31);
        assert!(analytics.busiest_day.is_none());
        assert!(analytics.most_hours_day.is_none());
        assert!(analytics.daily.is_empty());
        assert!(analytics.doctor_breakdown.is_empty());
        assert_eq!(analytics.calendar.len(), 31);
        assert!(analytics.weekday_breakdown.iter().all(|w| w.session_count == 0));
    }

    #[test]
    fn totals_and_weekend_split() {
        let records = vec![
            record("ann", "2025-07-28", "09:00", "12:00"),
            record("ann", "2025-07-28", "14:00", "17:00"),
            record("ann", "2025-07-26", "10:00", "11:30"),
            record("ann", "2025-08-01", "10:00", "11:00"),
        ];
        let analytics = aggregate(&records, july(), &ScheduleRules::default());
        assert_eq!(analytics.total_sessions, 3);
        assert_eq!(analytics.total_hours, dec!(7.5));
        assert_eq!(analytics.weekend_sessions, 1);
        assert_eq!(analytics.weekday_sessions, 2);
        assert_eq!(analytics.average_session_minutes, dec!(150));
        assert_eq!(analytics.days_with_sessions, 2);
        assert_eq!(analytics.days_without_sessions, 29);
    }

    #[test]
    fn malformed_times_count_as_zero() {
        let records = vec![
            record("ann", "2025-07-28", "09:00", "12:00"),
            record("ann", "2025-07-29", "nine", "12:00"),
        ];
        let analytics = aggregate(&records, july(), &ScheduleRules::default());
        assert_eq!(analytics.total_sessions, 2);
        assert_eq!(analytics.total_hours, dec!(3));
        assert_eq!(analytics.average_session_minutes, dec!(90));
    }

    #[test]
    fn busiest_and_most_hours_days_prefer_earliest_on_ties() {
        let records = vec![
            record("ann", "2025-07-15", "09:00", "10:00"),
            record("ann", "2025-07-15", "11:00", "12:00"),
            record("ann", "2025-07-03", "09:00", "10:00"),
            record("ann", "2025-07-03", "13:00", "14:00"),
            record("ann", "2025-07-20", "08:00", "16:00"),
        ];
        let analytics = aggregate(&records, july(), &ScheduleRules::default());
        let busiest = analytics.busiest_day.unwrap();
        assert_eq!(busiest.date, d("2025-07-03"));
        assert_eq!(busiest.session_count, 2);
        let most_hours = analytics.most_hours_day.unwrap();
        assert_eq!(most_hours.date, d("2025-07-20"));
        assert_eq!(most_hours.hours, dec!(8));
    }

    #[test]
    fn doctor_and_weekday_breakdowns() {
        let records = vec![
            record("ann", "2025-07-28", "09:00", "12:00"),
            record("bob", "2025-07-28", "09:00", "10:00"),
            record("bob", "2025-07-29", "09:00", "10:30"),
        ];
        let analytics = aggregate(&records, july(), &ScheduleRules::default());
        let bob = &analytics.doctor_breakdown["Clinic | bob | Doe"];
        assert_eq!(bob.session_count, 2);
        assert_eq!(bob.hours, dec!(2.5));
        assert_eq!(analytics.weekday_breakdown[0].weekday, "Monday");
        assert_eq!(analytics.weekday_breakdown[0].session_count, 2);
        assert_eq!(analytics.weekday_breakdown[1].session_count, 1);
    }

    #[test]
    fn calendar_marks_each_day() {
        let records = vec![record("ann", "2025-07-28", "09:00", "09:50")];
        let analytics = aggregate(&records, july(), &ScheduleRules::default());
        let by_date = |s: &str| analytics.calendar.iter().find(|c| c.date == d(s)).unwrap().clone();
        let worked = by_date("2025-07-28");
        assert_eq!(worked.status, DayStatus::HasSessions);
        assert_eq!(worked.hours, dec!(0.8));
        assert_eq!(by_date("2025-07-26").status, DayStatus::WeekendOff);
        assert_eq!(by_date("2025-07-29").status, DayStatus::WeekdayOff);
    }
}
