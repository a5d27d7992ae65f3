use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{HealthError, HealthResult};

/// One dated health measurement as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: NaiveDate,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDate, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Averaged value for one weekday.
///
/// `representative_date` is only meant for deriving the weekday label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekdaySummary {
    pub representative_date: NaiveDate,
    pub value: f64,
}

impl WeekdaySummary {
    pub fn weekday(&self) -> Weekday {
        self.representative_date.weekday()
    }

    /// 1 = Sunday .. 7 = Saturday.
    pub fn weekday_number(&self) -> u32 {
        self.weekday().number_from_sunday()
    }

    pub fn label(&self) -> &'static str {
        weekday_label(self.weekday())
    }
}

impl Serialize for WeekdaySummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WeekdaySummary", 4)?;
        state.serialize_field("weekday", &self.weekday_number())?;
        state.serialize_field("label", self.label())?;
        state.serialize_field("representative_date", &self.representative_date)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Steps,
    Weight,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Steps, MetricKind::Weight];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Steps => "steps",
            MetricKind::Weight => "weight",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Steps => "steps",
            MetricKind::Weight => "lbs",
        }
    }

    /// Steps accumulate over a day; weight readings are averaged.
    pub fn is_cumulative(&self) -> bool {
        matches!(self, MetricKind::Steps)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steps" | "step_count" => Ok(MetricKind::Steps),
            "weight" | "body_mass" => Ok(MetricKind::Weight),
            other => Err(format!("unknown metric '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Authorized => "authorized",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "authorized" => AuthorizationStatus::Authorized,
            "denied" => AuthorizationStatus::Denied,
            _ => AuthorizationStatus::NotDetermined,
        }
    }
}

/// Longest window accepted for a range query, roughly ten years.
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The `days` calendar days ending at `end`, inclusive. `days` below one
    /// is treated as one; windows longer than [`MAX_WINDOW_DAYS`] or reaching
    /// before the earliest representable date are rejected.
    pub fn last_days(end: NaiveDate, days: i64) -> HealthResult<Self> {
        if days > MAX_WINDOW_DAYS {
            return Err(HealthError::InvalidWindow(days));
        }
        let start = Duration::try_days(days.max(1) - 1)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or(HealthError::InvalidWindow(days))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn last_days_is_inclusive() {
        let range = DateRange::last_days(date(2025, 6, 28), 28).unwrap();
        assert_eq!(range.start, date(2025, 6, 1));
        assert_eq!(range.days().count(), 28);
        assert!(range.contains(date(2025, 6, 1)));
        assert!(!range.contains(date(2025, 5, 31)));
    }

    #[test]
    fn last_days_clamps_to_one_day() {
        let range = DateRange::last_days(date(2025, 6, 28), 0).unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(range.days().count(), 1);
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let end = date(2025, 6, 28);
        assert!(matches!(
            DateRange::last_days(end, 1_000_000_000),
            Err(HealthError::InvalidWindow(1_000_000_000))
        ));
        assert!(matches!(
            DateRange::last_days(end, i64::MAX),
            Err(HealthError::InvalidWindow(_))
        ));

        let widest = DateRange::last_days(end, MAX_WINDOW_DAYS).unwrap();
        assert_eq!(widest.days().count() as i64, MAX_WINDOW_DAYS);
    }

    #[test]
    fn windows_before_the_earliest_date_are_rejected() {
        assert!(matches!(
            DateRange::last_days(NaiveDate::MIN, 2),
            Err(HealthError::InvalidWindow(2))
        ));
    }

    #[test]
    fn summary_labels_follow_date() {
        let summary = WeekdaySummary {
            representative_date: date(2025, 6, 15),
            value: 1.0,
        };
        assert_eq!(summary.label(), "Sun");
        assert_eq!(summary.weekday_number(), 1);
    }

    #[test]
    fn metric_kind_parses_aliases() {
        assert_eq!("Steps".parse::<MetricKind>(), Ok(MetricKind::Steps));
        assert_eq!("body_mass".parse::<MetricKind>(), Ok(MetricKind::Weight));
        assert!("calories".parse::<MetricKind>().is_err());
    }
}
