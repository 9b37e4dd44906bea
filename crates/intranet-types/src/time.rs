//! Timestamp and date parsing shared by the stores and the HTTP layer.
//!
//! Timestamps are stored as RFC 3339 UTC text with second precision so that
//! lexical order in SQLite equals chronological order. Dates are stored as
//! `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

/// Naive layouts accepted from clients (e.g. `<input type="datetime-local">`).
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parses a client timestamp. Offset-less input is taken as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimeError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TimeError::InvalidTimestamp(input.to_string()))
}

/// Renders a timestamp the way it is stored and returned.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| TimeError::InvalidDate(input.to_string()))
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Current time, truncated the same way stored timestamps are.
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn rfc3339_is_normalized_to_utc() {
        let ts = parse_timestamp("2025-03-10T09:30:00-03:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2025-03-10T12:30:00Z");
    }

    #[test]
    fn naive_input_is_treated_as_utc() {
        let ts = parse_timestamp("2025-03-10T09:30").unwrap();
        assert_eq!(ts.hour(), 9);
        assert_eq!(ts.minute(), 30);
        assert_eq!(format_timestamp(&ts), "2025-03-10T09:30:00Z");

        let spaced = parse_timestamp("2025-03-10 09:30:15").unwrap();
        assert_eq!(spaced.second(), 15);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(
            parse_timestamp("next tuesday"),
            Err(TimeError::InvalidTimestamp("next tuesday".to_string()))
        );
        assert!(parse_date("10/03/2025").is_err());
    }

    #[test]
    fn dates_round_trip_through_text() {
        let date = parse_date("1990-02-28").unwrap();
        assert_eq!(date.month(), 2);
        assert_eq!(format_date(&date), "1990-02-28");
    }
}
