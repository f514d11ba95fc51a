//! Calendar helpers
//!
//! Dates are stored as `YYYY-MM-DD` text so they sort and compare
//! lexicographically; instants are stored as Unix seconds.

use chrono::{DateTime, Days, NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored date
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// 00:00:00 UTC on `date`
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// First instant after `date` (exclusive end of the day, UTC)
pub fn end_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
    start_of_day_utc(next)
}

/// Unix seconds to UTC instant; `None` when out of range
pub fn secs_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
