//! Calendar helpers shared by the proxies and the client

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Wire format for ISO calendar days
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a zero-padded `YYYY-MM-DD` calendar day
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let padded = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !padded {
        return None;
    }
    NaiveDate::parse_from_str(value, ISO_DATE_FORMAT).ok()
}

/// Unix seconds at `date`T00:00:00Z
#[must_use]
pub fn start_of_day_unix(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp()
}

/// Unix seconds at `date`T23:59:59Z
#[must_use]
pub fn end_of_day_unix(date: NaiveDate) -> i64 {
    start_of_day_unix(date) + 86_399
}

/// UTC calendar day containing the given Unix timestamp
#[must_use]
pub fn day_of_unix(timestamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

/// Format as `dd-mm-yyyy`, the date format of Provider A's history endpoint
#[must_use]
pub fn to_ddmmyyyy(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}
