//! Trade-date codecs.
//!
//! Dates cross the provider boundary in two spellings: compact `YYYYMMDD`
//! (query parameters) and dashed `YYYY-MM-DD` (response cells). Both are
//! accepted on input everywhere a task parameter carries a date.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::error::ValidationError;

const COMPACT: &[FormatItem<'_>] = format_description!("[year][month][day]");
const DASHED: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parses either date spelling.
pub fn parse_flex(value: &str) -> Result<Date, ValidationError> {
    let value = value.trim();
    let format = if value.contains('-') { DASHED } else { COMPACT };
    Date::parse(value, format).map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

/// Formats as `YYYYMMDD`.
pub fn compact(date: Date) -> String {
    date.format(COMPACT).unwrap_or_else(|_| date.to_string())
}

/// Formats as `YYYY-MM-DD`.
pub fn dashed(date: Date) -> String {
    date.format(DASHED).unwrap_or_else(|_| date.to_string())
}

/// Today's UTC date.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// First day of an inclusive trailing window ending at `end`: a 5-day window
/// ending Friday starts Monday.
pub fn window_start(end: Date, window_days: i64) -> Date {
    end - Duration::days(window_days.saturating_sub(1).max(0))
}
