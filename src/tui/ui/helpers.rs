//! Shared UI helper functions

use chrono::{DateTime, Local, Utc};

/// Format a timestamp as local wall-clock time (HH:MM)
pub fn format_time(dttm: DateTime<Utc>) -> String {
    dttm.with_timezone(&Local).format("%H:%M").to_string()
}

/// Format a timestamp as a local day heading (e.g. "1 May 2024")
///
/// Used for the day separators that group same-day messages.
pub fn format_day(dttm: DateTime<Utc>) -> String {
    dttm.with_timezone(&Local).format("%-d %B %Y").to_string()
}

/// Whether two timestamps fall on the same local day
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Local).date_naive() == b.with_timezone(&Local).date_naive()
}
