// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp helpers.
//!
//! Stage stores keep timestamps as fixed-width ISO 8601 strings with
//! millisecond precision (`2026-01-01T00:00:00.000Z`), so lexicographic
//! comparison in SQL matches chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC instant in the store's canonical form.
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in the store's canonical form.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Parse a stored timestamp. Accepts any RFC 3339 offset.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical timestamp for `now - age`, used as a housekeeping cutoff.
pub fn cutoff_ts(now: DateTime<Utc>, age: std::time::Duration) -> String {
    let age = Duration::from_std(age).unwrap_or(Duration::MAX);
    format_ts(now.checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC))
}

/// Seconds expressed as hours rounded to one decimal place.
pub fn hours_1dp(secs: u64) -> f64 {
    (secs as f64 / 360.0).round() / 10.0
}
