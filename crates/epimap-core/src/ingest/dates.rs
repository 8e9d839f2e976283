//! Date-column conventions of the two raw layouts.
//!
//! Row tables name date columns `M/D/YYYY` (year suffix); embedded boundary
//! properties use ISO `YYYY-MM-DD`. Anything else is not a date column and is
//! skipped without complaint.

use chrono::NaiveDate;

/// Parse a row-table header such as `4/15/2020`.
pub fn parse_table_date(column: &str) -> Option<NaiveDate> {
    let mut parts = column.trim().split('/');
    let (m, d, y) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if m.is_empty() || m.len() > 2 || d.is_empty() || d.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Parse an embedded property key such as `2020-04-15`.
pub fn parse_property_date(key: &str) -> Option<NaiveDate> {
    if key.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Collect `(date, payload)` pairs, sort ascending and keep the first payload
/// seen for any repeated date.
pub fn sorted_unique<T>(mut pairs: Vec<(NaiveDate, T)>) -> Vec<(NaiveDate, T)> {
    // Stable sort keeps source order among equal dates.
    pairs.sort_by_key(|(d, _)| *d);
    pairs.dedup_by(|later, earlier| later.0 == earlier.0);
    pairs
}
