//! Display helpers for counts, dates and stats

use chrono::{DateTime, Utc};

use crate::data::Stats;

/// Abbreviates a count: verbatim below 1000, then one decimal with K or M
///
/// Rounds half up on the integer value, so 1,450 is "1.5K" and 999,950
/// becomes "1.0M" rather than "1000.0K".
pub fn format_number(num: u64) -> String {
    if num < 1_000 {
        return num.to_string();
    }

    // Widened so rounding cannot overflow near u64::MAX
    let num = u128::from(num);
    let thousand_tenths = (num + 50) / 100;
    if thousand_tenths < 10_000 {
        return format!("{}.{}K", thousand_tenths / 10, thousand_tenths % 10);
    }

    let million_tenths = (num + 50_000) / 100_000;
    format!("{}.{}M", million_tenths / 10, million_tenths % 10)
}

/// Formats a timestamp as `YYYY-MM-DD`, or "N/A"
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "N/A".to_string(),
    }
}

/// One-line summary of stats, e.g. "1.5K DL | 3 releases"
pub fn describe_stats(stats: &Stats) -> String {
    match stats.download_count() {
        Some(downloads) => format!(
            "{} DL | {} releases | latest {}",
            format_number(downloads),
            stats.releases,
            format_date(stats.latest_release)
        ),
        None => "Failed / No releases".to_string(),
    }
}
