//! Date helper functions

use chrono::{DateTime, NaiveDate};

/// Format a content-source date string for display.
///
/// Accepts `YYYY-MM-DD` or RFC 3339 timestamps; anything else is shown as-is.
///
/// # Examples
/// ```ignore
/// display_date("2024-01-15", "%B %d, %Y") // -> "January 15, 2024"
/// ```
pub fn display_date(date: &str, format: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return date.format(format).to_string();
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(date) {
        return datetime.format(format).to_string();
    }
    date.to_string()
}

/// Machine-readable value for a `<time datetime>` attribute
pub fn date_xml(date: &str) -> String {
    DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
        .unwrap_or_else(|_| date.to_string())
}
