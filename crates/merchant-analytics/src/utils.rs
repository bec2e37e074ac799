//! Cell-level coercion helpers shared by ingestion and filtering.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// Numeric Coercion
// =============================================================================

/// Parse a cell as a finite number.
///
/// Anything else (empty, text, `NaN`, infinities) is a missing value.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a cell as a non-negative whole count.
///
/// `"3"` and `"3.0"` both give `3`; `"-1"`, `"2.5"` and text are missing.
pub fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(exact) = raw.trim().parse::<u64>() {
        return Some(exact);
    }
    let value = parse_amount(raw)?;
    // `u64::MAX as f64` rounds up to 2^64, which is already out of range.
    if value < 0.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return None;
    }
    Some(value as u64)
}

// =============================================================================
// Derived Columns
// =============================================================================

/// `1` iff the status reads "success", ignoring case and surrounding blanks.
pub fn success_flag(status: Option<&str>) -> u8 {
    match status {
        Some(s) if s.trim().eq_ignore_ascii_case("success") => 1,
        _ => 0,
    }
}

// Trailing all-caps word, e.g. "Mama Put Kitchen IKEJA" -> "IKEJA".
static LOCATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{2,})\s*$").expect("Invalid regex: trailing location"));

/// Extract the location token from a merchant name, if it ends in one.
pub fn extract_location(merchant_name: &str) -> Option<String> {
    LOCATION_PATTERN
        .captures(merchant_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// =============================================================================
// Date Coercion
// =============================================================================

/// Parse a date cell with the first matching format.
///
/// Formats carrying a time component are parsed as datetimes and truncated.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(trimmed, fmt).ok().or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, fmt)
                .ok()
                .map(|dt| dt.date())
        })
    })
}

/// Distinct values in first-appearance order.
pub fn distinct_in_order<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value) {
            out.push(value.to_string());
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
