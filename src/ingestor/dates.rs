//! Date disambiguation for human-authored spreadsheet cells
//!
//! Dates arrive as ISO strings, locale-ambiguous `d-m-y` / `m-d-y` tokens,
//! spreadsheet day serials or already-typed dates. [`resolve_date`] turns all
//! of them into a [`NaiveDate`] or rejects them.
//!
//! Positional rules for three numeric parts separated by `-` or `/`:
//!
//! - first part > 12: day-month-year
//! - second part > 12: month-day-year
//! - both ≤ 12: day-month-year (`01-11-2025` is 1 November)
//! - four-digit first part: year-month-day
//!
//! Two-digit years below 50 land in the 2000s, the rest in the 1900s. A
//! trailing time of day (`15/03/2024 10:30`) is ignored. Text that resolves
//! outside 1900..=9999 is rejected.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime};

use crate::models::CellValue;

/// Last serial representable as a calendar date (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Years accepted from text cells
const TEXT_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Formats tried after the positional rules give up
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Resolve a cell to an ISO `YYYY-MM-DD` string
pub fn resolve(value: &CellValue) -> Option<String> {
    resolve_date(value).map(|date| date.format("%Y-%m-%d").to_string())
}

pub fn resolve_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Empty => None,
        CellValue::Number(serial) => from_serial(*serial),
        CellValue::Date(date) => Some(*date),
        CellValue::Text(text) => parse_text(text),
    }
}

/// Convert a spreadsheet day serial using the 1899-12-30 epoch
///
/// Counting from the 30th absorbs the phantom 1900-02-29 that spreadsheet
/// serials include. Fractional time of day is discarded.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

pub fn parse_text(text: &str) -> Option<NaiveDate> {
    parse_any(text).filter(|date| TEXT_YEARS.contains(&date.year()))
}

fn parse_any(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_iso_date(trimmed) {
        return NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok();
    }

    if let Some(parts) = numeric_parts(strip_time_of_day(trimmed)) {
        return disambiguate(parts);
    }

    parse_fallback(trimmed)
}

fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

/// Drop a trailing `H:MM` or `H:MM:SS` token
fn strip_time_of_day(value: &str) -> &str {
    match value.rsplit_once(char::is_whitespace) {
        Some((date, time)) if is_time_of_day(time) => date.trim_end(),
        _ => value,
    }
}

fn is_time_of_day(value: &str) -> bool {
    let groups: Vec<&str> = value.split(':').collect();
    (2..=3).contains(&groups.len())
        && groups
            .iter()
            .all(|g| (1..=2).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Split on `-` or `/` into exactly three unsigned integers
fn numeric_parts(value: &str) -> Option<[u32; 3]> {
    let separator = if value.contains('-') {
        '-'
    } else if value.contains('/') {
        '/'
    } else {
        return None;
    };

    let parts: Vec<&str> = value.split(separator).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    Some(numbers)
}

fn disambiguate([first, second, third]: [u32; 3]) -> Option<NaiveDate> {
    let (year, month, day) = if first >= 1000 {
        (first, second, third)
    } else if first > 12 {
        (normalize_year(third), second, first)
    } else if second > 12 {
        (normalize_year(third), first, second)
    } else {
        (normalize_year(third), second, first)
    };

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

fn normalize_year(year: u32) -> u32 {
    match year {
        0..=49 => 2000 + year,
        50..=99 => 1900 + year,
        _ => year,
    }
}

fn parse_fallback(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        })
        .or_else(|| {
            // chrono's %Y takes a sign and padding, so compact dates need exact digits
            (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()))
                .then(|| NaiveDate::parse_from_str(value, "%Y%m%d").ok())
                .flatten()
        })
}
