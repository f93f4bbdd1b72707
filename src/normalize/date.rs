//! Clinical date normalization.
//!
//! Form dates arrive in whatever layout the host project was configured with,
//! and the host does not reliably tell us which one. We therefore:
//!
//! - accept canonical `YYYY-MM-DD` directly (no ambiguity to resolve)
//! - otherwise try an ordered list of candidate layouts, narrowed by the hint
//!   when one is supplied
//!
//! Parsing is strict: a candidate only wins if it yields a real calendar date
//! (`32/01/2020` never rolls over into February).

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{CanonicalDate, FormatHint};
use crate::error::CentileError;

const ISO_FORMAT: &str = "%Y-%m-%d";

const DMY_FORMATS: [&str; 3] = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"];
const MDY_FORMATS: [&str; 2] = ["%m-%d-%Y", "%m/%d/%Y"];
const YMD_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

// Year-first comes before day/month-first so `2024-03-05` is never read as a day.
const UNHINTED_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y",
];

// Datetime fields: the time of day is accepted and dropped.
const UNHINTED_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M",
    "%m-%d-%Y %H:%M",
];

/// Parse a clinical date string of unknown layout into a canonical date.
pub fn normalize(raw: &str, hint: Option<FormatHint>) -> Result<CanonicalDate, CentileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CentileError::EmptyDate);
    }

    let invalid = || CentileError::InvalidDateFormat {
        raw: raw.to_string(),
        hint,
    };

    if is_iso_shaped(trimmed) {
        return NaiveDate::parse_from_str(trimmed, ISO_FORMAT)
            .map(CanonicalDate::new)
            .map_err(|_| invalid());
    }

    let date_formats: &[&str] = match hint {
        Some(FormatHint::Dmy) => &DMY_FORMATS,
        Some(FormatHint::Mdy) => &MDY_FORMATS,
        Some(FormatHint::Ymd) => &YMD_FORMATS,
        None => &UNHINTED_DATE_FORMATS,
    };

    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(CanonicalDate::new(d));
        }
    }

    if hint.is_none() {
        for fmt in UNHINTED_DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(CanonicalDate::new(dt.date()));
            }
        }
    }

    Err(invalid())
}

/// `YYYY-MM-DD`, digits only.
fn is_iso_shaped(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}
