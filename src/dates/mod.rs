//! Lenient calendar-date parsing for spreadsheet and form input.
//!
//! Input is tried against an ordered list of strategies; the first one that
//! produces a date wins. Time of day is always discarded.

use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("empty date")]
    Empty,

    #[error("unsupported date format: {0}")]
    UnsupportedDateFormat(String),
}

/// Ways a date cell may be encoded, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStrategy {
    /// Day count since the spreadsheet epoch (1899-12-30), e.g. `45565`.
    SpreadsheetSerial,
    /// Human-written date with optional time-of-day and `г.` suffix.
    Decorated,
}

pub const STRATEGIES: [DateStrategy; 2] = [DateStrategy::SpreadsheetSerial, DateStrategy::Decorated];

const SERIAL_MIN_EXCLUSIVE: i64 = 20_000;
const SERIAL_MAX_EXCLUSIVE: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOrder {
    DayMonthYear,
    YearMonthDay,
}

/// One textual date layout: field order, separator and year width.
/// Day and month always accept one or two digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLayout {
    order: FieldOrder,
    separator: char,
    year_digits: usize,
}

impl DateLayout {
    const fn dmy(separator: char, year_digits: usize) -> Self {
        Self { order: FieldOrder::DayMonthYear, separator, year_digits }
    }

    const fn ymd(separator: char) -> Self {
        Self { order: FieldOrder::YearMonthDay, separator, year_digits: 4 }
    }

    fn parse(&self, text: &str) -> Option<NaiveDate> {
        let parts: Vec<&str> = text.split(self.separator).collect();
        let [a, b, c] = parts.as_slice() else {
            return None;
        };
        let (day, month, year) = match self.order {
            FieldOrder::DayMonthYear => (*a, *b, *c),
            FieldOrder::YearMonthDay => (*c, *b, *a),
        };

        let day = short_number(day)?;
        let month = short_number(month)?;
        if year.len() != self.year_digits || !all_ascii_digits(year) {
            return None;
        }
        let mut year: i32 = year.parse().ok()?;
        if self.year_digits == 2 {
            year += if year >= 69 { 1900 } else { 2000 };
        }

        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Layouts tried by the decorated strategy, after `/` has been folded into `.`.
pub const LAYOUTS: [DateLayout; 5] = [
    DateLayout::dmy('.', 4),
    DateLayout::dmy('.', 2),
    DateLayout::ymd('-'),
    DateLayout::dmy('-', 4),
    DateLayout::dmy('-', 2),
];

/// Parse a date written in any of the accepted forms.
pub fn parse_loose_date(text: &str) -> Result<NaiveDate, DateParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DateParseError::Empty);
    }

    STRATEGIES
        .iter()
        .find_map(|strategy| match strategy {
            DateStrategy::SpreadsheetSerial => from_serial(text),
            DateStrategy::Decorated => from_decorated(text),
        })
        .ok_or_else(|| DateParseError::UnsupportedDateFormat(text.to_string()))
}

/// Parse an optional date field; blank input is `Ok(None)`.
pub fn parse_optional_date(text: Option<&str>) -> Result<Option<NaiveDate>, DateParseError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_loose_date(value).map(Some),
    }
}

/// Add whole calendar years and months. A day past the end of the target
/// month rolls over into the next one (Jan 31 + 1 month in a leap year
/// lands on Mar 2, Feb 29 + 1 year on Mar 1).
pub fn add_years_months(date: NaiveDate, years: i32, months: u32) -> Option<NaiveDate> {
    let total = date.year() * 12 + date.month0() as i32 + years * 12 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_signed(Duration::days(i64::from(date.day()) - 1))
}

fn from_serial(text: &str) -> Option<NaiveDate> {
    if !all_ascii_digits(text) {
        return None;
    }
    let days: i64 = text.parse().ok()?;
    if days <= SERIAL_MIN_EXCLUSIVE || days >= SERIAL_MAX_EXCLUSIVE {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(days))
}

fn from_decorated(text: &str) -> Option<NaiveDate> {
    let cleaned = strip_decoration(text).replace('/', ".");
    LAYOUTS.iter().find_map(|layout| layout.parse(&cleaned))
}

/// Drop a trailing time/zone part and a trailing `г.` year marker.
fn strip_decoration(text: &str) -> String {
    let mut s = text.trim();
    if let Some(idx) = s.find(['T', ' ']) {
        let tail = &s[idx + 1..];
        if tail.contains([':', 'Z', '+', '-']) {
            s = &s[..idx];
        }
    }

    let s = s.trim();
    let s = s.strip_suffix(" г.").or_else(|| s.strip_suffix(" г")).unwrap_or(s).trim();
    let s = s.strip_suffix("г.").unwrap_or(s).trim();
    let s = s.strip_suffix('г').unwrap_or(s).trim();
    s.to_string()
}

fn short_number(part: &str) -> Option<u32> {
    if part.is_empty() || part.len() > 2 || !all_ascii_digits(part) {
        return None;
    }
    part.parse().ok()
}

fn all_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
