//! Key normalization: raw identifier, name, date and amount cells into
//! canonical comparable values.

use chrono::{Datelike, NaiveDate};

use crate::model::{CellValue, NormalizedKey};

/// Phrases billing systems use for "this patient has no record number".
pub const NO_IDENTIFIER_PHRASES: &[&str] = &["sin h.c", "sin hc", "sin historia"];

/// Normalize a raw identifier cell.
///
/// HC "0" and free-text "sin HC" are billable identities of their own, so
/// they are kept apart from `Absent` rather than folded into it.
pub fn normalize_identifier(raw: &CellValue) -> NormalizedKey {
    if raw.is_blank() {
        return NormalizedKey::Absent;
    }
    let s = raw.to_string().trim().to_lowercase();
    if s.is_empty() {
        return NormalizedKey::Absent;
    }
    if NO_IDENTIFIER_PHRASES.iter().any(|p| s.contains(p)) {
        return NormalizedKey::NoIdentifier(s);
    }
    match first_digit_run(&s) {
        Some(digits) => match digits.parse::<u64>() {
            Ok(0) => NormalizedKey::ZeroIdentifier(s),
            Ok(n) => NormalizedKey::Numeric(n),
            // Longer than any u64: not a record number we can compare numerically.
            Err(_) => NormalizedKey::Freeform(s),
        },
        None => NormalizedKey::Freeform(s),
    }
}

/// Textual form of a key that normalizes back to the same key.
pub fn normalize_identifier_display(key: &NormalizedKey) -> String {
    match key {
        NormalizedKey::Numeric(n) => n.to_string(),
        NormalizedKey::ZeroIdentifier(s)
        | NormalizedKey::NoIdentifier(s)
        | NormalizedKey::Freeform(s) => s.clone(),
        NormalizedKey::Absent => String::new(),
    }
}

fn first_digit_run(s: &str) -> Option<&str> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Uppercased, trimmed name; empty for null cells. Accents are not folded.
pub fn normalize_name(raw: &CellValue) -> String {
    if raw.is_blank() {
        return String::new();
    }
    raw.to_string().trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FieldOrder {
    DayMonthYear,
    YearMonthDay,
}

#[derive(Debug, Clone, Copy)]
struct DateLayout {
    separator: char,
    order: FieldOrder,
    year_digits: usize,
}

/// Day-before-month throughout. Tried in order; first success wins.
const DATE_LAYOUTS: [DateLayout; 5] = [
    DateLayout { separator: '/', order: FieldOrder::DayMonthYear, year_digits: 4 },
    DateLayout { separator: '-', order: FieldOrder::DayMonthYear, year_digits: 4 },
    DateLayout { separator: '-', order: FieldOrder::YearMonthDay, year_digits: 4 },
    DateLayout { separator: '/', order: FieldOrder::DayMonthYear, year_digits: 2 },
    DateLayout { separator: '-', order: FieldOrder::DayMonthYear, year_digits: 2 },
];

/// Native dates pass through, date-times are truncated, text is parsed
/// against the known layouts. Anything else is absent.
pub fn normalize_date(raw: &CellValue) -> Option<NaiveDate> {
    match raw {
        CellValue::Date(d) => Some(*d),
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Text(s) => {
            let s = s.trim();
            DATE_LAYOUTS.iter().find_map(|layout| parse_layout(s, layout))
        }
        CellValue::Empty | CellValue::Number(_) => None,
    }
}

fn parse_layout(s: &str, layout: &DateLayout) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(layout.separator).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    let (day, month, year) = match layout.order {
        FieldOrder::DayMonthYear => (parts[0], parts[1], parts[2]),
        FieldOrder::YearMonthDay => (parts[2], parts[1], parts[0]),
    };
    if day.len() > 2 || month.len() > 2 || year.len() != layout.year_digits {
        return None;
    }
    let mut year: i32 = year.parse().ok()?;
    if layout.year_digits == 2 {
        // Two-digit years pivot at 69: 00-68 -> 2000s, 69-99 -> 1900s.
        year += if year < 69 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Render a date the way the reports show it.
pub fn display_date(date: &NaiveDate) -> String {
    format!("{:02}/{:02}/{}", date.day(), date.month(), date.year())
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse an amount cell into cents.
///
/// Text follows the single supported cleaning rule: drop `$` and spaces,
/// treat `.` as a thousands separator and `,` as the decimal mark
/// (`"9.528,62 $"` -> 952862). Returns `None` for blank or unparseable cells.
pub fn parse_amount_cents(raw: &CellValue) -> Option<i64> {
    match raw {
        CellValue::Number(n) if n.is_finite() => Some((n * 100.0).round() as i64),
        CellValue::Text(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ' ' | '\u{a0}' | '.'))
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| (v * 100.0).round() as i64)
        }
        _ => None,
    }
}
