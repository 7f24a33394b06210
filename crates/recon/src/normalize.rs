//! Currency and due-date normalization for raw spreadsheet cells.
//!
//! Nothing here fails: unparsable currency becomes `0.0`, unparsable dates
//! become `None`.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::model::CellValue;

/// Currency symbol stripped from text amounts (`R$ 1.234,56`).
pub const CURRENCY_PREFIX: &str = "R$";

/// Days between the 1900 spreadsheet epoch and 1970-01-01.
pub const SERIAL_EPOCH_OFFSET: f64 = 25569.0;

/// Largest serial offset (in days) accepted before giving up.
const MAX_SERIAL_DAYS: f64 = 100_000_000.0;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Parse a currency cell. Numbers pass through; text uses `.` thousands and
/// `,` decimal separators.
pub fn parse_currency(value: &CellValue) -> f64 {
    match value {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => {
            let sanitized = s
                .replacen(CURRENCY_PREFIX, "", 1)
                .trim()
                .replace('.', "")
                .replacen(',', ".", 1);
            parse_float_prefix(&sanitized).unwrap_or(0.0)
        }
        CellValue::Bool(_) | CellValue::Empty => 0.0,
    }
}

/// Parse the longest leading decimal number, ignoring trailing garbage.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos = 1;
            true
        }
        Some(b'+') => {
            pos = 1;
            false
        }
        _ => false,
    };

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_part = &s[int_start..pos];

    let mut frac_part = "";
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            frac_part = &s[frac_start..frac_end];
            pos = frac_end;
        }
    }

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut exp_part = String::new();
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp_end = pos + 1;
        let sign_len = usize::from(exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-'));
        exp_end += sign_len;
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            exp_part = format!("e{}", &s[pos + 1..exp_end]);
        }
    }

    let literal = format!(
        "{}{}.{}{}",
        if negative { "-" } else { "" },
        if int_part.is_empty() { "0" } else { int_part },
        if frac_part.is_empty() { "0" } else { frac_part },
        exp_part,
    );
    // `1e400` or a few hundred digits overflow to infinity
    literal.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a leading integer (optional sign, then digits), ignoring the rest.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse::<i64>().ok()
}

// ---------------------------------------------------------------------------
// Due dates
// ---------------------------------------------------------------------------

/// Resolve a due-date cell to a UTC calendar date.
///
/// Order: `day/month/year` text, spreadsheet serial number, generic text.
pub fn parse_due_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Text(s) => {
            if s.contains('/') {
                if let Some(date) = parse_day_month_year(s) {
                    return Some(date);
                }
            }
            parse_generic_date(s)
        }
        CellValue::Number(n) => serial_to_date(*n),
        CellValue::Bool(_) | CellValue::Empty => None,
    }
}

/// Render a due date as `dd/mm/yyyy`, or the raw value when unparsable.
pub fn format_due_date(value: &CellValue) -> String {
    match parse_due_date(value) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => value.to_display_string(),
    }
}

/// `dd/mm/yyyy`, with out-of-range components rolling over the calendar
/// (`31/02/2024` is 2024-03-02).
fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let day = parse_int_prefix(parts[0])?;
    let month = parse_int_prefix(parts[1])?;
    let year = i32::try_from(parse_int_prefix(parts[2])?).ok()?;

    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let month_shift = month - 1;
    let shifted = if month_shift >= 0 {
        start.checked_add_months(Months::new(u32::try_from(month_shift).ok()?))?
    } else {
        start.checked_sub_months(Months::new(u32::try_from(-month_shift).ok()?))?
    };
    shifted.checked_add_signed(TimeDelta::try_days(day - 1)?)
}

/// 1900-epoch spreadsheet serial to a UTC calendar date. The fractional part
/// (time of day) is dropped.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = (serial - SERIAL_EPOCH_OFFSET).floor();
    if days.abs() > MAX_SERIAL_DAYS {
        return None;
    }
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(TimeDelta::try_days(days as i64)?)
}

fn parse_generic_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Non-finite amounts (NaN, ±inf) count as zero. Persisted records must stay
/// finite: JSON has no encoding for them.
pub fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Number-to-string coercion: integral values print without a fraction.
pub fn number_text(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
