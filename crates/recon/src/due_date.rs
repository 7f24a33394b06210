//! Billing-calendar rule.
//!
//! A due date is valid when it falls on a base day (5th, 10th or 15th by
//! default), or on the Monday right after a base day that landed on a
//! Saturday or Sunday. All arithmetic is on UTC calendar dates.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::RuleConfig;
use crate::model::{BillingRecord, CellValue};
use crate::normalize::parse_due_date;

/// Due-date check with the default calendar.
pub fn has_due_date_error(record: &BillingRecord) -> bool {
    RuleConfig::default().has_due_date_error(record)
}

/// True when the raw cell is unparsable or off-calendar.
pub fn due_date_error(raw: &CellValue, base_days: &[u32]) -> bool {
    match parse_due_date(raw) {
        Some(date) => !is_valid_due_date(date, base_days),
        None => true,
    }
}

pub fn is_valid_due_date(date: NaiveDate, base_days: &[u32]) -> bool {
    if base_days.contains(&date.day()) {
        return true;
    }

    if date.weekday() == Weekday::Mon {
        let sunday = date.pred_opt();
        let saturday = sunday.and_then(|d| d.pred_opt());
        return [sunday, saturday]
            .into_iter()
            .flatten()
            .any(|d| base_days.contains(&d.day()));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [u32; 3] = [5, 10, 15];

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn base_days_always_valid() {
        // Friday, Monday, Saturday
        assert!(is_valid_due_date(ymd(2024, 1, 5), &BASE));
        assert!(is_valid_due_date(ymd(2024, 6, 10), &BASE));
        assert!(is_valid_due_date(ymd(2024, 6, 15), &BASE));
    }

    #[test]
    fn monday_after_saturday_base_day() {
        // 2024-10-05 is a Saturday
        assert!(is_valid_due_date(ymd(2024, 10, 7), &BASE));
        // 2025-11-15 is a Saturday
        assert!(is_valid_due_date(ymd(2025, 11, 17), &BASE));
    }

    #[test]
    fn monday_after_sunday_base_day() {
        // 2024-05-05 is a Sunday
        assert!(is_valid_due_date(ymd(2024, 5, 6), &BASE));
        // 2025-01-05 is a Sunday
        assert!(is_valid_due_date(ymd(2025, 1, 6), &BASE));
    }

    #[test]
    fn off_calendar_days_are_errors() {
        // Thursday the 7th
        assert!(!is_valid_due_date(ymd(2024, 3, 7), &BASE));
        // Tuesday the 11th
        assert!(!is_valid_due_date(ymd(2024, 6, 11), &BASE));
        // Monday the 18th, weekend was 16/17
        assert!(!is_valid_due_date(ymd(2024, 3, 18), &BASE));
    }

    #[test]
    fn monday_on_first_of_month_rolls_back_across_months() {
        // 2024-07-01 Monday; weekend was June 29/30
        assert!(!is_valid_due_date(ymd(2024, 7, 1), &BASE));
        // 2024-12-02 Monday; weekend was Nov 30 / Dec 1
        assert!(!is_valid_due_date(ymd(2024, 12, 2), &BASE));
        // With the 30th as a base day the Monday after is accepted
        assert!(is_valid_due_date(ymd(2024, 7, 1), &[30]));
        assert!(is_valid_due_date(ymd(2024, 12, 2), &[30]));
    }

    #[test]
    fn unparsable_raw_is_error() {
        assert!(due_date_error(&"N/A".into(), &BASE));
        assert!(due_date_error(&CellValue::Empty, &BASE));
    }

    #[test]
    fn raw_serial_and_text_agree() {
        // 45572 = 2024-10-07 (Monday after Saturday the 5th)
        assert!(!due_date_error(&CellValue::Number(45572.0), &BASE));
        assert!(!due_date_error(&"07/10/2024".into(), &BASE));
        assert!(due_date_error(&CellValue::Number(45358.0), &BASE));
    }
}
