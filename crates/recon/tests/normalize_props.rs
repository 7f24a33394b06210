// Property-based tests for normalization, transformation and filter state.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;

use tuition_recon::due_date::is_valid_due_date;
use tuition_recon::filter::ErrorFilter;
use tuition_recon::normalize::{format_due_date, parse_currency, parse_due_date, round_to};
use tuition_recon::transform::{record_from_row, CONTRACT_WIDTH};
use tuition_recon::{CellValue, ErrorKind};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1950i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    })
}

/// `1234567` -> `1.234.567`
fn with_thousands(mut n: u64) -> String {
    let mut groups = Vec::new();
    loop {
        groups.push(n % 1000);
        n /= 1000;
        if n == 0 {
            break;
        }
    }
    let mut out = groups.pop().unwrap().to_string();
    while let Some(g) = groups.pop() {
        out.push_str(&format!(".{g:03}"));
    }
    out
}

fn arb_amount() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        1 => -5000.0..0.0f64,
        4 => 0.01..50_000.0f64,
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn brl_currency_text_parses(units in 0u64..100_000_000, cents in 0u64..100) {
        let text = format!("R$ {},{cents:02}", with_thousands(units));
        let parsed = parse_currency(&CellValue::text(text.clone()));
        let expected = units as f64 + cents as f64 / 100.0;
        prop_assert!((parsed - expected).abs() < 1e-6, "{text} -> {parsed}");
    }

    #[test]
    fn numeric_currency_passes_through(n in -1e9..1e9f64) {
        prop_assert_eq!(parse_currency(&CellValue::Number(n)), n);
    }

    #[test]
    fn currency_never_panics(s in ".{0,24}") {
        let v = parse_currency(&CellValue::text(s));
        prop_assert!(v.is_finite());
    }

    #[test]
    fn exponent_text_amounts_stay_finite(s in "-?[0-9]{1,4}(,[0-9]{1,2})?[eE][+-]?[0-9]{1,4}") {
        prop_assert!(parse_currency(&CellValue::text(s)).is_finite());
    }

    #[test]
    fn day_month_year_format_roundtrip(date in arb_date()) {
        let text = date.format("%d/%m/%Y").to_string();
        let cell = CellValue::text(text.clone());
        prop_assert_eq!(parse_due_date(&cell), Some(date));
        prop_assert_eq!(format_due_date(&cell), text);
    }

    #[test]
    fn base_days_are_always_valid(date in arb_date(), base in prop::sample::select(vec![5u32, 10, 15])) {
        let d = date.with_day(base).unwrap();
        prop_assert!(is_valid_due_date(d, &[5, 10, 15]));
    }

    #[test]
    fn only_mondays_are_valid_off_base(date in arb_date()) {
        if is_valid_due_date(date, &[5, 10, 15]) && ![5, 10, 15].contains(&date.day()) {
            prop_assert_eq!(date.weekday(), chrono::Weekday::Mon);
        }
    }

    #[test]
    fn differences_follow_rounding_rules(billed in arb_amount(), minimum in arb_amount()) {
        let mut row = vec![CellValue::Empty; CONTRACT_WIDTH];
        row[2] = CellValue::text("Ana");
        row[14] = CellValue::Number(billed);
        row[16] = CellValue::Number(minimum);
        let r = record_from_row(&row);

        prop_assert_eq!(r.diff_abs, round_to(billed - minimum, 2));
        if billed <= 0.0 {
            prop_assert_eq!(r.diff_percent, 0.0);
        } else {
            prop_assert_eq!(r.diff_percent, round_to((billed - minimum) / billed * 100.0, 1));
        }
    }

    #[test]
    fn error_filter_keeps_one_kind_enabled(toggles in prop::collection::vec(any::<bool>(), 0..32)) {
        let mut filter = ErrorFilter::default();
        for is_date in toggles {
            let kind = if is_date { ErrorKind::Date } else { ErrorKind::Value };
            let before = filter;
            if filter.toggle(kind).is_err() {
                prop_assert_eq!(filter, before);
            }
            prop_assert!(filter.date || filter.value);
        }
    }
}
