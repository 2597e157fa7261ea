//! Period planning
//!
//! Periods are calendar months, identified by their first day.

use chrono::{Datelike, Months, NaiveDate};

/// Compact period code format used in remote queries ("202501")
pub const PERIOD_CODE_FORMAT: &str = "%Y%m";

/// Storage format used for cleanup keys ("2025-01-01")
pub use khis_common::db::frame::DATE_FORMAT as STORAGE_FORMAT;

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First-of-month dates from `start`'s month through `end`, inclusive.
///
/// Empty when `start > end`.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    if start > end {
        return months;
    }

    let mut cursor = Some(first_of_month(start));
    while let Some(month) = cursor.filter(|m| *m <= end) {
        months.push(month);
        cursor = month.checked_add_months(Months::new(1));
    }
    months
}

/// Storage keys ("YYYY-MM-DD") for the given months
pub fn storage_keys(months: &[NaiveDate]) -> Vec<String> {
    months
        .iter()
        .map(|m| m.format(STORAGE_FORMAT).to_string())
        .collect()
}

/// Period codes ("YYYYMM") for the given months
pub fn period_codes(months: &[NaiveDate]) -> Vec<String> {
    months
        .iter()
        .map(|m| m.format(PERIOD_CODE_FORMAT).to_string())
        .collect()
}

/// Parse a "YYYYMM" period code into the first day of that month
pub fn parse_period_code(code: &str) -> Option<NaiveDate> {
    let code = code.trim();
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = code[..4].parse().ok()?;
    let month: u32 = code[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_single_day_yields_one_period() {
        assert_eq!(month_range(d(2025, 3, 17), d(2025, 3, 17)), vec![d(2025, 3, 1)]);
    }

    #[test]
    fn test_inclusive_count_across_year_boundary() {
        let months = month_range(d(2024, 11, 30), d(2025, 2, 1));
        assert_eq!(
            months,
            vec![d(2024, 11, 1), d(2024, 12, 1), d(2025, 1, 1), d(2025, 2, 1)]
        );
        assert!(months.iter().all(|m| m.day() == 1));
    }

    #[test]
    fn test_mid_month_end_still_includes_its_month() {
        let months = month_range(d(2025, 1, 31), d(2025, 3, 10));
        assert_eq!(months.len(), 3);
        assert_eq!(months.last(), Some(&d(2025, 3, 1)));
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert!(month_range(d(2025, 2, 1), d(2025, 1, 31)).is_empty());
        assert!(month_range(d(2025, 1, 15), d(2025, 1, 10)).is_empty());
    }

    #[test]
    fn test_length_matches_month_count() {
        for (start, end) in [
            (d(2020, 1, 1), d(2020, 12, 31)),
            (d(2019, 6, 15), d(2025, 1, 2)),
            (d(2024, 2, 29), d(2024, 3, 1)),
        ] {
            let expected = (end.year() - start.year()) * 12 + end.month() as i32
                - start.month() as i32
                + 1;
            assert_eq!(month_range(start, end).len() as i32, expected);
        }
    }

    #[test]
    fn test_renderings() {
        let months = vec![d(2025, 1, 1), d(2025, 12, 1)];
        assert_eq!(storage_keys(&months), vec!["2025-01-01", "2025-12-01"]);
        assert_eq!(period_codes(&months), vec!["202501", "202512"]);
    }

    #[test]
    fn test_parse_period_code() {
        assert_eq!(parse_period_code("202501"), Some(d(2025, 1, 1)));
        assert_eq!(parse_period_code("202513"), None);
        assert_eq!(parse_period_code("2025-01"), None);
    }
}
