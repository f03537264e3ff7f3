//! Calendar date → fundamental report period mapping.
//!
//! Disclosure deadlines drive the table: Q1 reports are due by Apr 30,
//! interim reports by Aug 30, Q3 reports by Oct 30. Annual reports are due
//! the following Apr 30 and are therefore never the freshest usable period.

use chrono::Datelike;
use sagres_traits::{Date, Result, SagresError};

/// Maps a calendar date to the most recently disclosed report period.
///
/// The returned date is a quarter-end label: month 5–8 → that year's 03-31,
/// month 9–10 → 06-30, month 11–12 → 09-30, month 1–4 → the prior year's
/// 09-30.
///
/// # Errors
///
/// Every month 1–12 is covered, so [`SagresError::UnmappableDate`] signals a
/// logic bug rather than bad input; the lookup fails loudly instead of
/// defaulting.
pub fn period_for(date: Date) -> Result<Date> {
    let y = date.year();
    let (py, pm, pd) = match date.month() {
        5..=8 => (y, 3, 31),
        9 | 10 => (y, 6, 30),
        11 | 12 => (y, 9, 30),
        1..=4 => (y - 1, 9, 30),
        _ => return Err(SagresError::UnmappableDate(date)),
    };
    Date::from_ymd_opt(py, pm, pd).ok_or(SagresError::UnmappableDate(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_branch_table() {
        assert_eq!(period_for(d(2020, 5, 1)).unwrap(), d(2020, 3, 31));
        assert_eq!(period_for(d(2020, 8, 31)).unwrap(), d(2020, 3, 31));
        assert_eq!(period_for(d(2020, 9, 1)).unwrap(), d(2020, 6, 30));
        assert_eq!(period_for(d(2020, 10, 30)).unwrap(), d(2020, 6, 30));
        assert_eq!(period_for(d(2020, 11, 2)).unwrap(), d(2020, 9, 30));
        assert_eq!(period_for(d(2020, 12, 31)).unwrap(), d(2020, 9, 30));
        assert_eq!(period_for(d(2021, 1, 4)).unwrap(), d(2020, 9, 30));
        assert_eq!(period_for(d(2021, 4, 30)).unwrap(), d(2020, 9, 30));
    }

    #[test]
    fn test_quarter_end_labels_only() {
        let mut date = d(2020, 1, 1);
        while date < d(2022, 1, 1) {
            let p = period_for(date).unwrap();
            let label = (p.month(), p.day());
            assert!(
                label == (3, 31) || label == (6, 30) || label == (9, 30),
                "unexpected label {p} for {date}"
            );
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_monotonic_over_full_cycle() {
        // Mapped periods never step backwards as the calendar advances.
        let mut date = d(2019, 1, 1);
        let mut prev = period_for(date).unwrap();
        while date < d(2021, 12, 31) {
            date = date.succ_opt().unwrap();
            let cur = period_for(date).unwrap();
            assert!(cur >= prev, "period regressed at {date}: {prev} -> {cur}");
            prev = cur;
        }
    }

    #[test]
    fn test_annual_report_never_used() {
        // No calendar date maps to a 12-31 period end.
        let mut date = d(2020, 1, 1);
        while date < d(2021, 1, 1) {
            let p = period_for(date).unwrap();
            assert_ne!((p.month(), p.day()), (12, 31));
            date = date.succ_opt().unwrap();
        }
    }
}
