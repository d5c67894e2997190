use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use super::window::QueryWindow;

/// Compute the missing date range for an entity group from the dates
/// already stored. The watermark is `max(existing)`; backfill runs from
/// the day after it through yesterday. Returns `None` when the store is
/// already current through yesterday.
///
/// The caller is responsible for seeding an initial backfill horizon;
/// an empty `existing` set never reaches this function.
pub fn resolve(existing: &BTreeSet<NaiveDate>, today: NaiveDate) -> Option<QueryWindow> {
    let watermark = *existing.iter().next_back()?;
    let start = watermark.checked_add_days(Days::new(1))?;
    let end = today.checked_sub_days(Days::new(1))?;
    if start > end {
        return None;
    }
    Some(QueryWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dates(days: &[NaiveDate]) -> BTreeSet<NaiveDate> {
        days.iter().copied().collect()
    }

    #[test]
    fn current_through_yesterday_resolves_to_none() {
        let today = d(2024, 3, 12);
        let existing = dates(&[d(2024, 3, 9), d(2024, 3, 10), d(2024, 3, 11)]);
        assert_eq!(resolve(&existing, today), None);
    }

    #[test]
    fn two_day_gap_resolves_to_two_day_window() {
        let today = d(2024, 3, 12);
        let existing = dates(&[d(2024, 3, 8), d(2024, 3, 9)]);
        let window = resolve(&existing, today).unwrap();
        assert_eq!(window.start, d(2024, 3, 10));
        assert_eq!(window.end, d(2024, 3, 11));
        assert_eq!(window.days(), 2);
    }

    #[test]
    fn watermark_is_max_not_latest_inserted() {
        let today = d(2024, 3, 12);
        let existing = dates(&[d(2024, 3, 10), d(2024, 2, 1), d(2024, 3, 5)]);
        let window = resolve(&existing, today).unwrap();
        assert_eq!(window.start, d(2024, 3, 11));
        assert_eq!(window.end, d(2024, 3, 11));
    }

    #[test]
    fn gap_spanning_month_boundary() {
        let today = d(2023, 11, 28);
        let existing = dates(&[d(2023, 10, 7)]);
        let window = resolve(&existing, today).unwrap();
        assert_eq!(window.start, d(2023, 10, 8));
        assert_eq!(window.end, d(2023, 11, 27));
    }
}
