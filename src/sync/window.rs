use chrono::{Datelike, Months, NaiveDate, NaiveTime};

/// Inclusive date range identified as missing from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QueryWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

fn midnight_utc_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Convert a backfill window into the vendor's query timestamps, one
/// per calendar month the window spans (epoch milliseconds, UTC
/// midnight). Each timestamp is documented by the vendor to return a
/// full month of daily-granularity data, so the caller must discard
/// days outside the window after normalization.
pub fn query_times(window: &QueryWindow) -> Vec<i64> {
    let month_diff = (window.end.year() - window.start.year()) * 12
        + (window.end.month() as i32 - window.start.month() as i32);

    if month_diff == 0 {
        return vec![midnight_utc_ms(window.start)];
    }

    let first_of_month = window.start.with_day(1).expect("day 1 always valid");
    (0..=month_diff as u32)
        .map(|i| {
            let month_start = first_of_month
                .checked_add_months(Months::new(i))
                .expect("window months within calendar range");
            midnight_utc_ms(month_start)
        })
        .collect()
}
