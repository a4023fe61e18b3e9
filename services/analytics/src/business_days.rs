//! Business-day arithmetic.
//!
//! Whole-day differences excluding Saturdays and Sundays. No holiday
//! calendar; time-of-day never affects the result.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

/// Signed count of business days from `start` to `end`, computed on calendar
/// dates only. Negative when `end` precedes `start`.
pub fn business_days_between(end: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    let (from, to, sign) = if end >= start {
        (start.date_naive(), end.date_naive(), 1)
    } else {
        (end.date_naive(), start.date_naive(), -1)
    };

    sign * weekdays_in_range(from, to)
}

fn weekdays_in_range(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut days = 0;
    let mut current = from;
    while current < to {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}
