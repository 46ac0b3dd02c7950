//! Business-day arithmetic over weekends and bank holidays

use chrono::{Datelike, Days, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate, holidays: &[NaiveDate]) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

/// Step back from `from` one calendar day at a time until `n` business days
/// have been counted, and return the last one counted. `n == 0` returns `from`.
pub fn subtract_business_days(from: NaiveDate, n: u32, holidays: &[NaiveDate]) -> NaiveDate {
    let mut date = from;
    let mut counted = 0;

    while counted < n {
        date = match date.checked_sub_days(Days::new(1)) {
            Some(previous) => previous,
            None => return date,
        };
        if is_business_day(date, holidays) {
            counted += 1;
        }
    }

    date
}
