use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// Normalizes an arbitrary date inside a reporting month to that month's end,
/// the canonical period date used by warehouse fetches.
pub fn month_end_for(date: NaiveDate) -> NaiveDate {
    last_day_of_month(date.year(), date.month())
}

/// First day of the calendar year a period date belongs to. Year-to-date
/// figures cover this date through the period's month end.
pub fn year_start_for(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap()
}
