//! Decides whether a concrete date satisfies a date pattern, date range,
//! or week-and-day pattern.

use rustbac_core::types::Date;

/// The BACnet wildcard octet: "any value" in a pattern field.
pub const WILDCARD: u8 = 255;

/// Same shape as [`Date`] but any field may be [`WILDCARD`], and the month
/// and day fields additionally carry odd/even/last-day-of-month meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePattern {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub day_of_week: u8,
}

/// An inclusive `[start, end]` window over `(year, month, day)`; the
/// day-of-week fields of the endpoints are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

/// A month / ordinal-week-of-month / day-of-week pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekNDay {
    pub month: u8,
    pub week_of_month: u8,
    pub day_of_week: u8,
}

/// The last day of `month` in `actualYear = year_since_1900 + 1900`, under
/// the Gregorian calendar. Returns `0` for an out-of-domain month octet —
/// callers treat that as a non-match rather than an error.
pub const fn last_day_of_month(year_since_1900: u8, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            let actual_year = year_since_1900 as u32 + 1900;
            if is_leap_year(actual_year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

const fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn match_year(year: u8, pattern: u8) -> bool {
    pattern == WILDCARD || pattern == year
}

fn match_month(month: u8, pattern: u8) -> bool {
    match pattern {
        WILDCARD => true,
        13 => month % 2 == 1,
        14 => month % 2 == 0,
        1..=12 => pattern == month,
        _ => false,
    }
}

fn match_day(year_since_1900: u8, month: u8, day: u8, pattern: u8) -> bool {
    match pattern {
        WILDCARD => true,
        32 => day == last_day_of_month(year_since_1900, month),
        33 => day % 2 == 1,
        34 => day % 2 == 0,
        1..=31 => pattern == day,
        _ => false,
    }
}

fn match_day_of_week(day_of_week: u8, pattern: u8) -> bool {
    match pattern {
        WILDCARD => true,
        1..=7 => pattern == day_of_week,
        _ => false,
    }
}

/// Field-by-field match of a concrete `date` against `pattern`.
/// Out-of-domain octets are non-matches, never errors.
pub fn match_date(date: Date, pattern: DatePattern) -> bool {
    match_year(date.year_since_1900, pattern.year)
        && match_month(date.month, pattern.month)
        && match_day(date.year_since_1900, date.month, date.day, pattern.day)
        && match_day_of_week(date.weekday, pattern.day_of_week)
}

/// True iff `(year, month, day)` of `date` lies in `[range.start, range.end]`
/// under lexicographic ordering. An inverted range (`start > end`) never
/// matches any date.
pub fn match_date_range(date: Date, range: DateRange) -> bool {
    let d = (date.year_since_1900, date.month, date.day);
    let start = (
        range.start.year_since_1900,
        range.start.month,
        range.start.day,
    );
    let end = (range.end.year_since_1900, range.end.month, range.end.day);
    start <= d && d <= end
}

fn match_week_of_month(year_since_1900: u8, month: u8, day: u8, pattern: u8) -> bool {
    let last = last_day_of_month(year_since_1900, month);
    match pattern {
        WILDCARD => true,
        1 => (1..=7).contains(&day),
        2 => (8..=14).contains(&day),
        3 => (15..=21).contains(&day),
        4 => (22..=28).contains(&day),
        5 => day >= 29 && day <= last,
        6 => day > last.saturating_sub(7),
        7 => day > last.saturating_sub(14) && day <= last.saturating_sub(7),
        8 => day > last.saturating_sub(21) && day <= last.saturating_sub(14),
        9 => day > last.saturating_sub(28) && day <= last.saturating_sub(21),
        _ => false,
    }
}

/// Match a concrete `date` against a `WeekNDay` pattern: the month field
/// shares the `{255, 13, 14, 1..12}` semantics of [`match_date`];
/// `week_of_month` selects a fixed 7-day slot, the last 7/14/21/28 days of
/// the month, or the last calendar-week slot (29–31, clipped to the
/// actual month length).
pub fn match_weeknday(date: Date, pattern: WeekNDay) -> bool {
    match_month(date.month, pattern.month)
        && match_week_of_month(date.year_since_1900, date.month, date.day, pattern.week_of_month)
        && match_day_of_week(date.weekday, pattern.day_of_week)
}
