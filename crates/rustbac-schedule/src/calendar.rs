//! Dispatches a `CalendarEntry` to the date pattern matchers.

use rustbac_core::types::Date;

use crate::date::{match_date, match_date_range, match_weeknday, DatePattern, DateRange, WeekNDay};

/// A single entry in a Calendar Object's `dateList`, or a `SpecialEvent`'s
/// inline period. Exactly one variant is ever populated — unlike the
/// BACnet wire choice this is modeled on, a Rust `enum` cannot be "empty",
/// so a `CalendarEntry` with no variant set cannot arise from this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarEntry {
    Date(DatePattern),
    DateRange(DateRange),
    WeekNDay(WeekNDay),
}

/// Test whether `date` is covered by `entry`, dispatching to the matching
/// pattern matcher for its populated variant.
pub fn date_in_calendar_entry(date: Date, entry: &CalendarEntry) -> bool {
    match entry {
        CalendarEntry::Date(pattern) => match_date(date, *pattern),
        CalendarEntry::DateRange(range) => match_date_range(date, *range),
        CalendarEntry::WeekNDay(weeknday) => match_weeknday(date, *weeknday),
    }
}
