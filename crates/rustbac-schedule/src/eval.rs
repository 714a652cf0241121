//! Computes the present value for `(date, time)` from the effective
//! period, the exception schedules (with priority), and the weekly
//! schedule.

use rustbac_core::types::{Date, Time};

use crate::calendar::date_in_calendar_entry;
use crate::date::match_date_range;
use crate::error::EvalError;
use crate::object::{ObjectDirectory, Reliability, ScheduleObject, SpecialEventPeriod, TimeValue};
use crate::value::ScheduleValue;

const PRIORITY_SLOTS: usize = 16;

fn time_tuple(t: Time) -> (u8, u8, u8, u8) {
    (t.hour, t.minute, t.second, t.hundredths)
}

/// One priority slot's running state while scanning exception events:
/// the chronologically latest matching `TimeValue` seen so far, and
/// whether it carried a value (`Some`) or relinquished the slot (`None`).
#[derive(Clone)]
struct Slot {
    time: Option<(u8, u8, u8, u8)>,
    value: Option<ScheduleValue>,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            time: None,
            value: None,
        }
    }

    /// Apply `tv` if it is at or before `time` and chronologically at
    /// least as late as anything already applied to this slot — this is
    /// what makes the result invariant under reordering a schedule's
    /// entries, rather than replaying declaration order literally.
    fn apply(&mut self, tv: &TimeValue, time: (u8, u8, u8, u8)) {
        let tv_time = time_tuple(tv.time);
        if tv_time > time {
            return;
        }
        if self.time.map_or(true, |best| tv_time >= best) {
            self.time = Some(tv_time);
            self.value = if tv.value.is_null() {
                None
            } else {
                Some(tv.value.clone())
            };
        }
    }
}

/// Resolve a `SpecialEventPeriod` to a match boolean against `date`.
fn period_matches(
    period: &SpecialEventPeriod,
    date: Date,
    directory: &dyn ObjectDirectory,
) -> Result<bool, EvalError> {
    match period {
        SpecialEventPeriod::Calendar(entry) => Ok(date_in_calendar_entry(date, entry)),
        SpecialEventPeriod::Reference(object_id) => {
            let Some(calendar) = directory.lookup_object(*object_id) else {
                #[cfg(feature = "std")]
                log::warn!("special event references unresolvable calendar object");
                return Err(EvalError::InvalidCalendarReference(*object_id));
            };
            Ok(calendar
                .date_list
                .iter()
                .any(|entry| date_in_calendar_entry(date, entry)))
        }
    }
}

/// Compute the Schedule Object's present value for `(date, time)`.
///
/// Pure with respect to `obj`: this function never mutates it. Returns
/// `Ok(None)` when `obj.reliability` is not `NoFaultDetected` (spec.md §7's
/// policy row, exercised by scenario S4) or when `date` lies outside the
/// effective period; otherwise the effective value after exception-priority
/// reduction and weekly fallback.
pub fn eval(
    obj: &ScheduleObject,
    date: Date,
    time: Time,
    directory: &dyn ObjectDirectory,
) -> Result<Option<ScheduleValue>, EvalError> {
    if obj.reliability != Reliability::NoFaultDetected {
        return Ok(None);
    }
    eval_ignoring_reliability(obj, date, time, directory)
}

/// The evaluation steps proper, without the reliability gate. Used by
/// [`crate::object::ScheduleObject::evaluate_and_update`] when a caller
/// explicitly opts to bypass reliability (spec.md §7: "caller may bypass
/// if desired").
pub(crate) fn eval_ignoring_reliability(
    obj: &ScheduleObject,
    date: Date,
    time: Time,
    directory: &dyn ObjectDirectory,
) -> Result<Option<ScheduleValue>, EvalError> {
    if !match_date_range(date, obj.effective_period) {
        return Ok(None);
    }

    let now = time_tuple(time);
    let mut slots: [Slot; PRIORITY_SLOTS] = core::array::from_fn(|_| Slot::empty());

    if let Some(exceptions) = &obj.exception_schedule {
        for event in exceptions {
            if !period_matches(&event.period, date, directory)? {
                continue;
            }
            let Some(idx) = (event.priority as usize).checked_sub(1) else {
                continue;
            };
            if idx >= PRIORITY_SLOTS {
                continue; // out-of-range priority, ignored defensively
            }
            for tv in &event.list_of_time_values {
                slots[idx].apply(tv, now);
            }
        }
    }

    for slot in &slots {
        if let Some(value) = &slot.value {
            return Ok(Some(value.clone()));
        }
    }

    Ok(Some(weekly_fallback(obj, date, now)))
}

fn weekly_fallback(obj: &ScheduleObject, date: Date, now: (u8, u8, u8, u8)) -> ScheduleValue {
    let Some(weekly) = &obj.weekly_schedule else {
        return obj.schedule_default.clone();
    };
    let Some(day_index) = (date.weekday as usize).checked_sub(1) else {
        return obj.schedule_default.clone();
    };
    let Some(daily) = weekly.get(day_index) else {
        return obj.schedule_default.clone();
    };

    let mut best_time: Option<(u8, u8, u8, u8)> = None;
    let mut result = obj.schedule_default.clone();
    for tv in &daily.day_schedule {
        let tv_time = time_tuple(tv.time);
        if tv_time > now {
            continue;
        }
        if best_time.map_or(true, |best| tv_time >= best) {
            best_time = Some(tv_time);
            result = if tv.value.is_null() {
                obj.schedule_default.clone()
            } else {
                tv.value.clone()
            };
        }
    }
    result
}
