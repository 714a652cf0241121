//! The Schedule Object configuration model: persistent fields, the
//! monitored-property observer hook, and the `ObjectDirectory` interface
//! the core consults to resolve calendar references and property datatypes.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use core::fmt;

use rustbac_core::types::{Date, ObjectId, ObjectType, PropertyId, Time};

use crate::calendar::CalendarEntry;
use crate::date::DateRange;
use crate::error::EvalError;
use crate::value::{Datatype, ScheduleValue};

/// A single `(time, value)` pair. `value` of `Null` acts as a relinquish
/// when applied during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeValue {
    pub time: Time,
    pub value: ScheduleValue,
}

/// An ordered sequence of [`TimeValue`] for one day-of-week slot. The
/// evaluator does not require this to be time-sorted — it scans every
/// entry and keeps the chronologically latest applicable one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySchedule {
    pub day_schedule: Vec<TimeValue>,
}

/// Seven [`DailySchedule`]s, indexed by `day_of_week - 1` (Monday = 0).
pub type WeeklySchedule = [DailySchedule; 7];

/// Either an inline calendar pattern or a reference to a Calendar Object
/// resolved through the [`ObjectDirectory`]. A Rust `enum` cannot be
/// "neither", so a `SpecialEventPeriod` with no populated variant cannot
/// arise here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEventPeriod {
    Calendar(CalendarEntry),
    Reference(ObjectId),
}

/// A priority-tagged exception override, active on dates matched by its
/// period.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialEvent {
    pub period: SpecialEventPeriod,
    pub list_of_time_values: Vec<TimeValue>,
    pub priority: u8,
}

/// A writeback target validated by [`crate::check_reliability`]. The act of
/// writing is delegated to the host; this crate only validates that the
/// referenced property's type agrees with the schedule datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectPropertyReference {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    /// `Some(0)` is special: it means "length of Unsigned", regardless of
    /// the referenced property's own declared type.
    pub array_index: Option<u32>,
}

/// The derived reliability state of a Schedule Object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    NoFaultDetected,
    ConfigurationError,
}

/// The small enumeration of properties whose mutation fires a
/// change-notification hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MonitoredProperty {
    WeeklySchedule,
    ExceptionSchedule,
    ScheduleDefault,
    PresentValue,
}

/// A Calendar Object as seen through the [`ObjectDirectory`]: an
/// identifier and its `dateList`, immutable for the duration of an
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarObject {
    pub object_id: ObjectId,
    pub date_list: Vec<CalendarEntry>,
}

/// The external object directory the core consults to resolve
/// `calendarReference`s and the declared datatype of a writeback
/// property reference. Purely functional: the core never mutates it.
pub trait ObjectDirectory {
    fn lookup_object(&self, id: ObjectId) -> Option<&CalendarObject>;
    fn datatype_of(&self, object_type: ObjectType, property_id: PropertyId) -> Option<Datatype>;
}

type Observer = Box<dyn FnMut(&ScheduleValue, &ScheduleValue)>;

/// Persistent configuration and derived state of a Schedule Object.
pub struct ScheduleObject {
    pub effective_period: DateRange,
    pub weekly_schedule: Option<WeeklySchedule>,
    pub exception_schedule: Option<Vec<SpecialEvent>>,
    pub schedule_default: ScheduleValue,
    pub list_of_object_property_references: Option<Vec<ObjectPropertyReference>>,
    pub reliability: Reliability,
    pub present_value: ScheduleValue,
    observers: BTreeMap<MonitoredProperty, Vec<Observer>>,
}

impl fmt::Debug for ScheduleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleObject")
            .field("effective_period", &self.effective_period)
            .field("weekly_schedule", &self.weekly_schedule)
            .field("exception_schedule", &self.exception_schedule)
            .field("schedule_default", &self.schedule_default)
            .field(
                "list_of_object_property_references",
                &self.list_of_object_property_references,
            )
            .field("reliability", &self.reliability)
            .field("present_value", &self.present_value)
            .finish_non_exhaustive()
    }
}

impl ScheduleObject {
    /// Construct a new Schedule Object and run the reliability check
    /// immediately.
    pub fn new(
        effective_period: DateRange,
        weekly_schedule: Option<WeeklySchedule>,
        exception_schedule: Option<Vec<SpecialEvent>>,
        schedule_default: ScheduleValue,
        list_of_object_property_references: Option<Vec<ObjectPropertyReference>>,
        directory: &dyn ObjectDirectory,
    ) -> Self {
        let mut obj = Self {
            effective_period,
            weekly_schedule,
            exception_schedule,
            present_value: schedule_default.clone(),
            schedule_default,
            list_of_object_property_references,
            reliability: Reliability::NoFaultDetected,
            observers: BTreeMap::new(),
        };
        crate::reliability::check_reliability(&mut obj, directory);
        obj
    }

    /// Register an observer fired with `(old_value, new_value)` whenever
    /// `property` changes.
    pub fn on_change(
        &mut self,
        property: MonitoredProperty,
        observer: impl FnMut(&ScheduleValue, &ScheduleValue) + 'static,
    ) {
        self.observers
            .entry(property)
            .or_default()
            .push(Box::new(observer));
    }

    fn notify(&mut self, property: MonitoredProperty, old: &ScheduleValue, new: &ScheduleValue) {
        if let Some(observers) = self.observers.get_mut(&property) {
            for observer in observers.iter_mut() {
                observer(old, new);
            }
        }
    }

    /// Replace `scheduleDefault`, re-run the reliability check, and fire
    /// the `ScheduleDefault` hook.
    pub fn set_schedule_default(&mut self, value: ScheduleValue, directory: &dyn ObjectDirectory) {
        let old = core::mem::replace(&mut self.schedule_default, value.clone());
        crate::reliability::check_reliability(self, directory);
        self.notify(MonitoredProperty::ScheduleDefault, &old, &value);
    }

    /// Replace the weekly schedule and re-run the reliability check.
    pub fn set_weekly_schedule(
        &mut self,
        weekly: Option<WeeklySchedule>,
        directory: &dyn ObjectDirectory,
    ) {
        self.weekly_schedule = weekly;
        crate::reliability::check_reliability(self, directory);
        self.notify(
            MonitoredProperty::WeeklySchedule,
            &ScheduleValue::Null,
            &ScheduleValue::Null,
        );
    }

    /// Replace the exception schedule and re-run the reliability check.
    pub fn set_exception_schedule(
        &mut self,
        exceptions: Option<Vec<SpecialEvent>>,
        directory: &dyn ObjectDirectory,
    ) {
        self.exception_schedule = exceptions;
        crate::reliability::check_reliability(self, directory);
        self.notify(
            MonitoredProperty::ExceptionSchedule,
            &ScheduleValue::Null,
            &ScheduleValue::Null,
        );
    }

    /// Write `presentValue` and fire its change-notification hook. Used by
    /// both the Evaluator and an external client writing the property
    /// directly — both paths land here.
    pub fn write_present_value(&mut self, value: ScheduleValue) {
        let old = core::mem::replace(&mut self.present_value, value.clone());
        self.notify(MonitoredProperty::PresentValue, &old, &value);
    }

    /// Evaluate the present value for `(date, time)` and, if the schedule
    /// is in effect, write it to `presentValue` (firing the hook).
    ///
    /// Returns `Ok(None)` without writing when `reliability` is not
    /// `NoFaultDetected`, unless `bypass_reliability` is set to let a
    /// caller read through a configuration error. The gate itself lives in
    /// [`crate::eval::eval`] — this wrapper only chooses whether to honor
    /// it or call the ungated evaluation steps directly.
    pub fn evaluate_and_update(
        &mut self,
        date: Date,
        time: Time,
        directory: &dyn ObjectDirectory,
        bypass_reliability: bool,
    ) -> Result<Option<ScheduleValue>, EvalError> {
        let result = if bypass_reliability {
            crate::eval::eval_ignoring_reliability(self, date, time, directory)?
        } else {
            crate::eval::eval(self, date, time, directory)?
        };
        if let Some(value) = &result {
            self.write_present_value(value.clone());
        }
        Ok(result)
    }
}
