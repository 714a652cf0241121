//! Validates a Schedule Object's configuration and derives its
//! reliability state.

use crate::object::{ObjectDirectory, Reliability, ScheduleObject};
use crate::value::Datatype;
use rustbac_core::types::Time;

/// Run every configuration check in order, store the result in
/// `obj.reliability`, and return it. A full pass sets `NoFaultDetected`;
/// the first violated check sets `ConfigurationError` and short-circuits
/// the rest — the cause is not surfaced to the caller, only logged at
/// `debug` under the `std` feature.
pub fn check_reliability(obj: &mut ScheduleObject, directory: &dyn ObjectDirectory) -> Reliability {
    let (result, _failure_reason) = evaluate_invariants(obj, directory);
    obj.reliability = result;
    #[cfg(feature = "std")]
    if let Some(reason) = _failure_reason {
        log::debug!("schedule object failed configuration validation: {reason}");
    }
    result
}

fn evaluate_invariants(
    obj: &ScheduleObject,
    directory: &dyn ObjectDirectory,
) -> (Reliability, Option<&'static str>) {
    let Some(datatype) = obj.schedule_default.datatype() else {
        return (Reliability::ConfigurationError, Some("schedule default is Null"));
    };

    if obj.weekly_schedule.is_none() && obj.exception_schedule.is_none() {
        return (
            Reliability::ConfigurationError,
            Some("neither a weekly schedule nor an exception schedule is configured"),
        );
    }

    if !all_time_values_match(obj, datatype) {
        return (
            Reliability::ConfigurationError,
            Some("a scheduled value's type does not match the schedule default's type"),
        );
    }

    if !weekly_times_are_concrete(obj) {
        return (
            Reliability::ConfigurationError,
            Some("weekly schedule carries a wildcard time octet"),
        );
    }

    if !property_references_match(obj, datatype, directory) {
        return (
            Reliability::ConfigurationError,
            Some("a referenced property's type does not match the schedule default's type"),
        );
    }

    if !exception_priorities_in_range(obj) {
        return (
            Reliability::ConfigurationError,
            Some("exception schedule priority is out of range"),
        );
    }

    (Reliability::NoFaultDetected, None)
}

fn all_time_values_match(obj: &ScheduleObject, datatype: Datatype) -> bool {
    if let Some(weekly) = &obj.weekly_schedule {
        for day in weekly {
            if day.day_schedule.iter().any(|tv| !datatype.matches(&tv.value)) {
                return false;
            }
        }
    }
    if let Some(exceptions) = &obj.exception_schedule {
        for event in exceptions {
            if event
                .list_of_time_values
                .iter()
                .any(|tv| !datatype.matches(&tv.value))
            {
                return false;
            }
        }
    }
    true
}

fn weekly_times_are_concrete(obj: &ScheduleObject) -> bool {
    let Some(weekly) = &obj.weekly_schedule else {
        return true;
    };
    weekly
        .iter()
        .flat_map(|day| day.day_schedule.iter())
        .all(|tv| !has_wildcard_field(tv.time))
}

fn has_wildcard_field(t: Time) -> bool {
    t.hour == 255 || t.minute == 255 || t.second == 255 || t.hundredths == 255
}

fn property_references_match(
    obj: &ScheduleObject,
    datatype: Datatype,
    directory: &dyn ObjectDirectory,
) -> bool {
    let Some(refs) = &obj.list_of_object_property_references else {
        return true;
    };
    refs.iter().all(|r| {
        let expected = if r.array_index == Some(0) {
            Some(Datatype::Unsigned)
        } else {
            directory.datatype_of(r.object_id.object_type(), r.property_id)
        };
        expected == Some(datatype)
    })
}

fn exception_priorities_in_range(obj: &ScheduleObject) -> bool {
    let Some(exceptions) = &obj.exception_schedule else {
        return true;
    };
    exceptions.iter().all(|e| (1..=16).contains(&e.priority))
}
