#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod calendar;
pub mod date;
pub mod error;
#[cfg(feature = "alloc")]
pub mod eval;
#[cfg(feature = "alloc")]
pub mod object;
#[cfg(feature = "alloc")]
pub mod reliability;
pub mod value;

pub use calendar::CalendarEntry;
pub use date::{DatePattern, DateRange, WeekNDay};
pub use error::EvalError;
#[cfg(feature = "alloc")]
pub use eval::eval;
#[cfg(feature = "alloc")]
pub use object::{
    CalendarObject, DailySchedule, MonitoredProperty, ObjectDirectory, ObjectPropertyReference,
    Reliability, ScheduleObject, SpecialEvent, SpecialEventPeriod, TimeValue, WeeklySchedule,
};
#[cfg(feature = "alloc")]
pub use reliability::check_reliability;
pub use value::{Datatype, ScheduleValue};
