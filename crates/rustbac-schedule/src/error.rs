use core::fmt;

use rustbac_core::types::ObjectId;

/// Errors surfaced by the evaluator and the calendar-entry resolver.
///
/// `check_reliability` never surfaces one of these: it coalesces every
/// anomaly it detects into [`crate::Reliability::ConfigurationError`]
/// without reporting a cause, by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    /// A `SpecialEvent`'s `calendarReference` did not resolve through the
    /// `ObjectDirectory`.
    InvalidCalendarReference(ObjectId),
    /// A `CalendarEntry` or `SpecialEventPeriod` had no variant populated.
    ///
    /// Unreachable through this crate's own tagged-union constructors (a
    /// Rust `enum` cannot be "empty"); retained so a host that builds a
    /// `CalendarEntry` from its own wire decode, which could fail this way,
    /// has somewhere to report it.
    MalformedConfiguration(&'static str),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCalendarReference(id) => {
                write!(f, "calendar reference {} did not resolve", id.raw())
            }
            Self::MalformedConfiguration(detail) => {
                write!(f, "malformed schedule configuration: {detail}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EvalError {}
