//! Tagged union of the atomic BACnet values a Schedule Object may carry.

#[cfg(feature = "alloc")]
use alloc::string::String;

/// A schedule value: one atomic BACnet primitive, or [`Null`](Self::Null),
/// the relinquish sentinel.
///
/// Unlike [`rustbac_core::types::DataValue`], which borrows wire bytes for
/// zero-copy decode, this type is owned — a Schedule Object's configuration
/// is long-lived, not a one-shot decode of an incoming APDU. `CharacterString`
/// is the one variant that needs an allocator and is gated on the `alloc`
/// feature, mirroring `rustbac_core::types::DataValue`'s `Constructed` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Integer(i32),
    Real(f32),
    Double(f64),
    Enumerated(u32),
    #[cfg(feature = "alloc")]
    CharacterString(String),
}

/// Runtime type tag derived from a non-[`Null`](ScheduleValue::Null) value.
///
/// `Integer` and `Unsigned` are distinct datatypes: no numeric coercion is
/// performed when checking a value against a schedule's datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Boolean,
    Unsigned,
    Integer,
    Real,
    Double,
    Enumerated,
    #[cfg(feature = "alloc")]
    CharacterString,
}

impl ScheduleValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The datatype tag of a non-`Null` value, or `None` for `Null`.
    pub fn datatype(&self) -> Option<Datatype> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(Datatype::Boolean),
            Self::Unsigned(_) => Some(Datatype::Unsigned),
            Self::Integer(_) => Some(Datatype::Integer),
            Self::Real(_) => Some(Datatype::Real),
            Self::Double(_) => Some(Datatype::Double),
            Self::Enumerated(_) => Some(Datatype::Enumerated),
            #[cfg(feature = "alloc")]
            Self::CharacterString(_) => Some(Datatype::CharacterString),
        }
    }
}

impl Datatype {
    /// True iff `value` is `Null` (always permitted, anywhere) or its
    /// datatype equals `self`.
    pub fn matches(self, value: &ScheduleValue) -> bool {
        match value.datatype() {
            None => true,
            Some(dt) => dt == self,
        }
    }
}
