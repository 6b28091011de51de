//! Compile-time constant values.

use std::fmt;

use crate::metadata::{TypeDesc, ValueKind};

/// A constant that can be pushed on the operand stack.
///
/// Floating point payloads are stored as raw bits so that constants can take part in
/// hashing and structural equality (value numbering keys). Two `NaN` constants with the
/// same bit pattern compare equal, which is what deduplication wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// The `null` reference
    Null,
    /// 32-bit integer (also used for every sub-integer kind)
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float, raw bits
    Float(u32),
    /// 64-bit float, raw bits
    Double(u64),
    /// Interned string literal
    Str(String),
    /// Class literal or static field holder
    Type(TypeDesc),
}

impl ConstValue {
    /// Creates a float constant.
    #[must_use]
    pub fn float(value: f32) -> Self {
        ConstValue::Float(value.to_bits())
    }

    /// Creates a double constant.
    #[must_use]
    pub fn double(value: f64) -> Self {
        ConstValue::Double(value.to_bits())
    }

    /// Stack kind of the constant.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            ConstValue::Int(_) => ValueKind::Int,
            ConstValue::Long(_) => ValueKind::Long,
            ConstValue::Float(_) => ValueKind::Float,
            ConstValue::Double(_) => ValueKind::Double,
            ConstValue::Null | ConstValue::Str(_) | ConstValue::Type(_) => ValueKind::Object,
        }
    }

    /// Returns the integer payload, if this is an `int` constant.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the long payload, if this is a `long` constant.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            ConstValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a `float` constant.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ConstValue::Float(bits) => Some(f32::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns the double payload, if this is a `double` constant.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            ConstValue::Double(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns `true` if this is an integral zero of either width.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, ConstValue::Int(0) | ConstValue::Long(0))
    }

    /// Returns `true` if this is an integral one of either width.
    #[must_use]
    pub fn is_one(&self) -> bool {
        matches!(self, ConstValue::Int(1) | ConstValue::Long(1))
    }

    /// The zero constant of an integral kind.
    #[must_use]
    pub fn zero_of(kind: ValueKind) -> Option<Self> {
        match kind.stack_kind() {
            ValueKind::Int => Some(ConstValue::Int(0)),
            ValueKind::Long => Some(ConstValue::Long(0)),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Long(v) => write!(f, "{v}L"),
            ConstValue::Float(bits) => write!(f, "{:?}f", f32::from_bits(*bits)),
            ConstValue::Double(bits) => write!(f, "{:?}d", f64::from_bits(*bits)),
            ConstValue::Str(s) => write!(f, "{s:?}"),
            ConstValue::Type(ty) => write!(f, "{ty}.class"),
        }
    }
}
