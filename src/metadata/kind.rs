//! Value kinds tracked on the operand stack, in local slots and on IR values.
//!
//! The instruction set distinguishes more kinds than it can keep on the stack: `boolean`,
//! `byte`, `char` and `short` only exist in field, array and signature positions and are
//! widened to `int` as soon as they are loaded. [`ValueKind::stack_kind`] performs that
//! decay. `long` and `double` are two-word kinds and occupy two consecutive stack or local
//! slots.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The kind of an SSA value, a field, an array element or a method result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// `boolean`, a sub-integer kind
    Boolean,
    /// `byte`, a sub-integer kind
    Byte,
    /// `char`, a sub-integer kind
    Char,
    /// `short`, a sub-integer kind
    Short,
    /// 32-bit integer
    Int,
    /// 64-bit integer, two-word
    Long,
    /// 32-bit IEEE 754 float
    Float,
    /// 64-bit IEEE 754 float, two-word
    Double,
    /// Object or array reference
    #[strum(to_string = "object", serialize = "ref")]
    Object,
    /// No value; only valid as a return kind and for side-effect-only instructions
    Void,
}

impl ValueKind {
    /// Returns the kind this value has once it is pushed on the operand stack.
    #[must_use]
    pub const fn stack_kind(self) -> ValueKind {
        match self {
            ValueKind::Boolean | ValueKind::Byte | ValueKind::Char | ValueKind::Short => {
                ValueKind::Int
            }
            other => other,
        }
    }

    /// Returns `true` for `boolean`, `byte`, `char` and `short`.
    #[must_use]
    pub const fn is_sub_int(self) -> bool {
        matches!(
            self,
            ValueKind::Boolean | ValueKind::Byte | ValueKind::Char | ValueKind::Short
        )
    }

    /// Returns `true` for kinds that occupy two stack or local slots.
    #[must_use]
    pub const fn is_double_word(self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }

    /// Number of stack or local slots a value of this kind occupies.
    #[must_use]
    pub const fn slot_size(self) -> usize {
        match self {
            ValueKind::Void => 0,
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for `int` and `long` (after stack decay).
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(self.stack_kind(), ValueKind::Int | ValueKind::Long)
    }

    /// Returns `true` for `float` and `double`.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Double)
    }

    /// The mask applied to a returned value of a sub-integer kind.
    ///
    /// Methods declared to return `byte` keep the low 8 bits, `short` and `char` keep the
    /// low 16 bits and `boolean` keeps only bit 0. Every other kind is returned unchanged.
    #[must_use]
    pub const fn return_mask(self) -> Option<i32> {
        match self {
            ValueKind::Byte => Some(0xFF),
            ValueKind::Short | ValueKind::Char => Some(0xFFFF),
            ValueKind::Boolean => Some(0x1),
            _ => None,
        }
    }

    /// Single-letter prefix used by the instruction set mnemonics (`i`, `l`, `f`, `d`, `a`).
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            ValueKind::Boolean | ValueKind::Byte => "b",
            ValueKind::Char => "c",
            ValueKind::Short => "s",
            ValueKind::Int => "i",
            ValueKind::Long => "l",
            ValueKind::Float => "f",
            ValueKind::Double => "d",
            ValueKind::Object => "a",
            ValueKind::Void => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_stack_kind_decay() {
        assert_eq!(ValueKind::Byte.stack_kind(), ValueKind::Int);
        assert_eq!(ValueKind::Char.stack_kind(), ValueKind::Int);
        assert_eq!(ValueKind::Short.stack_kind(), ValueKind::Int);
        assert_eq!(ValueKind::Boolean.stack_kind(), ValueKind::Int);
        assert_eq!(ValueKind::Long.stack_kind(), ValueKind::Long);
        assert_eq!(ValueKind::Object.stack_kind(), ValueKind::Object);
    }

    #[test]
    fn test_return_masks() {
        assert_eq!(ValueKind::Byte.return_mask(), Some(0xFF));
        assert_eq!(ValueKind::Short.return_mask(), Some(0xFFFF));
        assert_eq!(ValueKind::Char.return_mask(), Some(0xFFFF));
        assert_eq!(ValueKind::Boolean.return_mask(), Some(1));
        assert_eq!(ValueKind::Int.return_mask(), None);
        assert_eq!(ValueKind::Object.return_mask(), None);
    }

    #[test]
    fn test_slots() {
        assert_eq!(ValueKind::Long.slot_size(), 2);
        assert_eq!(ValueKind::Double.slot_size(), 2);
        assert_eq!(ValueKind::Int.slot_size(), 1);
        assert_eq!(ValueKind::Void.slot_size(), 0);
        assert!(ValueKind::Double.is_double_word());
        assert!(!ValueKind::Float.is_double_word());
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(ValueKind::from_str("int").unwrap(), ValueKind::Int);
        assert_eq!(ValueKind::from_str("ref").unwrap(), ValueKind::Object);
        assert_eq!(ValueKind::from_str("object").unwrap(), ValueKind::Object);
        assert_eq!(ValueKind::Boolean.to_string(), "boolean");
        assert!(ValueKind::from_str("quad").is_err());
    }
}
