//! Per-method metadata consumed by the HIR builder.

use bitflags::bitflags;

use crate::metadata::ValueKind;

bitflags! {
    /// Method-level attributes that change how the builder translates a body.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u16 {
        /// The method has no receiver
        const STATIC = 0x0008;
        /// The method is an instance initializer
        const CONSTRUCTOR = 0x1000;
    }
}

/// Declared shape of a method body.
///
/// `max_stack` and `max_locals` are counted in slots: `long` and `double` take two of each.
/// Parameters are laid out in the local slots in declaration order, after the receiver
/// when the method is not [`MethodFlags::STATIC`].
///
/// # Examples
///
/// ```rust,ignore
/// use hirforge::metadata::{MethodFlags, MethodInfo, ValueKind};
///
/// let info = MethodInfo::new("sum", 4, 3)
///     .with_params(vec![ValueKind::Int, ValueKind::Int])
///     .returns(ValueKind::Int)
///     .with_flags(MethodFlags::STATIC);
/// assert!(!info.has_receiver());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Simple name of the method, used in dumps and diagnostics
    pub name: String,
    /// Declared maximum operand stack depth in slots
    pub max_stack: u16,
    /// Declared number of local slots
    pub max_locals: u16,
    /// Declared parameter kinds, receiver excluded
    pub params: Vec<ValueKind>,
    /// Declared return kind
    pub return_kind: ValueKind,
    /// Method attributes
    pub flags: MethodFlags,
}

impl MethodInfo {
    /// Creates an instance method returning `void` with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, max_stack: u16, max_locals: u16) -> Self {
        MethodInfo {
            name: name.into(),
            max_stack,
            max_locals,
            params: Vec::new(),
            return_kind: ValueKind::Void,
            flags: MethodFlags::empty(),
        }
    }

    /// Replaces the declared parameter kinds.
    #[must_use]
    pub fn with_params(mut self, params: Vec<ValueKind>) -> Self {
        self.params = params;
        self
    }

    /// Sets the declared return kind.
    #[must_use]
    pub fn returns(mut self, kind: ValueKind) -> Self {
        self.return_kind = kind;
        self
    }

    /// Adds method attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns `true` when local slot 0 holds the receiver on entry.
    #[must_use]
    pub fn has_receiver(&self) -> bool {
        !self.flags.contains(MethodFlags::STATIC)
    }

    /// Returns `true` for instance initializers.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR)
    }

    /// Number of local slots the receiver and parameters occupy on entry.
    #[must_use]
    pub fn param_slots(&self) -> usize {
        usize::from(self.has_receiver())
            + self
                .params
                .iter()
                .map(|kind| kind.stack_kind().slot_size())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_slots() {
        let info = MethodInfo::new("m", 4, 6).with_params(vec![
            ValueKind::Int,
            ValueKind::Long,
            ValueKind::Object,
        ]);
        assert!(info.has_receiver());
        assert_eq!(info.param_slots(), 5);

        let info = info.with_flags(MethodFlags::STATIC);
        assert!(!info.has_receiver());
        assert_eq!(info.param_slots(), 4);
    }

    #[test]
    fn test_constructor_flag() {
        let info = MethodInfo::new("<init>", 2, 1).with_flags(MethodFlags::CONSTRUCTOR);
        assert!(info.is_constructor());
        assert_eq!(info.return_kind, ValueKind::Void);
    }
}
