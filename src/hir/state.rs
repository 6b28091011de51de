//! Symbolic execution state: operand stack, local slots and lock stack.
//!
//! A [`VmState`] describes one program point of the method being built. Every slot holds
//! either the [`ValueId`] currently stored there or nothing. Two-word kinds (`long`,
//! `double`) occupy two consecutive slots, the value in the lower one and an empty
//! filler in the upper one, which keeps the untyped shuffle operations (`pop2`,
//! `dup2_x1`, ...) exact.
//!
//! The state itself does not know the kinds of the values it holds; the builder checks
//! kinds against the graph when it pops operands.

use std::fmt;

use crate::{hir::ValueId, metadata::ValueKind, Result};

/// Operand stack, local slots and held monitors at one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmState {
    stack: Vec<Option<ValueId>>,
    locals: Vec<Option<ValueId>>,
    locks: Vec<ValueId>,
    max_stack: usize,
}

impl VmState {
    /// Creates an empty state with the declared limits of a method.
    #[must_use]
    pub fn new(max_stack: usize, max_locals: usize) -> Self {
        VmState {
            stack: Vec::with_capacity(max_stack),
            locals: vec![None; max_locals],
            locks: Vec::new(),
            max_stack,
        }
    }

    /// Current operand stack depth in slots.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Declared maximum stack depth.
    #[must_use]
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Number of local slots.
    #[must_use]
    pub fn max_locals(&self) -> usize {
        self.locals.len()
    }

    /// Operand stack slots, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[Option<ValueId>] {
        &self.stack
    }

    /// Local slots.
    #[must_use]
    pub fn locals(&self) -> &[Option<ValueId>] {
        &self.locals
    }

    /// Monitors currently held, outermost first.
    #[must_use]
    pub fn locks(&self) -> &[ValueId] {
        &self.locks
    }

    /// Number of monitors currently held.
    #[must_use]
    pub fn lock_depth(&self) -> usize {
        self.locks.len()
    }

    /// Value in local slot `index`, if any.
    #[must_use]
    pub fn local(&self, index: usize) -> Option<ValueId> {
        self.locals.get(index).copied().flatten()
    }

    /// Pushes a value of `kind`, adding the filler slot for two-word kinds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] on stack overflow.
    pub fn push(&mut self, value: ValueId, kind: ValueKind) -> Result<()> {
        self.push_slot(Some(value))?;
        if kind.is_double_word() {
            self.push_slot(None)?;
        }
        Ok(())
    }

    /// Pops a value of `kind`, consuming the filler slot for two-word kinds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] on underflow or when the slot
    /// layout does not match the requested kind.
    pub fn pop(&mut self, kind: ValueKind) -> Result<ValueId> {
        if kind.is_double_word() {
            if self.pop_slot()?.is_some() {
                return Err(invariant_error!(
                    "Expected the upper half of a {} on the stack",
                    kind
                ));
            }
        }
        self.pop_slot()?
            .ok_or_else(|| invariant_error!("Expected a {} on the stack, found a filler slot", kind))
    }

    /// Pushes a raw slot. Used by the shuffle operations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] on stack overflow.
    pub fn push_slot(&mut self, slot: Option<ValueId>) -> Result<()> {
        if self.stack.len() >= self.max_stack {
            return Err(invariant_error!(
                "Operand stack overflow (max {})",
                self.max_stack
            ));
        }
        self.stack.push(slot);
        Ok(())
    }

    /// Pops a raw slot. Used by the shuffle operations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] on stack underflow.
    pub fn pop_slot(&mut self) -> Result<Option<ValueId>> {
        self.stack
            .pop()
            .ok_or_else(|| invariant_error!("Operand stack underflow"))
    }

    /// Returns the value in local slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if the slot is out of range or
    /// empty.
    pub fn load(&self, index: usize) -> Result<ValueId> {
        match self.locals.get(index) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(invariant_error!("Load from empty local slot {}", index)),
            None => Err(invariant_error!(
                "Local slot {} out of range (max {})",
                index,
                self.locals.len()
            )),
        }
    }

    /// Stores `value` of `kind` into local slot `index`.
    ///
    /// Two-word values empty the following slot. Clearing a two-word value that started
    /// in the preceding slot is the caller's job, since only the caller knows its kind.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if the value does not fit.
    pub fn store(&mut self, index: usize, value: ValueId, kind: ValueKind) -> Result<()> {
        let size = kind.slot_size().max(1);
        if index + size > self.locals.len() {
            return Err(invariant_error!(
                "Store of {} to local slot {} out of range (max {})",
                kind,
                index,
                self.locals.len()
            ));
        }
        self.locals[index] = Some(value);
        if size == 2 {
            self.locals[index + 1] = None;
        }
        Ok(())
    }

    /// Empties local slot `index`. Out-of-range slots are ignored.
    pub fn invalidate_local(&mut self, index: usize) {
        if let Some(slot) = self.locals.get_mut(index) {
            *slot = None;
        }
    }

    /// Overwrites stack slot `index`.
    pub(crate) fn set_stack_slot(&mut self, index: usize, slot: Option<ValueId>) {
        if let Some(existing) = self.stack.get_mut(index) {
            *existing = slot;
        }
    }

    /// Overwrites local slot `index`.
    pub(crate) fn set_local_slot(&mut self, index: usize, slot: Option<ValueId>) {
        if let Some(existing) = self.locals.get_mut(index) {
            *existing = slot;
        }
    }

    /// Acquires the monitor of `object`, returning its lock depth.
    pub fn lock(&mut self, object: ValueId) -> usize {
        self.locks.push(object);
        self.locks.len() - 1
    }

    /// Releases the innermost monitor, returning its lock depth.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if no monitor is held.
    pub fn unlock(&mut self) -> Result<usize> {
        self.locks
            .pop()
            .map(|_| self.locks.len())
            .ok_or_else(|| invariant_error!("monitorexit without a held monitor"))
    }

    /// Iterates over every value referenced by the state: stack, locals, locks.
    pub fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.stack
            .iter()
            .chain(self.locals.iter())
            .filter_map(|slot| *slot)
            .chain(self.locks.iter().copied())
    }
}

fn write_slots(f: &mut fmt::Formatter<'_>, slots: &[Option<ValueId>]) -> fmt::Result {
    write!(f, "[")?;
    for (i, slot) in slots.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match slot {
            Some(value) => write!(f, "{value}")?,
            None => write!(f, "_")?,
        }
    }
    write!(f, "]")
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack=")?;
        write_slots(f, &self.stack)?;
        write!(f, " locals=")?;
        write_slots(f, &self.locals)?;
        if !self.locks.is_empty() {
            write!(f, " locks=[")?;
            for (i, lock) in self.locks.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{lock}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: usize) -> ValueId {
        ValueId::new(n)
    }

    #[test]
    fn test_push_pop_two_word() {
        let mut state = VmState::new(4, 0);
        state.push(v(1), ValueKind::Long).unwrap();
        state.push(v(2), ValueKind::Int).unwrap();
        assert_eq!(state.stack_depth(), 3);
        assert_eq!(state.stack(), &[Some(v(1)), None, Some(v(2))]);

        assert_eq!(state.pop(ValueKind::Int).unwrap(), v(2));
        assert_eq!(state.pop(ValueKind::Long).unwrap(), v(1));
        assert!(state.pop(ValueKind::Int).is_err());
    }

    #[test]
    fn test_pop_wrong_width() {
        let mut state = VmState::new(4, 0);
        state.push(v(1), ValueKind::Double).unwrap();
        assert!(state.pop(ValueKind::Int).is_err());

        let mut state = VmState::new(4, 0);
        state.push(v(1), ValueKind::Int).unwrap();
        state.push(v(2), ValueKind::Int).unwrap();
        assert!(state.pop(ValueKind::Long).is_err());
    }

    #[test]
    fn test_overflow() {
        let mut state = VmState::new(1, 0);
        state.push(v(1), ValueKind::Int).unwrap();
        assert!(state.push(v(2), ValueKind::Int).is_err());

        let mut state = VmState::new(1, 0);
        assert!(state.push(v(1), ValueKind::Long).is_err());
    }

    #[test]
    fn test_locals() {
        let mut state = VmState::new(0, 4);
        assert!(state.load(0).is_err());
        assert!(state.load(9).is_err());

        state.store(0, v(1), ValueKind::Int).unwrap();
        state.store(1, v(2), ValueKind::Double).unwrap();
        assert_eq!(state.locals(), &[Some(v(1)), Some(v(2)), None, None]);
        assert_eq!(state.load(1).unwrap(), v(2));

        assert!(state.store(3, v(3), ValueKind::Long).is_err());
        state.invalidate_local(0);
        assert_eq!(state.local(0), None);
    }

    #[test]
    fn test_locks() {
        let mut state = VmState::new(0, 0);
        assert!(state.unlock().is_err());
        assert_eq!(state.lock(v(4)), 0);
        assert_eq!(state.lock(v(5)), 1);
        assert_eq!(state.unlock().unwrap(), 1);
        assert_eq!(state.locks(), &[v(4)]);
    }

    #[test]
    fn test_display() {
        let mut state = VmState::new(2, 3);
        state.push(v(7), ValueKind::Long).unwrap();
        state.store(1, v(3), ValueKind::Int).unwrap();
        assert_eq!(state.to_string(), "stack=[v7, _] locals=[_, v3, _]");
        state.lock(v(3));
        assert_eq!(state.to_string(), "stack=[v7, _] locals=[_, v3, _] locks=[v3]");
        assert_eq!(state.values().collect::<Vec<_>>(), vec![v(7), v(3), v(3)]);
    }
}
