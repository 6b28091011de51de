//! Block-local value numbering.
//!
//! [`ValueNumbering`] maps a structural key of an instruction to the first value that
//! computed it in the current block. The builder consults it before appending and resets
//! it at every block boundary.
//!
//! Memory loads participate as long as nothing may have overwritten the location they
//! read. Stores, calls, monitors and barriers kill loads according to their
//! [`MemoryEffect`]; array lengths never change and are never killed.

use std::collections::HashMap;

use crate::{
    bytecode::{ArithOp, CompareOp, LogicOp, ShiftOp},
    hir::{ConstValue, HirOp, MemoryEffect, ValueId},
    metadata::{TypeDesc, ValueKind},
};

/// Structural identity of a cacheable instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Literal
    Constant(ConstValue),
    /// Arithmetic; commutative operands are ordered
    Arith(ArithOp, ValueKind, ValueId, ValueId),
    /// Negation
    Negate(ValueKind, ValueId),
    /// Shift
    Shift(ShiftOp, ValueKind, ValueId, ValueId),
    /// Bitwise logic; operands are ordered
    Logic(LogicOp, ValueKind, ValueId, ValueId),
    /// Conversion
    Convert(ValueKind, ValueKind, ValueId),
    /// Three-way compare
    Compare(CompareOp, ValueId, ValueId),
    /// Type test
    InstanceOf(TypeDesc, ValueId),
    /// Field load: holder, offset, object
    LoadField(TypeDesc, u32, ValueId),
    /// Element load: element kind, array, index
    ArrayLoad(ValueKind, ValueId, ValueId),
    /// Array length
    ArrayLength(ValueId),
}

impl ValueKey {
    /// Computes the key of `op`, or `None` if the instruction must not be cached.
    #[must_use]
    pub fn of(op: &HirOp, kind: ValueKind) -> Option<ValueKey> {
        let ordered = |x: ValueId, y: ValueId| if x <= y { (x, y) } else { (y, x) };
        let key = match op {
            HirOp::Constant(value) => ValueKey::Constant(value.clone()),
            HirOp::Arith { op, x, y } => {
                if matches!(op, ArithOp::Div | ArithOp::Rem) && kind.is_integral() {
                    return None;
                }
                let (x, y) = if op.is_commutative() {
                    ordered(*x, *y)
                } else {
                    (*x, *y)
                };
                ValueKey::Arith(*op, kind, x, y)
            }
            HirOp::Negate { x } => ValueKey::Negate(kind, *x),
            HirOp::Shift { op, x, y } => ValueKey::Shift(*op, kind, *x, *y),
            HirOp::Logic { op, x, y } => {
                let (x, y) = ordered(*x, *y);
                ValueKey::Logic(*op, kind, x, y)
            }
            HirOp::Convert { from, to, x } => ValueKey::Convert(*from, *to, *x),
            HirOp::Compare { op, x, y } => ValueKey::Compare(*op, *x, *y),
            HirOp::InstanceOf { ty, object } => ValueKey::InstanceOf(ty.clone(), *object),
            HirOp::LoadField { object, field } => {
                if field.is_volatile() {
                    return None;
                }
                ValueKey::LoadField(field.holder.clone(), field.offset, *object)
            }
            HirOp::ArrayLoad { array, index, elem } => ValueKey::ArrayLoad(*elem, *array, *index),
            HirOp::ArrayLength { array } => ValueKey::ArrayLength(*array),
            _ => return None,
        };
        Some(key)
    }

    fn is_memory_load(&self) -> bool {
        matches!(self, ValueKey::LoadField(..) | ValueKey::ArrayLoad(..))
    }
}

/// The value numbering table of the block being built.
#[derive(Debug, Default)]
pub struct ValueNumbering {
    table: HashMap<ValueKey, ValueId>,
}

impl ValueNumbering {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Looks up a previously registered value.
    #[must_use]
    pub fn find(&self, key: &ValueKey) -> Option<ValueId> {
        self.table.get(key).copied()
    }

    /// Registers `value` under `key`. An existing entry is kept.
    pub fn insert(&mut self, key: ValueKey, value: ValueId) {
        self.table.entry(key).or_insert(value);
    }

    /// Drops the cached loads that `effect` may have invalidated.
    pub fn kill(&mut self, effect: MemoryEffect) {
        match effect {
            MemoryEffect::None => {}
            MemoryEffect::StoresField(offset) => self
                .table
                .retain(|key, _| !matches!(key, ValueKey::LoadField(_, o, _) if *o == offset)),
            MemoryEffect::StoresElement(elem) => self
                .table
                .retain(|key, _| !matches!(key, ValueKey::ArrayLoad(e, ..) if *e == elem)),
            MemoryEffect::Clobbers => self.table.retain(|key, _| !key.is_memory_load()),
        }
    }

    /// Forgets everything. Called at every block boundary.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FieldFlags, ResolvedField};

    fn v(n: usize) -> ValueId {
        ValueId::new(n)
    }

    fn field(offset: u32, flags: FieldFlags) -> ResolvedField {
        ResolvedField {
            holder: TypeDesc::new("Point"),
            name: format!("f{offset}"),
            kind: ValueKind::Int,
            offset,
            flags,
        }
    }

    #[test]
    fn test_commutative_keys() {
        let a = HirOp::Arith {
            op: ArithOp::Add,
            x: v(1),
            y: v(2),
        };
        let b = HirOp::Arith {
            op: ArithOp::Add,
            x: v(2),
            y: v(1),
        };
        assert_eq!(ValueKey::of(&a, ValueKind::Int), ValueKey::of(&b, ValueKind::Int));

        let c = HirOp::Arith {
            op: ArithOp::Sub,
            x: v(1),
            y: v(2),
        };
        let d = HirOp::Arith {
            op: ArithOp::Sub,
            x: v(2),
            y: v(1),
        };
        assert_ne!(ValueKey::of(&c, ValueKind::Int), ValueKey::of(&d, ValueKind::Int));
    }

    #[test]
    fn test_uncacheable() {
        let div = HirOp::Arith {
            op: ArithOp::Div,
            x: v(1),
            y: v(2),
        };
        assert!(ValueKey::of(&div, ValueKind::Int).is_none());
        assert!(ValueKey::of(&div, ValueKind::Double).is_some());

        let volatile = HirOp::LoadField {
            object: v(0),
            field: field(8, FieldFlags::VOLATILE),
        };
        assert!(ValueKey::of(&volatile, ValueKind::Int).is_none());
        assert!(ValueKey::of(&HirOp::MemBarrier, ValueKind::Void).is_none());
    }

    #[test]
    fn test_kills() {
        let mut lvn = ValueNumbering::new();
        let load8 = ValueKey::of(
            &HirOp::LoadField {
                object: v(0),
                field: field(8, FieldFlags::empty()),
            },
            ValueKind::Int,
        )
        .unwrap();
        let load12 = ValueKey::of(
            &HirOp::LoadField {
                object: v(0),
                field: field(12, FieldFlags::empty()),
            },
            ValueKind::Int,
        )
        .unwrap();
        let elem = ValueKey::ArrayLoad(ValueKind::Int, v(1), v(2));
        let length = ValueKey::ArrayLength(v(1));
        let constant = ValueKey::Constant(ConstValue::Int(3));

        lvn.insert(load8.clone(), v(10));
        lvn.insert(load12.clone(), v(11));
        lvn.insert(elem.clone(), v(12));
        lvn.insert(length.clone(), v(13));
        lvn.insert(constant.clone(), v(14));

        lvn.kill(MemoryEffect::StoresField(8));
        assert_eq!(lvn.find(&load8), None);
        assert_eq!(lvn.find(&load12), Some(v(11)));

        lvn.kill(MemoryEffect::StoresElement(ValueKind::Long));
        assert_eq!(lvn.find(&elem), Some(v(12)));
        lvn.kill(MemoryEffect::StoresElement(ValueKind::Int));
        assert_eq!(lvn.find(&elem), None);

        lvn.kill(MemoryEffect::Clobbers);
        assert_eq!(lvn.find(&load12), None);
        assert_eq!(lvn.find(&length), Some(v(13)));
        assert_eq!(lvn.find(&constant), Some(v(14)));
        assert_eq!(lvn.len(), 2);

        lvn.clear();
        assert!(lvn.is_empty());
    }
}
