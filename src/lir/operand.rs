//! Operands of the low-level IR and their allocation.

use std::{collections::HashMap, fmt};

use crate::{
    hir::{ConstValue, HirGraph, ValueId},
    metadata::ValueKind,
};

/// A virtual register. The kind travels with the register so that temporaries can be
/// created with a matching width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualReg {
    index: u32,
    kind: ValueKind,
}

impl VirtualReg {
    /// Creates a register.
    #[must_use]
    pub const fn new(index: u32, kind: ValueKind) -> Self {
        VirtualReg { index, kind }
    }

    /// Register number.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Kind of the value held.
    #[must_use]
    pub const fn kind(self) -> ValueKind {
        self.kind
    }
}

impl fmt::Display for VirtualReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.index)
    }
}

/// Source or destination of a move.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LirOperand {
    /// A virtual register; one identity per register
    Register(VirtualReg),
    /// An immediate; every occurrence is distinct
    Constant(ConstValue),
}

impl LirOperand {
    /// The register, if this operand is one.
    #[must_use]
    pub fn as_register(&self) -> Option<VirtualReg> {
        match self {
            LirOperand::Register(reg) => Some(*reg),
            LirOperand::Constant(_) => None,
        }
    }

    /// Kind of the operand.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            LirOperand::Register(reg) => reg.kind(),
            LirOperand::Constant(value) => value.kind(),
        }
    }
}

impl From<VirtualReg> for LirOperand {
    fn from(reg: VirtualReg) -> Self {
        LirOperand::Register(reg)
    }
}

impl fmt::Display for LirOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirOperand::Register(reg) => write!(f, "{reg}"),
            LirOperand::Constant(value) => write!(f, "#{value}"),
        }
    }
}

/// One copy `to := from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// Copied operand
    pub from: LirOperand,
    /// Overwritten register
    pub to: VirtualReg,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {}", self.to, self.from)
    }
}

/// Maps HIR values to operands and hands out temporaries.
pub trait OperandAllocator {
    /// The operand holding `value`. Constants become immediates; every other value is
    /// bound to a register on first request.
    fn operand_of(&mut self, graph: &HirGraph, value: ValueId) -> LirOperand;

    /// A fresh register that no HIR value is bound to.
    fn new_temp(&mut self, kind: ValueKind) -> VirtualReg;
}

/// Sequential register numbering, one register per non-constant value.
#[derive(Debug, Default)]
pub struct VirtualRegisters {
    bound: HashMap<ValueId, VirtualReg>,
    next: u32,
}

impl VirtualRegisters {
    /// Creates an allocator with no registers handed out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registers handed out, temporaries included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.next as usize
    }

    /// The register bound to `value`, if any.
    #[must_use]
    pub fn register_of(&self, value: ValueId) -> Option<VirtualReg> {
        self.bound.get(&value).copied()
    }

    fn allocate(&mut self, kind: ValueKind) -> VirtualReg {
        let reg = VirtualReg::new(self.next, kind);
        self.next += 1;
        reg
    }
}

impl OperandAllocator for VirtualRegisters {
    fn operand_of(&mut self, graph: &HirGraph, value: ValueId) -> LirOperand {
        if let Some(constant) = graph.constant_of(value) {
            return LirOperand::Constant(constant.clone());
        }
        if let Some(reg) = self.bound.get(&value) {
            return LirOperand::Register(*reg);
        }
        let reg = self.allocate(graph.kind(value));
        self.bound.insert(value, reg);
        LirOperand::Register(reg)
    }

    fn new_temp(&mut self, kind: ValueKind) -> VirtualReg {
        self.allocate(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let reg = VirtualReg::new(3, ValueKind::Int);
        let mv = Move {
            from: LirOperand::Constant(ConstValue::Int(7)),
            to: reg,
        };
        assert_eq!(mv.to_string(), "r3 := #7");
        let mv = Move {
            from: reg.into(),
            to: VirtualReg::new(1, ValueKind::Int),
        };
        assert_eq!(mv.to_string(), "r1 := r3");
    }

    #[test]
    fn test_temps_are_fresh() {
        let mut regs = VirtualRegisters::new();
        let a = regs.new_temp(ValueKind::Long);
        let b = regs.new_temp(ValueKind::Int);
        assert_ne!(a, b);
        assert_eq!(a.kind(), ValueKind::Long);
        assert_eq!(regs.count(), 2);
    }
}
