//! Low-level IR support: operands and phi resolution.
//!
//! The low-level side only needs a small slice of a full LIR to lower SSA joins:
//! operands ([`LirOperand`], [`VirtualReg`]), copies ([`Move`]) and an
//! [`OperandAllocator`] that binds HIR values to registers. [`PhiResolver`] turns the
//! phi assignments of one control flow edge into an ordered copy sequence.
//!
//! # Key Components
//!
//! - [`PhiResolver`] - Orders parallel copies and breaks cycles with temporaries
//! - [`resolve_edge`] / [`resolve_block`] / [`resolve_all`] - Copies for edges of a [`HirGraph`](crate::hir::HirGraph)
//! - [`VirtualRegisters`] - Sequential register numbering

mod operand;
mod resolver;

pub use operand::{LirOperand, Move, OperandAllocator, VirtualReg, VirtualRegisters};
pub use resolver::{resolve_all, resolve_block, resolve_edge, PhiResolver};
