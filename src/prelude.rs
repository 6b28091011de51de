//! # hirforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the hirforge library. Import this module to get quick access to everything
//! needed to assemble a method, build its HIR and resolve its phis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all hirforge operations
pub use crate::Error;

/// The result type used throughout hirforge
pub use crate::Result;

/// Builder events
pub use crate::{Event, EventKind, EventLog};

// ================================================================================================
// Input Side
// ================================================================================================

/// Decoded operations, method bodies, block discovery and assembly
pub use crate::bytecode::{
    ArithOp, BlockMap, BytecodeAssembler, CompareOp, Cond, DecodedOp, LogicOp, MethodCode, Op,
    ShiftOp,
};

/// Method metadata and constant pool resolution
pub use crate::metadata::{
    ConstantEntry, FieldAccess, FieldFlags, InvokeKind, MetadataResolver, MethodFlags,
    MethodInfo, StaticResolver, TypeDesc, ValueKind,
};

// ================================================================================================
// High-Level IR
// ================================================================================================

/// Graph, blocks, instructions and values
pub use crate::hir::{
    BlockId, ConstValue, GraphFlags, HirBlock, HirGraph, HirOp, Instruction, PhiSlot, Terminal,
    ValueId, VmState,
};

/// Construction
pub use crate::hir::{BuildConfig, HirBuilder};

// ================================================================================================
// Phi Resolution
// ================================================================================================

/// Operands, moves and the resolver
pub use crate::lir::{
    resolve_all, LirOperand, Move, OperandAllocator, PhiResolver, VirtualReg, VirtualRegisters,
};

// ================================================================================================
// Graph Utilities
// ================================================================================================

/// Graph traits implemented by block maps and HIR graphs
pub use crate::utils::graph::{GraphBase, Predecessors, Successors};
