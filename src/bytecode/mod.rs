//! Decoded bytecode: typed operations, method bodies, block boundaries and an assembler.
//!
//! This module is the input side of the HIR builder. Nothing here interprets stack
//! effects; it only describes *what* operations a method contains and *where* its basic
//! blocks start and end.
//!
//! # Key Components
//!
//! - [`Op`] - Closed enum of decoded operations
//! - [`MethodCode`] / [`DecodedOp`] - A method's metadata plus its operation stream
//! - [`BlockMap`] - Basic blocks, edges and loop headers of a method body
//! - [`BytecodeAssembler`] - Fluent, label-resolving builder for operation streams

mod assembler;
mod blocks;
mod code;
mod op;

pub use assembler::BytecodeAssembler;
pub use blocks::{BlockDesc, BlockMap, HandlerTag};
pub use code::{DecodedOp, MethodCode};
pub use op::{ArithOp, CompareOp, Cond, LogicOp, Op, ShiftOp};
