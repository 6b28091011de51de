//! High-level intermediate representation in SSA form.
//!
//! This module turns a decoded method body into a graph of basic blocks whose
//! instructions consume and produce SSA values. Construction happens in a single pass of
//! abstract interpretation; there is no separate renaming phase.
//!
//! # Architecture
//!
//! ```text
//! MethodCode + BlockMap
//!        │
//!        ▼
//!   HirBuilder ──► VmState per block (operand stack, locals, locks)
//!        │           │
//!        │           └─► merge_state: phis at joins and loop headers
//!        │
//!        ├─► idealize: constant folding and identities
//!        ├─► ValueNumbering: block-local redundancy elimination
//!        ▼
//!    HirGraph ──► Display / to_dot / verify
//! ```
//!
//! # Key Components
//!
//! - [`HirBuilder`] - Abstract interpreter producing a [`HirGraph`]
//! - [`HirGraph`] / [`HirBlock`] / [`Instruction`] - The IR itself
//! - [`VmState`] - Symbolic operand stack, locals and held monitors
//! - [`HirOp`] / [`Terminal`] - Instruction and block-ending operations
//! - [`ValueNumbering`] / [`idealize`] - Optimizations applied while appending
//! - [`BuildConfig`] - Build options
//!
//! # Values
//!
//! Every instruction is a value, identified by a [`ValueId`] that indexes the graph's
//! arena. Instructions without a result have kind `void` and are only kept for their
//! effect. Long and double values occupy two stack and local slots; the upper slot is
//! always empty.

mod block;
mod builder;
mod config;
mod graph;
mod ideal;
mod ids;
mod instr;
mod lvn;
mod merge;
mod state;
mod value;

pub use block::HirBlock;
pub use builder::HirBuilder;
pub use config::BuildConfig;
pub use graph::{GraphFlags, HirGraph};
pub use ideal::{idealize, Ideal};
pub use ids::{BlockId, ValueId};
pub use instr::{HirOp, Instruction, MemoryEffect, PhiSlot, Terminal};
pub use lvn::{ValueKey, ValueNumbering};
pub use merge::MergeOutcome;
pub use state::VmState;
pub use value::ConstValue;
