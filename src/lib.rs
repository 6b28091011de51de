// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # hirforge
//!
//! The middle tier of a method JIT: it turns decoded stack-machine bytecode into a
//! high-level intermediate representation in SSA form, and lowers the phis of that
//! representation into ordered register copies.
//!
//! ## Features
//!
//! - **Single-pass SSA construction** - Abstract interpretation of the operand stack and
//!   local slots, with phis inserted while states are merged at joins and loop headers
//! - **Local value numbering** - Redundant pure computations and memory loads within a
//!   block resolve to their first occurrence
//! - **Idealization** - Constant folding and algebraic identities applied before an
//!   instruction is appended
//! - **Phi resolution** - Parallel copies linearized with cycle breaking
//! - **Observability** - Event log, `log` tracing, textual and Graphviz dumps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hirforge::prelude::*;
//!
//! let mut asm = BytecodeAssembler::new();
//! asm.iload(0)?.iconst(1)?.iadd()?.ireturn()?;
//! let code = asm.finish_method(
//!     MethodInfo::new("inc", 2, 1)
//!         .with_params(vec![ValueKind::Int])
//!         .returns(ValueKind::Int)
//!         .with_flags(MethodFlags::STATIC),
//! )?;
//!
//! let blocks = BlockMap::discover(&code)?;
//! let resolver = StaticResolver::new();
//! let graph = HirBuilder::new(&code, &blocks, &resolver).build()?;
//! println!("{graph}");
//! # Ok::<(), hirforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`bytecode`] - Decoded operations, method bodies, block discovery and an assembler
//! - [`metadata`] - Method metadata and the constant pool resolver interface
//! - [`hir`] - The SSA graph and the builder that produces it
//! - [`lir`] - Operands, register allocation hooks and the phi resolver
//! - [`events`] - Append-only log of what the builder did
//! - [`prelude`] - Re-exports of the commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result<T>`]. A build either produces a complete,
//! verified [`hir::HirGraph`] or fails with an [`Error`]; partial graphs are never
//! returned.

#[macro_use]
pub(crate) mod error;

/// Decoded bytecode and basic block discovery.
///
/// The input side of the pipeline: a closed [`bytecode::Op`] enum, the per-method
/// operation stream and the [`bytecode::BlockMap`] describing block boundaries, edges and
/// loop headers.
pub mod bytecode;

/// Append-only event log shared between the builder and its callers.
pub mod events;

/// High-level IR in SSA form and its builder.
///
/// # Key Components
///
/// - [`hir::HirBuilder`] - Abstract interpreter producing the graph
/// - [`hir::HirGraph`] - Arena of blocks and instructions
/// - [`hir::VmState`] - Symbolic operand stack and locals
/// - [`hir::ValueNumbering`] / [`hir::idealize`] - Block-local optimizations
pub mod hir;

/// Phi resolution into ordered register copies.
pub mod lir;

/// Method metadata and constant pool lookups.
pub mod metadata;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust,ignore
/// use hirforge::prelude::*;
/// ```
pub mod prelude;

/// Bit sets, graph traversal helpers and DOT output.
pub mod utils;

/// `hirforge` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `hirforge` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the variants
/// and which of them are bailouts of a build.
pub use error::Error;

/// Events recorded while building.
pub use events::{Event, EventKind, EventLog};
