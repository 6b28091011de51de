//! Shared helpers: bit sets, graph traversal and DOT output.

mod bitset;
mod dot;
pub mod graph;

pub use bitset::BitSet;
pub use dot::{escape_dot, left_aligned};
