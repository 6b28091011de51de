pub mod blocks;
pub mod common;
pub mod hir;
pub mod moves;
