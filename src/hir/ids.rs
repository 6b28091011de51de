//! Strongly-typed identifiers for IR values and blocks.
//!
//! Both identifiers index into the flat arenas owned by
//! [`HirGraph`](crate::hir::HirGraph). They are assigned sequentially and never reused
//! within one build, so they double as a stable definition order for dumps.

use std::fmt;

/// Identity of an SSA value (any [`Instruction`](crate::hir::Instruction), phis included).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// Creates a new `ValueId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        ValueId(index as u32)
    }

    /// Returns the raw index value of this identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({})", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identity of a basic block.
///
/// Blocks discovered by [`BlockMap`](crate::bytecode::BlockMap) keep their id in the IR
/// graph; a synthetic entry block, when one is needed, takes the next free id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a new `BlockId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index as u32)
    }

    /// Returns the raw index value of this identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_id_roundtrip() {
        let id = ValueId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{id}"), "v42");
        assert_eq!(format!("{id:?}"), "ValueId(42)");
    }

    #[test]
    fn test_block_id_ordering() {
        let a = BlockId::new(1);
        let b = BlockId::new(3);
        assert!(a < b);
        assert_eq!(format!("{b}"), "B3");
    }
}
