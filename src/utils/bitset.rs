//! A fixed-capacity bit set over small dense indices.
//!
//! Used for the per-build visited, on-stack and interpreted sets keyed by
//! [`BlockId`](crate::hir::BlockId) index, and for the color bookkeeping of the
//! phi resolver.
//!
//! # Example
//!
//! ```rust,ignore
//! use hirforge::utils::BitSet;
//!
//! let mut set = BitSet::new(100);
//! assert!(set.insert(50));
//! assert!(!set.insert(50));
//! assert!(set.contains(50));
//! assert_eq!(set.iter().collect::<Vec<_>>(), vec![50]);
//! ```

/// A bit vector for efficient membership tests.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// The bits, stored as a vector of words.
    words: Vec<u64>,
    /// The number of bits in the set.
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Returns the capacity of this bit set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bit set has no bits set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at the given index. Returns `true` if it was not set before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    /// Clears the bit at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.len, "index out of bounds");
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Returns `true` if the bit at the given index is set. Indices past the capacity are
    /// never set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Returns the number of bits set.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clears all bits.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Returns an iterator over the indices of set bits, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| {
                (0..64)
                    .filter(move |bit| word & (1u64 << bit) != 0)
                    .map(move |bit| word_idx * 64 + bit)
            })
            .take_while(|&idx| idx < self.len)
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = BitSet::new(100);
        assert!(bs.is_empty());
        assert_eq!(bs.count(), 0);

        assert!(bs.insert(0));
        assert!(bs.insert(64));
        assert!(bs.insert(99));
        assert!(!bs.insert(64));

        assert_eq!(bs.count(), 3);
        assert!(bs.contains(64));
        assert!(!bs.contains(1));
        assert!(!bs.contains(1000));
        assert_eq!(bs.iter().collect::<Vec<_>>(), vec![0, 64, 99]);
    }

    #[test]
    fn test_bitset_remove_and_clear() {
        let mut bs = BitSet::new(10);
        bs.insert(3);
        bs.insert(4);
        bs.remove(3);
        assert!(!bs.contains(3));
        assert!(bs.contains(4));
        bs.clear();
        assert!(bs.is_empty());
        assert_eq!(format!("{bs:?}"), "{}");
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_bitset_insert_out_of_bounds() {
        let mut bs = BitSet::new(4);
        bs.insert(4);
    }
}
