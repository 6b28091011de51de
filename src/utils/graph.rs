//! Graph traits and traversals over basic blocks.
//!
//! Both the precomputed [`BlockMap`](crate::bytecode::BlockMap) and the finished
//! [`HirGraph`](crate::hir::HirGraph) implement [`Successors`], so the same traversals
//! serve block discovery, dumps and phi resolution ordering.

use crate::{hir::BlockId, utils::BitSet};

/// Basic trait for graph types providing node count.
pub trait GraphBase {
    /// Returns the number of nodes; valid ids are `0..node_count()`.
    fn node_count(&self) -> usize;
}

/// Trait for graphs that support forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns an iterator over the successor nodes of the given node.
    fn successors(&self, node: BlockId) -> impl Iterator<Item = BlockId>;
}

/// Trait for graphs that support backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns an iterator over the predecessor nodes of the given node.
    fn predecessors(&self, node: BlockId) -> impl Iterator<Item = BlockId>;
}

/// Returns the nodes reachable from `start` in depth-first post-order.
///
/// Iterative; a node is emitted after all of its successors have been emitted (or are
/// on the current path). Out-of-range start nodes yield an empty vector.
pub fn postorder<G: Successors>(graph: &G, start: BlockId) -> Vec<BlockId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = BitSet::new(node_count);
    let mut result = Vec::with_capacity(node_count);
    let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

    visited.insert(start.index());
    stack.push((start, graph.successors(start).collect(), 0));

    while let Some((node, succs, next)) = stack.last_mut() {
        if let Some(&succ) = succs.get(*next) {
            *next += 1;
            if succ.index() < node_count && visited.insert(succ.index()) {
                let succs = graph.successors(succ).collect();
                stack.push((succ, succs, 0));
            }
        } else {
            result.push(*node);
            stack.pop();
        }
    }

    result
}

/// Returns the nodes reachable from `start` in reverse post-order.
///
/// In an acyclic region every node appears after all of its predecessors, which makes
/// this the natural order for forward dumps and forward data flow.
pub fn reverse_postorder<G: Successors>(graph: &G, start: BlockId) -> Vec<BlockId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Adjacency(Vec<Vec<usize>>);

    impl GraphBase for Adjacency {
        fn node_count(&self) -> usize {
            self.0.len()
        }
    }

    impl Successors for Adjacency {
        fn successors(&self, node: BlockId) -> impl Iterator<Item = BlockId> {
            self.0[node.index()].iter().map(|&i| BlockId::new(i))
        }
    }

    fn ids(raw: &[usize]) -> Vec<BlockId> {
        raw.iter().map(|&i| BlockId::new(i)).collect()
    }

    #[test]
    fn test_diamond_orders() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let graph = Adjacency(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        assert_eq!(postorder(&graph, BlockId::new(0)), ids(&[3, 1, 2, 0]));
        assert_eq!(reverse_postorder(&graph, BlockId::new(0)), ids(&[0, 2, 1, 3]));
    }

    #[test]
    fn test_loop_and_unreachable() {
        // 0 -> 1 -> 2 -> 1, 3 unreachable
        let graph = Adjacency(vec![vec![1], vec![2], vec![1], vec![0]]);
        let order = reverse_postorder(&graph, BlockId::new(0));
        assert_eq!(order, ids(&[0, 1, 2]));
    }

    #[test]
    fn test_invalid_start() {
        let graph = Adjacency(vec![vec![]]);
        assert!(postorder(&graph, BlockId::new(5)).is_empty());
    }
}
