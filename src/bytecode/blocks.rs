//! Basic block boundaries and control flow edges of a method body.
//!
//! The HIR builder consumes a precomputed [`BlockMap`]: for each block its offset range,
//! successor and predecessor lists, loop-header flag and optional exception handler tag.
//! [`BlockMap::discover`] computes one from a decoded method body using the classic
//! leader algorithm:
//!
//! 1. Offset 0, every branch target and every operation following a block-ending
//!    operation starts a block.
//! 2. Each block's successors are the targets of its last operation, plus the next block
//!    when control falls through. A body whose last operation falls off the end
//!    continues at offset 0.
//! 3. A depth-first walk from the entry marks every block reached through an edge to a
//!    block still on the walk stack as a loop header.
//!
//! Edges are unique per (source, target) pair: a switch with several cases leading to the
//! same block contributes one edge.

use std::fmt;

use crate::{
    bytecode::MethodCode,
    hir::BlockId,
    utils::{
        graph::{GraphBase, Successors},
        BitSet,
    },
    Result,
};

/// Opaque tag identifying the exception handler a block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerTag(pub u16);

/// One basic block of the method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDesc {
    /// Block identity, equal to its index in the map
    pub id: BlockId,
    /// Offset of the first operation
    pub start: u32,
    /// Offset one past the last operation
    pub end: u32,
    /// Unique successors in terminal order
    pub succs: Vec<BlockId>,
    /// Unique predecessors in discovery order
    pub preds: Vec<BlockId>,
    /// Target of at least one back edge
    pub loop_header: bool,
    /// Sources of the back edges into this block
    pub back_edges: Vec<BlockId>,
    /// Reachable from the entry through normal control flow
    pub reachable: bool,
    /// Set when the block starts an exception handler
    pub handler: Option<HandlerTag>,
}

impl BlockDesc {
    /// Returns `true` if `offset` lies within this block.
    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// The basic blocks of one method body, sorted by start offset.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    blocks: Vec<BlockDesc>,
}

impl BlockMap {
    /// Splits `code` into basic blocks and computes edges, reachability and loop headers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if a branch targets an offset
    /// that is not the start of an operation.
    pub fn discover(code: &MethodCode) -> Result<Self> {
        let ops = code.ops();
        if ops.is_empty() {
            return Ok(BlockMap::default());
        }

        let mut leaders = vec![0u32];
        for (i, decoded) in ops.iter().enumerate() {
            for target in decoded.op.branch_targets() {
                if code.op_at(target).is_none() {
                    return Err(invariant_error!(
                        "{} at {} targets {}, which is not an operation boundary",
                        decoded.op.mnemonic(),
                        decoded.offset,
                        target
                    ));
                }
                leaders.push(target);
            }
            if decoded.op.ends_block() {
                if let Some(next) = ops.get(i + 1) {
                    leaders.push(next.offset);
                }
            }
        }
        leaders.sort_unstable();
        leaders.dedup();

        let code_len = code.code_len();
        let mut blocks: Vec<BlockDesc> = leaders
            .iter()
            .enumerate()
            .map(|(i, &start)| BlockDesc {
                id: BlockId::new(i),
                start,
                end: leaders.get(i + 1).copied().unwrap_or(code_len),
                succs: Vec::new(),
                preds: Vec::new(),
                loop_header: false,
                back_edges: Vec::new(),
                reachable: false,
                handler: None,
            })
            .collect();

        for i in 0..blocks.len() {
            let range = code.ops_in(blocks[i].start, blocks[i].end);
            let Some(last) = range.last() else {
                return Err(invariant_error!("block at {} is empty", blocks[i].start));
            };

            let mut targets = last.op.branch_targets();
            if last.op.falls_through() {
                // falling off the end continues at the entry
                let next = if i + 1 < blocks.len() {
                    blocks[i + 1].start
                } else {
                    0
                };
                targets.push(next);
            }

            let mut succs = Vec::with_capacity(targets.len());
            for target in targets {
                let id = Self::search(&blocks, target).ok_or_else(|| {
                    invariant_error!("no block contains target offset {}", target)
                })?;
                if !succs.contains(&id) {
                    succs.push(id);
                }
            }
            blocks[i].succs = succs;
        }

        for i in 0..blocks.len() {
            let source = blocks[i].id;
            for succ in blocks[i].succs.clone() {
                let preds = &mut blocks[succ.index()].preds;
                if !preds.contains(&source) {
                    preds.push(source);
                }
            }
        }

        let mut map = BlockMap { blocks };
        map.mark_loops();
        Ok(map)
    }

    fn search(blocks: &[BlockDesc], offset: u32) -> Option<BlockId> {
        let index = blocks.partition_point(|block| block.start <= offset);
        let block = blocks.get(index.checked_sub(1)?)?;
        block.contains(offset).then_some(block.id)
    }

    /// Iterative depth-first walk with an explicit stack; an edge into a block that is
    /// still on the stack is a back edge.
    fn mark_loops(&mut self) {
        if self.blocks.is_empty() {
            return;
        }

        let count = self.blocks.len();
        let mut visited = BitSet::new(count);
        let mut on_stack = BitSet::new(count);
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry(), 0)];
        visited.insert(0);
        on_stack.insert(0);

        while let Some((block, next)) = stack.last_mut() {
            let current = *block;
            let succs = &self.blocks[current.index()].succs;
            if let Some(&succ) = succs.get(*next) {
                *next += 1;
                if on_stack.contains(succ.index()) {
                    let header = &mut self.blocks[succ.index()];
                    header.loop_header = true;
                    header.back_edges.push(current);
                } else if !visited.contains(succ.index()) {
                    visited.insert(succ.index());
                    on_stack.insert(succ.index());
                    stack.push((succ, 0));
                }
            } else {
                on_stack.remove(current.index());
                stack.pop();
            }
        }

        for block in &mut self.blocks {
            block.reachable = visited.contains(block.id.index());
        }
    }

    /// Tags `block` as the start of an exception handler.
    pub fn set_handler(&mut self, block: BlockId, tag: HandlerTag) {
        if let Some(desc) = self.blocks.get_mut(block.index()) {
            desc.handler = Some(tag);
        }
    }

    /// The entry block (the one containing offset 0).
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the body has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BlockDesc> {
        self.blocks.get(id.index())
    }

    /// All blocks in offset order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockDesc] {
        &self.blocks
    }

    /// The block whose offset range contains `offset`.
    #[must_use]
    pub fn block_containing(&self, offset: u32) -> Option<BlockId> {
        Self::search(&self.blocks, offset)
    }

    /// The block starting exactly at `offset`.
    #[must_use]
    pub fn block_starting_at(&self, offset: u32) -> Option<BlockId> {
        self.block_containing(offset)
            .filter(|id| self.blocks[id.index()].start == offset)
    }

    /// Returns `true` if `id` is the target of a back edge.
    #[must_use]
    pub fn is_loop_header(&self, id: BlockId) -> bool {
        self.block(id).is_some_and(|block| block.loop_header)
    }
}

impl GraphBase for BlockMap {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Successors for BlockMap {
    fn successors(&self, node: BlockId) -> impl Iterator<Item = BlockId> {
        self.blocks
            .get(node.index())
            .map(|block| block.succs.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

impl fmt::Display for BlockMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(
                f,
                "{}{} [{},{})",
                block.id,
                if block.loop_header { "*" } else { "" },
                block.start,
                block.end
            )?;
            if block.handler.is_some() {
                write!(f, " !")?;
            }
            write!(f, " =>")?;
            for succ in &block.succs {
                write!(f, " {succ}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{BytecodeAssembler, Cond},
        metadata::MethodInfo,
    };

    fn discover(asm: BytecodeAssembler) -> BlockMap {
        let code = asm.finish_method(MethodInfo::new("m", 4, 4)).unwrap();
        BlockMap::discover(&code).unwrap()
    }

    #[test]
    fn test_straight_line_is_one_block() {
        let mut asm = BytecodeAssembler::new();
        asm.iconst(1).unwrap().iconst(2).unwrap().iadd().unwrap().ireturn().unwrap();
        let map = discover(asm);
        assert_eq!(map.len(), 1);
        assert!(map.blocks()[0].succs.is_empty());
        assert!(!map.is_loop_header(map.entry()));
    }

    #[test]
    fn test_diamond() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(1)
            .unwrap()
            .ifeq("else")
            .unwrap()
            .iconst(1)
            .unwrap()
            .istore(2)
            .unwrap()
            .goto("join")
            .unwrap()
            .label("else")
            .unwrap()
            .iconst(2)
            .unwrap()
            .istore(2)
            .unwrap()
            .label("join")
            .unwrap()
            .iload(2)
            .unwrap()
            .ireturn()
            .unwrap();
        let map = discover(asm);

        assert_eq!(map.len(), 4);
        // conditional branch: taken target first, fall-through second
        assert_eq!(
            map.blocks()[0].succs,
            vec![BlockId::new(2), BlockId::new(1)]
        );
        assert_eq!(map.blocks()[3].preds.len(), 2);
        assert!(map.blocks().iter().all(|b| b.reachable && !b.loop_header));
    }

    #[test]
    fn test_loop_header_detected() {
        let mut asm = BytecodeAssembler::new();
        asm.iconst(0)
            .unwrap()
            .istore(1)
            .unwrap()
            .label("head")
            .unwrap()
            .iload(1)
            .unwrap()
            .iconst(10)
            .unwrap()
            .if_icmp(Cond::Ge, "exit")
            .unwrap()
            .iinc(1, 1)
            .unwrap()
            .goto("head")
            .unwrap()
            .label("exit")
            .unwrap()
            .return_void()
            .unwrap();
        let map = discover(asm);

        let head = map.block_containing(2).unwrap();
        assert!(map.is_loop_header(head));
        assert_eq!(map.block(head).unwrap().preds.len(), 2);
        let body = map.block_containing(8).unwrap();
        assert_eq!(map.block(head).unwrap().back_edges, vec![body]);
        assert_eq!(map.block_starting_at(2), Some(head));
        assert_eq!(map.block_starting_at(3), None);
    }

    #[test]
    fn test_fall_off_end_targets_entry() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0).unwrap().ifeq("tail").unwrap().return_void().unwrap();
        asm.label("tail").unwrap().nop().unwrap();
        let map = discover(asm);

        let last = map.blocks().last().unwrap();
        assert_eq!(last.succs, vec![map.entry()]);
        assert!(map.is_loop_header(map.entry()));
    }

    #[test]
    fn test_switch_edges_are_unique() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .tableswitch(0, &["a", "a", "b"], "b")
            .unwrap()
            .label("a")
            .unwrap()
            .return_void()
            .unwrap()
            .label("b")
            .unwrap()
            .return_void()
            .unwrap();
        let map = discover(asm);
        assert_eq!(map.blocks()[0].succs.len(), 2);
    }

    #[test]
    fn test_handler_blocks_are_unreachable() {
        let mut asm = BytecodeAssembler::new();
        asm.return_void().unwrap().label("handler").unwrap().athrow().unwrap();
        let mut map = discover(asm);
        let handler = map.block_starting_at(1).unwrap();
        map.set_handler(handler, HandlerTag(0));
        assert!(!map.block(handler).unwrap().reachable);
        assert_eq!(map.block(handler).unwrap().handler, Some(HandlerTag(0)));
    }
}
