//! Linearization of phi assignments into ordered copies.
//!
//! At the end of a block that jumps to a join, every phi of the join has to receive the
//! value the block provides for it. These assignments happen simultaneously in SSA
//! semantics; a machine needs them as a sequence of copies in which no register is
//! overwritten before it has been read. [`PhiResolver`] orders the copies and breaks
//! copy cycles with a temporary.
//!
//! # Algorithm
//!
//! Moves form a graph whose nodes are operands and whose edges point from a source to
//! each destination it feeds. Registers are one node per identity, constants get a
//! fresh node for every occurrence. Every register node is used as the start of a
//! depth-first walk (newest first) that emits a node's copy only after all copies out of
//! that node have been emitted. Reaching a node that is still in progress, and is not a
//! finished start node, closes a cycle: the value feeding it is saved in a temporary and
//! the node is later assigned from the temporary. Copies from constants never take part
//! in a cycle and are emitted last.
//!
//! # Example
//!
//! ```rust,ignore
//! use hirforge::lir::{LirOperand, PhiResolver, VirtualRegisters};
//!
//! let mut regs = VirtualRegisters::new();
//! let mut resolver = PhiResolver::new();
//! resolver.add_move(LirOperand::Register(a), b)?;
//! resolver.add_move(LirOperand::Register(b), a)?;
//! for mv in resolver.finish(&mut regs)? {
//!     println!("{mv}");
//! }
//! ```

use std::collections::HashMap;

use log::trace;

use crate::{
    hir::{BlockId, HirGraph, ValueId, VmState},
    lir::{LirOperand, Move, OperandAllocator, VirtualReg},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White, // Unvisited
    Gray,  // On the walk stack
    Black, // All outgoing copies emitted
}

#[derive(Debug)]
struct ResolveNode {
    operand: LirOperand,
    destinations: Vec<usize>,
    has_source: bool,
    assigned: bool,
    start: bool,
    color: Color,
}

impl ResolveNode {
    fn new(operand: LirOperand) -> Self {
        ResolveNode {
            operand,
            destinations: Vec::new(),
            has_source: false,
            assigned: false,
            start: false,
            color: Color::White,
        }
    }
}

enum Frame {
    Enter { src: Option<usize>, dest: usize },
    Finish { src: Option<usize>, dest: usize },
}

/// Collects the copies of one edge and emits them in a safe order.
#[derive(Debug, Default)]
pub struct PhiResolver {
    nodes: Vec<ResolveNode>,
    registers: HashMap<VirtualReg, usize>,
    virtual_nodes: Vec<usize>,
    other_nodes: Vec<usize>,
}

impl PhiResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no move was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn register_node(&mut self, reg: VirtualReg) -> usize {
        if let Some(node) = self.registers.get(&reg) {
            return *node;
        }
        let node = self.nodes.len();
        self.nodes.push(ResolveNode::new(LirOperand::Register(reg)));
        self.registers.insert(reg, node);
        self.virtual_nodes.push(node);
        node
    }

    /// Adds the simultaneous assignment `to := from`. Copies of a register onto itself
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if `to` already has a source.
    pub fn add_move(&mut self, from: LirOperand, to: VirtualReg) -> Result<()> {
        if from == LirOperand::Register(to) {
            return Ok(());
        }
        let source = match &from {
            LirOperand::Register(reg) => self.register_node(*reg),
            LirOperand::Constant(_) => {
                let node = self.nodes.len();
                self.nodes.push(ResolveNode::new(from.clone()));
                self.other_nodes.push(node);
                node
            }
        };
        let dest = self.register_node(to);
        if self.nodes[dest].has_source {
            return Err(invariant_error!("{} is assigned twice", to));
        }
        self.nodes[dest].has_source = true;
        self.nodes[source].destinations.push(dest);
        Ok(())
    }

    /// Emits the ordered copies. Temporaries come from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] if the move graph is
    /// inconsistent.
    pub fn finish(mut self, alloc: &mut dyn OperandAllocator) -> Result<Vec<Move>> {
        let mut moves = Vec::new();
        let mut pending: HashMap<usize, VirtualReg> = HashMap::new();

        let starts: Vec<usize> = self.virtual_nodes.iter().rev().copied().collect();
        for start in starts {
            if self.nodes[start].color != Color::White {
                continue;
            }
            self.walk(start, alloc, &mut pending, &mut moves)?;
            self.nodes[start].start = true;
        }

        for &node in self.other_nodes.iter().rev() {
            let node = &self.nodes[node];
            for &dest in node.destinations.iter().rev() {
                moves.push(Move {
                    from: node.operand.clone(),
                    to: self.register_of(dest)?,
                });
            }
        }
        Ok(moves)
    }

    fn register_of(&self, node: usize) -> Result<VirtualReg> {
        self.nodes[node]
            .operand
            .as_register()
            .ok_or_else(|| invariant_error!("Move destination {} is not a register", node))
    }

    fn walk(
        &mut self,
        start: usize,
        alloc: &mut dyn OperandAllocator,
        pending: &mut HashMap<usize, VirtualReg>,
        moves: &mut Vec<Move>,
    ) -> Result<()> {
        let mut stack = vec![Frame::Enter {
            src: None,
            dest: start,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { src, dest } => match self.nodes[dest].color {
                    Color::White => {
                        self.nodes[dest].color = Color::Gray;
                        stack.push(Frame::Finish { src, dest });
                        for &next in &self.nodes[dest].destinations {
                            stack.push(Frame::Enter {
                                src: Some(dest),
                                dest: next,
                            });
                        }
                    }
                    Color::Gray if !self.nodes[dest].start => {
                        let src = src.ok_or_else(|| {
                            invariant_error!("Cycle through node {} without a source", dest)
                        })?;
                        let operand = self.nodes[src].operand.clone();
                        let temp = alloc.new_temp(operand.kind());
                        trace!(
                            "phi cycle at {}, saving {operand} in {temp}",
                            self.nodes[dest].operand
                        );
                        moves.push(Move {
                            from: operand,
                            to: temp,
                        });
                        pending.insert(dest, temp);
                    }
                    Color::Gray | Color::Black => stack.push(Frame::Finish { src, dest }),
                },
                Frame::Finish { src, dest } => {
                    self.nodes[dest].color = Color::Black;
                    if self.nodes[dest].assigned {
                        continue;
                    }
                    let to = self.register_of(dest)?;
                    if let Some(temp) = pending.remove(&dest) {
                        moves.push(Move {
                            from: LirOperand::Register(temp),
                            to,
                        });
                        self.nodes[dest].assigned = true;
                    } else if let Some(src) = src {
                        moves.push(Move {
                            from: self.nodes[src].operand.clone(),
                            to,
                        });
                        self.nodes[dest].assigned = true;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Computes the copies on the edge `from -> to`, given `from`'s exit state.
///
/// Nothing is emitted unless `to` has more than one predecessor. For every stack and
/// local slot whose value in `to`'s entry state is a phi of `to`, the value `from`
/// leaves in that slot is copied into the phi's register.
///
/// # Errors
///
/// Returns [`crate::Error::InternalInvariantViolation`] if either block is missing,
/// `to` has not been reached, or the slot layouts differ.
pub fn resolve_edge(
    graph: &HirGraph,
    alloc: &mut dyn OperandAllocator,
    from: BlockId,
    to: BlockId,
    exit: &VmState,
) -> Result<Vec<Move>> {
    let target = graph
        .block(to)
        .ok_or_else(|| invariant_error!("Block {} does not exist", to))?;
    if target.preds().len() <= 1 {
        return Ok(Vec::new());
    }
    let entry = target
        .entry_state()
        .ok_or_else(|| invariant_error!("{} has no entry state", to))?;
    if entry.stack_depth() != exit.stack_depth() || entry.max_locals() != exit.max_locals() {
        return Err(invariant_error!(
            "State layout of {} does not match the entry of {}",
            from,
            to
        ));
    }

    let pairs: Vec<(ValueId, ValueId)> = exit
        .stack()
        .iter()
        .zip(entry.stack())
        .chain(exit.locals().iter().zip(entry.locals()))
        .filter_map(|(source, dest)| Some(((*source)?, (*dest)?)))
        .filter(|(source, dest)| source != dest && graph.is_phi_of(*dest, to))
        .collect();

    let mut resolver = PhiResolver::new();
    for (source, phi) in pairs {
        let operand = alloc.operand_of(graph, source);
        let Some(reg) = alloc.operand_of(graph, phi).as_register() else {
            return Err(invariant_error!("Phi {} has no register", phi));
        };
        resolver.add_move(operand, reg)?;
    }
    resolver.finish(alloc)
}

/// Copies for the end of a single-successor block, empty if the successor needs none.
///
/// # Errors
///
/// See [`resolve_edge`].
pub fn resolve_block(
    graph: &HirGraph,
    alloc: &mut dyn OperandAllocator,
    block: BlockId,
) -> Result<Vec<Move>> {
    let source = graph
        .block(block)
        .ok_or_else(|| invariant_error!("Block {} does not exist", block))?;
    let [succ] = source.succs() else {
        return Ok(Vec::new());
    };
    let Some(exit) = source.exit_state() else {
        return Ok(Vec::new());
    };
    resolve_edge(graph, alloc, block, *succ, exit)
}

/// Resolves every single-successor block of a finished graph, in block order. Blocks
/// without copies are left out.
///
/// # Errors
///
/// See [`resolve_edge`].
pub fn resolve_all(
    graph: &HirGraph,
    alloc: &mut dyn OperandAllocator,
) -> Result<Vec<(BlockId, Vec<Move>)>> {
    let mut resolved = Vec::new();
    for block in graph.blocks() {
        let moves = resolve_block(graph, alloc, block.id())?;
        if !moves.is_empty() {
            resolved.push((block.id(), moves));
        }
    }
    Ok(resolved)
}
