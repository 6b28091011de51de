//! The HIR graph: a flat arena of instructions and blocks.
//!
//! [`HirGraph`] owns every [`Instruction`] and every [`HirBlock`] of one method. Values
//! and blocks refer to each other only through [`ValueId`] and [`BlockId`], so the graph
//! is a plain data structure without interior pointers: cloning, dumping and handing it
//! to another thread are all trivial.
//!
//! The builder grows the graph through the crate-internal `append`/`new_phi` family and
//! [`HirGraph::merge_state`]; consumers only read it.
//!
//! # Output formats
//!
//! - `Display` prints a textual dump, blocks in reverse post-order, phis first
//! - [`HirGraph::to_dot`] renders a Graphviz digraph with one box per block

use std::fmt::{self, Write as _};

use bitflags::bitflags;

use crate::{
    bytecode::BlockMap,
    hir::{BlockId, ConstValue, HirBlock, HirOp, Instruction, PhiSlot, Terminal, ValueId, VmState},
    metadata::{MethodInfo, ValueKind},
    utils::{
        escape_dot,
        graph::{reverse_postorder, GraphBase, Predecessors, Successors},
    },
    Result,
};

bitflags! {
    /// Facts about the whole method collected while building.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GraphFlags: u8 {
        /// A `final` field was written
        const WRITES_FINAL = 0x01;
        /// A `volatile` field was written
        const WRITES_VOLATILE = 0x02;
    }
}

/// The SSA form of one method.
#[derive(Debug, Clone)]
pub struct HirGraph {
    method: MethodInfo,
    values: Vec<Instruction>,
    blocks: Vec<HirBlock>,
    entry: BlockId,
    flags: GraphFlags,
}

impl HirGraph {
    /// Creates an empty graph with one block per entry of `map`.
    #[must_use]
    pub fn new(method: MethodInfo, map: &BlockMap) -> Self {
        HirGraph {
            method,
            values: Vec::new(),
            blocks: map.blocks().iter().map(HirBlock::from_desc).collect(),
            entry: map.entry(),
            flags: GraphFlags::empty(),
        }
    }

    /// Inserts an empty entry block that jumps to the current entry, and makes it the
    /// new entry. Returns its id.
    pub(crate) fn add_synthetic_entry(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(HirBlock::synthetic_entry(id, self.entry));
        self.entry = id;
        id
    }

    /// Metadata of the method this graph was built for.
    #[must_use]
    pub fn method(&self) -> &MethodInfo {
        &self.method
    }

    /// Entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Method-level facts.
    #[must_use]
    pub fn flags(&self) -> GraphFlags {
        self.flags
    }

    pub(crate) fn set_flag(&mut self, flag: GraphFlags) {
        self.flags.insert(flag);
    }

    /// Number of blocks, unreached ones included.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of values in the arena, dead phis included.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&HirBlock> {
        self.blocks.get(id.index())
    }

    /// All blocks in id order.
    #[must_use]
    pub fn blocks(&self) -> &[HirBlock] {
        &self.blocks
    }

    /// Returns the instruction with the given id.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Instruction> {
        self.values.get(id.index())
    }

    /// All instructions in definition order.
    #[must_use]
    pub fn values(&self) -> &[Instruction] {
        &self.values
    }

    /// Result kind of a value; `void` for unknown ids.
    #[must_use]
    pub fn kind(&self, id: ValueId) -> ValueKind {
        self.value(id).map_or(ValueKind::Void, |v| v.kind)
    }

    /// The literal behind a value, if it is a constant.
    #[must_use]
    pub fn constant_of(&self, id: ValueId) -> Option<&ConstValue> {
        self.value(id).and_then(|v| v.op.as_constant())
    }

    /// The terminal of a block, once built.
    #[must_use]
    pub fn terminal(&self, block: BlockId) -> Option<&Terminal> {
        let id = self.block(block)?.terminal?;
        self.value(id)?.op.as_terminal()
    }

    /// Returns `true` if `value` is a phi owned by `block`.
    #[must_use]
    pub fn is_phi_of(&self, value: ValueId, block: BlockId) -> bool {
        self.value(value).is_some_and(|v| v.is_phi_of(block))
    }

    /// Phis of `block` that are still live, paired with their slot.
    pub fn phis(&self, block: BlockId) -> impl Iterator<Item = (PhiSlot, &Instruction)> + '_ {
        self.block(block)
            .map(|b| b.phis.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.value(*id))
            .filter_map(|instr| match instr.op {
                HirOp::Phi { slot, .. } => Some((slot, instr)),
                _ => None,
            })
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut HirBlock> {
        self.blocks
            .get_mut(id.index())
            .ok_or_else(|| invariant_error!("Block {} does not exist", id))
    }

    fn push_value(
        &mut self,
        block: BlockId,
        kind: ValueKind,
        op: HirOp,
        offset: Option<u32>,
        state_before: Option<VmState>,
    ) -> ValueId {
        let id = ValueId::new(self.values.len());
        self.values.push(Instruction {
            id,
            kind,
            op,
            block,
            offset,
            state_before: state_before.map(Box::new),
        });
        id
    }

    /// Appends an instruction to the end of `block`'s instruction list.
    pub(crate) fn append(
        &mut self,
        block: BlockId,
        kind: ValueKind,
        op: HirOp,
        offset: Option<u32>,
        state_before: Option<VmState>,
    ) -> Result<ValueId> {
        for operand in op.operands() {
            if operand.index() >= self.values.len() {
                return Err(invariant_error!("{} used before its definition", operand));
            }
        }
        self.block_mut(block)?;
        let id = self.push_value(block, kind, op, offset, state_before);
        self.block_mut(block)?.instrs.push(id);
        Ok(id)
    }

    /// Creates a phi owned by `block`.
    pub(crate) fn new_phi(
        &mut self,
        block: BlockId,
        slot: PhiSlot,
        kind: ValueKind,
        inputs: Vec<ValueId>,
    ) -> Result<ValueId> {
        self.block_mut(block)?;
        let op = HirOp::Phi {
            block,
            slot,
            inputs,
        };
        let id = self.push_value(block, kind, op, None, None);
        self.block_mut(block)?.phis.push(id);
        Ok(id)
    }

    /// Appends one input to a phi.
    pub(crate) fn push_phi_input(&mut self, phi: ValueId, input: ValueId) -> Result<()> {
        match self.values.get_mut(phi.index()).map(|v| &mut v.op) {
            Some(HirOp::Phi { inputs, .. }) => {
                inputs.push(input);
                Ok(())
            }
            _ => Err(invariant_error!("{} is not a phi", phi)),
        }
    }

    /// Removes a phi from its block's phi list. The value itself stays in the arena.
    pub(crate) fn remove_phi(&mut self, block: BlockId, phi: ValueId) -> Result<()> {
        self.block_mut(block)?.phis.retain(|p| *p != phi);
        Ok(())
    }

    /// Records the edge `from -> to` once.
    pub(crate) fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        let source = self.block_mut(from)?;
        if !source.succs.contains(&to) {
            source.succs.push(to);
        }
        let target = self.block_mut(to)?;
        if !target.preds.contains(&from) {
            target.preds.push(from);
        }
        Ok(())
    }

    /// Installs the terminal of `block` and replaces its successor list with the
    /// terminal's unique successors.
    pub(crate) fn set_terminal(
        &mut self,
        block: BlockId,
        terminal: Terminal,
        offset: Option<u32>,
        state_before: Option<VmState>,
    ) -> Result<ValueId> {
        if self.block_mut(block)?.terminal.is_some() {
            return Err(invariant_error!("Block {} already has a terminal", block));
        }
        for operand in terminal.operands() {
            if operand.index() >= self.values.len() {
                return Err(invariant_error!("{} used before its definition", operand));
            }
        }
        let succs = terminal.successors();
        let id = self.push_value(
            block,
            ValueKind::Void,
            HirOp::End(terminal),
            offset,
            state_before,
        );
        let target = self.block_mut(block)?;
        target.terminal = Some(id);
        target.succs = succs;
        Ok(id)
    }

    /// Checks structural invariants of a finished graph.
    ///
    /// Every built block has a terminal, every live phi has one input per predecessor and
    /// every operand refers to an earlier value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InternalInvariantViolation`] describing the first violation.
    pub fn verify(&self) -> Result<()> {
        for block in self.blocks.iter().filter(|b| b.built) {
            if block.terminal.is_none() {
                return Err(invariant_error!("Block {} has no terminal", block.id));
            }
            for (slot, phi) in self.phis(block.id) {
                let arity = phi.phi_inputs().map_or(0, <[ValueId]>::len);
                if arity != block.preds.len() {
                    return Err(invariant_error!(
                        "Phi {} ({}) of {} has {} inputs but {} predecessors",
                        phi.id,
                        slot,
                        block.id,
                        arity,
                        block.preds.len()
                    ));
                }
            }
        }
        for instr in self.values.iter().filter(|v| !v.is_phi()) {
            if let Some(operand) = instr.op.operands().into_iter().find(|o| *o >= instr.id) {
                return Err(invariant_error!(
                    "{} uses {} before its definition",
                    instr.id,
                    operand
                ));
            }
        }
        Ok(())
    }

    /// Blocks in dump order: reverse post-order from the entry.
    #[must_use]
    pub fn block_order(&self) -> Vec<BlockId> {
        reverse_postorder(self, self.entry)
    }

    /// Renders the graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();

        dot.push_str("digraph HIR {\n");
        let _ = writeln!(dot, "    label=\"HIR: {}\";", escape_dot(&self.method.name));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        let order = self.block_order();
        for &id in &order {
            let Some(block) = self.block(id) else {
                continue;
            };
            let mut label = format!("{id} [{}..{})", block.start, block.end);
            if block.loop_header {
                label.push_str(" (loop)");
            }
            label.push_str("\\l");
            for (_, phi) in self.phis(id) {
                let _ = write!(label, "{}\\l", escape_dot(&phi.to_string()));
            }
            for instr in block.instrs.iter().filter_map(|v| self.value(*v)) {
                let _ = write!(label, "{}\\l", escape_dot(&instr.to_string()));
            }
            if let Some(terminal) = self.terminal(id) {
                let _ = write!(label, "{}\\l", escape_dot(&terminal.to_string()));
            }

            let style = if id == self.entry {
                ", style=filled, fillcolor=lightgreen"
            } else if block.loop_header {
                ", style=filled, fillcolor=lightyellow"
            } else {
                ""
            };
            let _ = writeln!(dot, "    {id} [label=\"{label}\"{style}];");
        }

        dot.push('\n');

        for &id in &order {
            match self.terminal(id) {
                Some(Terminal::If {
                    taken, not_taken, ..
                }) => {
                    let _ = writeln!(dot, "    {id} -> {taken} [label=\"T\", color=green];");
                    let _ = writeln!(dot, "    {id} -> {not_taken} [label=\"F\", color=red];");
                }
                Some(terminal) => {
                    for succ in terminal.successors() {
                        let _ = writeln!(dot, "    {id} -> {succ};");
                    }
                }
                None => {}
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for HirGraph {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Successors for HirGraph {
    fn successors(&self, node: BlockId) -> impl Iterator<Item = BlockId> {
        self.block(node)
            .map(|b| b.succs.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

impl Predecessors for HirGraph {
    fn predecessors(&self, node: BlockId) -> impl Iterator<Item = BlockId> {
        self.block(node)
            .map(|b| b.preds.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

impl fmt::Display for HirGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "method {} stack={} locals={}",
            self.method.name, self.method.max_stack, self.method.max_locals
        )?;
        for id in self.block_order() {
            let Some(block) = self.block(id) else {
                continue;
            };
            write!(f, "{id} [{}..{})", block.start, block.end)?;
            if block.loop_header {
                write!(f, " loop")?;
            }
            if block.synthetic {
                write!(f, " synthetic")?;
            }
            if !block.preds.is_empty() {
                write!(f, " preds:")?;
                for pred in &block.preds {
                    write!(f, " {pred}")?;
                }
            }
            writeln!(f)?;
            for (_, phi) in self.phis(id) {
                writeln!(f, "  {phi}")?;
            }
            for instr in block.instrs.iter().filter_map(|v| self.value(*v)) {
                writeln!(f, "  {instr}")?;
            }
            if let Some(terminal) = self.terminal(id) {
                writeln!(f, "  {terminal}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::BytecodeAssembler;

    fn straight_line() -> HirGraph {
        let mut asm = BytecodeAssembler::new();
        asm.iconst(1).unwrap().ireturn().unwrap();
        let code = asm
            .finish_method(MethodInfo::new("one", 1, 0).returns(ValueKind::Int))
            .unwrap();
        let map = BlockMap::discover(&code).unwrap();
        HirGraph::new(code.info().clone(), &map)
    }

    #[test]
    fn test_append_and_terminal() {
        let mut graph = straight_line();
        let b0 = graph.entry();
        let one = graph
            .append(b0, ValueKind::Int, HirOp::Constant(ConstValue::Int(1)), Some(0), None)
            .unwrap();
        graph
            .set_terminal(b0, Terminal::Return { value: Some(one) }, Some(1), None)
            .unwrap();
        graph.block_mut(b0).unwrap().built = true;

        assert_eq!(graph.constant_of(one), Some(&ConstValue::Int(1)));
        assert_eq!(graph.kind(one), ValueKind::Int);
        assert!(graph.block(b0).unwrap().succs().is_empty());
        assert!(graph.verify().is_ok());
        assert_eq!(
            graph.to_string(),
            "method one stack=1 locals=0\nB0 [0..2)\n  v0:i = const 1\n  return v0\n"
        );
        assert!(graph
            .set_terminal(b0, Terminal::Return { value: None }, None, None)
            .is_err());
    }

    #[test]
    fn test_use_before_definition() {
        let mut graph = straight_line();
        let b0 = graph.entry();
        let result = graph.append(
            b0,
            ValueKind::Int,
            HirOp::Negate {
                x: ValueId::new(3),
            },
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_phi_bookkeeping() {
        let mut graph = straight_line();
        let b0 = graph.entry();
        let c = graph
            .append(b0, ValueKind::Int, HirOp::Constant(ConstValue::Int(3)), None, None)
            .unwrap();
        let phi = graph
            .new_phi(b0, PhiSlot::Local(0), ValueKind::Int, vec![c])
            .unwrap();
        graph.push_phi_input(phi, c).unwrap();
        assert!(graph.is_phi_of(phi, b0));
        assert_eq!(graph.phis(b0).count(), 1);
        assert!(graph.push_phi_input(c, c).is_err());

        graph.remove_phi(b0, phi).unwrap();
        assert_eq!(graph.phis(b0).count(), 0);
        assert!(graph.value(phi).is_some());
    }

    #[test]
    fn test_dot_output() {
        let mut graph = straight_line();
        let b0 = graph.entry();
        graph
            .set_terminal(b0, Terminal::Return { value: None }, None, None)
            .unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph HIR {"));
        assert!(dot.contains("B0 [label=\"B0 [0..2)\\lreturn\\l\""));
        assert!(dot.ends_with("}\n"));
    }
}
