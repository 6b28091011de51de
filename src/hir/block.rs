//! Basic blocks of the HIR graph.

use crate::{
    bytecode::{BlockDesc, HandlerTag},
    hir::{BlockId, ValueId, VmState},
};

/// One basic block under construction or finished.
///
/// The instruction list holds every non-phi instruction in definition order; phis are
/// kept separately and the terminal is referenced by id. Predecessors are recorded in
/// merge order: the i-th input of every phi owned by the block belongs to the i-th
/// predecessor.
#[derive(Debug, Clone)]
pub struct HirBlock {
    pub(crate) id: BlockId,
    pub(crate) start: u32,
    pub(crate) end: u32,
    pub(crate) loop_header: bool,
    pub(crate) handler: Option<HandlerTag>,
    pub(crate) synthetic: bool,
    pub(crate) preds: Vec<BlockId>,
    pub(crate) succs: Vec<BlockId>,
    pub(crate) phis: Vec<ValueId>,
    pub(crate) instrs: Vec<ValueId>,
    pub(crate) terminal: Option<ValueId>,
    pub(crate) entry_state: Option<VmState>,
    pub(crate) exit_state: Option<VmState>,
    pub(crate) merged: usize,
    pub(crate) built: bool,
}

impl HirBlock {
    pub(crate) fn from_desc(desc: &BlockDesc) -> Self {
        HirBlock {
            id: desc.id,
            start: desc.start,
            end: desc.end,
            loop_header: desc.loop_header,
            handler: desc.handler,
            synthetic: false,
            preds: Vec::new(),
            succs: desc.succs.clone(),
            phis: Vec::new(),
            instrs: Vec::new(),
            terminal: None,
            entry_state: None,
            exit_state: None,
            merged: 0,
            built: false,
        }
    }

    pub(crate) fn synthetic_entry(id: BlockId, target: BlockId) -> Self {
        HirBlock {
            id,
            start: 0,
            end: 0,
            loop_header: false,
            handler: None,
            synthetic: true,
            preds: Vec::new(),
            succs: vec![target],
            phis: Vec::new(),
            instrs: Vec::new(),
            terminal: None,
            entry_state: None,
            exit_state: None,
            merged: 0,
            built: false,
        }
    }

    /// Block identity.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Offset of the first operation.
    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Offset one past the last operation.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Returns `true` if the block is the target of a back edge.
    #[must_use]
    pub fn is_loop_header(&self) -> bool {
        self.loop_header
    }

    /// Exception handler tag, if the block starts a handler.
    #[must_use]
    pub fn handler(&self) -> Option<HandlerTag> {
        self.handler
    }

    /// Returns `true` for the empty entry block inserted in front of a loop-header entry.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Predecessors in merge order.
    #[must_use]
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    /// Unique successors; the terminal's successors once the block is built.
    #[must_use]
    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    /// Phis owned by the block.
    #[must_use]
    pub fn phis(&self) -> &[ValueId] {
        &self.phis
    }

    /// Non-phi instructions in definition order, terminal excluded.
    #[must_use]
    pub fn instructions(&self) -> &[ValueId] {
        &self.instrs
    }

    /// The terminal instruction, once the block is built.
    #[must_use]
    pub fn terminal(&self) -> Option<ValueId> {
        self.terminal
    }

    /// State at block entry.
    #[must_use]
    pub fn entry_state(&self) -> Option<&VmState> {
        self.entry_state.as_ref()
    }

    /// State after the terminal.
    #[must_use]
    pub fn exit_state(&self) -> Option<&VmState> {
        self.exit_state.as_ref()
    }

    /// Returns `true` once the block was interpreted.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of predecessor edges merged into the entry state.
    #[must_use]
    pub fn merged_edges(&self) -> usize {
        self.merged
    }
}
