//! Abstract interpretation of a method body into HIR.
//!
//! [`HirBuilder`] walks the blocks of a [`BlockMap`] with a FIFO worklist, symbolically
//! executes each block's operations against a [`VmState`], appends IR for every
//! operation with a computational effect and merges the resulting state into every
//! successor.
//!
//! # Traversal
//!
//! 1. The entry state is built from the receiver and the declared parameters, each bound
//!    to a `param` instruction. If the block at offset 0 is a loop header, a synthetic
//!    entry block jumps to it so that the parameters arrive through a real edge.
//! 2. A dequeued block is interpreted at most once. Blocks whose forward predecessors
//!    are not all interpreted yet go back to the end of the queue, unless a full pass over
//!    the queue made no progress.
//! 3. After the terminal, the exit state is merged into every successor, and each
//!    successor is enqueued.
//!
//! # Appending
//!
//! Every pure instruction is first idealized (constant folding, identities) and then
//! looked up in the block's value numbering table; only misses reach the graph. Side
//! effects kill cached loads as described in [`ValueNumbering`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hirforge::prelude::*;
//!
//! let map = BlockMap::discover(&code)?;
//! let graph = HirBuilder::new(&code, &map, &resolver)
//!     .with_config(BuildConfig::default().with_print_ir(true))
//!     .build()?;
//! println!("{graph}");
//! ```

use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::{
    bytecode::{ArithOp, BlockMap, DecodedOp, LogicOp, MethodCode, Op},
    events::{EventKind, EventLog},
    hir::{
        idealize, BlockId, BuildConfig, ConstValue, GraphFlags, HirGraph, HirOp, Ideal,
        MergeOutcome, Terminal, ValueId, ValueKey, ValueNumbering, VmState,
    },
    metadata::{ConstantEntry, FieldAccess, MetadataResolver, ValueKind},
    utils::BitSet,
    Error, Result,
};

/// Mutable state of the block being interpreted.
struct BlockContext {
    block: BlockId,
    state: VmState,
    lvn: ValueNumbering,
    offset: u32,
    terminated: bool,
}

/// Translates one method body into a [`HirGraph`].
pub struct HirBuilder<'a> {
    code: &'a MethodCode,
    map: &'a BlockMap,
    resolver: &'a dyn MetadataResolver,
    config: BuildConfig,
    events: Option<&'a EventLog>,
    graph: HirGraph,
}

impl<'a> HirBuilder<'a> {
    /// Creates a builder for `code`, whose blocks are described by `map`.
    #[must_use]
    pub fn new(code: &'a MethodCode, map: &'a BlockMap, resolver: &'a dyn MetadataResolver) -> Self {
        HirBuilder {
            code,
            map,
            resolver,
            config: BuildConfig::default(),
            events: None,
            graph: HirGraph::new(code.info().clone(), map),
        }
    }

    /// Replaces the build options.
    #[must_use]
    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches an event log.
    #[must_use]
    pub fn with_events(mut self, events: &'a EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Active build options.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds the graph.
    ///
    /// # Errors
    ///
    /// Any [`Error`] aborts the build; the partially built graph is dropped.
    pub fn build(mut self) -> Result<HirGraph> {
        match self.run() {
            Ok(()) => Ok(self.graph),
            Err(error) => {
                if let Some(log) = self.log() {
                    log.error(format!("{}: {error}", self.code.info().name));
                }
                Err(error)
            }
        }
    }

    fn log(&self) -> Option<&'a EventLog> {
        self.events.filter(|_| self.config.record_events)
    }

    fn event(
        &self,
        kind: EventKind,
        block: BlockId,
        offset: Option<u32>,
        message: impl FnOnce() -> String,
    ) {
        if let Some(log) = self.log() {
            let event = match offset {
                Some(offset) => log.record(kind).at(block, offset),
                None => log.record(kind).block(block),
            };
            event.message(message());
        }
    }

    fn run(&mut self) -> Result<()> {
        let code = self.code;
        if self.map.is_empty() {
            return Err(invariant_error!("Method {} has no code", code.info().name));
        }

        let mut start = self.map.entry();
        if self.map.is_loop_header(start) {
            let real = start;
            start = self.graph.add_synthetic_entry();
            self.event(EventKind::EntryInserted, start, None, || {
                format!("{start} jumps to loop header {real}")
            });
        }
        let state = self.entry_state(start)?;
        self.graph.seed_entry_state(start, state)?;

        let mut visited = BitSet::new(self.graph.block_count());
        let mut queue = VecDeque::from([start]);
        let mut stalled = 0usize;

        while let Some(block) = queue.pop_front() {
            if visited.contains(block.index()) {
                continue;
            }
            if stalled <= queue.len() && !self.is_ready(block, &visited) {
                stalled += 1;
                self.event(EventKind::BlockDeferred, block, None, || {
                    format!("{block} waits for its predecessors")
                });
                queue.push_back(block);
                continue;
            }
            stalled = 0;
            visited.insert(block.index());

            let exit = self.build_block(block)?;
            let succs = self
                .graph
                .block(block)
                .map(|b| b.succs().to_vec())
                .unwrap_or_default();
            for succ in succs {
                self.graph.add_edge(block, succ)?;
                let outcome = self.graph.merge_state(succ, block, &exit)?;
                self.report_merge(succ, &outcome);
                queue.push_back(succ);
            }
        }

        self.insert_final_barriers()?;
        self.graph.verify()?;
        if self.config.print_ir {
            debug!("{}", self.graph);
        }
        Ok(())
    }

    /// A block is ready once every predecessor that does not reach it through a back edge
    /// has been interpreted. Unreachable predecessors never will be and are ignored.
    fn is_ready(&self, block: BlockId, visited: &BitSet) -> bool {
        let Some(desc) = self.map.block(block) else {
            return true;
        };
        desc.preds.iter().all(|pred| {
            visited.contains(pred.index())
                || desc.back_edges.contains(pred)
                || self.map.block(*pred).is_some_and(|p| !p.reachable)
        })
    }

    fn report_merge(&self, target: BlockId, outcome: &MergeOutcome) {
        for (slot, phi) in &outcome.created {
            self.event(EventKind::PhiCreated, target, None, || {
                format!("{phi} = phi {slot}")
            });
        }
        for local in &outcome.invalidated {
            self.event(EventKind::SlotInvalidated, target, None, || {
                format!("local {local} invalidated")
            });
        }
    }

    /// Binds the receiver and the declared parameters to `param` instructions.
    fn entry_state(&mut self, block: BlockId) -> Result<VmState> {
        let code = self.code;
        let info = code.info();
        let mut state = VmState::new(usize::from(info.max_stack), usize::from(info.max_locals));

        let receiver = info.has_receiver().then_some(ValueKind::Object);
        let kinds: Vec<ValueKind> = receiver
            .into_iter()
            .chain(info.params.iter().map(|k| k.stack_kind()))
            .collect();

        let mut slot = 0usize;
        for kind in kinds {
            let index = u16::try_from(slot)
                .map_err(|_| invariant_error!("Parameter slot {} out of range", slot))?;
            let param = self
                .graph
                .append(block, kind, HirOp::Param { index }, None, None)?;
            state.store(slot, param, kind)?;
            slot += kind.slot_size();
        }
        Ok(state)
    }

    fn build_block(&mut self, block: BlockId) -> Result<VmState> {
        let target = self.graph.block_mut(block)?;
        let (start, end) = (target.start, target.end);
        let state = target
            .entry_state
            .clone()
            .ok_or_else(|| invariant_error!("{} has no entry state", block))?;

        let mut ctx = BlockContext {
            block,
            state,
            lvn: ValueNumbering::new(),
            offset: start,
            terminated: false,
        };

        let code = self.code;
        for decoded in code.ops_in(start, end) {
            if ctx.terminated {
                return Err(invariant_error!(
                    "{} at {} follows the terminal of {}",
                    decoded.op.mnemonic(),
                    decoded.offset,
                    block
                ));
            }
            ctx.offset = decoded.offset;
            if self.config.trace_generation {
                trace!("{block} {:>5}: {} | {}", decoded.offset, decoded.op, ctx.state);
            }
            self.interpret(&mut ctx, decoded)?;
        }

        if !ctx.terminated {
            let target = self.fallthrough_target(&ctx, end)?;
            self.terminate(&mut ctx, Terminal::Goto { target }, None)?;
        }

        let target = self.graph.block_mut(block)?;
        target.exit_state = Some(ctx.state.clone());
        target.built = true;
        self.event(EventKind::BlockBuilt, block, None, || {
            format!("{block} [{start}..{end})")
        });
        Ok(ctx.state)
    }

    /// The block a terminal-less block continues in.
    fn fallthrough_target(&self, ctx: &BlockContext, end: u32) -> Result<BlockId> {
        if let Some(next) = self.map.block_containing(end) {
            return Ok(next);
        }
        if self.config.strict_fallthrough {
            return Err(invariant_error!(
                "{} falls off the end of {} at {}",
                ctx.block,
                self.code.info().name,
                end
            ));
        }
        let entry = self.map.entry();
        warn!(
            "{}: {} falls off the end at {}, continuing at offset 0",
            self.code.info().name,
            ctx.block,
            end
        );
        self.event(EventKind::FallthroughSynthesized, ctx.block, Some(end), || {
            format!("goto {entry}")
        });
        if let Some(log) = self.log() {
            log.warn(format!("{} falls off the end", ctx.block));
        }
        Ok(entry)
    }

    fn resolve_target(&self, offset: u32) -> Result<BlockId> {
        self.map
            .block_containing(offset)
            .ok_or_else(|| invariant_error!("No block contains branch target {}", offset))
    }

    fn type_mismatch(ctx: &BlockContext, expected: ValueKind, found: ValueKind) -> Error {
        Error::TypeMismatch {
            expected,
            found,
            location: format!("{} offset {}", ctx.block, ctx.offset),
        }
    }

    /// Pops a value and checks its kind.
    fn pop(&self, ctx: &mut BlockContext, kind: ValueKind) -> Result<ValueId> {
        let expected = kind.stack_kind();
        let value = ctx.state.pop(expected)?;
        let found = self.graph.kind(value);
        if found != expected {
            return Err(Self::type_mismatch(ctx, expected, found));
        }
        Ok(value)
    }

    fn push(&self, ctx: &mut BlockContext, value: ValueId) -> Result<()> {
        ctx.state.push(value, self.graph.kind(value))
    }

    /// Pops `count` raw slots for a shuffle, top first. The deepest slot must hold a value
    /// so that no two-word value is split.
    fn pop_group(ctx: &mut BlockContext, count: usize) -> Result<Vec<Option<ValueId>>> {
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(ctx.state.pop_slot()?);
        }
        if slots.last().is_some_and(Option::is_none) {
            return Err(invariant_error!(
                "Stack shuffle at {} splits a two-word value",
                ctx.offset
            ));
        }
        Ok(slots)
    }

    fn push_slots(ctx: &mut BlockContext, slots: &[Option<ValueId>]) -> Result<()> {
        for slot in slots {
            ctx.state.push_slot(*slot)?;
        }
        Ok(())
    }

    /// Appends a pure or load instruction through idealization and value numbering.
    fn append(&mut self, ctx: &mut BlockContext, kind: ValueKind, op: HirOp) -> Result<ValueId> {
        self.append_with_state(ctx, kind, op, None)
    }

    fn append_with_state(
        &mut self,
        ctx: &mut BlockContext,
        kind: ValueKind,
        op: HirOp,
        state_before: Option<VmState>,
    ) -> Result<ValueId> {
        let mut op = op;
        if self.config.idealize {
            match idealize(&self.graph, &op, kind) {
                Ideal::Keep => {}
                Ideal::Replace(better) => {
                    self.event(EventKind::Idealized, ctx.block, Some(ctx.offset), || {
                        format!("{op} -> {better}")
                    });
                    op = better;
                }
                Ideal::Existing(value) => {
                    self.event(EventKind::Idealized, ctx.block, Some(ctx.offset), || {
                        format!("{op} -> {value}")
                    });
                    return Ok(value);
                }
            }
        }

        let key = if self.config.value_numbering {
            ValueKey::of(&op, kind)
        } else {
            None
        };
        if let Some(existing) = key.as_ref().and_then(|k| ctx.lvn.find(k)) {
            self.event(EventKind::ValueNumbered, ctx.block, Some(ctx.offset), || {
                format!("{op} -> {existing}")
            });
            return Ok(existing);
        }

        let effect = op.memory_effect();
        if self.config.trace_generation {
            trace!("{}   append {kind} {op}", ctx.block);
        }
        let id = self
            .graph
            .append(ctx.block, kind, op, Some(ctx.offset), state_before)?;
        ctx.lvn.kill(effect);
        if let Some(key) = key {
            ctx.lvn.insert(key, id);
        }
        Ok(id)
    }

    fn constant(&mut self, ctx: &mut BlockContext, value: ConstValue) -> Result<ValueId> {
        let kind = value.kind();
        self.append(ctx, kind, HirOp::Constant(value))
    }

    fn terminate(
        &mut self,
        ctx: &mut BlockContext,
        terminal: Terminal,
        state_before: Option<VmState>,
    ) -> Result<()> {
        if self.config.trace_generation {
            trace!("{}   end {terminal}", ctx.block);
        }
        self.graph
            .set_terminal(ctx.block, terminal, Some(ctx.offset), state_before)?;
        ctx.terminated = true;
        Ok(())
    }

    /// Stores into a local, clearing a two-word value that started in the slot below.
    fn store_local(
        &self,
        ctx: &mut BlockContext,
        index: usize,
        value: ValueId,
        kind: ValueKind,
    ) -> Result<()> {
        if let Some(below) = index.checked_sub(1) {
            if let Some(previous) = ctx.state.local(below) {
                if self.graph.kind(previous).is_double_word() {
                    ctx.state.invalidate_local(below);
                }
            }
        }
        ctx.state.store(index, value, kind)
    }

    fn load_local(&self, ctx: &BlockContext, index: usize, kind: ValueKind) -> Result<ValueId> {
        let value = ctx.state.load(index)?;
        let found = self.graph.kind(value);
        if found != kind.stack_kind() {
            return Err(Self::type_mismatch(ctx, kind.stack_kind(), found));
        }
        Ok(value)
    }

    #[allow(clippy::too_many_lines)]
    fn interpret(&mut self, ctx: &mut BlockContext, decoded: &DecodedOp) -> Result<()> {
        match &decoded.op {
            Op::Nop => {}
            Op::Const(value) => {
                let value = self.constant(ctx, value.clone())?;
                self.push(ctx, value)?;
            }
            Op::Ldc(index) => match self.resolver.resolve_constant(*index)? {
                ConstantEntry::Value(value) => {
                    let value = self.constant(ctx, value)?;
                    self.push(ctx, value)?;
                }
                ConstantEntry::Unloadable(_) => {
                    return Err(Error::UnresolvedConstant { index: *index })
                }
            },
            Op::Load(kind, index) => {
                let value = self.load_local(ctx, usize::from(*index), *kind)?;
                self.push(ctx, value)?;
            }
            Op::Store(kind, index) => {
                let value = self.pop(ctx, *kind)?;
                self.store_local(ctx, usize::from(*index), value, kind.stack_kind())?;
            }
            Op::Iinc(index, delta) => {
                let index = usize::from(*index);
                let x = self.load_local(ctx, index, ValueKind::Int)?;
                let y = self.constant(ctx, ConstValue::Int(i32::from(*delta)))?;
                let sum = self.append(
                    ctx,
                    ValueKind::Int,
                    HirOp::Arith {
                        op: ArithOp::Add,
                        x,
                        y,
                    },
                )?;
                self.store_local(ctx, index, sum, ValueKind::Int)?;
            }
            Op::ArrayLoad(elem) => {
                let before = ctx.state.clone();
                let index = self.pop(ctx, ValueKind::Int)?;
                let array = self.pop(ctx, ValueKind::Object)?;
                let value = self.append_with_state(
                    ctx,
                    elem.stack_kind(),
                    HirOp::ArrayLoad {
                        array,
                        index,
                        elem: *elem,
                    },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::ArrayStore(elem) => {
                let before = ctx.state.clone();
                let value = self.pop(ctx, *elem)?;
                let index = self.pop(ctx, ValueKind::Int)?;
                let array = self.pop(ctx, ValueKind::Object)?;
                self.append_with_state(
                    ctx,
                    ValueKind::Void,
                    HirOp::ArrayStore {
                        array,
                        index,
                        value,
                        elem: *elem,
                    },
                    Some(before),
                )?;
            }
            Op::Pop => {
                Self::pop_group(ctx, 1)?;
            }
            Op::Pop2 => {
                Self::pop_group(ctx, 2)?;
            }
            Op::Dup => {
                let v1 = Self::pop_group(ctx, 1)?;
                Self::push_slots(ctx, &[v1[0], v1[0]])?;
            }
            Op::DupX1 => {
                let v1 = Self::pop_group(ctx, 1)?;
                let v2 = Self::pop_group(ctx, 1)?;
                Self::push_slots(ctx, &[v1[0], v2[0], v1[0]])?;
            }
            Op::DupX2 => {
                let v1 = Self::pop_group(ctx, 1)?;
                let v2 = Self::pop_group(ctx, 2)?;
                Self::push_slots(ctx, &[v1[0], v2[1], v2[0], v1[0]])?;
            }
            Op::Dup2 => {
                let v = Self::pop_group(ctx, 2)?;
                Self::push_slots(ctx, &[v[1], v[0], v[1], v[0]])?;
            }
            Op::Dup2X1 => {
                let v = Self::pop_group(ctx, 2)?;
                let w = Self::pop_group(ctx, 1)?;
                Self::push_slots(ctx, &[v[1], v[0], w[0], v[1], v[0]])?;
            }
            Op::Dup2X2 => {
                let v = Self::pop_group(ctx, 2)?;
                let w = Self::pop_group(ctx, 2)?;
                Self::push_slots(ctx, &[v[1], v[0], w[1], w[0], v[1], v[0]])?;
            }
            Op::Swap => {
                let v1 = Self::pop_group(ctx, 1)?;
                let v2 = Self::pop_group(ctx, 1)?;
                Self::push_slots(ctx, &[v1[0], v2[0]])?;
            }
            Op::Arith(op, kind) => {
                let traps = matches!(op, ArithOp::Div | ArithOp::Rem) && kind.is_integral();
                let before = traps.then(|| ctx.state.clone());
                let y = self.pop(ctx, *kind)?;
                let x = self.pop(ctx, *kind)?;
                let value =
                    self.append_with_state(ctx, *kind, HirOp::Arith { op: *op, x, y }, before)?;
                self.push(ctx, value)?;
            }
            Op::Neg(kind) => {
                let x = self.pop(ctx, *kind)?;
                let value = self.append(ctx, *kind, HirOp::Negate { x })?;
                self.push(ctx, value)?;
            }
            Op::Shift(op, kind) => {
                let y = self.pop(ctx, ValueKind::Int)?;
                let x = self.pop(ctx, *kind)?;
                let value = self.append(ctx, *kind, HirOp::Shift { op: *op, x, y })?;
                self.push(ctx, value)?;
            }
            Op::Logic(op, kind) => {
                let y = self.pop(ctx, *kind)?;
                let x = self.pop(ctx, *kind)?;
                let value = self.append(ctx, *kind, HirOp::Logic { op: *op, x, y })?;
                self.push(ctx, value)?;
            }
            Op::Convert(from, to) => {
                let x = self.pop(ctx, *from)?;
                let value = self.append(
                    ctx,
                    to.stack_kind(),
                    HirOp::Convert {
                        from: *from,
                        to: *to,
                        x,
                    },
                )?;
                self.push(ctx, value)?;
            }
            Op::Compare(op) => {
                let y = self.pop(ctx, op.operand_kind())?;
                let x = self.pop(ctx, op.operand_kind())?;
                let value = self.append(ctx, ValueKind::Int, HirOp::Compare { op: *op, x, y })?;
                self.push(ctx, value)?;
            }
            Op::IfZero { cond, kind, target } => {
                let before = ctx.state.clone();
                let x = self.pop(ctx, *kind)?;
                let terminal = Terminal::If {
                    cond: *cond,
                    x,
                    y: None,
                    taken: self.resolve_target(*target)?,
                    not_taken: self.resolve_target(decoded.next_offset())?,
                };
                self.terminate(ctx, terminal, Some(before))?;
            }
            Op::IfCmp { cond, kind, target } => {
                let before = ctx.state.clone();
                let y = self.pop(ctx, *kind)?;
                let x = self.pop(ctx, *kind)?;
                let terminal = Terminal::If {
                    cond: *cond,
                    x,
                    y: Some(y),
                    taken: self.resolve_target(*target)?,
                    not_taken: self.resolve_target(decoded.next_offset())?,
                };
                self.terminate(ctx, terminal, Some(before))?;
            }
            Op::Goto(target) => {
                let target = self.resolve_target(*target)?;
                self.terminate(ctx, Terminal::Goto { target }, None)?;
            }
            Op::Jsr(_) => {
                return Err(Error::UnsupportedConstruct {
                    op: "jsr",
                    offset: decoded.offset,
                })
            }
            Op::Ret(_) => {
                return Err(Error::UnsupportedConstruct {
                    op: "ret",
                    offset: decoded.offset,
                })
            }
            Op::TableSwitch {
                low,
                targets,
                default,
            } => {
                let before = ctx.state.clone();
                let selector = self.pop(ctx, ValueKind::Int)?;
                let targets = targets
                    .iter()
                    .chain([default])
                    .map(|t| self.resolve_target(*t))
                    .collect::<Result<Vec<_>>>()?;
                let terminal = Terminal::TableSwitch {
                    selector,
                    low_key: *low,
                    targets,
                };
                self.terminate(ctx, terminal, Some(before))?;
            }
            Op::LookupSwitch { pairs, default } => {
                let before = ctx.state.clone();
                let selector = self.pop(ctx, ValueKind::Int)?;
                let keys = pairs.iter().map(|(key, _)| *key).collect();
                let targets = pairs
                    .iter()
                    .map(|(_, target)| target)
                    .chain([default])
                    .map(|t| self.resolve_target(*t))
                    .collect::<Result<Vec<_>>>()?;
                let terminal = Terminal::LookupSwitch {
                    selector,
                    keys,
                    targets,
                };
                self.terminate(ctx, terminal, Some(before))?;
            }
            Op::Return(kind) => self.interpret_return(ctx, *kind)?,
            Op::Field(access, index) => self.interpret_field(ctx, *access, *index)?,
            Op::Invoke(kind, index) => {
                let target = self.resolver.resolve_method(*index, *kind)?;
                let before = ctx.state.clone();
                let mut args = Vec::with_capacity(target.params.len());
                for param in target.params.iter().rev() {
                    args.push(self.pop(ctx, *param)?);
                }
                args.reverse();
                let receiver = if kind.has_receiver() {
                    Some(self.pop(ctx, ValueKind::Object)?)
                } else {
                    None
                };
                let result_kind = target.return_kind.stack_kind();
                let value = self.append_with_state(
                    ctx,
                    result_kind,
                    HirOp::Invoke {
                        kind: *kind,
                        target,
                        receiver,
                        args,
                    },
                    Some(before),
                )?;
                if result_kind != ValueKind::Void {
                    self.push(ctx, value)?;
                }
            }
            Op::New(index) => {
                let ty = self.resolver.resolve_type(*index)?;
                let before = ctx.state.clone();
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Object,
                    HirOp::NewInstance { ty },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::NewArray(elem) => {
                let before = ctx.state.clone();
                let length = self.pop(ctx, ValueKind::Int)?;
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Object,
                    HirOp::NewTypeArray {
                        elem: *elem,
                        length,
                    },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::ANewArray(index) => {
                let elem = self.resolver.resolve_type(*index)?;
                let before = ctx.state.clone();
                let length = self.pop(ctx, ValueKind::Int)?;
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Object,
                    HirOp::NewObjectArray { elem, length },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::MultiANewArray(index, count) => {
                let ty = self.resolver.resolve_type(*index)?;
                let before = ctx.state.clone();
                let mut dims = Vec::with_capacity(usize::from(*count));
                for _ in 0..*count {
                    dims.push(self.pop(ctx, ValueKind::Int)?);
                }
                dims.reverse();
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Object,
                    HirOp::NewMultiArray { ty, dims },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::ArrayLength => {
                let before = ctx.state.clone();
                let array = self.pop(ctx, ValueKind::Object)?;
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Int,
                    HirOp::ArrayLength { array },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::AThrow => {
                let before = ctx.state.clone();
                let exception = self.pop(ctx, ValueKind::Object)?;
                self.terminate(ctx, Terminal::Throw { exception }, Some(before))?;
            }
            Op::CheckCast(index) => {
                let ty = self.resolver.resolve_type(*index)?;
                let before = ctx.state.clone();
                let object = self.pop(ctx, ValueKind::Object)?;
                let value = self.append_with_state(
                    ctx,
                    ValueKind::Object,
                    HirOp::CheckCast { ty, object },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            Op::InstanceOf(index) => {
                let ty = self.resolver.resolve_type(*index)?;
                let object = self.pop(ctx, ValueKind::Object)?;
                let value = self.append(ctx, ValueKind::Int, HirOp::InstanceOf { ty, object })?;
                self.push(ctx, value)?;
            }
            Op::MonitorEnter => {
                let object = self.pop(ctx, ValueKind::Object)?;
                let before = ctx.state.clone();
                let lock = ctx.state.lock(object);
                self.append_with_state(
                    ctx,
                    ValueKind::Void,
                    HirOp::MonitorEnter { object, lock },
                    Some(before),
                )?;
            }
            Op::MonitorExit => {
                let before = ctx.state.clone();
                let object = self.pop(ctx, ValueKind::Object)?;
                let lock = ctx.state.unlock()?;
                self.append_with_state(
                    ctx,
                    ValueKind::Void,
                    HirOp::MonitorExit { object, lock },
                    Some(before),
                )?;
            }
            Op::Wide | Op::Unknown(_) => {
                return Err(invariant_error!(
                    "Unexpected operation {} at {}",
                    decoded.op.mnemonic(),
                    decoded.offset
                ))
            }
        }
        Ok(())
    }

    fn interpret_return(&mut self, ctx: &mut BlockContext, kind: ValueKind) -> Result<()> {
        let code = self.code;
        let info = code.info();
        let declared = info.return_kind;
        if kind.stack_kind() != declared.stack_kind() {
            return Err(Self::type_mismatch(ctx, declared.stack_kind(), kind.stack_kind()));
        }

        let before = ctx.state.clone();
        let value = if kind == ValueKind::Void {
            None
        } else {
            let mut value = self.pop(ctx, kind)?;
            if let Some(mask) = declared.return_mask() {
                let mask = self.constant(ctx, ConstValue::Int(mask))?;
                value = self.append(
                    ctx,
                    ValueKind::Int,
                    HirOp::Logic {
                        op: LogicOp::And,
                        x: value,
                        y: mask,
                    },
                )?;
            }
            Some(value)
        };

        if info.is_constructor() && self.graph.flags().contains(GraphFlags::WRITES_FINAL) {
            self.barrier(ctx.block, Some(ctx.offset))?;
            ctx.lvn.kill(HirOp::MemBarrier.memory_effect());
        }
        self.terminate(ctx, Terminal::Return { value }, Some(before))
    }

    fn interpret_field(
        &mut self,
        ctx: &mut BlockContext,
        access: FieldAccess,
        index: u16,
    ) -> Result<()> {
        let field = self.resolver.resolve_field(index, access)?;
        let kind = field.kind.stack_kind();
        let before = ctx.state.clone();

        match access {
            FieldAccess::GetStatic | FieldAccess::GetField => {
                let object = if access.is_static() {
                    self.constant(ctx, ConstValue::Type(field.holder.clone()))?
                } else {
                    self.pop(ctx, ValueKind::Object)?
                };
                let value = self.append_with_state(
                    ctx,
                    kind,
                    HirOp::LoadField { object, field },
                    Some(before),
                )?;
                self.push(ctx, value)?;
            }
            FieldAccess::PutStatic | FieldAccess::PutField => {
                let value = self.pop(ctx, kind)?;
                let object = if access.is_static() {
                    self.constant(ctx, ConstValue::Type(field.holder.clone()))?
                } else {
                    self.pop(ctx, ValueKind::Object)?
                };
                if field.is_final() {
                    self.graph.set_flag(GraphFlags::WRITES_FINAL);
                }
                if field.is_volatile() {
                    self.graph.set_flag(GraphFlags::WRITES_VOLATILE);
                }
                self.append_with_state(
                    ctx,
                    ValueKind::Void,
                    HirOp::StoreField {
                        object,
                        field,
                        value,
                    },
                    Some(before),
                )?;
            }
        }
        Ok(())
    }

    fn barrier(&mut self, block: BlockId, offset: Option<u32>) -> Result<()> {
        self.graph
            .append(block, ValueKind::Void, HirOp::MemBarrier, offset, None)?;
        self.event(EventKind::BarrierInserted, block, offset, || {
            "membar store_store".to_string()
        });
        Ok(())
    }

    /// A constructor may write its final field in a block that is interpreted after some
    /// of its returns; those returns get their barrier here.
    fn insert_final_barriers(&mut self) -> Result<()> {
        if !self.code.info().is_constructor()
            || !self.graph.flags().contains(GraphFlags::WRITES_FINAL)
        {
            return Ok(());
        }

        let mut missing = Vec::new();
        for block in self.graph.blocks() {
            let Some(Terminal::Return { .. }) = self.graph.terminal(block.id()) else {
                continue;
            };
            let fenced = block
                .instructions()
                .last()
                .and_then(|id| self.graph.value(*id))
                .is_some_and(|instr| instr.op == HirOp::MemBarrier);
            if !fenced {
                let offset = block
                    .terminal()
                    .and_then(|id| self.graph.value(id))
                    .and_then(|instr| instr.offset);
                missing.push((block.id(), offset));
            }
        }
        for (block, offset) in missing {
            self.barrier(block, offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::BytecodeAssembler,
        metadata::{MethodFlags, MethodInfo, StaticResolver},
    };

    fn build(asm: BytecodeAssembler, info: MethodInfo) -> Result<HirGraph> {
        let code = asm.finish_method(info)?;
        let map = BlockMap::discover(&code)?;
        let resolver = StaticResolver::new();
        HirBuilder::new(&code, &map, &resolver).build()
    }

    fn instructions(graph: &HirGraph, block: BlockId) -> Vec<HirOp> {
        graph
            .block(block)
            .unwrap()
            .instructions()
            .iter()
            .map(|id| graph.value(*id).unwrap().op.clone())
            .collect()
    }

    #[test]
    fn test_params_bound_to_locals() {
        let mut asm = BytecodeAssembler::new();
        asm.lload(1).unwrap().return_value(ValueKind::Long).unwrap();
        let info = MethodInfo::new("id", 2, 3)
            .with_params(vec![ValueKind::Long])
            .returns(ValueKind::Long);
        let graph = build(asm, info).unwrap();

        let entry = graph.block(graph.entry()).unwrap();
        let state = entry.entry_state().unwrap();
        assert_eq!(state.locals().len(), 3);
        assert!(state.local(0).is_some());
        assert!(state.local(1).is_some());
        assert_eq!(state.local(2), None);
        assert_eq!(graph.kind(state.local(1).unwrap()), ValueKind::Long);
        assert_eq!(
            graph.terminal(graph.entry()),
            Some(&Terminal::Return {
                value: state.local(1)
            })
        );
    }

    #[test]
    fn test_loads_and_stores_emit_nothing() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .istore(1)
            .unwrap()
            .iload(1)
            .unwrap()
            .ireturn()
            .unwrap();
        let info = MethodInfo::new("copy", 1, 2)
            .with_params(vec![ValueKind::Int])
            .returns(ValueKind::Int)
            .with_flags(MethodFlags::STATIC);
        let graph = build(asm, info).unwrap();
        assert_eq!(
            instructions(&graph, graph.entry()),
            vec![HirOp::Param { index: 0 }]
        );
    }

    #[test]
    fn test_value_numbering_within_block() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .iload(1)
            .unwrap()
            .iadd()
            .unwrap()
            .iload(1)
            .unwrap()
            .iload(0)
            .unwrap()
            .iadd()
            .unwrap()
            .isub()
            .unwrap()
            .ireturn()
            .unwrap();
        let info = MethodInfo::new("zero", 2, 2)
            .with_params(vec![ValueKind::Int, ValueKind::Int])
            .returns(ValueKind::Int)
            .with_flags(MethodFlags::STATIC);
        let graph = build(asm, info).unwrap();

        // a + b, b + a share one add; their difference folds to 0
        let adds = instructions(&graph, graph.entry())
            .into_iter()
            .filter(|op| matches!(op, HirOp::Arith { op: ArithOp::Add, .. }))
            .count();
        assert_eq!(adds, 1);
        let Some(Terminal::Return { value: Some(value) }) = graph.terminal(graph.entry()) else {
            panic!("expected a value return");
        };
        assert_eq!(graph.constant_of(*value), Some(&ConstValue::Int(0)));
    }

    #[test]
    fn test_iinc_expands_to_add() {
        let mut asm = BytecodeAssembler::new();
        asm.iinc(0, 3).unwrap().iload(0).unwrap().ireturn().unwrap();
        let info = MethodInfo::new("inc", 1, 1)
            .with_params(vec![ValueKind::Int])
            .returns(ValueKind::Int)
            .with_flags(MethodFlags::STATIC);
        let graph = build(asm, info).unwrap();
        let ops = instructions(&graph, graph.entry());
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], HirOp::Constant(ConstValue::Int(3)));
        assert!(matches!(ops[2], HirOp::Arith { op: ArithOp::Add, .. }));
    }

    #[test]
    fn test_dup2_on_long_keeps_pairs() {
        let mut asm = BytecodeAssembler::new();
        asm.lload(0)
            .unwrap()
            .dup2()
            .unwrap()
            .ladd()
            .unwrap()
            .return_value(ValueKind::Long)
            .unwrap();
        let info = MethodInfo::new("twice", 4, 2)
            .with_params(vec![ValueKind::Long])
            .returns(ValueKind::Long)
            .with_flags(MethodFlags::STATIC);
        let graph = build(asm, info).unwrap();
        let ops = instructions(&graph, graph.entry());
        let param = graph.block(graph.entry()).unwrap().instructions()[0];
        assert_eq!(
            ops[1],
            HirOp::Arith {
                op: ArithOp::Add,
                x: param,
                y: param
            }
        );
    }

    #[test]
    fn test_swap_of_two_word_rejected() {
        let mut asm = BytecodeAssembler::new();
        asm.lload(0)
            .unwrap()
            .swap()
            .unwrap()
            .return_void()
            .unwrap();
        let info = MethodInfo::new("bad", 4, 2)
            .with_params(vec![ValueKind::Long])
            .with_flags(MethodFlags::STATIC);
        assert!(matches!(
            build(asm, info),
            Err(Error::InternalInvariantViolation { .. })
        ));
    }

    #[test]
    fn test_operand_kind_checked() {
        let mut asm = BytecodeAssembler::new();
        asm.fconst(1.0)
            .unwrap()
            .iconst(1)
            .unwrap()
            .iadd()
            .unwrap()
            .ireturn()
            .unwrap();
        let info = MethodInfo::new("mixed", 2, 0)
            .returns(ValueKind::Int)
            .with_flags(MethodFlags::STATIC);
        assert!(matches!(
            build(asm, info),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_stack_overflow_is_invariant_violation() {
        let mut asm = BytecodeAssembler::new();
        asm.iconst(1)
            .unwrap()
            .iconst(2)
            .unwrap()
            .pop()
            .unwrap()
            .pop()
            .unwrap()
            .return_void()
            .unwrap();
        let info = MethodInfo::new("deep", 1, 0).with_flags(MethodFlags::STATIC);
        assert!(matches!(
            build(asm, info),
            Err(Error::InternalInvariantViolation { .. })
        ));
    }
}
