//! Merging execution states at block entries.
//!
//! Every edge into a block delivers the predecessor's exit state. The first edge seeds the
//! block's entry state; each later edge is reconciled slot by slot:
//!
//! | existing slot          | incoming slot            | result                          |
//! |------------------------|--------------------------|---------------------------------|
//! | phi owned by the block | any value of same kind   | value appended as phi input     |
//! | value `a`              | the same value `a`       | unchanged                       |
//! | value `a`              | value `b`, same kind     | new phi `[a; K] ++ [b]`         |
//! | local value            | empty or other kind      | slot invalidated                |
//! | stack value            | other kind               | [`Error::TypeMismatch`]         |
//!
//! `K` is the number of edges merged so far, so the i-th phi input always belongs to the
//! i-th predecessor. Loop headers receive a phi for every occupied slot on the first
//! merge, which turns every later back edge into a plain append; a back edge that would
//! invalidate one of those phis is a [`Error::TypeMismatch`].

use crate::{
    hir::{BlockId, HirGraph, PhiSlot, ValueId, VmState},
    metadata::ValueKind,
    Error, Result,
};

/// What a single merge did to the target's entry state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Phis created by this merge
    pub created: Vec<(PhiSlot, ValueId)>,
    /// Local slots invalidated by this merge
    pub invalidated: Vec<u16>,
    /// The edge had been merged before; nothing changed
    pub already_merged: bool,
}

impl MergeOutcome {
    fn unchanged() -> Self {
        MergeOutcome {
            already_merged: true,
            ..MergeOutcome::default()
        }
    }
}

fn slot_index(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| invariant_error!("Slot index {} out of range", index))
}

impl HirGraph {
    /// Seeds the entry state of the method's entry block.
    pub(crate) fn seed_entry_state(&mut self, block: BlockId, state: VmState) -> Result<()> {
        let target = self.block_mut(block)?;
        if target.entry_state.is_some() {
            return Err(invariant_error!("Entry state of {} already set", block));
        }
        target.entry_state = Some(state);
        Ok(())
    }

    /// Merges the exit state of `pred` into the entry state of `target`.
    ///
    /// The edge `pred -> target` must have been recorded before. Merging the same edge
    /// twice changes nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] if a stack slot changes kind, or a loop back edge removes
    ///   or changes the kind of a value the header holds in a phi
    /// - [`Error::InternalInvariantViolation`] if stack or lock depths disagree, or the
    ///   merge would have to add a phi to, or invalidate a slot of, a block that was
    ///   already interpreted
    pub fn merge_state(
        &mut self,
        target: BlockId,
        pred: BlockId,
        incoming: &VmState,
    ) -> Result<MergeOutcome> {
        let block = self
            .block(target)
            .ok_or_else(|| invariant_error!("Block {} does not exist", target))?;
        let edge = block
            .preds
            .iter()
            .position(|p| *p == pred)
            .ok_or_else(|| invariant_error!("{} is not a predecessor of {}", pred, target))?;
        if edge < block.merged {
            return Ok(MergeOutcome::unchanged());
        }
        if edge != block.merged {
            return Err(invariant_error!(
                "Edge {} -> {} merged out of order ({} of {})",
                pred,
                target,
                edge,
                block.merged
            ));
        }

        let outcome = match block.entry_state.clone() {
            None => self.initialize(target, incoming)?,
            Some(existing) => self.reconcile(target, existing, incoming)?,
        };
        self.block_mut(target)?.merged += 1;
        Ok(outcome)
    }

    fn initialize(&mut self, target: BlockId, incoming: &VmState) -> Result<MergeOutcome> {
        let mut state = incoming.clone();
        let mut outcome = MergeOutcome::default();

        let loop_header = self.block(target).is_some_and(|b| b.loop_header);
        if loop_header {
            for (i, slot) in incoming.stack().iter().enumerate() {
                if let Some(value) = slot {
                    let slot = PhiSlot::Stack(slot_index(i)?);
                    let phi = self.new_phi(target, slot, self.kind(*value), vec![*value])?;
                    state.set_stack_slot(i, Some(phi));
                    outcome.created.push((slot, phi));
                }
            }
            for (i, slot) in incoming.locals().iter().enumerate() {
                if let Some(value) = slot {
                    let slot = PhiSlot::Local(slot_index(i)?);
                    let phi = self.new_phi(target, slot, self.kind(*value), vec![*value])?;
                    state.set_local_slot(i, Some(phi));
                    outcome.created.push((slot, phi));
                }
            }
        }

        self.block_mut(target)?.entry_state = Some(state);
        Ok(outcome)
    }

    fn reconcile(
        &mut self,
        target: BlockId,
        mut state: VmState,
        incoming: &VmState,
    ) -> Result<MergeOutcome> {
        if state.stack_depth() != incoming.stack_depth() {
            return Err(invariant_error!(
                "Stack depth mismatch at {}: {} vs {}",
                target,
                state.stack_depth(),
                incoming.stack_depth()
            ));
        }
        if state.lock_depth() != incoming.lock_depth() {
            return Err(invariant_error!(
                "Lock depth mismatch at {}: {} vs {}",
                target,
                state.lock_depth(),
                incoming.lock_depth()
            ));
        }

        let (loop_header, built, merged) = self
            .block(target)
            .map(|b| (b.loop_header, b.built, b.merged))
            .unwrap_or_default();
        let frozen = built && !loop_header;
        let mut outcome = MergeOutcome::default();

        for (i, (existing, new)) in state
            .stack()
            .to_vec()
            .into_iter()
            .zip(incoming.stack().iter().copied())
            .enumerate()
        {
            let location = || format!("{target} stack {i}");
            let (existing, new) = match (existing, new) {
                (None, None) => continue,
                (Some(existing), Some(new)) => (existing, new),
                (Some(existing), None) => {
                    return Err(Error::TypeMismatch {
                        expected: self.kind(existing),
                        found: ValueKind::Void,
                        location: location(),
                    })
                }
                (None, Some(new)) => {
                    return Err(Error::TypeMismatch {
                        expected: ValueKind::Void,
                        found: self.kind(new),
                        location: location(),
                    })
                }
            };
            if self.kind(existing) != self.kind(new) {
                return Err(Error::TypeMismatch {
                    expected: self.kind(existing),
                    found: self.kind(new),
                    location: location(),
                });
            }
            let slot = PhiSlot::Stack(slot_index(i)?);
            if let Some(phi) = self.join(target, slot, existing, new, merged, frozen)? {
                state.set_stack_slot(i, Some(phi));
                outcome.created.push((slot, phi));
            }
        }

        for (i, (existing, new)) in state
            .locals()
            .to_vec()
            .into_iter()
            .zip(incoming.locals().iter().copied())
            .enumerate()
        {
            let Some(existing) = existing else {
                continue;
            };
            let compatible = new.filter(|n| self.kind(*n) == self.kind(existing));
            let Some(new) = compatible else {
                // forward edges into a header that is not interpreted yet follow the
                // general rule; a back edge may not change what the body was built with
                if loop_header && built {
                    return Err(Error::TypeMismatch {
                        expected: self.kind(existing),
                        found: new.map_or(ValueKind::Void, |n| self.kind(n)),
                        location: format!("{target} local {i}"),
                    });
                }
                if frozen {
                    return Err(invariant_error!(
                        "Local {} of already built {} would be invalidated",
                        i,
                        target
                    ));
                }
                if self.is_phi_of(existing, target) {
                    self.remove_phi(target, existing)?;
                }
                state.invalidate_local(i);
                outcome.invalidated.push(slot_index(i)?);
                continue;
            };
            let slot = PhiSlot::Local(slot_index(i)?);
            if let Some(phi) = self.join(target, slot, existing, new, merged, frozen)? {
                state.set_local_slot(i, Some(phi));
                outcome.created.push((slot, phi));
            }
        }

        self.block_mut(target)?.entry_state = Some(state);
        Ok(outcome)
    }

    /// Joins one compatible slot. Returns the phi if one had to be created.
    fn join(
        &mut self,
        target: BlockId,
        slot: PhiSlot,
        existing: ValueId,
        new: ValueId,
        merged: usize,
        frozen: bool,
    ) -> Result<Option<ValueId>> {
        if self.is_phi_of(existing, target) {
            self.push_phi_input(existing, new)?;
            return Ok(None);
        }
        if existing == new {
            return Ok(None);
        }
        if frozen {
            return Err(invariant_error!(
                "Phi for {} of already built {} would be created",
                slot,
                target
            ));
        }
        let mut inputs = vec![existing; merged];
        inputs.push(new);
        let phi = self.new_phi(target, slot, self.kind(existing), inputs)?;
        Ok(Some(phi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{BlockMap, BytecodeAssembler},
        hir::{ConstValue, HirOp},
        metadata::MethodInfo,
    };

    /// B0: if -> B2 else B1; B1: goto B2; B2: return. B2 has two predecessors.
    fn diamond() -> HirGraph {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .ifeq("join")
            .unwrap()
            .goto("join")
            .unwrap()
            .label("join")
            .unwrap()
            .return_void()
            .unwrap();
        let code = asm.finish_method(MethodInfo::new("m", 2, 3)).unwrap();
        let map = BlockMap::discover(&code).unwrap();
        HirGraph::new(code.info().clone(), &map)
    }

    fn constant(graph: &mut HirGraph, block: BlockId, value: ConstValue) -> ValueId {
        let kind = value.kind();
        graph
            .append(block, kind, HirOp::Constant(value), None, None)
            .unwrap()
    }

    const B0: BlockId = BlockId::new(0);
    const B1: BlockId = BlockId::new(1);
    const B2: BlockId = BlockId::new(2);

    #[test]
    fn test_same_value_no_phi() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(7));
        let mut state = VmState::new(2, 3);
        state.store(2, a, ValueKind::Int).unwrap();

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &state).unwrap();
        graph.add_edge(B1, B2).unwrap();
        let outcome = graph.merge_state(B2, B1, &state).unwrap();

        assert!(outcome.created.is_empty());
        assert_eq!(graph.phis(B2).count(), 0);
        assert_eq!(graph.block(B2).unwrap().entry_state().unwrap().local(2), Some(a));
    }

    #[test]
    fn test_different_values_create_phi() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(1));
        let b = constant(&mut graph, B1, ConstValue::Int(2));
        let mut left = VmState::new(2, 3);
        left.push(a, ValueKind::Int).unwrap();
        let mut right = VmState::new(2, 3);
        right.push(b, ValueKind::Int).unwrap();

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &left).unwrap();
        graph.add_edge(B1, B2).unwrap();
        let outcome = graph.merge_state(B2, B1, &right).unwrap();

        assert_eq!(outcome.created.len(), 1);
        let (slot, phi) = outcome.created[0];
        assert_eq!(slot, PhiSlot::Stack(0));
        assert_eq!(graph.value(phi).unwrap().phi_inputs(), Some(&[a, b][..]));
    }

    #[test]
    fn test_incompatible_local_invalidated() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(1));
        let n = constant(&mut graph, B1, ConstValue::Null);
        let mut left = VmState::new(2, 3);
        left.store(2, a, ValueKind::Int).unwrap();
        let mut right = VmState::new(2, 3);
        right.store(2, n, ValueKind::Object).unwrap();

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &left).unwrap();
        graph.add_edge(B1, B2).unwrap();
        let outcome = graph.merge_state(B2, B1, &right).unwrap();

        assert_eq!(outcome.invalidated, vec![2]);
        assert_eq!(graph.block(B2).unwrap().entry_state().unwrap().local(2), None);
    }

    #[test]
    fn test_stack_kind_mismatch() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(1));
        let f = constant(&mut graph, B1, ConstValue::float(1.0));
        let mut left = VmState::new(2, 3);
        left.push(a, ValueKind::Int).unwrap();
        let mut right = VmState::new(2, 3);
        right.push(f, ValueKind::Float).unwrap();

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &left).unwrap();
        graph.add_edge(B1, B2).unwrap();
        let result = graph.merge_state(B2, B1, &right);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_depth_mismatch() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(1));
        let mut left = VmState::new(2, 3);
        left.push(a, ValueKind::Int).unwrap();
        let right = VmState::new(2, 3);

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &left).unwrap();
        graph.add_edge(B1, B2).unwrap();
        let result = graph.merge_state(B2, B1, &right);
        assert!(matches!(
            result,
            Err(Error::InternalInvariantViolation { .. })
        ));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut graph = diamond();
        let a = constant(&mut graph, B0, ConstValue::Int(1));
        let b = constant(&mut graph, B1, ConstValue::Int(2));
        let mut left = VmState::new(2, 3);
        left.store(0, a, ValueKind::Int).unwrap();
        let mut right = VmState::new(2, 3);
        right.store(0, b, ValueKind::Int).unwrap();

        graph.add_edge(B0, B2).unwrap();
        graph.merge_state(B2, B0, &left).unwrap();
        graph.add_edge(B1, B2).unwrap();
        graph.merge_state(B2, B1, &right).unwrap();
        let before = graph.block(B2).unwrap().entry_state().cloned();
        let values = graph.value_count();

        let again = graph.merge_state(B2, B1, &right).unwrap();
        assert!(again.already_merged);
        assert_eq!(graph.block(B2).unwrap().entry_state().cloned(), before);
        assert_eq!(graph.value_count(), values);
    }

    #[test]
    fn test_unrecorded_edge() {
        let mut graph = diamond();
        let state = VmState::new(2, 3);
        assert!(graph.merge_state(B2, B1, &state).is_err());
    }
}
