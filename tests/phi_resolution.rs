//! Phi resolution integration tests.
//!
//! Graphs are built from assembled bytecode, then every single-successor block is
//! resolved into copies. The copies are executed on a simulated register file and
//! compared with the simultaneous assignment the phis describe.

use std::collections::HashMap;

use hirforge::prelude::*;

fn build(asm: BytecodeAssembler, info: MethodInfo) -> Result<HirGraph> {
    let code = asm.finish_method(info)?;
    let map = BlockMap::discover(&code)?;
    HirBuilder::new(&code, &map, &StaticResolver::new()).build()
}

/// Runs `moves` in order on `regs`. Constants must be `int`.
fn execute(regs: &mut HashMap<VirtualReg, i64>, moves: &[Move]) {
    for mv in moves {
        let value = match &mv.from {
            LirOperand::Register(reg) => *regs.get(reg).expect("read of an unset register"),
            LirOperand::Constant(value) => i64::from(value.as_int().expect("int constant")),
        };
        regs.insert(mv.to, value);
    }
}

#[test]
fn test_diamond_copies_into_phi() -> Result<()> {
    let mut asm = BytecodeAssembler::new();
    asm.iload(0)?.ifeq("else")?;
    asm.iconst(1)?.istore(0)?.goto("join")?;
    asm.label("else")?.iconst(2)?.istore(0)?;
    asm.label("join")?.iload(0)?.ireturn()?;
    let info = MethodInfo::new("choose", 1, 1)
        .with_params(vec![ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let graph = build(asm, info)?;

    let mut regs = VirtualRegisters::new();
    let resolved = resolve_all(&graph, &mut regs)?;
    assert_eq!(resolved.len(), 2);

    let join = graph
        .blocks()
        .iter()
        .find(|b| b.preds().len() == 2)
        .expect("join");
    let (_, phi) = graph.phis(join.id()).next().expect("phi");
    let phi_reg = regs.register_of(phi.id).expect("phi register");

    let mut constants = Vec::new();
    for (block, moves) in &resolved {
        assert_eq!(graph.block(*block).unwrap().succs(), &[join.id()]);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].to, phi_reg);
        let LirOperand::Constant(value) = &moves[0].from else {
            panic!("Expected a constant source");
        };
        constants.push(value.as_int().unwrap());
    }
    constants.sort_unstable();
    assert_eq!(constants, vec![1, 2]);
    Ok(())
}

#[test]
fn test_block_without_join_has_no_copies() -> Result<()> {
    let mut asm = BytecodeAssembler::new();
    asm.iload(0)?.istore(1)?.goto("next")?;
    asm.label("next")?.iload(1)?.ireturn()?;
    let info = MethodInfo::new("straight", 1, 2)
        .with_params(vec![ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let graph = build(asm, info)?;

    let mut regs = VirtualRegisters::new();
    assert!(resolve_all(&graph, &mut regs)?.is_empty());
    Ok(())
}

#[test]
fn test_loop_swap_breaks_cycle() -> Result<()> {
    // (a, b) = (b, a) on every iteration
    let mut asm = BytecodeAssembler::new();
    asm.label("loop")?.iload(0)?.if_zero(Cond::Le, "exit")?;
    asm.iload(1)?.istore(3)?.iload(2)?.istore(1)?.iload(3)?.istore(2)?;
    asm.iinc(0, -1)?.goto("loop")?;
    asm.label("exit")?.iload(1)?.ireturn()?;
    let info = MethodInfo::new("rotate", 1, 4)
        .with_params(vec![ValueKind::Int, ValueKind::Int, ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let graph = build(asm, info)?;

    let header = graph
        .blocks()
        .iter()
        .find(|b| b.is_loop_header())
        .expect("loop header");
    let body = header
        .preds()
        .iter()
        .copied()
        .find(|p| !graph.block(*p).unwrap().is_synthetic())
        .expect("back edge");

    let mut regs = VirtualRegisters::new();
    let resolved = resolve_all(&graph, &mut regs)?;
    let moves = &resolved
        .iter()
        .find(|(block, _)| *block == body)
        .expect("copies on the back edge")
        .1;

    let phi_regs: HashMap<PhiSlot, VirtualReg> = graph
        .phis(header.id())
        .map(|(slot, phi)| (slot, regs.register_of(phi.id).unwrap()))
        .collect();
    let a = phi_regs[&PhiSlot::Local(1)];
    let b = phi_regs[&PhiSlot::Local(2)];
    let n = phi_regs[&PhiSlot::Local(0)];

    let temps: Vec<_> = moves
        .iter()
        .filter(|mv| !phi_regs.values().any(|r| *r == mv.to))
        .collect();
    assert_eq!(temps.len(), 1);
    assert_eq!(moves.len(), 4);

    // the decrement is computed into its own register before the copies
    let exit = graph.block(body).unwrap().exit_state().unwrap();
    let decremented = regs.register_of(exit.local(0).unwrap()).unwrap();

    let mut file = HashMap::from([(a, 10), (b, 20), (n, 3), (decremented, 2)]);
    execute(&mut file, moves);
    assert_eq!(file[&a], 20);
    assert_eq!(file[&b], 10);
    assert_eq!(file[&n], 2);
    Ok(())
}

#[test]
fn test_two_cycle_matches_simultaneous_assignment() -> Result<()> {
    let mut regs = VirtualRegisters::new();
    let a = regs.new_temp(ValueKind::Int);
    let b = regs.new_temp(ValueKind::Int);

    let mut resolver = PhiResolver::new();
    resolver.add_move(LirOperand::Register(a), b)?;
    resolver.add_move(LirOperand::Register(b), a)?;
    let moves = resolver.finish(&mut regs)?;

    assert_eq!(moves.len(), 3);
    let temp = moves[0].to;
    assert!(temp != a && temp != b);
    assert_eq!(moves[0].from, LirOperand::Register(a));
    assert_eq!(moves[1], Move { from: LirOperand::Register(b), to: a });
    assert_eq!(moves[2], Move { from: LirOperand::Register(temp), to: b });

    let mut file = HashMap::from([(a, 1), (b, 2)]);
    execute(&mut file, &moves);
    assert_eq!((file[&a], file[&b]), (2, 1));
    Ok(())
}
