//! Property tests for phi placement and phi resolution.

use std::collections::{BTreeSet, HashMap};

use hirforge::prelude::*;
use proptest::prelude::*;

const REGISTERS: usize = 8;
const SWITCH_LOCALS: u16 = 3;

#[derive(Debug, Clone)]
enum Source {
    Keep,
    Register(usize),
    Constant(i32),
}

fn source_strategy() -> impl Strategy<Value = Source> {
    prop_oneof![
        Just(Source::Keep),
        (0..REGISTERS).prop_map(Source::Register),
        (-4i32..4).prop_map(Source::Constant),
    ]
}

/// Per case, the constant each of locals 1..=3 is overwritten with.
fn case_strategy() -> impl Strategy<Value = Vec<Option<i32>>> {
    proptest::collection::vec(proptest::option::of(0i32..3), SWITCH_LOCALS as usize)
}

/// A switch whose cases store constants into locals and then meet in a single join.
/// `order` permutes which case body each switch key dispatches to.
fn build_switch(cases: &[Vec<Option<i32>>], order: &[usize]) -> Result<HirGraph> {
    let mut asm = BytecodeAssembler::new();
    for local in 1..=SWITCH_LOCALS {
        asm.iload(0)?.istore(local)?;
    }
    let labels: Vec<String> = (0..cases.len()).map(|i| format!("case{i}")).collect();
    let targets: Vec<&str> = order.iter().map(|&i| labels[i].as_str()).collect();
    asm.iload(0)?.tableswitch(0, &targets, "join")?;

    for (label, stores) in labels.iter().zip(cases) {
        asm.label(label)?;
        for (local, value) in (1..=SWITCH_LOCALS).zip(stores) {
            if let Some(value) = value {
                asm.iconst(*value)?.istore(local)?;
            }
        }
        asm.goto("join")?;
    }
    asm.label("join")?.return_void()?;

    let info = MethodInfo::new("switch", 1, SWITCH_LOCALS + 1)
        .with_params(vec![ValueKind::Int])
        .with_flags(MethodFlags::STATIC);
    let code = asm.finish_method(info)?;
    let map = BlockMap::discover(&code)?;
    HirBuilder::new(&code, &map, &StaticResolver::new()).build()
}

fn join_phis(graph: &HirGraph) -> BTreeSet<PhiSlot> {
    let join = graph
        .blocks()
        .iter()
        .max_by_key(|b| b.preds().len())
        .expect("blocks");
    graph.phis(join.id()).map(|(slot, _)| slot).collect()
}

proptest! {
    #[test]
    fn prop_resolved_moves_match_parallel_assignment(
        sources in proptest::collection::vec(source_strategy(), REGISTERS)
    ) {
        let mut alloc = VirtualRegisters::new();
        let regs: Vec<VirtualReg> = (0..REGISTERS).map(|_| alloc.new_temp(ValueKind::Int)).collect();

        let mut resolver = PhiResolver::new();
        let mut expected: HashMap<VirtualReg, i64> = HashMap::new();
        for (i, reg) in regs.iter().enumerate() {
            expected.insert(*reg, i as i64 * 100);
        }
        let initial = expected.clone();

        for (dest, source) in regs.iter().zip(&sources) {
            match source {
                Source::Keep => {}
                Source::Register(from) => {
                    resolver.add_move(LirOperand::Register(regs[*from]), *dest).unwrap();
                    expected.insert(*dest, initial[&regs[*from]]);
                }
                Source::Constant(value) => {
                    resolver.add_move(LirOperand::Constant(ConstValue::Int(*value)), *dest).unwrap();
                    expected.insert(*dest, i64::from(*value));
                }
            }
        }

        let moves = resolver.finish(&mut alloc).unwrap();

        let mut file = initial.clone();
        for mv in &moves {
            let value = match &mv.from {
                LirOperand::Register(reg) => file[reg],
                LirOperand::Constant(value) => i64::from(value.as_int().unwrap()),
            };
            file.insert(mv.to, value);
        }

        for reg in &regs {
            prop_assert_eq!(file[reg], expected[reg], "register {}", reg);
        }

        // each destination is written exactly once, temporaries aside
        for reg in &regs {
            let writes = moves.iter().filter(|mv| mv.to == *reg).count();
            prop_assert!(writes <= 1, "{} written {} times", reg, writes);
        }
        let temps = moves.iter().filter(|mv| !regs.contains(&mv.to)).count();
        prop_assert!(temps <= REGISTERS / 2);
    }

    #[test]
    fn prop_join_phis_independent_of_successor_order(
        (cases, order) in proptest::collection::vec(case_strategy(), 2..5)
            .prop_flat_map(|cases| {
                let order: Vec<usize> = (0..cases.len()).collect();
                (Just(cases), Just(order).prop_shuffle())
            })
    ) {
        let identity: Vec<usize> = (0..cases.len()).collect();
        let ordered = build_switch(&cases, &identity).unwrap();
        let shuffled = build_switch(&cases, &order).unwrap();

        let expected: BTreeSet<PhiSlot> = (1..=SWITCH_LOCALS)
            .filter(|local| cases.iter().any(|stores| stores[usize::from(*local) - 1].is_some()))
            .map(PhiSlot::Local)
            .collect();
        prop_assert_eq!(join_phis(&ordered), expected.clone());
        prop_assert_eq!(join_phis(&shuffled), expected);

        for graph in [&ordered, &shuffled] {
            for block in graph.blocks() {
                for (_, phi) in graph.phis(block.id()) {
                    let HirOp::Phi { inputs, .. } = &phi.op else {
                        panic!("Expected a phi");
                    };
                    prop_assert_eq!(inputs.len(), block.preds().len());
                }
            }
        }
    }
}
