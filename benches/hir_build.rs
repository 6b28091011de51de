//! Benchmarks for HIR construction and phi resolution.
//!
//! Measures the complete middle tier on synthetic methods:
//! - Straight-line arithmetic (value numbering and idealization heavy)
//! - Nested loops (loop header phis and back-edge merges)
//! - Wide switches (many-predecessor joins)
//! - Phi resolution of every join in a built graph

extern crate hirforge;

use criterion::{criterion_group, criterion_main, Criterion};
use hirforge::prelude::*;
use std::hint::black_box;

/// `x = ((x + y) * y) - (y + x)` repeated, returning `x`.
fn straight_line(rounds: usize) -> (MethodCode, BlockMap) {
    let mut asm = BytecodeAssembler::new();
    for _ in 0..rounds {
        asm.iload(0).unwrap().iload(1).unwrap().iadd().unwrap();
        asm.iload(1).unwrap().imul().unwrap();
        asm.iload(1).unwrap().iload(0).unwrap().iadd().unwrap();
        asm.isub().unwrap().istore(0).unwrap();
    }
    asm.iload(0).unwrap().ireturn().unwrap();
    let info = MethodInfo::new("straight", 4, 2)
        .with_params(vec![ValueKind::Int, ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let code = asm.finish_method(info).unwrap();
    let map = BlockMap::discover(&code).unwrap();
    (code, map)
}

/// `depth` nested counting loops, each rotating three locals.
fn nested_loops(depth: u16) -> (MethodCode, BlockMap) {
    let mut asm = BytecodeAssembler::new();
    let counter = |level: u16| 3 + level;
    for level in 0..depth {
        asm.iconst(10).unwrap().istore(counter(level)).unwrap();
        asm.label(&format!("head{level}")).unwrap();
        asm.iload(counter(level)).unwrap();
        asm.if_zero(Cond::Le, &format!("exit{level}")).unwrap();
    }
    asm.iload(0).unwrap().istore(2).unwrap();
    asm.iload(1).unwrap().istore(0).unwrap();
    asm.iload(2).unwrap().istore(1).unwrap();
    for level in (0..depth).rev() {
        asm.iinc(counter(level), -1).unwrap();
        asm.goto(&format!("head{level}")).unwrap();
        asm.label(&format!("exit{level}")).unwrap();
    }
    asm.iload(0).unwrap().ireturn().unwrap();
    let info = MethodInfo::new("nested", 2, 3 + depth)
        .with_params(vec![ValueKind::Int, ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let code = asm.finish_method(info).unwrap();
    let map = BlockMap::discover(&code).unwrap();
    (code, map)
}

/// A `tableswitch` whose cases each overwrite one local before meeting at a join.
fn wide_switch(cases: usize) -> (MethodCode, BlockMap) {
    let mut asm = BytecodeAssembler::new();
    let labels: Vec<String> = (0..cases).map(|i| format!("case{i}")).collect();
    let targets: Vec<&str> = labels.iter().map(String::as_str).collect();
    asm.iload(0).unwrap().istore(1).unwrap();
    asm.iload(0).unwrap().tableswitch(0, &targets, "join").unwrap();
    for (i, label) in labels.iter().enumerate() {
        asm.label(label).unwrap();
        asm.iconst(i as i32).unwrap().istore(1).unwrap();
        asm.goto("join").unwrap();
    }
    asm.label("join").unwrap().iload(1).unwrap().ireturn().unwrap();
    let info = MethodInfo::new("switch", 1, 2)
        .with_params(vec![ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let code = asm.finish_method(info).unwrap();
    let map = BlockMap::discover(&code).unwrap();
    (code, map)
}

fn bench_build_straight_line(c: &mut Criterion) {
    let (code, map) = straight_line(200);
    let resolver = StaticResolver::new();

    c.bench_function("hir_build_straight_line", |b| {
        b.iter(|| {
            let graph = HirBuilder::new(black_box(&code), &map, &resolver)
                .build()
                .unwrap();
            black_box(graph)
        });
    });
}

fn bench_build_straight_line_unoptimized(c: &mut Criterion) {
    let (code, map) = straight_line(200);
    let resolver = StaticResolver::new();
    let config = BuildConfig::default()
        .with_idealize(false)
        .with_value_numbering(false);

    c.bench_function("hir_build_straight_line_unoptimized", |b| {
        b.iter(|| {
            let graph = HirBuilder::new(black_box(&code), &map, &resolver)
                .with_config(config)
                .build()
                .unwrap();
            black_box(graph)
        });
    });
}

fn bench_build_nested_loops(c: &mut Criterion) {
    let (code, map) = nested_loops(8);
    let resolver = StaticResolver::new();

    c.bench_function("hir_build_nested_loops", |b| {
        b.iter(|| {
            let graph = HirBuilder::new(black_box(&code), &map, &resolver)
                .build()
                .unwrap();
            black_box(graph)
        });
    });
}

fn bench_build_wide_switch(c: &mut Criterion) {
    let (code, map) = wide_switch(64);
    let resolver = StaticResolver::new();

    c.bench_function("hir_build_wide_switch", |b| {
        b.iter(|| {
            let graph = HirBuilder::new(black_box(&code), &map, &resolver)
                .build()
                .unwrap();
            black_box(graph)
        });
    });
}

fn bench_resolve_nested_loops(c: &mut Criterion) {
    let (code, map) = nested_loops(8);
    let graph = HirBuilder::new(&code, &map, &StaticResolver::new())
        .build()
        .unwrap();

    c.bench_function("phi_resolve_nested_loops", |b| {
        b.iter(|| {
            let mut regs = VirtualRegisters::new();
            let moves = resolve_all(black_box(&graph), &mut regs).unwrap();
            black_box(moves)
        });
    });
}

fn bench_resolve_swap_cycle(c: &mut Criterion) {
    let mut base = VirtualRegisters::new();
    let regs: Vec<VirtualReg> = (0..16).map(|_| base.new_temp(ValueKind::Int)).collect();

    c.bench_function("phi_resolve_rotation_16", |b| {
        b.iter(|| {
            let mut resolver = PhiResolver::new();
            for (i, reg) in regs.iter().enumerate() {
                let from = regs[(i + 1) % regs.len()];
                resolver.add_move(LirOperand::Register(from), *reg).unwrap();
            }
            let mut alloc = VirtualRegisters::new();
            let moves = resolver.finish(&mut alloc).unwrap();
            black_box(moves)
        });
    });
}

criterion_group!(
    benches,
    bench_build_straight_line,
    bench_build_straight_line_unoptimized,
    bench_build_nested_loops,
    bench_build_wide_switch,
    bench_resolve_nested_loops,
    bench_resolve_swap_cycle,
);
criterion_main!(benches);
