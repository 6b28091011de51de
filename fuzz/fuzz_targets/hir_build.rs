#![no_main]

use hirforge::prelude::*;
use libfuzzer_sys::fuzz_target;

const LABELS: [&str; 4] = ["a", "b", "c", "d"];

/// Interprets each byte as one assembler call. Anything the assembler, block discovery
/// or the builder rejects is fine; panics are not.
fn assemble(data: &[u8]) -> Result<BytecodeAssembler> {
    let mut asm = BytecodeAssembler::new();
    let mut placed = [false; LABELS.len()];
    for byte in data {
        let arg = u16::from(byte >> 4) % 4;
        let label = LABELS[usize::from(arg)];
        match byte & 0x0f {
            0 => asm.iconst(i32::from(arg))?,
            1 => asm.iload(arg)?,
            2 => asm.istore(arg)?,
            3 => asm.iadd()?,
            4 => asm.pop()?,
            5 => asm.dup()?,
            6 => asm.swap()?,
            7 => asm.ifeq(label)?,
            8 => asm.goto(label)?,
            9 => asm.ireturn()?,
            10 => asm.iinc(arg, -1)?,
            11 => asm.fconst(1.0)?,
            12 => asm.fstore(arg)?,
            13 => asm.idiv()?,
            _ => {
                if placed[usize::from(arg)] {
                    continue;
                }
                placed[usize::from(arg)] = true;
                asm.label(label)?
            }
        };
    }
    Ok(asm)
}

fuzz_target!(|data: &[u8]| {
    let Ok(asm) = assemble(data) else {
        return;
    };
    let info = MethodInfo::new("fuzz", 8, 4)
        .with_params(vec![ValueKind::Int])
        .returns(ValueKind::Int)
        .with_flags(MethodFlags::STATIC);
    let Ok(code) = asm.finish_method(info) else {
        return;
    };
    let Ok(map) = BlockMap::discover(&code) else {
        return;
    };
    let resolver = StaticResolver::new();
    if let Ok(graph) = HirBuilder::new(&code, &map, &resolver).build() {
        let mut regs = VirtualRegisters::new();
        let _ = resolve_all(&graph, &mut regs);
    }
});
