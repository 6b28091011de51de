//! Fluent assembler for method bodies.
//!
//! [`BytecodeAssembler`] produces the decoded operation stream directly, so tests,
//! benchmarks and the CLI can describe a method body in instruction set mnemonics without
//! going through a class file. Branches refer to string labels that are resolved to
//! absolute offsets when the assembler is finished.
//!
//! # Examples
//!
//! ```rust,ignore
//! use hirforge::bytecode::BytecodeAssembler;
//!
//! let mut asm = BytecodeAssembler::new();
//! asm.iload(0)?
//!     .ifeq("zero")?
//!     .iconst(1)?
//!     .ireturn()?
//!     .label("zero")?
//!     .iconst(0)?
//!     .ireturn()?;
//! let ops = asm.finish()?;
//! ```

use std::collections::HashMap;

use crate::{
    bytecode::{ArithOp, CompareOp, Cond, DecodedOp, LogicOp, MethodCode, Op, ShiftOp},
    hir::ConstValue,
    metadata::{FieldAccess, InvokeKind, MethodInfo, ValueKind},
    Error, Result,
};

/// Label-resolving builder for a decoded operation stream.
#[derive(Debug, Default)]
pub struct BytecodeAssembler {
    ops: Vec<DecodedOp>,
    offset: u32,
    labels: HashMap<String, u32>,
    /// (index into `ops`, labels in [`Op::branch_targets`] order)
    fixups: Vec<(usize, Vec<String>)>,
}

impl BytecodeAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted operation will get.
    #[must_use]
    pub fn current_offset(&self) -> u32 {
        self.offset
    }

    /// Defines `name` at the current offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.insert(name.to_string(), self.offset).is_some() {
            return Err(Error::Assembly(format!("duplicate label '{name}'")));
        }
        Ok(self)
    }

    /// Emits an arbitrary operation without branch targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] if the operation carries branch targets; use the
    /// label-taking emitters for those.
    pub fn emit(&mut self, op: Op) -> Result<&mut Self> {
        if !op.branch_targets().is_empty() {
            return Err(Error::Assembly(format!(
                "'{}' needs label targets",
                op.mnemonic()
            )));
        }
        self.push(op);
        Ok(self)
    }

    fn push(&mut self, op: Op) -> usize {
        let length = op.encoded_len(self.offset);
        self.ops.push(DecodedOp {
            offset: self.offset,
            length,
            op,
        });
        self.offset += length;
        self.ops.len() - 1
    }

    fn emit_branch(&mut self, op: Op, labels: Vec<String>) -> Result<&mut Self> {
        let index = self.push(op);
        self.fixups.push((index, labels));
        Ok(self)
    }

    /// Resolves all labels and returns the operation stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] if a referenced label was never defined.
    pub fn finish(mut self) -> Result<Vec<DecodedOp>> {
        for (index, labels) in &self.fixups {
            let mut offsets = Vec::with_capacity(labels.len());
            for label in labels {
                let offset = self
                    .labels
                    .get(label)
                    .copied()
                    .ok_or_else(|| Error::Assembly(format!("undefined label '{label}'")))?;
                offsets.push(offset);
            }

            let op = &mut self.ops[*index].op;
            let expected = op.branch_targets().len();
            if expected != offsets.len() {
                return Err(Error::Assembly(format!(
                    "'{}' expects {} targets, got {}",
                    op.mnemonic(),
                    expected,
                    offsets.len()
                )));
            }
            for (slot, offset) in op.branch_targets_mut().into_iter().zip(offsets) {
                *slot = offset;
            }
        }
        Ok(self.ops)
    }

    /// Resolves all labels and pairs the operations with `info`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] if a referenced label was never defined.
    pub fn finish_method(self, info: MethodInfo) -> Result<MethodCode> {
        Ok(MethodCode::new(info, self.finish()?))
    }

    // Constants

    /// `nop`
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.emit(Op::Nop)
    }

    /// Pushes any constant (`aconst_null`, `iconst`, `bipush`, `sipush`, `lconst`, ...).
    pub fn constant(&mut self, value: ConstValue) -> Result<&mut Self> {
        self.emit(Op::Const(value))
    }

    /// Pushes an `int`.
    pub fn iconst(&mut self, value: i32) -> Result<&mut Self> {
        self.emit(Op::Const(ConstValue::Int(value)))
    }

    /// Pushes a `long`.
    pub fn lconst(&mut self, value: i64) -> Result<&mut Self> {
        self.emit(Op::Const(ConstValue::Long(value)))
    }

    /// Pushes a `float`.
    pub fn fconst(&mut self, value: f32) -> Result<&mut Self> {
        self.emit(Op::Const(ConstValue::float(value)))
    }

    /// Pushes a `double`.
    pub fn dconst(&mut self, value: f64) -> Result<&mut Self> {
        self.emit(Op::Const(ConstValue::double(value)))
    }

    /// `aconst_null`
    pub fn aconst_null(&mut self) -> Result<&mut Self> {
        self.emit(Op::Const(ConstValue::Null))
    }

    /// `ldc #index`
    pub fn ldc(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::Ldc(index))
    }

    // Locals

    /// Loads local `index` of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] for kinds that have no load instruction.
    pub fn load(&mut self, kind: ValueKind, index: u16) -> Result<&mut Self> {
        check_local_kind(kind, "load")?;
        self.emit(Op::Load(kind, index))
    }

    /// Stores the stack top into local `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] for kinds that have no store instruction.
    pub fn store(&mut self, kind: ValueKind, index: u16) -> Result<&mut Self> {
        check_local_kind(kind, "store")?;
        self.emit(Op::Store(kind, index))
    }

    /// `iload`
    pub fn iload(&mut self, index: u16) -> Result<&mut Self> {
        self.load(ValueKind::Int, index)
    }

    /// `lload`
    pub fn lload(&mut self, index: u16) -> Result<&mut Self> {
        self.load(ValueKind::Long, index)
    }

    /// `fload`
    pub fn fload(&mut self, index: u16) -> Result<&mut Self> {
        self.load(ValueKind::Float, index)
    }

    /// `dload`
    pub fn dload(&mut self, index: u16) -> Result<&mut Self> {
        self.load(ValueKind::Double, index)
    }

    /// `aload`
    pub fn aload(&mut self, index: u16) -> Result<&mut Self> {
        self.load(ValueKind::Object, index)
    }

    /// `istore`
    pub fn istore(&mut self, index: u16) -> Result<&mut Self> {
        self.store(ValueKind::Int, index)
    }

    /// `lstore`
    pub fn lstore(&mut self, index: u16) -> Result<&mut Self> {
        self.store(ValueKind::Long, index)
    }

    /// `fstore`
    pub fn fstore(&mut self, index: u16) -> Result<&mut Self> {
        self.store(ValueKind::Float, index)
    }

    /// `dstore`
    pub fn dstore(&mut self, index: u16) -> Result<&mut Self> {
        self.store(ValueKind::Double, index)
    }

    /// `astore`
    pub fn astore(&mut self, index: u16) -> Result<&mut Self> {
        self.store(ValueKind::Object, index)
    }

    /// `iinc index, delta`
    pub fn iinc(&mut self, index: u16, delta: i16) -> Result<&mut Self> {
        self.emit(Op::Iinc(index, delta))
    }

    // Arrays

    /// `Xaload` for the given element kind.
    pub fn array_load(&mut self, elem: ValueKind) -> Result<&mut Self> {
        check_array_kind(elem)?;
        self.emit(Op::ArrayLoad(elem))
    }

    /// `Xastore` for the given element kind.
    pub fn array_store(&mut self, elem: ValueKind) -> Result<&mut Self> {
        check_array_kind(elem)?;
        self.emit(Op::ArrayStore(elem))
    }

    /// `arraylength`
    pub fn arraylength(&mut self) -> Result<&mut Self> {
        self.emit(Op::ArrayLength)
    }

    /// `newarray` with a primitive element kind.
    pub fn newarray(&mut self, elem: ValueKind) -> Result<&mut Self> {
        if elem == ValueKind::Object {
            return Err(Error::Assembly(
                "newarray takes a primitive element kind, use anewarray".to_string(),
            ));
        }
        check_array_kind(elem)?;
        self.emit(Op::NewArray(elem))
    }

    /// `anewarray #index`
    pub fn anewarray(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::ANewArray(index))
    }

    /// `multianewarray #index, dims`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] when `dims` is zero.
    pub fn multianewarray(&mut self, index: u16, dims: u8) -> Result<&mut Self> {
        if dims == 0 {
            return Err(Error::Assembly(
                "multianewarray needs at least one dimension".to_string(),
            ));
        }
        self.emit(Op::MultiANewArray(index, dims))
    }

    // Stack

    /// `pop`
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.emit(Op::Pop)
    }

    /// `pop2`
    pub fn pop2(&mut self) -> Result<&mut Self> {
        self.emit(Op::Pop2)
    }

    /// `dup`
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.emit(Op::Dup)
    }

    /// `dup_x1`
    pub fn dup_x1(&mut self) -> Result<&mut Self> {
        self.emit(Op::DupX1)
    }

    /// `dup_x2`
    pub fn dup_x2(&mut self) -> Result<&mut Self> {
        self.emit(Op::DupX2)
    }

    /// `dup2`
    pub fn dup2(&mut self) -> Result<&mut Self> {
        self.emit(Op::Dup2)
    }

    /// `dup2_x1`
    pub fn dup2_x1(&mut self) -> Result<&mut Self> {
        self.emit(Op::Dup2X1)
    }

    /// `dup2_x2`
    pub fn dup2_x2(&mut self) -> Result<&mut Self> {
        self.emit(Op::Dup2X2)
    }

    /// `swap`
    pub fn swap(&mut self) -> Result<&mut Self> {
        self.emit(Op::Swap)
    }

    // Arithmetic

    /// Binary arithmetic on `int`, `long`, `float` or `double`.
    pub fn arith(&mut self, op: ArithOp, kind: ValueKind) -> Result<&mut Self> {
        check_numeric_kind(kind, "arithmetic")?;
        self.emit(Op::Arith(op, kind))
    }

    /// `iadd`
    pub fn iadd(&mut self) -> Result<&mut Self> {
        self.arith(ArithOp::Add, ValueKind::Int)
    }

    /// `isub`
    pub fn isub(&mut self) -> Result<&mut Self> {
        self.arith(ArithOp::Sub, ValueKind::Int)
    }

    /// `imul`
    pub fn imul(&mut self) -> Result<&mut Self> {
        self.arith(ArithOp::Mul, ValueKind::Int)
    }

    /// `idiv`
    pub fn idiv(&mut self) -> Result<&mut Self> {
        self.arith(ArithOp::Div, ValueKind::Int)
    }

    /// `ladd`
    pub fn ladd(&mut self) -> Result<&mut Self> {
        self.arith(ArithOp::Add, ValueKind::Long)
    }

    /// Negation.
    pub fn neg(&mut self, kind: ValueKind) -> Result<&mut Self> {
        check_numeric_kind(kind, "neg")?;
        self.emit(Op::Neg(kind))
    }

    /// Shift on `int` or `long`.
    pub fn shift(&mut self, op: ShiftOp, kind: ValueKind) -> Result<&mut Self> {
        check_integral_kind(kind, "shift")?;
        self.emit(Op::Shift(op, kind))
    }

    /// Bitwise logic on `int` or `long`.
    pub fn logic(&mut self, op: LogicOp, kind: ValueKind) -> Result<&mut Self> {
        check_integral_kind(kind, "logic")?;
        self.emit(Op::Logic(op, kind))
    }

    /// `iand`
    pub fn iand(&mut self) -> Result<&mut Self> {
        self.logic(LogicOp::And, ValueKind::Int)
    }

    /// Numeric conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] for conversions the instruction set does not have.
    pub fn convert(&mut self, from: ValueKind, to: ValueKind) -> Result<&mut Self> {
        let valid = match from {
            ValueKind::Int => matches!(
                to,
                ValueKind::Long
                    | ValueKind::Float
                    | ValueKind::Double
                    | ValueKind::Byte
                    | ValueKind::Char
                    | ValueKind::Short
            ),
            ValueKind::Long | ValueKind::Float | ValueKind::Double => {
                from != to
                    && matches!(
                        to,
                        ValueKind::Int | ValueKind::Long | ValueKind::Float | ValueKind::Double
                    )
            }
            _ => false,
        };
        if !valid {
            return Err(Error::Assembly(format!("no conversion from {from} to {to}")));
        }
        self.emit(Op::Convert(from, to))
    }

    /// Three-way compare.
    pub fn compare(&mut self, op: CompareOp) -> Result<&mut Self> {
        self.emit(Op::Compare(op))
    }

    // Control flow

    /// `if<cond> label` comparing an `int` against zero.
    pub fn if_zero(&mut self, cond: Cond, label: &str) -> Result<&mut Self> {
        self.emit_branch(
            Op::IfZero {
                cond,
                kind: ValueKind::Int,
                target: 0,
            },
            vec![label.to_string()],
        )
    }

    /// `ifeq label`
    pub fn ifeq(&mut self, label: &str) -> Result<&mut Self> {
        self.if_zero(Cond::Eq, label)
    }

    /// `ifne label`
    pub fn ifne(&mut self, label: &str) -> Result<&mut Self> {
        self.if_zero(Cond::Ne, label)
    }

    /// `iflt label`
    pub fn iflt(&mut self, label: &str) -> Result<&mut Self> {
        self.if_zero(Cond::Lt, label)
    }

    /// `ifnull label`
    pub fn ifnull(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(
            Op::IfZero {
                cond: Cond::Eq,
                kind: ValueKind::Object,
                target: 0,
            },
            vec![label.to_string()],
        )
    }

    /// `ifnonnull label`
    pub fn ifnonnull(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(
            Op::IfZero {
                cond: Cond::Ne,
                kind: ValueKind::Object,
                target: 0,
            },
            vec![label.to_string()],
        )
    }

    /// `if_icmp<cond> label`
    pub fn if_icmp(&mut self, cond: Cond, label: &str) -> Result<&mut Self> {
        self.emit_branch(
            Op::IfCmp {
                cond,
                kind: ValueKind::Int,
                target: 0,
            },
            vec![label.to_string()],
        )
    }

    /// `if_acmp<cond> label`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] for conditions other than `eq` and `ne`.
    pub fn if_acmp(&mut self, cond: Cond, label: &str) -> Result<&mut Self> {
        if !matches!(cond, Cond::Eq | Cond::Ne) {
            return Err(Error::Assembly(format!("if_acmp{cond} does not exist")));
        }
        self.emit_branch(
            Op::IfCmp {
                cond,
                kind: ValueKind::Object,
                target: 0,
            },
            vec![label.to_string()],
        )
    }

    /// `goto label`
    pub fn goto(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(Op::Goto(0), vec![label.to_string()])
    }

    /// `jsr label`
    pub fn jsr(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(Op::Jsr(0), vec![label.to_string()])
    }

    /// `ret index`
    pub fn ret(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::Ret(index))
    }

    /// `tableswitch` with cases for consecutive keys starting at `low`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] if there are no cases or the key range overflows.
    pub fn tableswitch(&mut self, low: i32, cases: &[&str], default: &str) -> Result<&mut Self> {
        if cases.is_empty() {
            return Err(Error::Assembly("tableswitch needs at least one case".into()));
        }
        if low.checked_add(cases.len() as i32 - 1).is_none() {
            return Err(Error::Assembly("tableswitch key range overflows".into()));
        }
        let labels = cases
            .iter()
            .chain([&default])
            .map(|label| (*label).to_string())
            .collect();
        self.emit_branch(
            Op::TableSwitch {
                low,
                targets: vec![0; cases.len()],
                default: 0,
            },
            labels,
        )
    }

    /// `lookupswitch`; pairs are sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assembly`] on duplicate keys.
    pub fn lookupswitch(&mut self, pairs: &[(i32, &str)], default: &str) -> Result<&mut Self> {
        let mut sorted: Vec<(i32, &str)> = pairs.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        if sorted.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::Assembly("lookupswitch has duplicate keys".into()));
        }
        let labels = sorted
            .iter()
            .map(|(_, label)| (*label).to_string())
            .chain([default.to_string()])
            .collect();
        self.emit_branch(
            Op::LookupSwitch {
                pairs: sorted.iter().map(|(key, _)| (*key, 0)).collect(),
                default: 0,
            },
            labels,
        )
    }

    /// Returns a value of the given kind (`void` for plain `return`).
    pub fn return_value(&mut self, kind: ValueKind) -> Result<&mut Self> {
        if kind != ValueKind::Void {
            check_local_kind(kind, "return")?;
        }
        self.emit(Op::Return(kind))
    }

    /// `ireturn`
    pub fn ireturn(&mut self) -> Result<&mut Self> {
        self.return_value(ValueKind::Int)
    }

    /// `areturn`
    pub fn areturn(&mut self) -> Result<&mut Self> {
        self.return_value(ValueKind::Object)
    }

    /// `return`
    pub fn return_void(&mut self) -> Result<&mut Self> {
        self.return_value(ValueKind::Void)
    }

    /// `athrow`
    pub fn athrow(&mut self) -> Result<&mut Self> {
        self.emit(Op::AThrow)
    }

    // Objects

    /// `getfield`, `putfield`, `getstatic` or `putstatic`.
    pub fn field(&mut self, access: FieldAccess, index: u16) -> Result<&mut Self> {
        self.emit(Op::Field(access, index))
    }

    /// `getfield #index`
    pub fn getfield(&mut self, index: u16) -> Result<&mut Self> {
        self.field(FieldAccess::GetField, index)
    }

    /// `putfield #index`
    pub fn putfield(&mut self, index: u16) -> Result<&mut Self> {
        self.field(FieldAccess::PutField, index)
    }

    /// `getstatic #index`
    pub fn getstatic(&mut self, index: u16) -> Result<&mut Self> {
        self.field(FieldAccess::GetStatic, index)
    }

    /// `putstatic #index`
    pub fn putstatic(&mut self, index: u16) -> Result<&mut Self> {
        self.field(FieldAccess::PutStatic, index)
    }

    /// Any invocation.
    pub fn invoke(&mut self, kind: InvokeKind, index: u16) -> Result<&mut Self> {
        self.emit(Op::Invoke(kind, index))
    }

    /// `invokevirtual #index`
    pub fn invokevirtual(&mut self, index: u16) -> Result<&mut Self> {
        self.invoke(InvokeKind::Virtual, index)
    }

    /// `invokestatic #index`
    pub fn invokestatic(&mut self, index: u16) -> Result<&mut Self> {
        self.invoke(InvokeKind::Static, index)
    }

    /// `invokespecial #index`
    pub fn invokespecial(&mut self, index: u16) -> Result<&mut Self> {
        self.invoke(InvokeKind::Special, index)
    }

    /// `new #index`
    pub fn new_instance(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::New(index))
    }

    /// `checkcast #index`
    pub fn checkcast(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::CheckCast(index))
    }

    /// `instanceof #index`
    pub fn instanceof(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Op::InstanceOf(index))
    }

    /// `monitorenter`
    pub fn monitorenter(&mut self) -> Result<&mut Self> {
        self.emit(Op::MonitorEnter)
    }

    /// `monitorexit`
    pub fn monitorexit(&mut self) -> Result<&mut Self> {
        self.emit(Op::MonitorExit)
    }
}

fn check_local_kind(kind: ValueKind, what: &str) -> Result<()> {
    match kind {
        ValueKind::Int
        | ValueKind::Long
        | ValueKind::Float
        | ValueKind::Double
        | ValueKind::Object => Ok(()),
        other => Err(Error::Assembly(format!("no {what} instruction for {other}"))),
    }
}

fn check_array_kind(kind: ValueKind) -> Result<()> {
    if kind == ValueKind::Void {
        return Err(Error::Assembly("arrays of void do not exist".into()));
    }
    Ok(())
}

fn check_numeric_kind(kind: ValueKind, what: &str) -> Result<()> {
    match kind {
        ValueKind::Int | ValueKind::Long | ValueKind::Float | ValueKind::Double => Ok(()),
        other => Err(Error::Assembly(format!("no {what} instruction for {other}"))),
    }
}

fn check_integral_kind(kind: ValueKind, what: &str) -> Result<()> {
    match kind {
        ValueKind::Int | ValueKind::Long => Ok(()),
        other => Err(Error::Assembly(format!("no {what} instruction for {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let mut asm = BytecodeAssembler::new();
        asm.label("top")
            .unwrap()
            .iload(0)
            .unwrap()
            .ifeq("out")
            .unwrap()
            .goto("top")
            .unwrap()
            .label("out")
            .unwrap()
            .return_void()
            .unwrap();
        let ops = asm.finish().unwrap();

        assert_eq!(ops.len(), 4);
        assert_eq!(
            ops[1].op,
            Op::IfZero {
                cond: Cond::Eq,
                kind: ValueKind::Int,
                target: 7
            }
        );
        assert_eq!(ops[2].op, Op::Goto(0));
        assert_eq!(ops[3].offset, 7);
    }

    #[test]
    fn test_undefined_label() {
        let mut asm = BytecodeAssembler::new();
        asm.goto("nowhere").unwrap();
        assert!(matches!(asm.finish(), Err(Error::Assembly(_))));
    }

    #[test]
    fn test_duplicate_label() {
        let mut asm = BytecodeAssembler::new();
        asm.label("a").unwrap();
        assert!(asm.label("a").is_err());
    }

    #[test]
    fn test_tableswitch_targets() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .tableswitch(10, &["c10", "c11", "c12"], "dflt")
            .unwrap()
            .label("c10")
            .unwrap()
            .return_void()
            .unwrap()
            .label("c11")
            .unwrap()
            .return_void()
            .unwrap()
            .label("c12")
            .unwrap()
            .return_void()
            .unwrap()
            .label("dflt")
            .unwrap()
            .return_void()
            .unwrap();
        let ops = asm.finish().unwrap();

        // iload_0 at 0, tableswitch at 1 padded to 4: 1 + 2 + 12 + 12 = 27 bytes
        assert_eq!(ops[1].length, 27);
        assert_eq!(ops[1].op.branch_targets(), vec![28, 29, 30, 31]);
    }

    #[test]
    fn test_lookupswitch_sorts_keys() {
        let mut asm = BytecodeAssembler::new();
        asm.iload(0)
            .unwrap()
            .lookupswitch(&[(7, "b"), (-3, "a")], "a")
            .unwrap()
            .label("a")
            .unwrap()
            .return_void()
            .unwrap()
            .label("b")
            .unwrap()
            .return_void()
            .unwrap();
        let ops = asm.finish().unwrap();
        match &ops[1].op {
            Op::LookupSwitch { pairs, .. } => {
                assert_eq!(pairs[0].0, -3);
                assert_eq!(pairs[1].0, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_operand_validation() {
        let mut asm = BytecodeAssembler::new();
        assert!(asm.load(ValueKind::Byte, 0).is_err());
        assert!(asm.shift(ShiftOp::Shl, ValueKind::Float).is_err());
        assert!(asm.convert(ValueKind::Long, ValueKind::Byte).is_err());
        assert!(asm.convert(ValueKind::Int, ValueKind::Char).is_ok());
        assert!(asm.if_acmp(Cond::Lt, "x").is_err());
        assert!(asm.newarray(ValueKind::Object).is_err());
        assert!(asm.emit(Op::Goto(3)).is_err());
    }
}
