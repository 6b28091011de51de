//! Typed bytecode operations.
//!
//! [`Op`] is the closed set of decoded operations the HIR builder understands. Families of
//! opcodes that only differ by operand kind (`iadd`/`ladd`/`fadd`/`dadd`, `iload_0`/`aload 7`,
//! ...) collapse into one variant carrying a [`ValueKind`]. Branch targets are absolute
//! bytecode offsets.
//!
//! Encoded lengths follow the instruction set's encoding (short forms for small
//! immediates and local indices, `wide` forms above 255, 4-byte alignment padding for the
//! switches) so that offsets produced by
//! [`BytecodeAssembler`](crate::bytecode::BytecodeAssembler) look like the ones a real
//! class file would carry.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    hir::ConstValue,
    metadata::{FieldAccess, InvokeKind, ValueKind},
};

/// Condition code of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Cond {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
}

impl Cond {
    /// The condition that holds exactly when `self` does not.
    #[must_use]
    pub const fn negate(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
        }
    }

    /// Evaluates the condition on an ordering result of `x` compared to `y`.
    #[must_use]
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Cond::Eq => ordering == Equal,
            Cond::Ne => ordering != Equal,
            Cond::Lt => ordering == Less,
            Cond::Ge => ordering != Less,
            Cond::Gt => ordering == Greater,
            Cond::Le => ordering != Greater,
        }
    }
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division (traps on integer division by zero)
    Div,
    /// Remainder (traps on integer division by zero)
    Rem,
}

impl ArithOp {
    /// Returns `true` when operand order does not matter.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, ArithOp::Add | ArithOp::Mul)
    }
}

/// Shift operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ShiftOp {
    /// Left shift
    Shl,
    /// Arithmetic right shift
    Shr,
    /// Logical right shift
    Ushr,
}

/// Bitwise logic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LogicOp {
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
}

/// Three-way compare operator.
///
/// The `l` and `g` flavours differ only in the result produced when either operand is NaN:
/// `-1` for `l`, `1` for `g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum CompareOp {
    /// `lcmp`
    Lcmp,
    /// `fcmpl`
    Fcmpl,
    /// `fcmpg`
    Fcmpg,
    /// `dcmpl`
    Dcmpl,
    /// `dcmpg`
    Dcmpg,
}

impl CompareOp {
    /// Kind of both operands.
    #[must_use]
    pub const fn operand_kind(self) -> ValueKind {
        match self {
            CompareOp::Lcmp => ValueKind::Long,
            CompareOp::Fcmpl | CompareOp::Fcmpg => ValueKind::Float,
            CompareOp::Dcmpl | CompareOp::Dcmpg => ValueKind::Double,
        }
    }

    /// Result when an operand is NaN.
    #[must_use]
    pub const fn nan_result(self) -> i32 {
        match self {
            CompareOp::Fcmpg | CompareOp::Dcmpg => 1,
            _ => -1,
        }
    }
}

/// A decoded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `nop`
    Nop,
    /// `aconst_null`, `iconst_*`, `lconst_*`, `fconst_*`, `dconst_*`, `bipush`, `sipush`
    Const(ConstValue),
    /// `ldc`, `ldc_w`, `ldc2_w` with the constant pool index
    Ldc(u16),
    /// `iload`, `lload`, `fload`, `dload`, `aload` (and their short forms)
    Load(ValueKind, u16),
    /// `istore`, `lstore`, `fstore`, `dstore`, `astore` (and their short forms)
    Store(ValueKind, u16),
    /// `iinc local, delta`
    Iinc(u16, i16),
    /// `iaload`, `laload`, `faload`, `daload`, `aaload`, `baload`, `caload`, `saload`
    ArrayLoad(ValueKind),
    /// `iastore`, `lastore`, `fastore`, `dastore`, `aastore`, `bastore`, `castore`, `sastore`
    ArrayStore(ValueKind),
    /// `pop`
    Pop,
    /// `pop2`
    Pop2,
    /// `dup`
    Dup,
    /// `dup_x1`
    DupX1,
    /// `dup_x2`
    DupX2,
    /// `dup2`
    Dup2,
    /// `dup2_x1`
    Dup2X1,
    /// `dup2_x2`
    Dup2X2,
    /// `swap`
    Swap,
    /// `{i,l,f,d}{add,sub,mul,div,rem}`
    Arith(ArithOp, ValueKind),
    /// `{i,l,f,d}neg`
    Neg(ValueKind),
    /// `{i,l}{shl,shr,ushr}`
    Shift(ShiftOp, ValueKind),
    /// `{i,l}{and,or,xor}`
    Logic(LogicOp, ValueKind),
    /// `i2l`, `l2i`, `i2b`, `d2f`, ... as (from, to)
    Convert(ValueKind, ValueKind),
    /// `lcmp`, `fcmpl`, `fcmpg`, `dcmpl`, `dcmpg`
    Compare(CompareOp),
    /// `if<cond>` against zero (kind `int`) or `ifnull`/`ifnonnull` (kind `object`)
    IfZero {
        /// Condition code
        cond: Cond,
        /// `int` or `object`
        kind: ValueKind,
        /// Branch target offset
        target: u32,
    },
    /// `if_icmp<cond>` (kind `int`) or `if_acmp<cond>` (kind `object`)
    IfCmp {
        /// Condition code
        cond: Cond,
        /// `int` or `object`
        kind: ValueKind,
        /// Branch target offset
        target: u32,
    },
    /// `goto`, `goto_w`
    Goto(u32),
    /// `jsr`, `jsr_w`
    Jsr(u32),
    /// `ret local`
    Ret(u16),
    /// `tableswitch`
    TableSwitch {
        /// Key of the first case
        low: i32,
        /// Case targets for consecutive keys starting at `low`
        targets: Vec<u32>,
        /// Default target
        default: u32,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// (match key, target) pairs in ascending key order
        pairs: Vec<(i32, u32)>,
        /// Default target
        default: u32,
    },
    /// `ireturn`, `lreturn`, `freturn`, `dreturn`, `areturn`, or `return` (kind `void`)
    Return(ValueKind),
    /// `getfield`, `putfield`, `getstatic`, `putstatic`
    Field(FieldAccess, u16),
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`
    Invoke(InvokeKind, u16),
    /// `new`
    New(u16),
    /// `newarray` with a primitive element kind
    NewArray(ValueKind),
    /// `anewarray`
    ANewArray(u16),
    /// `multianewarray type, dimensions`
    MultiANewArray(u16, u8),
    /// `arraylength`
    ArrayLength,
    /// `athrow`
    AThrow,
    /// `checkcast`
    CheckCast(u16),
    /// `instanceof`
    InstanceOf(u16),
    /// `monitorenter`
    MonitorEnter,
    /// `monitorexit`
    MonitorExit,
    /// A stray `wide` prefix that was not folded into the following operation
    Wide,
    /// An opcode the decoder does not know
    Unknown(u8),
}

impl Op {
    /// Returns `true` if this operation ends its basic block.
    #[must_use]
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Op::IfZero { .. }
                | Op::IfCmp { .. }
                | Op::Goto(_)
                | Op::Jsr(_)
                | Op::Ret(_)
                | Op::TableSwitch { .. }
                | Op::LookupSwitch { .. }
                | Op::Return(_)
                | Op::AThrow
        )
    }

    /// Returns `true` if control can continue with the next operation in offset order.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        match self {
            Op::IfZero { .. } | Op::IfCmp { .. } => true,
            other => !other.ends_block(),
        }
    }

    /// Explicit branch targets, in successor order (case targets before the default).
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match self {
            Op::IfZero { target, .. } | Op::IfCmp { target, .. } => vec![*target],
            Op::Goto(target) | Op::Jsr(target) => vec![*target],
            Op::TableSwitch {
                targets, default, ..
            } => targets.iter().copied().chain([*default]).collect(),
            Op::LookupSwitch { pairs, default } => pairs
                .iter()
                .map(|(_, target)| *target)
                .chain([*default])
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable access to the branch targets, in the order of [`Op::branch_targets`].
    pub fn branch_targets_mut(&mut self) -> Vec<&mut u32> {
        match self {
            Op::IfZero { target, .. } | Op::IfCmp { target, .. } => vec![target],
            Op::Goto(target) | Op::Jsr(target) => vec![target],
            Op::TableSwitch {
                targets, default, ..
            } => targets.iter_mut().chain([default]).collect(),
            Op::LookupSwitch { pairs, default } => pairs
                .iter_mut()
                .map(|(_, target)| target)
                .chain([default])
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Encoded length in bytes when placed at `offset`.
    #[must_use]
    pub fn encoded_len(&self, offset: u32) -> u32 {
        match self {
            Op::Const(value) => match value {
                ConstValue::Null => 1,
                ConstValue::Int(v) if (-1..=5).contains(v) => 1,
                ConstValue::Int(v) if i8::try_from(*v).is_ok() => 2,
                ConstValue::Int(v) if i16::try_from(*v).is_ok() => 3,
                ConstValue::Long(0 | 1) => 1,
                ConstValue::Float(bits)
                    if [0.0f32, 1.0, 2.0].iter().any(|c| c.to_bits() == *bits) =>
                {
                    1
                }
                ConstValue::Double(bits) if [0.0f64, 1.0].iter().any(|c| c.to_bits() == *bits) => {
                    1
                }
                _ => 3,
            },
            Op::Ldc(index) => {
                if *index <= 0xFF {
                    2
                } else {
                    3
                }
            }
            Op::Load(_, index) | Op::Store(_, index) => match *index {
                0..=3 => 1,
                4..=0xFF => 2,
                _ => 4,
            },
            Op::Ret(index) => {
                if *index <= 0xFF {
                    2
                } else {
                    4
                }
            }
            Op::Iinc(index, delta) => {
                if *index <= 0xFF && i8::try_from(*delta).is_ok() {
                    3
                } else {
                    6
                }
            }
            Op::IfZero { .. } | Op::IfCmp { .. } | Op::Goto(_) | Op::Jsr(_) => 3,
            Op::TableSwitch { targets, .. } => {
                1 + switch_padding(offset) + 12 + 4 * targets.len() as u32
            }
            Op::LookupSwitch { pairs, .. } => {
                1 + switch_padding(offset) + 8 + 8 * pairs.len() as u32
            }
            Op::Field(..) | Op::New(_) | Op::ANewArray(_) | Op::CheckCast(_) => 3,
            Op::InstanceOf(_) => 3,
            Op::Invoke(kind, _) => {
                if *kind == InvokeKind::Interface {
                    5
                } else {
                    3
                }
            }
            Op::NewArray(_) => 2,
            Op::MultiANewArray(..) => 4,
            _ => 1,
        }
    }

    /// Instruction set mnemonic of the operation (family name for kinded variants).
    #[must_use]
    pub fn mnemonic(&self) -> String {
        match self {
            Op::Nop => "nop".into(),
            Op::Const(ConstValue::Null) => "aconst_null".into(),
            Op::Const(value) => format!("{}const", value.kind().prefix()),
            Op::Ldc(_) => "ldc".into(),
            Op::Load(kind, _) => format!("{}load", kind.prefix()),
            Op::Store(kind, _) => format!("{}store", kind.prefix()),
            Op::Iinc(..) => "iinc".into(),
            Op::ArrayLoad(kind) => format!("{}aload", kind.prefix()),
            Op::ArrayStore(kind) => format!("{}astore", kind.prefix()),
            Op::Pop => "pop".into(),
            Op::Pop2 => "pop2".into(),
            Op::Dup => "dup".into(),
            Op::DupX1 => "dup_x1".into(),
            Op::DupX2 => "dup_x2".into(),
            Op::Dup2 => "dup2".into(),
            Op::Dup2X1 => "dup2_x1".into(),
            Op::Dup2X2 => "dup2_x2".into(),
            Op::Swap => "swap".into(),
            Op::Arith(op, kind) => format!("{}{op}", kind.prefix()),
            Op::Neg(kind) => format!("{}neg", kind.prefix()),
            Op::Shift(op, kind) => format!("{}{op}", kind.prefix()),
            Op::Logic(op, kind) => format!("{}{op}", kind.prefix()),
            Op::Convert(from, to) => format!("{}2{}", from.prefix(), to.prefix()),
            Op::Compare(op) => op.to_string(),
            Op::IfZero {
                cond,
                kind: ValueKind::Object,
                ..
            } => match cond {
                Cond::Eq => "ifnull".into(),
                _ => "ifnonnull".into(),
            },
            Op::IfZero { cond, .. } => format!("if{cond}"),
            Op::IfCmp { cond, kind, .. } => format!("if_{}cmp{cond}", kind.prefix()),
            Op::Goto(_) => "goto".into(),
            Op::Jsr(_) => "jsr".into(),
            Op::Ret(_) => "ret".into(),
            Op::TableSwitch { .. } => "tableswitch".into(),
            Op::LookupSwitch { .. } => "lookupswitch".into(),
            Op::Return(ValueKind::Void) => "return".into(),
            Op::Return(kind) => format!("{}return", kind.prefix()),
            Op::Field(access, _) => access.mnemonic().into(),
            Op::Invoke(kind, _) => kind.mnemonic().into(),
            Op::New(_) => "new".into(),
            Op::NewArray(_) => "newarray".into(),
            Op::ANewArray(_) => "anewarray".into(),
            Op::MultiANewArray(..) => "multianewarray".into(),
            Op::ArrayLength => "arraylength".into(),
            Op::AThrow => "athrow".into(),
            Op::CheckCast(_) => "checkcast".into(),
            Op::InstanceOf(_) => "instanceof".into(),
            Op::MonitorEnter => "monitorenter".into(),
            Op::MonitorExit => "monitorexit".into(),
            Op::Wide => "wide".into(),
            Op::Unknown(code) => format!("<unknown 0x{code:02x}>"),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Op::Const(ConstValue::Null) => Ok(()),
            Op::Const(value) => write!(f, " {value}"),
            Op::Ldc(index)
            | Op::New(index)
            | Op::ANewArray(index)
            | Op::CheckCast(index)
            | Op::InstanceOf(index)
            | Op::Field(_, index)
            | Op::Invoke(_, index) => write!(f, " #{index}"),
            Op::Load(_, index) | Op::Store(_, index) | Op::Ret(index) => write!(f, " {index}"),
            Op::Iinc(index, delta) => write!(f, " {index} {delta}"),
            Op::IfZero { target, .. }
            | Op::IfCmp { target, .. }
            | Op::Goto(target)
            | Op::Jsr(target) => write!(f, " @{target}"),
            Op::NewArray(kind) => write!(f, " {kind}"),
            Op::MultiANewArray(index, dims) => write!(f, " #{index} {dims}"),
            Op::TableSwitch {
                low,
                targets,
                default,
            } => {
                for (i, target) in targets.iter().enumerate() {
                    write!(f, " {}:@{target}", i64::from(*low) + i as i64)?;
                }
                write!(f, " default:@{default}")
            }
            Op::LookupSwitch { pairs, default } => {
                for (key, target) in pairs {
                    write!(f, " {key}:@{target}")?;
                }
                write!(f, " default:@{default}")
            }
            _ => Ok(()),
        }
    }
}

/// Number of padding bytes after a switch opcode at `offset` so that its operands start on
/// a 4-byte boundary.
const fn switch_padding(offset: u32) -> u32 {
    (4 - (offset + 1) % 4) % 4
}
