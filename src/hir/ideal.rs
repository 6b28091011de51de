//! Constant folding and algebraic simplification.
//!
//! [`idealize`] looks at an instruction before it is appended and either keeps it,
//! replaces it by a cheaper operation (usually a constant) or answers with a value that
//! already exists. Folding follows the instruction set's arithmetic exactly: integer
//! operations wrap, shift distances are masked to the operand width, float-to-integer
//! conversions saturate and map NaN to zero, and division by a constant zero is never
//! folded because it has to trap at run time.

use std::cmp::Ordering;

use crate::{
    bytecode::{ArithOp, CompareOp, LogicOp, ShiftOp},
    hir::{ConstValue, HirGraph, HirOp, ValueId},
    metadata::ValueKind,
};

/// Result of idealizing one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Ideal {
    /// Append the instruction unchanged.
    Keep,
    /// Append this operation instead.
    Replace(HirOp),
    /// Do not append anything; use this value.
    Existing(ValueId),
}

/// Idealizes `op` with result kind `kind` against the values already in `graph`.
#[must_use]
pub fn idealize(graph: &HirGraph, op: &HirOp, kind: ValueKind) -> Ideal {
    let constant = |v: ValueId| graph.constant_of(v);
    let folded = match op {
        HirOp::Arith { op, x, y } => match (constant(*x), constant(*y)) {
            (Some(a), Some(b)) => fold_arith(*op, a, b),
            _ => return arith_identity(*op, *x, *y, kind, graph),
        },
        HirOp::Negate { x } => constant(*x).and_then(fold_negate),
        HirOp::Shift { op, x, y } => match (constant(*x), constant(*y)) {
            (Some(a), Some(b)) => fold_shift(*op, a, b),
            (None, Some(b)) => {
                let mask = if kind == ValueKind::Long { 0x3f } else { 0x1f };
                match b.as_int() {
                    Some(distance) if distance & mask == 0 => return Ideal::Existing(*x),
                    _ => None,
                }
            }
            _ => None,
        },
        HirOp::Logic { op, x, y } => match (constant(*x), constant(*y)) {
            (Some(a), Some(b)) => fold_logic(*op, a, b),
            _ => return logic_identity(*op, *x, *y, kind, graph),
        },
        HirOp::Convert { from, to, x } => constant(*x).and_then(|c| fold_convert(*from, *to, c)),
        HirOp::Compare { op, x, y } => match (constant(*x), constant(*y)) {
            (Some(a), Some(b)) => fold_compare(*op, a, b),
            _ => None,
        },
        _ => None,
    };

    match folded {
        Some(value) => Ideal::Replace(HirOp::Constant(value)),
        None => Ideal::Keep,
    }
}

fn zero(kind: ValueKind) -> Ideal {
    match ConstValue::zero_of(kind) {
        Some(value) => Ideal::Replace(HirOp::Constant(value)),
        None => Ideal::Keep,
    }
}

fn arith_identity(op: ArithOp, x: ValueId, y: ValueId, kind: ValueKind, graph: &HirGraph) -> Ideal {
    if !kind.is_integral() {
        return Ideal::Keep;
    }
    let cx = graph.constant_of(x);
    let cy = graph.constant_of(y);
    let is_zero = |c: Option<&ConstValue>| c.is_some_and(ConstValue::is_zero);
    let is_one = |c: Option<&ConstValue>| c.is_some_and(ConstValue::is_one);

    match op {
        ArithOp::Add if is_zero(cy) => Ideal::Existing(x),
        ArithOp::Add if is_zero(cx) => Ideal::Existing(y),
        ArithOp::Sub if is_zero(cy) => Ideal::Existing(x),
        ArithOp::Sub if x == y => zero(kind),
        ArithOp::Mul if is_one(cy) => Ideal::Existing(x),
        ArithOp::Mul if is_one(cx) => Ideal::Existing(y),
        ArithOp::Mul if is_zero(cx) || is_zero(cy) => zero(kind),
        ArithOp::Div if is_one(cy) => Ideal::Existing(x),
        _ => Ideal::Keep,
    }
}

fn logic_identity(op: LogicOp, x: ValueId, y: ValueId, kind: ValueKind, graph: &HirGraph) -> Ideal {
    let is_zero = |v: ValueId| graph.constant_of(v).is_some_and(ConstValue::is_zero);
    match op {
        LogicOp::And | LogicOp::Or if x == y => Ideal::Existing(x),
        LogicOp::Xor if x == y => zero(kind),
        LogicOp::And if is_zero(x) || is_zero(y) => zero(kind),
        LogicOp::Or | LogicOp::Xor if is_zero(y) => Ideal::Existing(x),
        LogicOp::Or | LogicOp::Xor if is_zero(x) => Ideal::Existing(y),
        _ => Ideal::Keep,
    }
}

fn fold_arith(op: ArithOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(a), ConstValue::Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div if b != 0 => a.wrapping_div(b),
                ArithOp::Rem if b != 0 => a.wrapping_rem(b),
                ArithOp::Div | ArithOp::Rem => return None,
            };
            Some(ConstValue::Int(value))
        }
        (ConstValue::Long(a), ConstValue::Long(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div if b != 0 => a.wrapping_div(b),
                ArithOp::Rem if b != 0 => a.wrapping_rem(b),
                ArithOp::Div | ArithOp::Rem => return None,
            };
            Some(ConstValue::Long(value))
        }
        (ConstValue::Float(_), ConstValue::Float(_)) => {
            let (a, b) = (a.as_float()?, b.as_float()?);
            let value = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            };
            Some(ConstValue::float(value))
        }
        (ConstValue::Double(_), ConstValue::Double(_)) => {
            let (a, b) = (a.as_double()?, b.as_double()?);
            let value = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            };
            Some(ConstValue::double(value))
        }
        _ => None,
    }
}

fn fold_negate(a: &ConstValue) -> Option<ConstValue> {
    match a {
        ConstValue::Int(a) => Some(ConstValue::Int(a.wrapping_neg())),
        ConstValue::Long(a) => Some(ConstValue::Long(a.wrapping_neg())),
        ConstValue::Float(_) => a.as_float().map(|v| ConstValue::float(-v)),
        ConstValue::Double(_) => a.as_double().map(|v| ConstValue::double(-v)),
        _ => None,
    }
}

fn fold_shift(op: ShiftOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    let distance = b.as_int()?;
    match a {
        ConstValue::Int(a) => {
            let s = (distance & 0x1f) as u32;
            let value = match op {
                ShiftOp::Shl => a.wrapping_shl(s),
                ShiftOp::Shr => a.wrapping_shr(s),
                ShiftOp::Ushr => ((*a as u32) >> s) as i32,
            };
            Some(ConstValue::Int(value))
        }
        ConstValue::Long(a) => {
            let s = (distance & 0x3f) as u32;
            let value = match op {
                ShiftOp::Shl => a.wrapping_shl(s),
                ShiftOp::Shr => a.wrapping_shr(s),
                ShiftOp::Ushr => ((*a as u64) >> s) as i64,
            };
            Some(ConstValue::Long(value))
        }
        _ => None,
    }
}

fn fold_logic(op: LogicOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(a), ConstValue::Int(b)) => Some(ConstValue::Int(match op {
            LogicOp::And => a & b,
            LogicOp::Or => a | b,
            LogicOp::Xor => a ^ b,
        })),
        (ConstValue::Long(a), ConstValue::Long(b)) => Some(ConstValue::Long(match op {
            LogicOp::And => a & b,
            LogicOp::Or => a | b,
            LogicOp::Xor => a ^ b,
        })),
        _ => None,
    }
}

/// Folds a numeric conversion. Rust's `as` casts from floating point saturate and map
/// NaN to zero, which is exactly what the instruction set requires.
fn fold_convert(from: ValueKind, to: ValueKind, a: &ConstValue) -> Option<ConstValue> {
    use ValueKind::{Byte, Char, Double, Float, Int, Long, Short};

    let value = match (from, to) {
        (Int, Long) => ConstValue::Long(i64::from(a.as_int()?)),
        (Int, Float) => ConstValue::float(a.as_int()? as f32),
        (Int, Double) => ConstValue::double(f64::from(a.as_int()?)),
        (Int, Byte) => ConstValue::Int(i32::from(a.as_int()? as i8)),
        (Int, Char) => ConstValue::Int(i32::from(a.as_int()? as u16)),
        (Int, Short) => ConstValue::Int(i32::from(a.as_int()? as i16)),
        (Long, Int) => ConstValue::Int(a.as_long()? as i32),
        (Long, Float) => ConstValue::float(a.as_long()? as f32),
        (Long, Double) => ConstValue::double(a.as_long()? as f64),
        (Float, Int) => ConstValue::Int(a.as_float()? as i32),
        (Float, Long) => ConstValue::Long(a.as_float()? as i64),
        (Float, Double) => ConstValue::double(f64::from(a.as_float()?)),
        (Double, Int) => ConstValue::Int(a.as_double()? as i32),
        (Double, Long) => ConstValue::Long(a.as_double()? as i64),
        (Double, Float) => ConstValue::float(a.as_double()? as f32),
        _ => return None,
    };
    Some(value)
}

fn ordering_result(ordering: Option<Ordering>, nan: i32) -> i32 {
    match ordering {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => nan,
    }
}

fn fold_compare(op: CompareOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    let result = match op {
        CompareOp::Lcmp => ordering_result(Some(a.as_long()?.cmp(&b.as_long()?)), 0),
        CompareOp::Fcmpl | CompareOp::Fcmpg => {
            ordering_result(a.as_float()?.partial_cmp(&b.as_float()?), op.nan_result())
        }
        CompareOp::Dcmpl | CompareOp::Dcmpg => {
            ordering_result(a.as_double()?.partial_cmp(&b.as_double()?), op.nan_result())
        }
    };
    Some(ConstValue::Int(result))
}
