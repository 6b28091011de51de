//! Decoded method bodies.

use std::fmt;

use crate::{bytecode::Op, metadata::MethodInfo};

/// One decoded operation with its position in the method body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedOp {
    /// Offset of the opcode byte
    pub offset: u32,
    /// Encoded length in bytes
    pub length: u32,
    /// The operation
    pub op: Op,
}

impl DecodedOp {
    /// Offset of the operation that follows this one.
    #[must_use]
    pub const fn next_offset(&self) -> u32 {
        self.offset + self.length
    }
}

impl fmt::Display for DecodedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: {}", self.offset, self.op)
    }
}

/// A method's metadata together with its decoded operation stream.
///
/// Operations are kept sorted by offset; [`MethodCode::ops_in`] hands out the operations
/// of one block's offset range.
#[derive(Debug, Clone)]
pub struct MethodCode {
    info: MethodInfo,
    ops: Vec<DecodedOp>,
}

impl MethodCode {
    /// Creates a method body. `ops` must be sorted by offset and contiguous.
    #[must_use]
    pub fn new(info: MethodInfo, ops: Vec<DecodedOp>) -> Self {
        MethodCode { info, ops }
    }

    /// Declared method metadata.
    #[must_use]
    pub fn info(&self) -> &MethodInfo {
        &self.info
    }

    /// All decoded operations.
    #[must_use]
    pub fn ops(&self) -> &[DecodedOp] {
        &self.ops
    }

    /// Total length of the body in bytes.
    #[must_use]
    pub fn code_len(&self) -> u32 {
        self.ops.last().map_or(0, DecodedOp::next_offset)
    }

    /// Returns `true` if the body contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations whose offset lies in `start..end`.
    #[must_use]
    pub fn ops_in(&self, start: u32, end: u32) -> &[DecodedOp] {
        let lo = self.ops.partition_point(|op| op.offset < start);
        let hi = self.ops.partition_point(|op| op.offset < end);
        &self.ops[lo..hi.max(lo)]
    }

    /// The operation starting exactly at `offset`.
    #[must_use]
    pub fn op_at(&self, offset: u32) -> Option<&DecodedOp> {
        self.ops
            .binary_search_by_key(&offset, |op| op.offset)
            .ok()
            .map(|index| &self.ops[index])
    }
}

impl fmt::Display for MethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "method {} (stack={}, locals={})",
            self.info.name, self.info.max_stack, self.info.max_locals
        )?;
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hir::ConstValue, metadata::ValueKind};

    fn sample() -> MethodCode {
        let ops = vec![
            DecodedOp {
                offset: 0,
                length: 1,
                op: Op::Const(ConstValue::Int(1)),
            },
            DecodedOp {
                offset: 1,
                length: 2,
                op: Op::Store(ValueKind::Int, 4),
            },
            DecodedOp {
                offset: 3,
                length: 1,
                op: Op::Return(ValueKind::Void),
            },
        ];
        MethodCode::new(MethodInfo::new("m", 1, 5), ops)
    }

    #[test]
    fn test_ops_in_range() {
        let code = sample();
        assert_eq!(code.ops_in(0, 3).len(), 2);
        assert_eq!(code.ops_in(1, 4).len(), 2);
        assert!(code.ops_in(4, 9).is_empty());
        assert!(code.ops_in(3, 1).is_empty());
        assert_eq!(code.code_len(), 4);
    }

    #[test]
    fn test_op_at() {
        let code = sample();
        assert_eq!(code.op_at(1).unwrap().op, Op::Store(ValueKind::Int, 4));
        assert!(code.op_at(2).is_none());
    }
}
