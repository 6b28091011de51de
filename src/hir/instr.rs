//! HIR instructions and block terminals.
//!
//! Every [`Instruction`] lives in the graph's flat arena and is addressed by its
//! [`ValueId`]. Operands are ids of earlier instructions; nothing is referenced by name.
//! Control flow leaves a block only through its [`Terminal`], which is itself stored as
//! an instruction of kind `void` so that it carries an offset and a state snapshot like
//! any other side-effecting instruction.

use std::fmt;

use crate::{
    bytecode::{ArithOp, CompareOp, Cond, LogicOp, ShiftOp},
    hir::{BlockId, ConstValue, ValueId, VmState},
    metadata::{InvokeKind, ResolvedField, ResolvedMethod, TypeDesc, ValueKind},
};

/// The state slot a phi merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhiSlot {
    /// Operand stack slot, counted from the bottom
    Stack(u16),
    /// Local slot
    Local(u16),
}

impl fmt::Display for PhiSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhiSlot::Stack(i) => write!(f, "stack {i}"),
            PhiSlot::Local(i) => write!(f, "local {i}"),
        }
    }
}

/// How an instruction interacts with memory, as seen by value numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEffect {
    /// Reads or writes nothing the cache tracks.
    None,
    /// Writes the field at this offset.
    StoresField(u32),
    /// Writes an array element of this kind.
    StoresElement(ValueKind),
    /// May write anything.
    Clobbers,
}

/// The operation an instruction performs.
#[derive(Debug, Clone, PartialEq)]
pub enum HirOp {
    /// Incoming parameter bound to local slot `index` at method entry
    Param {
        /// First local slot of the parameter
        index: u16,
    },
    /// Literal value
    Constant(ConstValue),
    /// Merge of one input per predecessor edge of `block`
    Phi {
        /// Owning block
        block: BlockId,
        /// Slot the phi was created for
        slot: PhiSlot,
        /// One input per merged edge, in predecessor order
        inputs: Vec<ValueId>,
    },
    /// Binary arithmetic
    Arith {
        /// Operation
        op: ArithOp,
        /// Left operand
        x: ValueId,
        /// Right operand
        y: ValueId,
    },
    /// Arithmetic negation
    Negate {
        /// Operand
        x: ValueId,
    },
    /// Shift; the distance is always an `int`
    Shift {
        /// Operation
        op: ShiftOp,
        /// Value to shift
        x: ValueId,
        /// Distance
        y: ValueId,
    },
    /// Bitwise logic
    Logic {
        /// Operation
        op: LogicOp,
        /// Left operand
        x: ValueId,
        /// Right operand
        y: ValueId,
    },
    /// Numeric conversion; `to` keeps the sub-integer destination
    Convert {
        /// Source kind
        from: ValueKind,
        /// Destination kind
        to: ValueKind,
        /// Operand
        x: ValueId,
    },
    /// Three-way compare producing -1, 0 or 1
    Compare {
        /// Operation
        op: CompareOp,
        /// Left operand
        x: ValueId,
        /// Right operand
        y: ValueId,
    },
    /// Null- and bounds-checked element load
    ArrayLoad {
        /// Array reference
        array: ValueId,
        /// Element index
        index: ValueId,
        /// Declared element kind
        elem: ValueKind,
    },
    /// Null- and bounds-checked element store
    ArrayStore {
        /// Array reference
        array: ValueId,
        /// Element index
        index: ValueId,
        /// Stored value
        value: ValueId,
        /// Declared element kind
        elem: ValueKind,
    },
    /// Array length
    ArrayLength {
        /// Array reference
        array: ValueId,
    },
    /// Field load; static fields use their holder constant as object
    LoadField {
        /// Object or holder
        object: ValueId,
        /// Resolved field
        field: ResolvedField,
    },
    /// Field store; static fields use their holder constant as object
    StoreField {
        /// Object or holder
        object: ValueId,
        /// Resolved field
        field: ResolvedField,
        /// Stored value
        value: ValueId,
    },
    /// Object allocation
    NewInstance {
        /// Allocated type
        ty: TypeDesc,
    },
    /// Primitive array allocation
    NewTypeArray {
        /// Element kind
        elem: ValueKind,
        /// Length
        length: ValueId,
    },
    /// Reference array allocation
    NewObjectArray {
        /// Element type
        elem: TypeDesc,
        /// Length
        length: ValueId,
    },
    /// Multi-dimensional array allocation
    NewMultiArray {
        /// Array type
        ty: TypeDesc,
        /// One length per dimension, outermost first
        dims: Vec<ValueId>,
    },
    /// Checked cast; yields the object
    CheckCast {
        /// Target type
        ty: TypeDesc,
        /// Object
        object: ValueId,
    },
    /// Type test producing 0 or 1
    InstanceOf {
        /// Tested type
        ty: TypeDesc,
        /// Object
        object: ValueId,
    },
    /// Monitor acquisition
    MonitorEnter {
        /// Locked object
        object: ValueId,
        /// Lock depth after acquisition, minus one
        lock: usize,
    },
    /// Monitor release
    MonitorExit {
        /// Unlocked object
        object: ValueId,
        /// Lock depth of the released monitor
        lock: usize,
    },
    /// Method call
    Invoke {
        /// Dispatch kind
        kind: InvokeKind,
        /// Resolved target
        target: ResolvedMethod,
        /// Receiver, for non-static calls
        receiver: Option<ValueId>,
        /// Arguments in declaration order
        args: Vec<ValueId>,
    },
    /// Store-store memory barrier
    MemBarrier,
    /// Block terminal
    End(Terminal),
}

impl HirOp {
    /// Operands of this operation, in order.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            HirOp::Param { .. }
            | HirOp::Constant(_)
            | HirOp::NewInstance { .. }
            | HirOp::MemBarrier => Vec::new(),
            HirOp::Phi { inputs, .. } => inputs.clone(),
            HirOp::Arith { x, y, .. }
            | HirOp::Shift { x, y, .. }
            | HirOp::Logic { x, y, .. }
            | HirOp::Compare { x, y, .. } => vec![*x, *y],
            HirOp::Negate { x } | HirOp::Convert { x, .. } => vec![*x],
            HirOp::ArrayLoad { array, index, .. } => vec![*array, *index],
            HirOp::ArrayStore {
                array,
                index,
                value,
                ..
            } => vec![*array, *index, *value],
            HirOp::ArrayLength { array } => vec![*array],
            HirOp::LoadField { object, .. }
            | HirOp::CheckCast { object, .. }
            | HirOp::InstanceOf { object, .. }
            | HirOp::MonitorEnter { object, .. }
            | HirOp::MonitorExit { object, .. } => vec![*object],
            HirOp::StoreField { object, value, .. } => vec![*object, *value],
            HirOp::NewTypeArray { length, .. } | HirOp::NewObjectArray { length, .. } => {
                vec![*length]
            }
            HirOp::NewMultiArray { dims, .. } => dims.clone(),
            HirOp::Invoke { receiver, args, .. } => {
                receiver.iter().chain(args.iter()).copied().collect()
            }
            HirOp::End(terminal) => terminal.operands(),
        }
    }

    /// Returns `true` if the operation has an observable effect and must be kept even
    /// when its result is unused.
    #[must_use]
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            HirOp::ArrayStore { .. }
                | HirOp::StoreField { .. }
                | HirOp::NewInstance { .. }
                | HirOp::NewTypeArray { .. }
                | HirOp::NewObjectArray { .. }
                | HirOp::NewMultiArray { .. }
                | HirOp::CheckCast { .. }
                | HirOp::MonitorEnter { .. }
                | HirOp::MonitorExit { .. }
                | HirOp::Invoke { .. }
                | HirOp::MemBarrier
                | HirOp::End(_)
        )
    }

    /// Memory effect of this operation.
    #[must_use]
    pub fn memory_effect(&self) -> MemoryEffect {
        match self {
            HirOp::StoreField { field, .. } => MemoryEffect::StoresField(field.offset),
            HirOp::ArrayStore { elem, .. } => MemoryEffect::StoresElement(*elem),
            HirOp::Invoke { .. }
            | HirOp::MonitorEnter { .. }
            | HirOp::MonitorExit { .. }
            | HirOp::MemBarrier => MemoryEffect::Clobbers,
            _ => MemoryEffect::None,
        }
    }

    /// Returns the terminal, if this is one.
    #[must_use]
    pub fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            HirOp::End(terminal) => Some(terminal),
            _ => None,
        }
    }

    /// Returns the constant, if this is one.
    #[must_use]
    pub fn as_constant(&self) -> Option<&ConstValue> {
        match self {
            HirOp::Constant(value) => Some(value),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[ValueId]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

fn arith_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Rem => "%",
    }
}

impl fmt::Display for HirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HirOp::Param { index } => write!(f, "param {index}"),
            HirOp::Constant(value) => write!(f, "const {value}"),
            HirOp::Phi { slot, inputs, .. } => {
                write!(f, "phi {slot} [")?;
                write_list(f, inputs)?;
                write!(f, "]")
            }
            HirOp::Arith { op, x, y } => write!(f, "{x} {} {y}", arith_symbol(*op)),
            HirOp::Negate { x } => write!(f, "-{x}"),
            HirOp::Shift { op, x, y } => {
                let symbol = match op {
                    ShiftOp::Shl => "<<",
                    ShiftOp::Shr => ">>",
                    ShiftOp::Ushr => ">>>",
                };
                write!(f, "{x} {symbol} {y}")
            }
            HirOp::Logic { op, x, y } => {
                let symbol = match op {
                    LogicOp::And => "&",
                    LogicOp::Or => "|",
                    LogicOp::Xor => "^",
                };
                write!(f, "{x} {symbol} {y}")
            }
            HirOp::Convert { from, to, x } => write!(f, "{from}2{to} {x}"),
            HirOp::Compare { op, x, y } => write!(f, "{op} {x}, {y}"),
            HirOp::ArrayLoad { array, index, elem } => write!(f, "{array}[{index}]:{elem}"),
            HirOp::ArrayStore {
                array,
                index,
                value,
                elem,
            } => write!(f, "{array}[{index}]:{elem} := {value}"),
            HirOp::ArrayLength { array } => write!(f, "{array}.length"),
            HirOp::LoadField { object, field } => write!(f, "{object}.{field}"),
            HirOp::StoreField {
                object,
                field,
                value,
            } => write!(f, "{object}.{field} := {value}"),
            HirOp::NewInstance { ty } => write!(f, "new {ty}"),
            HirOp::NewTypeArray { elem, length } => write!(f, "new {elem}[{length}]"),
            HirOp::NewObjectArray { elem, length } => write!(f, "new {elem}[{length}]"),
            HirOp::NewMultiArray { ty, dims } => {
                write!(f, "new {ty} dims [")?;
                write_list(f, dims)?;
                write!(f, "]")
            }
            HirOp::CheckCast { ty, object } => write!(f, "checkcast {object} to {ty}"),
            HirOp::InstanceOf { ty, object } => write!(f, "{object} instanceof {ty}"),
            HirOp::MonitorEnter { object, lock } => write!(f, "monitorenter {object} #{lock}"),
            HirOp::MonitorExit { object, lock } => write!(f, "monitorexit {object} #{lock}"),
            HirOp::Invoke {
                kind,
                target,
                receiver,
                args,
            } => {
                write!(f, "{} {target}", kind.mnemonic())?;
                if let Some(receiver) = receiver {
                    write!(f, " on {receiver}")?;
                }
                write!(f, " (")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            HirOp::MemBarrier => write!(f, "membar store_store"),
            HirOp::End(terminal) => write!(f, "{terminal}"),
        }
    }
}

/// The control transfer that ends a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Two-way branch; compares `x` against `y`, or against zero/null when `y` is absent
    If {
        /// Condition code
        cond: Cond,
        /// Left operand
        x: ValueId,
        /// Right operand, absent for comparisons against zero or null
        y: Option<ValueId>,
        /// Successor when the condition holds
        taken: BlockId,
        /// Successor when it does not
        not_taken: BlockId,
    },
    /// Unconditional jump
    Goto {
        /// Successor
        target: BlockId,
    },
    /// Dense switch over consecutive keys starting at `low_key`; default last
    TableSwitch {
        /// Selector
        selector: ValueId,
        /// Key of the first case
        low_key: i32,
        /// Case successors followed by the default successor
        targets: Vec<BlockId>,
    },
    /// Sparse switch over explicit keys; default last
    LookupSwitch {
        /// Selector
        selector: ValueId,
        /// Match keys, parallel to the leading entries of `targets`
        keys: Vec<i32>,
        /// Case successors followed by the default successor
        targets: Vec<BlockId>,
    },
    /// Method return
    Return {
        /// Returned value, absent for `void`
        value: Option<ValueId>,
    },
    /// Exceptional exit
    Throw {
        /// Thrown reference
        exception: ValueId,
    },
}

impl Terminal {
    /// All successor slots in order. Duplicates are kept.
    #[must_use]
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Terminal::If {
                taken, not_taken, ..
            } => vec![*taken, *not_taken],
            Terminal::Goto { target } => vec![*target],
            Terminal::TableSwitch { targets, .. } | Terminal::LookupSwitch { targets, .. } => {
                targets.clone()
            }
            Terminal::Return { .. } | Terminal::Throw { .. } => Vec::new(),
        }
    }

    /// Unique successors in first-occurrence order.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        let mut unique = Vec::new();
        for target in self.targets() {
            if !unique.contains(&target) {
                unique.push(target);
            }
        }
        unique
    }

    /// Index into [`Terminal::targets`] selected by a switch selector value.
    ///
    /// Dense switches pick `selector - low_key` when it names a case and the default
    /// otherwise; sparse switches pick the position of the matching key. Returns `None`
    /// for terminals that are not switches.
    #[must_use]
    pub fn dispatch(&self, selector: i32) -> Option<usize> {
        match self {
            Terminal::TableSwitch {
                low_key, targets, ..
            } => {
                let cases = targets.len().checked_sub(1)?;
                let index = i64::from(selector) - i64::from(*low_key);
                match usize::try_from(index) {
                    Ok(index) if index < cases => Some(index),
                    _ => Some(cases),
                }
            }
            Terminal::LookupSwitch { keys, targets, .. } => {
                let default = targets.len().checked_sub(1)?;
                Some(keys.iter().position(|&k| k == selector).unwrap_or(default))
            }
            _ => None,
        }
    }

    /// Operands of this terminal.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Terminal::If { x, y, .. } => std::iter::once(*x).chain(*y).collect(),
            Terminal::TableSwitch { selector, .. } | Terminal::LookupSwitch { selector, .. } => {
                vec![*selector]
            }
            Terminal::Return { value } => value.iter().copied().collect(),
            Terminal::Throw { exception } => vec![*exception],
            Terminal::Goto { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::If {
                cond,
                x,
                y,
                taken,
                not_taken,
            } => {
                write!(f, "if {x} {cond} ")?;
                match y {
                    Some(y) => write!(f, "{y}")?,
                    None => write!(f, "0")?,
                }
                write!(f, " then {taken} else {not_taken}")
            }
            Terminal::Goto { target } => write!(f, "goto {target}"),
            Terminal::TableSwitch {
                selector,
                low_key,
                targets,
            } => {
                write!(f, "tableswitch {selector}")?;
                let (default, cases) = targets.split_last().ok_or(fmt::Error)?;
                for (i, target) in cases.iter().enumerate() {
                    write!(f, " {}:{target}", i64::from(*low_key) + i as i64)?;
                }
                write!(f, " default:{default}")
            }
            Terminal::LookupSwitch {
                selector,
                keys,
                targets,
            } => {
                write!(f, "lookupswitch {selector}")?;
                let (default, cases) = targets.split_last().ok_or(fmt::Error)?;
                for (key, target) in keys.iter().zip(cases) {
                    write!(f, " {key}:{target}")?;
                }
                write!(f, " default:{default}")
            }
            Terminal::Return { value: Some(value) } => write!(f, "return {value}"),
            Terminal::Return { value: None } => write!(f, "return"),
            Terminal::Throw { exception } => write!(f, "throw {exception}"),
        }
    }
}

/// One SSA value in the graph arena.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Identity, equal to the arena index
    pub id: ValueId,
    /// Result kind (`void` for pure effects and terminals)
    pub kind: ValueKind,
    /// The operation
    pub op: HirOp,
    /// Block the instruction was appended to
    pub block: BlockId,
    /// Bytecode offset of the originating operation
    pub offset: Option<u32>,
    /// Execution state before the operation, for instructions that may deoptimize
    pub state_before: Option<Box<VmState>>,
}

impl Instruction {
    /// Returns `true` if this is a phi.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.op, HirOp::Phi { .. })
    }

    /// Returns `true` if this is a phi owned by `block`.
    #[must_use]
    pub fn is_phi_of(&self, block: BlockId) -> bool {
        matches!(self.op, HirOp::Phi { block: owner, .. } if owner == block)
    }

    /// Phi inputs, if this is a phi.
    #[must_use]
    pub fn phi_inputs(&self) -> Option<&[ValueId]> {
        match &self.op {
            HirOp::Phi { inputs, .. } => Some(inputs),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ValueKind::Void {
            write!(f, "{}", self.op)
        } else {
            write!(f, "{}:{} = {}", self.id, self.kind.prefix(), self.op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(n: usize) -> BlockId {
        BlockId::new(n)
    }

    #[test]
    fn test_table_switch_dispatch() {
        let switch = Terminal::TableSwitch {
            selector: ValueId::new(0),
            low_key: 10,
            targets: vec![b(1), b(2), b(3), b(4)],
        };
        assert_eq!(switch.dispatch(10), Some(0));
        assert_eq!(switch.dispatch(11), Some(1));
        assert_eq!(switch.dispatch(12), Some(2));
        assert_eq!(switch.dispatch(13), Some(3));
        assert_eq!(switch.dispatch(9), Some(3));
        assert_eq!(switch.dispatch(i32::MIN), Some(3));
    }

    #[test]
    fn test_lookup_switch_dispatch() {
        let switch = Terminal::LookupSwitch {
            selector: ValueId::new(0),
            keys: vec![-5, 100],
            targets: vec![b(1), b(2), b(3)],
        };
        assert_eq!(switch.dispatch(100), Some(1));
        assert_eq!(switch.dispatch(-5), Some(0));
        assert_eq!(switch.dispatch(0), Some(2));
        assert_eq!(Terminal::Goto { target: b(1) }.dispatch(0), None);
    }

    #[test]
    fn test_unique_successors() {
        let switch = Terminal::TableSwitch {
            selector: ValueId::new(0),
            low_key: 0,
            targets: vec![b(2), b(2), b(1), b(2)],
        };
        assert_eq!(switch.targets().len(), 4);
        assert_eq!(switch.successors(), vec![b(2), b(1)]);
        assert!(Terminal::Return { value: None }.successors().is_empty());
    }

    #[test]
    fn test_display() {
        let branch = Terminal::If {
            cond: Cond::Lt,
            x: ValueId::new(1),
            y: None,
            taken: b(2),
            not_taken: b(3),
        };
        assert_eq!(branch.to_string(), "if v1 lt 0 then B2 else B3");

        let switch = Terminal::TableSwitch {
            selector: ValueId::new(4),
            low_key: 10,
            targets: vec![b(1), b(2), b(3)],
        };
        assert_eq!(switch.to_string(), "tableswitch v4 10:B1 11:B2 default:B3");

        let add = HirOp::Arith {
            op: ArithOp::Add,
            x: ValueId::new(1),
            y: ValueId::new(2),
        };
        assert_eq!(add.to_string(), "v1 + v2");
    }

    #[test]
    fn test_effects() {
        assert_eq!(HirOp::MemBarrier.memory_effect(), MemoryEffect::Clobbers);
        assert!(HirOp::MemBarrier.has_side_effect());
        let length = HirOp::ArrayLength {
            array: ValueId::new(0),
        };
        assert!(!length.has_side_effect());
        assert_eq!(length.memory_effect(), MemoryEffect::None);
        assert_eq!(length.operands(), vec![ValueId::new(0)]);
    }
}
