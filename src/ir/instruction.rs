//! IR instruction definitions

use super::types::Type;
use super::value::Value;

/// Stable handle of an instruction within its function's arena
///
/// Handles are never reused. Inserting or deleting other instructions does
/// not invalidate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl InstId {
    /// Arena slot of this instruction
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a basic block within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Position of this block in the function
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Two-operand integer arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinaryOp {
    /// Textual mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::URem => "urem",
            BinaryOp::SRem => "srem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
        }
    }
}

/// Value conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

impl CastOp {
    /// Textual mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::Bitcast => "bitcast",
        }
    }
}

/// Integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    /// Textual mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }
}

/// Instruction kind
///
/// Operand layout per kind:
///
/// | Kind | Operands |
/// |------|----------|
/// | `Alloca(ty)` | element count |
/// | `Load` | address |
/// | `Store` | value, address |
/// | `Binary`, `ICmp` | lhs, rhs |
/// | `Cast` | source |
/// | `Select` | condition, if-true, if-false |
/// | `Phi(blocks)` | one incoming value per block |
/// | `Call` | arguments..., callee |
/// | `Br` | none |
/// | `CondBr` | condition |
/// | `Ret` | optional return value |
/// | `Unreachable` | none |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Stack allocation of the given element type
    Alloca(Type),
    Load,
    Store,
    Binary(BinaryOp),
    ICmp(IntPredicate),
    Cast(CastOp),
    Select,
    /// SSA merge; incoming blocks in operand order
    Phi(Vec<BlockId>),
    Call,
    Br(BlockId),
    CondBr {
        /// Target when the condition holds
        then_block: BlockId,
        /// Target otherwise
        else_block: BlockId,
    },
    Ret,
    Unreachable,
}

impl Opcode {
    /// Textual mnemonic, as used in diagnostics
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Alloca(_) => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Binary(op) => op.mnemonic(),
            Opcode::ICmp(_) => "icmp",
            Opcode::Cast(op) => op.mnemonic(),
            Opcode::Select => "select",
            Opcode::Phi(_) => "phi",
            Opcode::Call => "call",
            Opcode::Br(_) | Opcode::CondBr { .. } => "br",
            Opcode::Ret => "ret",
            Opcode::Unreachable => "unreachable",
        }
    }
}

/// An instruction: kind, operands and result type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstData {
    /// Instruction kind
    pub opcode: Opcode,
    /// Operands in kind-specific order
    pub operands: Vec<Value>,
    /// Result type (`Void` when the instruction produces nothing)
    pub ty: Type,
    /// Optional result name for printing
    pub name: Option<String>,
}

impl InstData {
    /// Create an unnamed instruction
    pub fn new(opcode: Opcode, operands: Vec<Value>, ty: Type) -> Self {
        Self {
            opcode,
            operands,
            ty,
            name: None,
        }
    }

    /// Attach a result name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true for a cast of the given kind
    pub fn is_cast(&self, op: CastOp) -> bool {
        self.opcode == Opcode::Cast(op)
    }

    /// Callee operand of a call
    pub fn callee(&self) -> Option<&Value> {
        match self.opcode {
            Opcode::Call => self.operands.last(),
            _ => None,
        }
    }

    /// Argument operands of a call (the callee excluded)
    pub fn call_args(&self) -> &[Value] {
        match self.opcode {
            Opcode::Call if !self.operands.is_empty() => {
                &self.operands[..self.operands.len() - 1]
            }
            _ => &[],
        }
    }
}
