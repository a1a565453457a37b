//! Operand values

use super::instruction::InstId;
use super::types::Type;

/// Reference to a module-level entity (global variable or function)
///
/// `ty` is the type of the symbol's address, i.e. always a pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// Symbol name without the `@` sigil
    pub name: String,
    /// Pointer type of the symbol
    pub ty: Type,
}

impl Symbol {
    /// Symbol for a global variable holding a value of type `value_ty`
    pub fn global(name: impl Into<String>, value_ty: Type) -> Self {
        Self {
            name: name.into(),
            ty: Type::ptr_to(value_ty),
        }
    }

    /// Symbol for a function with the given signature
    pub fn function(name: impl Into<String>, ret: Type, params: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            ty: Type::ptr_to(Type::function(ret, params)),
        }
    }
}

/// Compile-time constant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Integer constant; `value` is kept masked to `bits`
    Int {
        /// Bit width
        bits: u32,
        /// Zero-extended value
        value: u64,
    },
    /// Null pointer of the given pointer type
    Null(Type),
    /// Undefined value of the given type
    Undef(Type),
}

impl Constant {
    /// Integer constant of width `bits`, truncated to that width
    pub fn int(bits: u32, value: u64) -> Self {
        Constant::Int {
            bits,
            value: mask(bits, value),
        }
    }

    /// Type of the constant
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Null(ty) | Constant::Undef(ty) => ty.clone(),
        }
    }

    /// Value read as a signed integer of its width
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Constant::Int { bits, value } => {
                let shift = 64 - (*bits).clamp(1, 64);
                Some(((*value << shift) as i64) >> shift)
            }
            _ => None,
        }
    }

    /// Value read as an unsigned integer of its width
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Truncate `value` to its low `bits` bits
pub fn mask(bits: u32, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Anything an operand can reference
///
/// Values are shared by reference: an instruction result is named by its
/// [`InstId`], never copied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Result of an instruction in the same function
    Inst(InstId),
    /// Function parameter by position
    Arg(u32),
    /// Constant
    Const(Constant),
    /// Address of a global variable or function
    Global(Symbol),
}

impl Value {
    /// Integer constant operand
    pub fn int(bits: u32, value: u64) -> Self {
        Value::Const(Constant::int(bits, value))
    }

    /// The instruction producing this value, if any
    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    /// The constant, if this value is one
    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        Value::Const(c)
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Global(sym)
    }
}
