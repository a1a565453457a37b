//! IR type definitions

use std::fmt;

/// Width of the general-purpose integer registers on the target
pub const MACHINE_WIDTH: u32 = 64;

/// Width of a sandboxed address before it is rebased
pub const ADDRESS_WIDTH: u32 = 32;

/// First-class IR type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (result type of stores, branches, void calls)
    Void,
    /// Integer of the given bit width (`i1`, `i8`, `i32`, `i64`, ...)
    Int(u32),
    /// Typed pointer to a pointee type (`i32*`)
    Ptr(Box<Type>),
    /// Function signature; only ever seen behind a pointer
    Function {
        /// Return type
        ret: Box<Type>,
        /// Parameter types
        params: Vec<Type>,
    },
}

impl Type {
    /// 1-bit integer (comparison results)
    pub fn i1() -> Self {
        Type::Int(1)
    }

    /// 8-bit integer
    pub fn i8() -> Self {
        Type::Int(8)
    }

    /// 32-bit integer, the width of a sandboxed address
    pub fn i32() -> Self {
        Type::Int(ADDRESS_WIDTH)
    }

    /// 64-bit integer, the machine width
    pub fn i64() -> Self {
        Type::Int(MACHINE_WIDTH)
    }

    /// Pointer to `pointee`
    pub fn ptr_to(pointee: Type) -> Self {
        Type::Ptr(Box::new(pointee))
    }

    /// Function type with the given return and parameter types
    pub fn function(ret: Type, params: Vec<Type>) -> Self {
        Type::Function {
            ret: Box::new(ret),
            params,
        }
    }

    /// Returns true if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    /// Returns true if this is an integer of exactly `bits` bits
    pub fn is_int(&self, bits: u32) -> bool {
        *self == Type::Int(bits)
    }

    /// Bit width of an integer type
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// The pointed-to type of a pointer
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns true if this is the void type
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Ptr(inner) => write!(f, "{}*", inner),
            Type::Function { ret, params } => {
                write!(f, "{} (", ret)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}
