//! Typed instruction construction
//!
//! [`FunctionBuilder`] inserts instructions at a cursor and derives result
//! types from operand types, so callers never spell out the type of an
//! `add` or a `load`.

use super::function::Function;
use super::instruction::{BinaryOp, BlockId, CastOp, InstData, InstId, IntPredicate, Opcode};
use super::types::Type;
use super::value::{Symbol, Value};

/// Where new instructions go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Append to the end of a block
    End(BlockId),
    /// Insert immediately before an instruction
    Before(InstId),
}

/// Instruction builder positioned at a [`Cursor`]
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    cursor: Cursor,
}

impl<'f> FunctionBuilder<'f> {
    /// Builder appending to `block`
    pub fn at_end(func: &'f mut Function, block: BlockId) -> Self {
        Self {
            func,
            cursor: Cursor::End(block),
        }
    }

    /// Builder inserting before `inst`
    pub fn before(func: &'f mut Function, inst: InstId) -> Self {
        Self {
            func,
            cursor: Cursor::Before(inst),
        }
    }

    /// Insert a fully formed instruction at the cursor
    pub fn insert(&mut self, data: InstData) -> InstId {
        match self.cursor {
            Cursor::End(block) => self.func.append_inst(block, data),
            Cursor::Before(anchor) => self.func.insert_before(anchor, data),
        }
    }

    fn value(&mut self, data: InstData) -> Value {
        Value::Inst(self.insert(data))
    }

    /// `alloca ty, i32 count`
    pub fn alloca(&mut self, ty: Type, count: Value) -> Value {
        let result = Type::ptr_to(ty.clone());
        self.value(InstData::new(Opcode::Alloca(ty), vec![count], result))
    }

    /// `load` through a typed pointer
    pub fn load(&mut self, ptr: Value) -> Value {
        let ty = self
            .func
            .value_type(&ptr)
            .pointee()
            .cloned()
            .unwrap_or(Type::Void);
        self.value(InstData::new(Opcode::Load, vec![ptr], ty))
    }

    /// `store value, ptr`
    pub fn store(&mut self, value: Value, ptr: Value) -> InstId {
        self.insert(InstData::new(Opcode::Store, vec![value, ptr], Type::Void))
    }

    /// Integer arithmetic; the result has the type of `lhs`
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.func.value_type(&lhs);
        self.value(InstData::new(Opcode::Binary(op), vec![lhs, rhs], ty))
    }

    /// `add lhs, rhs`
    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// `icmp pred lhs, rhs`
    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.value(InstData::new(Opcode::ICmp(pred), vec![lhs, rhs], Type::i1()))
    }

    /// Conversion to `ty`
    pub fn cast(&mut self, op: CastOp, value: Value, ty: Type) -> Value {
        self.value(InstData::new(Opcode::Cast(op), vec![value], ty))
    }

    /// `trunc value to ty`
    pub fn trunc(&mut self, value: Value, ty: Type) -> Value {
        self.cast(CastOp::Trunc, value, ty)
    }

    /// `zext value to ty`
    pub fn zext(&mut self, value: Value, ty: Type) -> Value {
        self.cast(CastOp::ZExt, value, ty)
    }

    /// `ptrtoint value to ty`
    pub fn ptr_to_int(&mut self, value: Value, ty: Type) -> Value {
        self.cast(CastOp::PtrToInt, value, ty)
    }

    /// `inttoptr value to ty`
    pub fn int_to_ptr(&mut self, value: Value, ty: Type) -> Value {
        self.cast(CastOp::IntToPtr, value, ty)
    }

    /// `select cond, a, b`
    pub fn select(&mut self, cond: Value, if_true: Value, if_false: Value) -> Value {
        let ty = self.func.value_type(&if_true);
        self.value(InstData::new(
            Opcode::Select,
            vec![cond, if_true, if_false],
            ty,
        ))
    }

    /// `phi` over `(value, predecessor)` pairs
    pub fn phi(&mut self, ty: Type, incoming: Vec<(Value, BlockId)>) -> Value {
        let (values, blocks): (Vec<_>, Vec<_>) = incoming.into_iter().unzip();
        self.value(InstData::new(Opcode::Phi(blocks), values, ty))
    }

    /// Direct or indirect call. Returns the instruction handle; use
    /// `Value::Inst` on it when the callee returns a value.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> InstId {
        let ret = match self.func.value_type(&callee).pointee() {
            Some(Type::Function { ret, .. }) => (**ret).clone(),
            _ => Type::Void,
        };
        let mut operands = args;
        operands.push(callee);
        self.insert(InstData::new(Opcode::Call, operands, ret))
    }

    /// Call of a named function or intrinsic
    pub fn call_symbol(&mut self, callee: Symbol, args: Vec<Value>) -> InstId {
        self.call(Value::Global(callee), args)
    }

    /// `br label`
    pub fn br(&mut self, target: BlockId) -> InstId {
        self.insert(InstData::new(Opcode::Br(target), vec![], Type::Void))
    }

    /// `br i1 cond, label then, label else`
    pub fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) -> InstId {
        self.insert(InstData::new(
            Opcode::CondBr {
                then_block,
                else_block,
            },
            vec![cond],
            Type::Void,
        ))
    }

    /// `ret` with an optional value
    pub fn ret(&mut self, value: Option<Value>) -> InstId {
        self.insert(InstData::new(
            Opcode::Ret,
            value.into_iter().collect(),
            Type::Void,
        ))
    }

    /// `unreachable`
    pub fn unreachable(&mut self) -> InstId {
        self.insert(InstData::new(Opcode::Unreachable, vec![], Type::Void))
    }
}
