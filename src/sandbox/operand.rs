//! Confinement of a single pointer operand

use super::FunctionSandbox;
use crate::error::{Error, Result};
use crate::ir::{
    BinaryOp, CastOp, Function, FunctionBuilder, InstId, Opcode, Type, Value, ADDRESS_WIDTH,
    MACHINE_WIDTH,
};

/// A matched `inttoptr(add i32 index, offset)` with `offset > 0`
///
/// Pointer lowering emits exactly this shape for constant offsets. Reusing
/// `index` saves the `ptrtoint`/`inttoptr` round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoldedAddress {
    pub(crate) index: Value,
    pub(crate) offset: u64,
    pub(crate) cast: InstId,
    pub(crate) add: InstId,
}

/// Match the folded address shape on a pointer value
pub(crate) fn match_folded_address(func: &Function, ptr: &Value) -> Option<FoldedAddress> {
    let cast = ptr.as_inst()?;
    let cast_data = func.inst(cast);
    if !cast_data.is_cast(CastOp::IntToPtr) {
        return None;
    }

    let add = cast_data.operands.first()?.as_inst()?;
    let add_data = func.inst(add);
    if add_data.opcode != Opcode::Binary(BinaryOp::Add) || !add_data.ty.is_int(ADDRESS_WIDTH) {
        return None;
    }

    let offset = add_data.operands.get(1)?.as_const()?;
    if offset.as_signed()? <= 0 {
        return None;
    }

    Some(FoldedAddress {
        index: add_data.operands.first()?.clone(),
        offset: offset.as_unsigned()?,
        cast,
        add,
    })
}

impl FunctionSandbox<'_> {
    /// Pointer operand `index` of `inst`, checked for presence and type
    pub(crate) fn address_operand(&self, inst: InstId, index: usize) -> Result<Value> {
        let value = self.access_operand(inst, index)?;
        let ty = self.func.value_type(&value);
        if !ty.is_pointer() {
            return Err(Error::NotAPointer {
                function: self.func.name.clone(),
                opcode: self.opcode_name(inst),
                operand: index,
                ty: ty.to_string(),
            });
        }
        Ok(value)
    }

    /// Replace pointer operand `index` of `inst` with its confined form
    ///
    /// Generic path:
    ///
    /// ```text
    /// %t = ptrtoint T* %p to i32
    /// %e = zext i32 %t to i64
    /// %s = add i64 %mem_base, %e
    /// %a = inttoptr i64 %s to T*
    /// ```
    ///
    /// Folded path, for `%p = inttoptr (add i32 %x, C)`:
    ///
    /// ```text
    /// %e = zext i32 %x to i64
    /// %s = add i64 %mem_base, %e
    /// %s2 = add i64 %s, C
    /// %a = inttoptr i64 %s2 to T*
    /// ```
    ///
    /// The matched cast and add are deleted once nothing else uses them.
    pub(crate) fn sandbox_pointer(&mut self, inst: InstId, index: usize) -> Result<()> {
        let ptr = self.address_operand(inst, index)?;
        let ptr_ty = self.func.value_type(&ptr);
        let base = self.base()?;
        let folded = if self.options.fold_address_arithmetic {
            match_folded_address(self.func, &ptr)
        } else {
            None
        };

        let before = self.func.inst_count();
        let mut b = FunctionBuilder::before(self.func, inst);
        let truncated = match &folded {
            Some(f) => f.index.clone(),
            None => b.ptr_to_int(ptr, Type::i32()),
        };
        let extended = b.zext(truncated, Type::i64());
        let mut sum = b.add(base, extended);
        if let Some(f) = &folded {
            sum = b.add(sum, Value::int(MACHINE_WIDTH, f.offset));
        }
        let sandboxed = b.int_to_ptr(sum, ptr_ty);
        self.stats.instructions_inserted += self.func.inst_count() - before;

        self.func.set_operand(inst, index, sandboxed);
        self.stats.pointers_sandboxed += 1;

        tracing::trace!(
            function = %self.func.name,
            operand = index,
            folded = folded.is_some(),
            "sandboxed {}",
            self.func.display_inst(inst)
        );

        if let Some(f) = folded {
            self.stats.addresses_folded += 1;
            // The cast goes first: it may hold the add's last use
            for dead in [f.cast, f.add] {
                if self.func.is_live(dead) && self.func.use_count(dead) == 0 {
                    self.func.remove_inst(dead);
                    self.stats.instructions_removed += 1;
                }
            }
        }
        Ok(())
    }
}
