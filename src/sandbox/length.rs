//! Clipping of block operation lengths

use super::FunctionSandbox;
use crate::error::Result;
use crate::ir::{FunctionBuilder, InstId, Type, MACHINE_WIDTH};

impl FunctionSandbox<'_> {
    /// Replace a 64-bit length operand with `zext(trunc(len to i32) to i64)`
    ///
    /// Narrower lengths already fit and are left alone.
    pub(crate) fn normalize_length(&mut self, inst: InstId, index: usize) -> Result<()> {
        let len = self.access_operand(inst, index)?;
        if !self.func.value_type(&len).is_int(MACHINE_WIDTH) {
            return Ok(());
        }

        let mut b = FunctionBuilder::before(self.func, inst);
        let truncated = b.trunc(len, Type::i32());
        let extended = b.zext(truncated, Type::i64());
        self.func.set_operand(inst, index, extended);
        self.stats.lengths_clipped += 1;
        self.stats.instructions_inserted += 2;

        tracing::trace!(function = %self.func.name, operand = index, "clipped length");
        Ok(())
    }
}
