//! Region base resolution
//!
//! The base address of the sandbox region is a run-time value. Where it comes
//! from is injected through [`BaseProvider`]; [`RegionBase`] makes sure it is
//! materialized at most once per function.

use crate::error::{Error, Result};
use crate::ir::{Function, InstData, Opcode, Symbol, Type, Value};

/// Source of the sandbox region base
///
/// Implementations emit whatever instructions produce the base as a 64-bit
/// integer at the head of the function's entry block and return the
/// resulting value. Providers are shared between functions processed in
/// parallel, so they must be `Sync` and must not keep per-function state.
pub trait BaseProvider: Sync {
    /// Emit the base computation into `func` and return its value
    fn materialize(&self, func: &mut Function) -> Result<Value>;
}

/// Base read from a process-wide `i64` global variable
#[derive(Debug, Clone)]
pub struct GlobalBase {
    symbol: Symbol,
}

impl GlobalBase {
    /// Provider loading from the global `symbol` (an `i64*`)
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

impl BaseProvider for GlobalBase {
    fn materialize(&self, func: &mut Function) -> Result<Value> {
        let entry = func.entry_block().ok_or_else(|| Error::NoEntryBlock {
            function: func.name.clone(),
        })?;
        let load = InstData::new(
            Opcode::Load,
            vec![Value::Global(self.symbol.clone())],
            Type::i64(),
        )
        .named("mem_base");
        Ok(Value::Inst(func.prepend_inst(entry, load)))
    }
}

/// Per-function memo of the region base; first use wins
pub(crate) struct RegionBase<'p> {
    provider: &'p dyn BaseProvider,
    cached: Option<Value>,
}

impl<'p> RegionBase<'p> {
    pub(crate) fn new(provider: &'p dyn BaseProvider) -> Self {
        Self {
            provider,
            cached: None,
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// The base value, emitting its load on first call
    pub(crate) fn get_or_load(&mut self, func: &mut Function) -> Result<Value> {
        if let Some(base) = &self.cached {
            return Ok(base.clone());
        }
        let base = self.provider.materialize(func)?;
        self.cached = Some(base.clone());
        Ok(base)
    }
}
