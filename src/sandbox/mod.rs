//! # Memory access sandboxing
//!
//! Rewrites every memory-touching instruction of a function so that the
//! address it dereferences lies inside a 4 GiB region starting at a run-time
//! base:
//!
//! ```text
//! address' = inttoptr(base + zext(trunc(address to i32) to i64))
//! ```
//!
//! Block copy and fill lengths are clipped to 32 bits the same way. Any
//! instruction that carries a pointer operand the pass does not know how to
//! confine fails the whole transformation: there is no run-time checker
//! behind this pass, so an unhandled pointer is a hole, not a missed
//! optimization.
//!
//! ## Components
//!
//! - [`base`] - region base provider and per-function memo
//! - `operand` - confinement of one pointer operand, including folding of
//!   `inttoptr(add i32 x, C)` produced by pointer lowering
//! - `length` - 32-bit clipping of block operation lengths
//! - [`classify`] - instruction classification and the completeness guard
//!
//! ## Deployment precondition
//!
//! Folding `inttoptr(add i32 x, C)` rebases `x` and adds `C` afterwards, so
//! an access may reach up to `base + 2^32 + C`. The region must be followed
//! by an unmapped guard area of at least `i32::MAX` bytes plus a page. This
//! pass does not check that; set `fold_address_arithmetic = false` when the
//! guard area is not available.

pub mod base;
pub mod classify;
mod length;
mod operand;

pub use base::{BaseProvider, GlobalBase};
pub use classify::{classify, InstClass};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ir::{Function, InstId, Module, Opcode, Type, Value};
use crate::verifier::Verifier;
use base::RegionBase;

/// Name of the global holding the region base
pub const DEFAULT_BASE_SYMBOL: &str = "__sfi_memory_base";

/// Sandboxing options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxOptions {
    /// Global variable holding the region base (an `i64`)
    pub base_symbol: String,
    /// Fold `inttoptr(add i32 x, C)` address arithmetic instead of re-truncating
    pub fold_address_arithmetic: bool,
    /// Re-check each sandboxed function with the [`Verifier`]
    pub verify: bool,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            base_symbol: DEFAULT_BASE_SYMBOL.to_string(),
            fold_address_arithmetic: true,
            verify: false,
        }
    }
}

impl SandboxOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What a sandboxing run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStats {
    /// Functions with a body that were processed
    pub functions: usize,
    /// Region base loads inserted (at most one per function)
    pub base_loads: usize,
    /// Pointer operands rewritten
    pub pointers_sandboxed: usize,
    /// Pointer operands rewritten through the folded `inttoptr(add)` path
    pub addresses_folded: usize,
    /// Block operation lengths clipped to 32 bits
    pub lengths_clipped: usize,
    /// Instructions added, base loads included
    pub instructions_inserted: usize,
    /// Folded `inttoptr`/`add` instructions deleted after losing their last use
    pub instructions_removed: usize,
}

impl SandboxStats {
    /// Accumulate another run's counters
    pub fn merge(&mut self, other: &SandboxStats) {
        self.functions += other.functions;
        self.base_loads += other.base_loads;
        self.pointers_sandboxed += other.pointers_sandboxed;
        self.addresses_folded += other.addresses_folded;
        self.lengths_clipped += other.lengths_clipped;
        self.instructions_inserted += other.instructions_inserted;
        self.instructions_removed += other.instructions_removed;
    }
}

/// Per-function sandboxing entry point
///
/// Holds no per-function state between calls, so one `Sandboxer` can be
/// shared by threads processing different functions.
pub struct Sandboxer<'p> {
    provider: &'p dyn BaseProvider,
    options: SandboxOptions,
}

impl<'p> Sandboxer<'p> {
    /// Create a sandboxer drawing the region base from `provider`
    pub fn new(provider: &'p dyn BaseProvider, options: SandboxOptions) -> Self {
        Self { provider, options }
    }

    /// Sandbox every memory access of `func` in place
    ///
    /// Declarations are left alone. On error the function may be partially
    /// rewritten and must be discarded.
    pub fn run_on_function(&self, func: &mut Function) -> Result<SandboxStats> {
        if func.is_declaration() {
            return Ok(SandboxStats::default());
        }

        let mut pass = FunctionSandbox::new(func, self.provider, &self.options);
        // Instructions inserted while walking are not part of the snapshot
        for inst in pass.func.layout() {
            if pass.func.is_live(inst) {
                pass.sandbox_inst(inst)?;
            }
        }
        let mut stats = pass.stats;
        stats.functions = 1;

        tracing::debug!(
            function = %func.name,
            pointers = stats.pointers_sandboxed,
            folded = stats.addresses_folded,
            lengths = stats.lengths_clipped,
            removed = stats.instructions_removed,
            "sandboxed function"
        );

        if self.options.verify {
            let result = Verifier::new(&self.options.base_symbol).verify(func);
            if !result.valid {
                return Err(Error::VerificationFailed {
                    function: func.name.clone(),
                    errors: result.errors.iter().map(|e| e.to_string()).collect(),
                });
            }
        }

        Ok(stats)
    }
}

/// Sandbox all functions of `module`
///
/// Declares the base global (`i64`) if the module lacks it. The module is
/// returned only on success, so a failed run never yields partially
/// sandboxed output.
pub fn sandbox_module(
    mut module: Module,
    options: &SandboxOptions,
) -> Result<(Module, SandboxStats)> {
    let symbol = module.get_or_insert_global(&options.base_symbol, Type::i64())?;
    let provider = GlobalBase::new(symbol);
    let sandboxer = Sandboxer::new(&provider, options.clone());

    let mut total = SandboxStats::default();
    for func in module.functions.iter_mut() {
        let stats = sandboxer.run_on_function(func)?;
        total.merge(&stats);
    }

    tracing::debug!(
        module = %module.name,
        functions = total.functions,
        pointers = total.pointers_sandboxed,
        "sandboxed module"
    );
    Ok((module, total))
}

/// State of one sandboxing run over one function
pub(crate) struct FunctionSandbox<'a> {
    pub(crate) func: &'a mut Function,
    base: RegionBase<'a>,
    options: &'a SandboxOptions,
    pub(crate) stats: SandboxStats,
}

impl<'a> FunctionSandbox<'a> {
    pub(crate) fn new(
        func: &'a mut Function,
        provider: &'a dyn BaseProvider,
        options: &'a SandboxOptions,
    ) -> Self {
        Self {
            func,
            base: RegionBase::new(provider),
            options,
            stats: SandboxStats::default(),
        }
    }

    /// Region base of this function, loaded on first use
    ///
    /// Only instructions the provider actually emits are counted; a provider
    /// may hand back an existing value.
    fn base(&mut self) -> Result<Value> {
        if self.base.is_loaded() {
            return self.base.get_or_load(self.func);
        }
        let before = self.func.inst_count();
        let base = self.base.get_or_load(self.func)?;
        let emitted = self.func.inst_count() - before;
        if emitted > 0 {
            self.stats.base_loads += 1;
            self.stats.instructions_inserted += emitted;
        }
        Ok(base)
    }

    /// Operand `index` of a memory instruction
    ///
    /// For intrinsic calls the index is bounded by the argument list, so a
    /// short call never resolves to its callee.
    fn access_operand(&self, inst: InstId, index: usize) -> Result<Value> {
        let value = match self.func.inst(inst).opcode {
            Opcode::Call => self.func.call_arg(inst, index),
            _ => self.func.operand(inst, index),
        };
        value.cloned().ok_or_else(|| Error::MissingOperand {
            function: self.func.name.clone(),
            opcode: self.opcode_name(inst),
            operand: index,
        })
    }

    fn opcode_name(&self, inst: InstId) -> String {
        self.func.inst(inst).opcode.mnemonic().to_string()
    }
}
