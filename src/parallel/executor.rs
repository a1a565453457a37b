//! Parallel executor for module sandboxing
//!
//! Uses Rayon for work-stealing parallelism with configurable limits.

use crate::error::{Error, Result};
use crate::ir::{Module, Type};
use crate::sandbox::{GlobalBase, SandboxOptions, SandboxStats, Sandboxer};
use rayon::prelude::*;

/// Configuration for parallel sandboxing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of worker threads (default: num_cpus)
    pub max_parallelism: usize,
    /// Stop at the first failure seen by any worker instead of finishing
    /// every function and reporting the earliest failure in module order
    pub fail_fast: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// Sandbox all functions of `module` on a thread pool
///
/// Produces the same module as [`crate::sandbox::sandbox_module`]. With
/// `fail_fast = false` the reported error is deterministic: it belongs to
/// the first failing function in module order.
///
/// # Example
/// ```ignore
/// let (module, stats) = sandbox_module_parallel(
///     module,
///     &SandboxOptions::default(),
///     ParallelConfig::default(),
/// )?;
/// ```
pub fn sandbox_module_parallel(
    mut module: Module,
    options: &SandboxOptions,
    config: ParallelConfig,
) -> Result<(Module, SandboxStats)> {
    let symbol = module.get_or_insert_global(&options.base_symbol, Type::i64())?;
    let provider = GlobalBase::new(symbol);
    let sandboxer = Sandboxer::new(&provider, options.clone());

    // Small modules are not worth a pool
    if module.functions.len() <= 1 {
        let mut total = SandboxStats::default();
        for func in module.functions.iter_mut() {
            total.merge(&sandboxer.run_on_function(func)?);
        }
        return Ok((module, total));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.min(module.functions.len()))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let per_function = pool.install(|| {
        if config.fail_fast {
            module
                .functions
                .par_iter_mut()
                .map(|func| sandboxer.run_on_function(func))
                .collect::<Result<Vec<SandboxStats>>>()
        } else {
            let results: Vec<Result<SandboxStats>> = module
                .functions
                .par_iter_mut()
                .map(|func| sandboxer.run_on_function(func))
                .collect();
            results.into_iter().collect()
        }
    })?;

    let mut total = SandboxStats::default();
    for stats in &per_function {
        total.merge(stats);
    }

    tracing::debug!(
        module = %module.name,
        functions = total.functions,
        pointers = total.pointers_sandboxed,
        threads = pool.current_num_threads(),
        "sandboxed module in parallel"
    );
    Ok((module, total))
}
