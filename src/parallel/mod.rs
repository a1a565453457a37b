//! Parallel sandboxing of module functions
//!
//! Functions share no mutable state during sandboxing, so they can be
//! processed on a work-stealing pool.

mod executor;

pub use executor::{sandbox_module_parallel, ParallelConfig};
