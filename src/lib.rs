//! # minsfi - Memory access sandboxing for a typed IR
//!
//! Software fault isolation by address masking. Every load, store, block
//! copy, block fill and atomic access of a function is rewritten so that the
//! address it dereferences lies inside a 4 GiB region:
//!
//! ```text
//! address' = inttoptr(base + zext(trunc(address to i32) to i64))
//! ```
//!
//! The region base is a run-time value read once per function. Instructions
//! carrying pointer operands the transform cannot confine are rejected
//! rather than passed through.
//!
//! ## Features
//!
//! - **Complete coverage** - every instruction kind is classified; unknown
//!   pointer uses abort the transform
//! - **Address folding** - `inttoptr(add i32 x, C)` emitted by pointer
//!   lowering is rebased without a redundant truncation
//! - **Verification** - an independent checker for sandboxed form
//! - **Parallel** - functions are sandboxed on a Rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use minsfi::ir::{Function, FunctionBuilder, Module, Type, Value};
//! use minsfi::{sandbox_module, SandboxOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // void store(i32* %p, i32 %v) { store i32 %v, i32* %p }
//! let mut func = Function::new("store", vec![Type::ptr_to(Type::i32()), Type::i32()], Type::Void);
//! let entry = func.add_block("entry");
//! let mut b = FunctionBuilder::at_end(&mut func, entry);
//! b.store(Value::Arg(1), Value::Arg(0));
//! b.ret(None);
//!
//! let mut module = Module::new("demo");
//! module.add_function(func);
//!
//! let (module, stats) = sandbox_module(module, &SandboxOptions::default())?;
//! assert_eq!(stats.pointers_sandboxed, 1);
//! assert_eq!(stats.base_loads, 1);
//! println!("{}", module);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Module ──► sandbox_module / sandbox_module_parallel
//!                 │
//!                 ▼
//!            Sandboxer::run_on_function
//!                 │  classify each instruction
//!                 ├─► sandbox pointer operands (base memoized per function)
//!                 ├─► clip block operation lengths
//!                 └─► reject stray pointer operands
//!                 │
//!                 ▼
//!            Verifier (optional)
//! ```
//!
//! ## Modules
//!
//! - [`ir`] - typed instruction-level IR
//! - [`intrinsics`] - recognized memory and atomic intrinsics
//! - [`sandbox`] - the transform
//! - [`verifier`] - sandboxed-form checker
//! - [`parallel`] - multi-threaded driver
//! - [`error`] - error types

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod intrinsics;
pub mod ir;
pub mod parallel;
pub mod sandbox;
pub mod verifier;

// Re-export main types
pub use error::{Error, Result};
pub use parallel::{sandbox_module_parallel, ParallelConfig};
pub use sandbox::{
    sandbox_module, BaseProvider, GlobalBase, SandboxOptions, SandboxStats, Sandboxer,
    DEFAULT_BASE_SYMBOL,
};
pub use verifier::{VerifyError, VerifyResult, Verifier};
