//! # Typed instruction-level IR
//!
//! The transform in [`crate::sandbox`] rewrites functions expressed in this
//! IR. It is deliberately small: just enough structure to enumerate
//! instructions in a stable order, inspect operands by index and type, and
//! insert, replace and delete instructions.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # Type (void, iN, T*, function types)
//! ├── value.rs        # Value, Constant, Symbol
//! ├── instruction.rs  # InstId, BlockId, Opcode, InstData
//! ├── function.rs     # Function arena, block layout, use counts
//! ├── builder.rs      # FunctionBuilder (typed construction at a cursor)
//! ├── module.rs       # Module, GlobalDecl
//! └── printer.rs      # LLVM-like textual rendering
//! ```
//!
//! ## Key Types
//!
//! - [`Function`] - instruction arena addressed by stable [`InstId`] handles
//! - [`Opcode`] - closed set of instruction kinds
//! - [`Value`] - instruction result, argument, constant or global symbol
//! - [`FunctionBuilder`] - inserts instructions at the end of a block or
//!   before an existing instruction

mod builder;
mod function;
mod instruction;
mod module;
mod printer;
mod types;
mod value;

pub use builder::{Cursor, FunctionBuilder};
pub use function::{Block, Function};
pub use instruction::{BinaryOp, BlockId, CastOp, InstData, InstId, IntPredicate, Opcode};
pub use module::{GlobalDecl, Module};
pub use types::{Type, ADDRESS_WIDTH, MACHINE_WIDTH};
pub use value::{mask, Constant, Symbol, Value};
