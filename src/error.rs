//! Error types for the memory sandboxing transform

use thiserror::Error;

/// Sandboxing errors
///
/// Every variant aborts the whole transformation. There is no partial
/// application mode: a function that failed part-way is not usable output.
#[derive(Error, Debug)]
pub enum Error {
    // Completeness guard
    /// An instruction outside the handled and exempt sets carries a pointer operand
    ///
    /// **Triggered by:** e.g. `select` over two pointers, a pointer passed as a call
    /// argument, a pointer-typed `phi`.
    /// **Why fatal:** the pointer would reach memory without being confined to the
    /// sandbox region.
    #[error(
        "unsandboxed pointer operand #{operand} in `{opcode}` instruction of function `{function}`: {instruction}"
    )]
    UnsandboxedPointer {
        /// Function containing the instruction
        function: String,
        /// Instruction mnemonic
        opcode: String,
        /// Index of the offending operand
        operand: usize,
        /// Rendered instruction
        instruction: String,
    },

    // Malformed input
    /// An address operand of a memory instruction is not pointer-typed
    #[error("operand #{operand} of `{opcode}` in function `{function}` must be a pointer, found {ty}")]
    NotAPointer {
        /// Function containing the instruction
        function: String,
        /// Instruction mnemonic
        opcode: String,
        /// Operand index
        operand: usize,
        /// Actual operand type
        ty: String,
    },

    /// A memory instruction has fewer operands than its kind requires
    #[error("`{opcode}` in function `{function}` has no operand #{operand}")]
    MissingOperand {
        /// Function containing the instruction
        function: String,
        /// Instruction mnemonic
        opcode: String,
        /// Missing operand index
        operand: usize,
    },

    /// The region base was requested for a function without blocks
    #[error("function `{function}` has no entry block")]
    NoEntryBlock {
        /// Function name
        function: String,
    },

    /// The base variable is already declared with another type
    #[error("global `{name}` is declared as {found}, expected {expected}")]
    GlobalTypeMismatch {
        /// Global name
        name: String,
        /// Required value type
        expected: String,
        /// Declared value type
        found: String,
    },

    // Post-transform checking
    /// The verifier rejected a sandboxed function
    #[error("sandboxed function `{function}` failed verification: {}", errors.join("; "))]
    VerificationFailed {
        /// Function name
        function: String,
        /// Rendered verifier findings
        errors: Vec<String>,
    },

    // Configuration and execution
    /// Options could not be parsed
    #[error("invalid sandbox options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// True for errors meaning sandboxed output would have been unsafe,
    /// as opposed to malformed input or configuration problems.
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Error::UnsandboxedPointer { .. } | Error::VerificationFailed { .. }
        )
    }
}

/// Result type for sandboxing operations
pub type Result<T> = std::result::Result<T, Error>;
