//! # Sandbox Verifier
//!
//! Checks that a function is in sandboxed form, independently of the pass
//! that produced it. Useful after later transformations that might have
//! rewritten confined addresses, and in tests.
//!
//! A function passes when:
//! - the region base is loaded at most once, as the first instruction of the
//!   entry block
//! - every address operand is `inttoptr(add(base, zext i32 x))`, optionally
//!   followed by a non-negative `i64` constant offset
//! - every block operation length is at most 32 bits wide or a `zext` of a
//!   32-bit value
//! - no other instruction carries a pointer operand

use crate::ir::{BinaryOp, CastOp, Function, InstId, Opcode, Value, ADDRESS_WIDTH, MACHINE_WIDTH};
use crate::sandbox::{classify, InstClass};

/// Verification result with warnings
#[derive(Debug)]
pub struct VerifyResult {
    /// Function is in sandboxed form
    pub valid: bool,
    /// Violations
    pub errors: Vec<VerifyError>,
    /// Warnings (non-fatal)
    pub warnings: Vec<String>,
    /// Statistics
    pub stats: VerifyStats,
}

/// Verification statistics
#[derive(Debug, Default)]
pub struct VerifyStats {
    /// Live instructions inspected
    pub instruction_count: usize,
    /// Region base loads found
    pub base_loads: usize,
    /// Confined address operands
    pub addresses: usize,
    /// Block operation lengths checked
    pub lengths: usize,
}

/// Verification error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The region base is loaded more than once
    MultipleBaseLoads {
        /// Number of loads found
        count: usize,
    },

    /// A base load is not the first instruction of the entry block
    MisplacedBaseLoad {
        /// Rendered instruction
        instruction: String,
    },

    /// An address operand does not have the confined shape
    UnconfinedAddress {
        /// Operand index
        operand: usize,
        /// Rendered instruction
        instruction: String,
    },

    /// A block operation length may exceed 32 bits
    UnclippedLength {
        /// Operand index
        operand: usize,
        /// Rendered instruction
        instruction: String,
    },

    /// A pointer operand on an instruction that may not carry one
    UnhandledPointer {
        /// Operand index
        operand: usize,
        /// Rendered instruction
        instruction: String,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::MultipleBaseLoads { count } => {
                write!(f, "Region base loaded {} times (expected at most 1)", count)
            }
            VerifyError::MisplacedBaseLoad { instruction } => {
                write!(f, "Region base load is not at the entry head: {}", instruction)
            }
            VerifyError::UnconfinedAddress {
                operand,
                instruction,
            } => {
                write!(f, "Address operand #{} is not confined: {}", operand, instruction)
            }
            VerifyError::UnclippedLength {
                operand,
                instruction,
            } => {
                write!(f, "Length operand #{} is not clipped: {}", operand, instruction)
            }
            VerifyError::UnhandledPointer {
                operand,
                instruction,
            } => {
                write!(f, "Unhandled pointer operand #{}: {}", operand, instruction)
            }
        }
    }
}

/// Sandboxed-form verifier
pub struct Verifier {
    /// Global holding the region base
    base_symbol: String,
    /// Strict mode (treat warnings as errors)
    strict: bool,
}

impl Verifier {
    /// Creates a verifier recognizing loads of `base_symbol` as the region base
    pub fn new(base_symbol: impl Into<String>) -> Self {
        Self {
            base_symbol: base_symbol.into(),
            strict: false,
        }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Verify a function; declarations are trivially valid
    pub fn verify(&self, func: &Function) -> VerifyResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let layout = func.layout();
        let mut stats = VerifyStats {
            instruction_count: layout.len(),
            ..VerifyStats::default()
        };

        let base_loads: Vec<InstId> = layout
            .iter()
            .copied()
            .filter(|&i| self.is_base_load(func, i))
            .collect();
        stats.base_loads = base_loads.len();
        if base_loads.len() > 1 {
            errors.push(VerifyError::MultipleBaseLoads {
                count: base_loads.len(),
            });
        }
        let entry_head = func
            .entry_block()
            .and_then(|bb| func.block(bb).insts().first().copied());
        for &load in &base_loads {
            if Some(load) != entry_head {
                errors.push(VerifyError::MisplacedBaseLoad {
                    instruction: func.display_inst(load),
                });
            }
            if func.use_count(load) == 0 {
                warnings.push(format!("Unused region base load: {}", func.display_inst(load)));
            }
        }

        for &inst in &layout {
            if base_loads.contains(&inst) {
                continue;
            }
            let data = func.inst(inst);
            let class = classify(data);

            for index in class.address_operands() {
                let confined = data
                    .operands
                    .get(index)
                    .map_or(false, |op| self.is_confined(func, op));
                if confined {
                    stats.addresses += 1;
                } else {
                    errors.push(VerifyError::UnconfinedAddress {
                        operand: index,
                        instruction: func.display_inst(inst),
                    });
                }
            }

            if let Some(index) = class.length_operand() {
                stats.lengths += 1;
                let clipped = data
                    .operands
                    .get(index)
                    .map_or(false, |op| is_clipped_length(func, op));
                if !clipped {
                    errors.push(VerifyError::UnclippedLength {
                        operand: index,
                        instruction: func.display_inst(inst),
                    });
                }
            }

            let unchecked: &[Value] = match class {
                InstClass::AtomicOther | InstClass::Call => data.call_args(),
                InstClass::Other => &data.operands,
                InstClass::Load
                | InstClass::Store
                | InstClass::MemTransfer
                | InstClass::MemSet
                | InstClass::AtomicAccess { .. }
                | InstClass::Exempt => &[],
            };
            if let Some(operand) = unchecked
                .iter()
                .position(|op| func.value_type(op).is_pointer())
            {
                errors.push(VerifyError::UnhandledPointer {
                    operand,
                    instruction: func.display_inst(inst),
                });
            }
        }

        let valid = errors.is_empty() && (!self.strict || warnings.is_empty());

        VerifyResult {
            valid,
            errors,
            warnings,
            stats,
        }
    }

    fn is_base_load(&self, func: &Function, inst: InstId) -> bool {
        let data = func.inst(inst);
        data.opcode == Opcode::Load
            && matches!(data.operands.first(), Some(Value::Global(sym)) if sym.name == self.base_symbol)
    }

    fn is_base(&self, func: &Function, value: &Value) -> bool {
        value
            .as_inst()
            .map_or(false, |i| func.is_live(i) && self.is_base_load(func, i))
    }

    /// `inttoptr(add(base, zext i32 x))` or `inttoptr(add(that sum, C >= 0))`
    fn is_confined(&self, func: &Function, ptr: &Value) -> bool {
        let Some(cast) = ptr.as_inst() else {
            return false;
        };
        let cast_data = func.inst(cast);
        if !cast_data.is_cast(CastOp::IntToPtr) {
            return false;
        }
        let Some(sum) = cast_data.operands.first() else {
            return false;
        };
        if self.is_rebased(func, sum) {
            return true;
        }
        match binary_add_operands(func, sum) {
            Some((inner, Value::Const(c))) => {
                c.as_signed().map_or(false, |v| v >= 0) && self.is_rebased(func, inner)
            }
            _ => false,
        }
    }

    /// `add i64 base, zext(i32 x)`
    fn is_rebased(&self, func: &Function, sum: &Value) -> bool {
        match binary_add_operands(func, sum) {
            Some((lhs, rhs)) => self.is_base(func, lhs) && is_zext_from_address(func, rhs),
            None => false,
        }
    }
}

fn binary_add_operands<'f>(func: &'f Function, value: &Value) -> Option<(&'f Value, &'f Value)> {
    let data = func.inst(value.as_inst()?);
    if data.opcode != Opcode::Binary(BinaryOp::Add) || !data.ty.is_int(MACHINE_WIDTH) {
        return None;
    }
    Some((data.operands.first()?, data.operands.get(1)?))
}

fn is_zext_from_address(func: &Function, value: &Value) -> bool {
    let Some(ext) = value.as_inst() else {
        return false;
    };
    let data = func.inst(ext);
    data.is_cast(CastOp::ZExt)
        && data
            .operands
            .first()
            .map_or(false, |op| func.value_type(op).is_int(ADDRESS_WIDTH))
}

fn is_clipped_length(func: &Function, len: &Value) -> bool {
    match func.value_type(len).int_width() {
        Some(bits) if bits <= ADDRESS_WIDTH => true,
        Some(_) => is_zext_from_address(func, len),
        None => false,
    }
}
