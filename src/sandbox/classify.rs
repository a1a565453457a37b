//! Instruction classification and the completeness guard
//!
//! Every instruction kind lands in exactly one [`InstClass`]. The match in
//! [`classify`] has no wildcard arm, so adding an [`Opcode`] variant does not
//! compile until it is placed in a class.
//!
//! | Class | Action |
//! |-------|--------|
//! | `Load` | sandbox operand 0 |
//! | `Store` | sandbox operand 1 |
//! | `MemTransfer` | sandbox 0 and 1, clip length 2 |
//! | `MemSet` | sandbox 0, clip length 2 |
//! | `AtomicAccess` | sandbox the address operand |
//! | `AtomicOther` | arguments must not be pointers |
//! | `Exempt` | untouched (`inttoptr`, `ptrtoint`, `ret`) |
//! | `Call` | arguments must not be pointers; the callee is left to CFI |
//! | `Other` | no operand may be a pointer |

use super::FunctionSandbox;
use crate::error::{Error, Result};
use crate::intrinsics::{self, Intrinsic};
use crate::ir::{CastOp, InstData, InstId, Opcode};

/// How the sandbox treats an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstClass {
    /// `load`; address in operand 0
    Load,
    /// `store`; address in operand 1
    Store,
    /// `memcpy`/`memmove`; destination 0, source 1, length 2
    MemTransfer,
    /// `memset`; destination 0, length 2
    MemSet,
    /// Atomic intrinsic addressing memory through `address`
    AtomicAccess {
        /// Address operand index
        address: usize,
    },
    /// Atomic intrinsic without an address (fences)
    AtomicOther,
    /// Raw pointer/integer conversions and returns
    Exempt,
    /// Ordinary call
    Call,
    /// Everything else
    Other,
}

impl InstClass {
    /// Operands confined to the sandbox region
    pub fn address_operands(self) -> Vec<usize> {
        match self {
            InstClass::Load => vec![0],
            InstClass::Store => vec![1],
            InstClass::MemTransfer => vec![0, 1],
            InstClass::MemSet => vec![0],
            InstClass::AtomicAccess { address } => vec![address],
            InstClass::AtomicOther | InstClass::Exempt | InstClass::Call | InstClass::Other => {
                Vec::new()
            }
        }
    }

    /// Operand clipped to 32 bits, for block operations
    pub fn length_operand(self) -> Option<usize> {
        match self {
            InstClass::MemTransfer | InstClass::MemSet => Some(2),
            _ => None,
        }
    }
}

/// Classify an instruction
pub fn classify(inst: &InstData) -> InstClass {
    match &inst.opcode {
        Opcode::Load => InstClass::Load,
        Opcode::Store => InstClass::Store,
        Opcode::Cast(CastOp::IntToPtr) | Opcode::Cast(CastOp::PtrToInt) | Opcode::Ret => {
            InstClass::Exempt
        }
        Opcode::Call => match intrinsics::classify_call(inst) {
            Some(Intrinsic::MemCpy) | Some(Intrinsic::MemMove) => InstClass::MemTransfer,
            Some(Intrinsic::MemSet) => InstClass::MemSet,
            Some(Intrinsic::Atomic(op)) => match op.address_operand() {
                Some(address) => InstClass::AtomicAccess { address },
                None => InstClass::AtomicOther,
            },
            None => InstClass::Call,
        },
        Opcode::Alloca(_)
        | Opcode::Binary(_)
        | Opcode::ICmp(_)
        | Opcode::Cast(_)
        | Opcode::Select
        | Opcode::Phi(_)
        | Opcode::Br(_)
        | Opcode::CondBr { .. }
        | Opcode::Unreachable => InstClass::Other,
    }
}

impl FunctionSandbox<'_> {
    /// Sandbox one instruction according to its class
    pub(crate) fn sandbox_inst(&mut self, inst: InstId) -> Result<()> {
        let class = classify(self.func.inst(inst));
        match class {
            InstClass::Load
            | InstClass::Store
            | InstClass::MemTransfer
            | InstClass::MemSet
            | InstClass::AtomicAccess { .. } => {
                // Reject malformed operand lists before anything is rewritten
                for index in class.address_operands() {
                    self.address_operand(inst, index)?;
                }
                if let Some(index) = class.length_operand() {
                    self.access_operand(inst, index)?;
                }

                for index in class.address_operands() {
                    self.sandbox_pointer(inst, index)?;
                }
                if let Some(index) = class.length_operand() {
                    self.normalize_length(inst, index)?;
                }
                Ok(())
            }
            InstClass::Exempt => Ok(()),
            InstClass::AtomicOther | InstClass::Call => self.check_no_pointer_operands(inst, true),
            InstClass::Other => self.check_no_pointer_operands(inst, false),
        }
    }

    /// Fail if `inst` has a pointer-typed operand
    ///
    /// For calls only the arguments are checked: the callee pointer is left
    /// to control-flow integrity enforcement.
    fn check_no_pointer_operands(&self, inst: InstId, args_only: bool) -> Result<()> {
        let data = self.func.inst(inst);
        let operands = if args_only {
            data.call_args()
        } else {
            &data.operands[..]
        };

        let offending = operands
            .iter()
            .position(|op| self.func.value_type(op).is_pointer());
        match offending {
            None => Ok(()),
            Some(operand) => {
                let err = Error::UnsandboxedPointer {
                    function: self.func.name.clone(),
                    opcode: data.opcode.mnemonic().to_string(),
                    operand,
                    instruction: self.func.display_inst(inst),
                };
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }
}
