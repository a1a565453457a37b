//! Textual rendering of IR in an LLVM-like syntax
//!
//! Used for diagnostics (the completeness guard names the offending
//! instruction) and for dumping functions while debugging.

use std::fmt::{self, Write as _};

use super::function::Function;
use super::instruction::{BlockId, InstId, Opcode};
use super::module::Module;
use super::value::{Constant, Value};

impl Function {
    /// Render a value reference (`%3`, `%arg0`, `42`, `@g`)
    pub fn display_value(&self, value: &Value) -> String {
        match value {
            Value::Inst(id) => match &self.inst(*id).name {
                Some(name) => format!("%{}", name),
                None => format!("%{}", id.0),
            },
            Value::Arg(n) => format!("%arg{}", n),
            Value::Const(c) => match c {
                Constant::Int { bits: 1, value } => {
                    if *value == 0 { "false" } else { "true" }.to_string()
                }
                Constant::Int { .. } => c.as_signed().unwrap_or_default().to_string(),
                Constant::Null(_) => "null".to_string(),
                Constant::Undef(_) => "undef".to_string(),
            },
            Value::Global(sym) => format!("@{}", sym.name),
        }
    }

    fn typed(&self, value: Option<&Value>) -> String {
        match value {
            Some(v) => format!("{} {}", self.value_type(v), self.display_value(v)),
            None => "<missing>".to_string(),
        }
    }

    fn label(&self, block: BlockId) -> String {
        match self.blocks().nth(block.index()) {
            Some((_, b)) => format!("%{}", b.name),
            None => format!("%bb{}", block.0),
        }
    }

    /// Render one instruction without indentation
    pub fn display_inst(&self, id: InstId) -> String {
        let data = self.inst(id);
        let ops = &data.operands;
        let mut out = String::new();
        if !data.ty.is_void() {
            let _ = write!(out, "{} = ", self.display_value(&Value::Inst(id)));
        }
        let mnemonic = data.opcode.mnemonic();
        let body = match &data.opcode {
            Opcode::Alloca(ty) => format!("{} {}, {}", mnemonic, ty, self.typed(ops.first())),
            Opcode::Load => format!("{} {}, {}", mnemonic, data.ty, self.typed(ops.first())),
            Opcode::Store => format!(
                "{} {}, {}",
                mnemonic,
                self.typed(ops.first()),
                self.typed(ops.get(1))
            ),
            Opcode::Binary(_) => format!(
                "{} {}, {}",
                mnemonic,
                self.typed(ops.first()),
                ops.get(1).map(|v| self.display_value(v)).unwrap_or_default()
            ),
            Opcode::ICmp(pred) => format!(
                "{} {} {}, {}",
                mnemonic,
                pred.mnemonic(),
                self.typed(ops.first()),
                ops.get(1).map(|v| self.display_value(v)).unwrap_or_default()
            ),
            Opcode::Cast(_) => format!("{} {} to {}", mnemonic, self.typed(ops.first()), data.ty),
            Opcode::Select => format!(
                "{} {}, {}, {}",
                mnemonic,
                self.typed(ops.first()),
                self.typed(ops.get(1)),
                self.typed(ops.get(2))
            ),
            Opcode::Phi(blocks) => {
                let incoming: Vec<String> = ops
                    .iter()
                    .zip(blocks)
                    .map(|(v, b)| format!("[ {}, {} ]", self.display_value(v), self.label(*b)))
                    .collect();
                format!("{} {} {}", mnemonic, data.ty, incoming.join(", "))
            }
            Opcode::Call => {
                let args: Vec<String> =
                    data.call_args().iter().map(|a| self.typed(Some(a))).collect();
                let callee = data
                    .callee()
                    .map(|c| self.display_value(c))
                    .unwrap_or_default();
                format!("{} {} {}({})", mnemonic, data.ty, callee, args.join(", "))
            }
            Opcode::Br(target) => format!("{} label {}", mnemonic, self.label(*target)),
            Opcode::CondBr {
                then_block,
                else_block,
            } => format!(
                "{} {}, label {}, label {}",
                mnemonic,
                self.typed(ops.first()),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Opcode::Ret => match ops.first() {
                Some(v) => format!("{} {}", mnemonic, self.typed(Some(v))),
                None => format!("{} void", mnemonic),
            },
            Opcode::Unreachable => mnemonic.to_string(),
        };
        out.push_str(&body);
        out
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            return writeln!(f, "declare {} @{}({})", self.ret, self.name, params.join(", "));
        }
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} %arg{}", p, i))
            .collect();
        writeln!(f, "define {} @{}({}) {{", self.ret, self.name, params.join(", "))?;
        for (_, block) in self.blocks() {
            writeln!(f, "{}:", block.name)?;
            for &id in block.insts() {
                writeln!(f, "  {}", self.display_inst(id))?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.globals {
            writeln!(f, "@{} = external global {}", global.name, global.value_ty)?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
