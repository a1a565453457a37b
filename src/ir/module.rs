//! IR module: global declarations and functions

use super::function::Function;
use super::types::Type;
use super::value::Symbol;
use crate::error::{Error, Result};

/// Declared global variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDecl {
    /// Symbol name
    pub name: String,
    /// Type of the stored value (the symbol itself is a pointer to it)
    pub value_ty: Type,
}

impl GlobalDecl {
    /// Symbol referring to this global's address
    pub fn symbol(&self) -> Symbol {
        Symbol::global(self.name.clone(), self.value_ty.clone())
    }
}

/// Complete IR module
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Global variables
    pub globals: Vec<GlobalDecl>,
    /// Function definitions and declarations
    pub functions: Vec<Function>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Look up a global variable by name
    pub fn global(&self, name: &str) -> Option<&GlobalDecl> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Return the symbol of global `name`, declaring it with `value_ty` if absent
    ///
    /// Fails if the global already exists with a different type.
    pub fn get_or_insert_global(&mut self, name: &str, value_ty: Type) -> Result<Symbol> {
        if let Some(existing) = self.global(name) {
            if existing.value_ty != value_ty {
                return Err(Error::GlobalTypeMismatch {
                    name: name.to_string(),
                    expected: value_ty.to_string(),
                    found: existing.value_ty.to_string(),
                });
            }
            return Ok(existing.symbol());
        }
        let decl = GlobalDecl {
            name: name.to_string(),
            value_ty,
        };
        let sym = decl.symbol();
        self.globals.push(decl);
        Ok(sym)
    }

    /// Add a function and return its index
    pub fn add_function(&mut self, func: Function) -> usize {
        self.functions.push(func);
        self.functions.len() - 1
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
