//! Intrinsic call recognition
//!
//! Maps the callee of a call to the memory intrinsic it implements, if
//! any. Overloaded intrinsics carry type suffixes
//! (`llvm.memcpy.p0i8.p0i8.i32`, `llvm.nacl.atomic.load.i32`); lookup strips
//! dot-separated suffixes until a known family name matches.

use std::collections::HashMap;

use crate::ir::{InstData, Value};

/// Atomic intrinsic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    /// `llvm.nacl.atomic.load(ptr, order)`
    Load,
    /// `llvm.nacl.atomic.store(value, ptr, order)`
    Store,
    /// `llvm.nacl.atomic.rmw(op, ptr, value, order)`
    Rmw,
    /// `llvm.nacl.atomic.cmpxchg(ptr, expected, desired, success, failure)`
    CmpXchg,
    /// `llvm.nacl.atomic.is.lock.free(size, ptr)`
    IsLockFree,
    /// `llvm.nacl.atomic.fence(order)`
    Fence,
    /// `llvm.nacl.atomic.fence.all()`
    FenceAll,
}

impl AtomicOp {
    /// Index of the address operand, if the operation touches memory through one
    pub fn address_operand(self) -> Option<usize> {
        match self {
            AtomicOp::Load | AtomicOp::CmpXchg => Some(0),
            AtomicOp::Store | AtomicOp::Rmw | AtomicOp::IsLockFree => Some(1),
            AtomicOp::Fence | AtomicOp::FenceAll => None,
        }
    }
}

/// Recognized intrinsics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `llvm.memcpy(dest, src, len, ...)`
    MemCpy,
    /// `llvm.memmove(dest, src, len, ...)`
    MemMove,
    /// `llvm.memset(dest, byte, len, ...)`
    MemSet,
    /// NaCl atomic family
    Atomic(AtomicOp),
}

lazy_static::lazy_static! {
    /// Family names of recognized intrinsics
    static ref INTRINSICS: HashMap<&'static str, Intrinsic> = {
        let mut table = HashMap::new();
        table.insert("llvm.memcpy", Intrinsic::MemCpy);
        table.insert("llvm.memmove", Intrinsic::MemMove);
        table.insert("llvm.memset", Intrinsic::MemSet);
        table.insert("llvm.nacl.atomic.load", Intrinsic::Atomic(AtomicOp::Load));
        table.insert("llvm.nacl.atomic.store", Intrinsic::Atomic(AtomicOp::Store));
        table.insert("llvm.nacl.atomic.rmw", Intrinsic::Atomic(AtomicOp::Rmw));
        table.insert("llvm.nacl.atomic.cmpxchg", Intrinsic::Atomic(AtomicOp::CmpXchg));
        table.insert(
            "llvm.nacl.atomic.is.lock.free",
            Intrinsic::Atomic(AtomicOp::IsLockFree),
        );
        table.insert("llvm.nacl.atomic.fence", Intrinsic::Atomic(AtomicOp::Fence));
        table.insert("llvm.nacl.atomic.fence.all", Intrinsic::Atomic(AtomicOp::FenceAll));
        table
    };
}

/// Classify an intrinsic by callee name
pub fn lookup(name: &str) -> Option<Intrinsic> {
    if !name.starts_with("llvm.") {
        return None;
    }
    let mut candidate = name;
    loop {
        if let Some(intrinsic) = INTRINSICS.get(candidate) {
            return Some(*intrinsic);
        }
        candidate = &candidate[..candidate.rfind('.')?];
    }
}

/// Classify a call instruction by its callee
///
/// Indirect calls and calls to ordinary functions yield `None`.
pub fn classify_call(call: &InstData) -> Option<Intrinsic> {
    match call.callee()? {
        Value::Global(sym) => lookup(&sym.name),
        _ => None,
    }
}
