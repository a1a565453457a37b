//! End-to-end tests for memory access sandboxing
//!
//! Each test builds a small function, runs the transform, and inspects the
//! rewritten instruction stream (or the diagnostic when it must refuse).

use minsfi::ir::{
    CastOp, Function, FunctionBuilder, InstId, IntPredicate, Module, Opcode, Symbol,
    Type, Value,
};
use minsfi::sandbox::{BaseProvider, GlobalBase, SandboxOptions, SandboxStats, Sandboxer};
use minsfi::{sandbox_module, Error, Result, Verifier, DEFAULT_BASE_SYMBOL};

// ====================
// Helpers
// ====================

fn base_symbol() -> Symbol {
    Symbol::global(DEFAULT_BASE_SYMBOL, Type::i64())
}

fn run(func: &mut Function) -> Result<SandboxStats> {
    run_with(func, SandboxOptions::default())
}

fn run_with(func: &mut Function, options: SandboxOptions) -> Result<SandboxStats> {
    let provider = GlobalBase::new(base_symbol());
    Sandboxer::new(&provider, options).run_on_function(func)
}

fn i8_ptr() -> Type {
    Type::ptr_to(Type::i8())
}

fn memcpy(len_ty: Type) -> Symbol {
    Symbol::function(
        "llvm.memcpy.p0i8.p0i8.i64",
        Type::Void,
        vec![i8_ptr(), i8_ptr(), len_ty, Type::i32(), Type::i1()],
    )
}

fn is_base_load(func: &Function, id: InstId) -> bool {
    let data = func.inst(id);
    data.opcode == Opcode::Load && data.operands == vec![Value::Global(base_symbol())]
}

fn count_base_loads(func: &Function) -> usize {
    func.layout()
        .into_iter()
        .filter(|&i| is_base_load(func, i))
        .count()
}

fn assert_verified(func: &Function) {
    let result = Verifier::new(DEFAULT_BASE_SYMBOL).strict().verify(func);
    assert!(result.valid, "Errors: {:?}\n{}", result.errors, func);
}

// ====================
// Rewrite shape
// ====================

/// Storing a pointer through `inttoptr(add i32 %x, 64)` rebases `%x` and
/// adds the offset in 64 bits; the original arithmetic disappears.
#[test]
fn test_folded_store_exact_output() {
    let mut func = Function::new("f", vec![Type::i32(), i8_ptr()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let sum = b.add(Value::Arg(0), Value::int(32, 64));
    let addr = b.int_to_ptr(sum, Type::ptr_to(i8_ptr()));
    b.store(Value::Arg(1), addr);
    b.ret(None);

    let stats = run(&mut func).unwrap();

    let expected = "\
define void @f(i32 %arg0, i8* %arg1) {
entry:
  %mem_base = load i64, i64* @__sfi_memory_base
  %5 = zext i32 %arg0 to i64
  %6 = add i64 %mem_base, %5
  %7 = add i64 %6, 64
  %8 = inttoptr i64 %7 to i8**
  store i8* %arg1, i8** %8
  ret void
}
";
    assert_eq!(func.to_string(), expected);
    assert_eq!(stats.addresses_folded, 1);
    assert_eq!(stats.instructions_removed, 2);
    assert_eq!(stats.instructions_inserted, 5);
    assert_verified(&func);
}

/// Without a foldable shape the pointer goes through `ptrtoint` to i32.
#[test]
fn test_generic_load_exact_output() {
    let mut func = Function::new("g", vec![Type::ptr_to(Type::i32())], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let v = b.load(Value::Arg(0));
    b.ret(Some(v));

    run(&mut func).unwrap();

    let expected = "\
define i32 @g(i32* %arg0) {
entry:
  %mem_base = load i64, i64* @__sfi_memory_base
  %3 = ptrtoint i32* %arg0 to i32
  %4 = zext i32 %3 to i64
  %5 = add i64 %mem_base, %4
  %6 = inttoptr i64 %5 to i32*
  %0 = load i32, i32* %6
  ret i32 %0
}
";
    assert_eq!(func.to_string(), expected);
    assert_verified(&func);
}

/// A negative offset (as a signed 32-bit constant) is not folded.
#[test]
fn test_negative_offset_takes_generic_path() {
    let mut func = Function::new("f", vec![Type::i32()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let sum = b.add(Value::Arg(0), Value::int(32, (-4i32) as u32 as u64));
    let addr = b.int_to_ptr(sum.clone(), Type::ptr_to(Type::i32()));
    let v = b.load(addr.clone());
    b.ret(Some(v));

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.addresses_folded, 0);
    assert_eq!(stats.instructions_removed, 0);
    assert!(func.is_live(sum.as_inst().unwrap()));
    assert!(func.is_live(addr.as_inst().unwrap()));
    assert_verified(&func);
}

// ====================
// Base memoization
// ====================

/// Many accesses over several blocks share one base load at the entry head.
#[test]
fn test_single_base_load_across_blocks() {
    let ptr = Type::ptr_to(Type::i32());
    let mut func = Function::new("f", vec![ptr.clone(), ptr, Type::i1()], Type::Void);
    let entry = func.add_block("entry");
    let left = func.add_block("left");
    let right = func.add_block("right");

    let mut b = FunctionBuilder::at_end(&mut func, entry);
    let v = b.load(Value::Arg(0));
    b.cond_br(Value::Arg(2), left, right);
    let mut b = FunctionBuilder::at_end(&mut func, left);
    b.store(v.clone(), Value::Arg(1));
    b.ret(None);
    let mut b = FunctionBuilder::at_end(&mut func, right);
    b.store(v, Value::Arg(0));
    b.load(Value::Arg(1));
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.base_loads, 1);
    assert_eq!(stats.pointers_sandboxed, 4);
    assert_eq!(count_base_loads(&func), 1);
    let head = func.block(entry).insts()[0];
    assert!(is_base_load(&func, head));
    assert_verified(&func);
}

/// Functions that never touch memory get no base load.
#[test]
fn test_no_memory_access_no_base_load() {
    let mut func = Function::new("f", vec![Type::i32(), Type::i32()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let sum = b.add(Value::Arg(0), Value::Arg(1));
    b.ret(Some(sum));
    let before = func.to_string();

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.base_loads, 0);
    assert_eq!(stats.functions, 1);
    assert_eq!(func.to_string(), before);
}

/// The base comes from whatever provider is injected.
#[test]
fn test_injected_base_provider() {
    /// Base passed in as the function's last argument
    struct ArgBase;

    impl BaseProvider for ArgBase {
        fn materialize(&self, func: &mut Function) -> Result<Value> {
            Ok(Value::Arg(func.params.len() as u32 - 1))
        }
    }

    let mut func = Function::new("f", vec![Type::ptr_to(Type::i32()), Type::i64()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let v = b.load(Value::Arg(0));
    b.ret(Some(v.clone()));

    let stats = Sandboxer::new(&ArgBase, SandboxOptions::default())
        .run_on_function(&mut func)
        .unwrap();

    let load = v.as_inst().unwrap();
    let cast = func.inst(load).operands[0].as_inst().unwrap();
    let sum = func.inst(cast).operands[0].as_inst().unwrap();
    assert_eq!(func.inst(sum).operands[0], Value::Arg(1));
    assert_eq!(count_base_loads(&func), 0);
    // Only the ptrtoint, zext, add and inttoptr were inserted
    assert_eq!(stats.base_loads, 0);
    assert_eq!(stats.instructions_inserted, 4);
    assert_eq!(func.inst_count(), 6);
}

// ====================
// Block operations
// ====================

/// memcpy sandboxes both pointers and clips a 64-bit length.
#[test]
fn test_memcpy_with_64_bit_length() {
    let mut func = Function::new("f", vec![i8_ptr(), i8_ptr(), Type::i64()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let call = b.call_symbol(
        memcpy(Type::i64()),
        vec![
            Value::Arg(0),
            Value::Arg(1),
            Value::Arg(2),
            Value::int(32, 1),
            Value::int(1, 0),
        ],
    );
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 2);
    assert_eq!(stats.lengths_clipped, 1);

    let len = func.operand(call, 2).unwrap().as_inst().unwrap();
    assert!(func.inst(len).is_cast(CastOp::ZExt));
    let trunc = func.inst(len).operands[0].as_inst().unwrap();
    assert!(func.inst(trunc).is_cast(CastOp::Trunc));
    assert_eq!(func.inst(trunc).operands[0], Value::Arg(2));
    // Alignment and volatility flags are not touched
    assert_eq!(func.operand(call, 3), Some(&Value::int(32, 1)));
    assert_verified(&func);
}

/// memmove is handled exactly like memcpy.
#[test]
fn test_memmove_with_64_bit_length() {
    let memmove = Symbol::function(
        "llvm.memmove.p0i8.p0i8.i64",
        Type::Void,
        vec![i8_ptr(), i8_ptr(), Type::i64(), Type::i32(), Type::i1()],
    );
    let mut func = Function::new("f", vec![i8_ptr(), i8_ptr(), Type::i64()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let call = b.call_symbol(
        memmove,
        vec![
            Value::Arg(0),
            Value::Arg(1),
            Value::Arg(2),
            Value::int(32, 1),
            Value::int(1, 0),
        ],
    );
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 2);
    assert_eq!(stats.lengths_clipped, 1);
    assert_eq!(stats.base_loads, 1);

    for index in 0..2 {
        let addr = func.operand(call, index).unwrap().as_inst().unwrap();
        assert!(func.inst(addr).is_cast(CastOp::IntToPtr));
    }
    let len = func.operand(call, 2).unwrap().as_inst().unwrap();
    assert!(func.inst(len).is_cast(CastOp::ZExt));
    assert_verified(&func);
}

/// memset with a 32-bit length keeps the length operand as is.
#[test]
fn test_memset_with_32_bit_length() {
    let memset = Symbol::function(
        "llvm.memset.p0i8.i32",
        Type::Void,
        vec![i8_ptr(), Type::i8(), Type::i32(), Type::i32(), Type::i1()],
    );
    let mut func = Function::new("f", vec![i8_ptr(), Type::i32()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let call = b.call_symbol(
        memset,
        vec![
            Value::Arg(0),
            Value::int(8, 0),
            Value::Arg(1),
            Value::int(32, 1),
            Value::int(1, 0),
        ],
    );
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 1);
    assert_eq!(stats.lengths_clipped, 0);
    assert_eq!(func.operand(call, 2), Some(&Value::Arg(1)));
    assert_verified(&func);
}

// ====================
// Atomics
// ====================

/// Each atomic intrinsic has its address confined at the right operand.
#[test]
fn test_atomic_address_operands() {
    let ptr = Type::ptr_to(Type::i32());
    let atomic = |name: &str, ret: Type, params: Vec<Type>| {
        Symbol::function(format!("llvm.nacl.atomic.{}", name), ret, params)
    };
    let mut func = Function::new("f", vec![ptr.clone(), Type::i32()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let order = Value::int(32, 6);

    let load = b.call_symbol(
        atomic("load.i32", Type::i32(), vec![ptr.clone(), Type::i32()]),
        vec![Value::Arg(0), order.clone()],
    );
    let store = b.call_symbol(
        atomic("store.i32", Type::Void, vec![Type::i32(), ptr.clone(), Type::i32()]),
        vec![Value::Arg(1), Value::Arg(0), order.clone()],
    );
    let rmw = b.call_symbol(
        atomic(
            "rmw.i32",
            Type::i32(),
            vec![Type::i32(), ptr.clone(), Type::i32(), Type::i32()],
        ),
        vec![Value::int(32, 1), Value::Arg(0), Value::Arg(1), order.clone()],
    );
    let cmpxchg = b.call_symbol(
        atomic(
            "cmpxchg.i32",
            Type::i32(),
            vec![ptr.clone(), Type::i32(), Type::i32(), Type::i32(), Type::i32()],
        ),
        vec![
            Value::Arg(0),
            Value::int(32, 0),
            Value::Arg(1),
            order.clone(),
            order.clone(),
        ],
    );
    let lock_free = b.call_symbol(
        atomic("is.lock.free", Type::i1(), vec![Type::i32(), i8_ptr()]),
        vec![Value::int(32, 4), Value::Const(minsfi::ir::Constant::Null(i8_ptr()))],
    );
    b.call_symbol(atomic("fence", Type::Void, vec![Type::i32()]), vec![order]);
    b.call_symbol(atomic("fence.all", Type::Void, vec![]), vec![]);
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 5);

    let confined = |inst: InstId, index: usize| {
        let op = func.operand(inst, index).unwrap().as_inst().unwrap();
        func.inst(op).is_cast(CastOp::IntToPtr)
    };
    assert!(confined(load, 0));
    assert!(confined(store, 1));
    assert_eq!(func.operand(store, 0), Some(&Value::Arg(1)));
    assert!(confined(rmw, 1));
    assert!(confined(cmpxchg, 0));
    assert!(confined(lock_free, 1));
    assert_eq!(count_base_loads(&func), 1);
    assert_verified(&func);
}

// ====================
// Exemptions and completeness
// ====================

/// `ptrtoint`, `inttoptr` and `ret` keep their pointer operands.
#[test]
fn test_exempt_instructions_are_untouched() {
    let mut func = Function::new("f", vec![i8_ptr()], i8_ptr());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let int = b.ptr_to_int(Value::Arg(0), Type::i32());
    let back = b.int_to_ptr(int.clone(), i8_ptr());
    let ret = b.ret(Some(back.clone()));
    let before = func.to_string();

    let stats = run(&mut func).unwrap();
    assert_eq!(stats, SandboxStats { functions: 1, ..SandboxStats::default() });
    assert_eq!(func.to_string(), before);
    assert_eq!(func.operand(ret, 0), Some(&back));
    assert_eq!(func.operand(back.as_inst().unwrap(), 0), Some(&int));
}

/// Every handled or exempt instruction kind passes the guard.
#[test]
fn test_handled_and_exempt_kinds_pass_guard() {
    let ptr = Type::ptr_to(Type::i32());
    let callee = Symbol::function("helper", Type::i32(), vec![Type::i32()]);
    let mut func = Function::new("f", vec![ptr.clone(), Type::i32()], ptr.clone());
    let entry = func.add_block("entry");
    let body = func.add_block("body");
    let exit = func.add_block("exit");
    let dead = func.add_block("dead");

    let mut b = FunctionBuilder::at_end(&mut func, entry);
    let slot = b.alloca(Type::i32(), Value::int(32, 1));
    let v = b.load(Value::Arg(0));
    b.store(v.clone(), slot.clone());
    let c = b.icmp(IntPredicate::Slt, v.clone(), Value::Arg(1));
    b.cond_br(c, body, exit);

    let mut b = FunctionBuilder::at_end(&mut func, body);
    let r = b.call_symbol(callee, vec![v.clone()]);
    let doubled = b.add(Value::Inst(r), Value::Inst(r));
    b.br(exit);

    let mut b = FunctionBuilder::at_end(&mut func, exit);
    let merged = b.phi(Type::i32(), vec![(v, entry), (doubled, body)]);
    let int = b.ptr_to_int(Value::Arg(0), Type::i32());
    let moved = b.add(int, merged);
    let out = b.int_to_ptr(moved, ptr);
    b.ret(Some(out));

    FunctionBuilder::at_end(&mut func, dead).unreachable();

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 2);
    assert_verified(&func);
}

/// Indirect calls are allowed as long as no argument is a pointer.
#[test]
fn test_indirect_call_callee_is_exempt() {
    let fn_ptr = Type::ptr_to(Type::function(Type::Void, vec![Type::i32()]));
    let mut func = Function::new("f", vec![fn_ptr], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    b.call(Value::Arg(0), vec![Value::int(32, 7)]);
    b.ret(None);

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.pointers_sandboxed, 0);
}

// ====================
// Fatal violations
// ====================

/// A `select` over pointers aborts before later instructions are touched.
#[test]
fn test_select_over_pointers_is_fatal() {
    let mut func = Function::new("f", vec![Type::i1(), i8_ptr(), i8_ptr()], Type::i8());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    b.select(Value::Arg(0), Value::Arg(1), Value::Arg(2));
    let later = b.load(Value::Arg(1));
    b.ret(Some(later.clone()));

    let err = run(&mut func).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unsandboxed pointer"), "{}", msg);
    assert!(msg.contains("`select`"), "{}", msg);
    assert!(err.is_security_violation());
    match err {
        Error::UnsandboxedPointer { function, operand, .. } => {
            assert_eq!(function, "f");
            assert_eq!(operand, 1);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(func.operand(later.as_inst().unwrap(), 0), Some(&Value::Arg(1)));
}

/// Pointer-typed phis, bitcasts, comparisons and call arguments are refused.
#[test]
fn test_other_pointer_uses_are_fatal() {
    let cases: Vec<(&str, Box<dyn Fn(&mut Function)>)> = vec![
        (
            "phi",
            Box::new(|func: &mut Function| {
                let entry = func.entry_block().unwrap();
                let mut b = FunctionBuilder::at_end(func, entry);
                b.phi(i8_ptr(), vec![(Value::Arg(0), entry)]);
            }),
        ),
        (
            "bitcast",
            Box::new(|func: &mut Function| {
                let entry = func.entry_block().unwrap();
                FunctionBuilder::at_end(func, entry).cast(
                    CastOp::Bitcast,
                    Value::Arg(0),
                    Type::ptr_to(Type::i32()),
                );
            }),
        ),
        (
            "icmp",
            Box::new(|func: &mut Function| {
                let entry = func.entry_block().unwrap();
                FunctionBuilder::at_end(func, entry).icmp(
                    IntPredicate::Eq,
                    Value::Arg(0),
                    Value::Arg(0),
                );
            }),
        ),
        (
            "call",
            Box::new(|func: &mut Function| {
                let entry = func.entry_block().unwrap();
                let puts = Symbol::function("puts", Type::i32(), vec![i8_ptr()]);
                FunctionBuilder::at_end(func, entry).call_symbol(puts, vec![Value::Arg(0)]);
            }),
        ),
    ];

    for (opcode, build) in cases {
        let mut func = Function::new("f", vec![i8_ptr()], Type::Void);
        func.add_block("entry");
        build(&mut func);
        let entry = func.entry_block().unwrap();
        FunctionBuilder::at_end(&mut func, entry).ret(None);

        match run(&mut func) {
            Err(Error::UnsandboxedPointer { opcode: found, .. }) => assert_eq!(found, opcode),
            other => panic!("{}: expected a violation, got {:?}", opcode, other.map(|_| ())),
        }
    }
}

/// Runs `name` with `args` and expects `MissingOperand { operand }`, with the
/// call (callee included) left exactly as it was.
fn assert_short_call_rejected(name: &str, args: Vec<Value>, operand: usize) {
    let callee = Symbol::function(name, Type::Void, vec![]);
    let mut func = Function::new("f", vec![i8_ptr(), i8_ptr()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let call = b.call_symbol(callee.clone(), args.clone());
    b.ret(None);
    let before = func.inst_count();

    match run(&mut func) {
        Err(Error::MissingOperand { operand: found, opcode, .. }) => {
            assert_eq!(found, operand, "{}", name);
            assert_eq!(opcode, "call");
        }
        other => panic!("{}: expected MissingOperand, got {:?}", name, other),
    }
    assert_eq!(func.inst_count(), before, "{} was partially rewritten", name);
    assert_eq!(func.inst(call).call_args(), &args[..]);
    assert_eq!(func.inst(call).operands.last(), Some(&Value::Global(callee)));
}

/// Intrinsic calls with too few arguments are rejected before any rewrite;
/// the callee is never mistaken for an address or length.
#[test]
fn test_short_intrinsic_calls_are_rejected() {
    // memcpy with only a destination: the source would be the callee
    assert_short_call_rejected("llvm.memcpy.p0i8.p0i8.i64", vec![Value::Arg(0)], 1);
    // memset without a length
    assert_short_call_rejected(
        "llvm.memset.p0i8.i64",
        vec![Value::Arg(0), Value::int(8, 0)],
        2,
    );
    // atomic store without its address
    assert_short_call_rejected("llvm.nacl.atomic.store.i32", vec![Value::int(32, 7)], 1);
}

// ====================
// Dead arithmetic removal
// ====================

/// A folded cast still used elsewhere survives; an unshared one is deleted.
#[test]
fn test_folded_arithmetic_removal_respects_other_uses() {
    let ptr = Type::ptr_to(Type::i32());
    let mut func = Function::new("f", vec![Type::i32()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let shared_sum = b.add(Value::Arg(0), Value::int(32, 4));
    let shared = b.int_to_ptr(shared_sum.clone(), ptr.clone());
    let first = b.load(shared.clone());
    let second = b.load(shared.clone());
    let own_sum = b.add(Value::Arg(0), Value::int(32, 8));
    let own = b.int_to_ptr(own_sum.clone(), ptr);
    let third = b.load(own.clone());
    let t = b.add(first, second);
    let t = b.add(t, third);
    b.ret(Some(t));

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.addresses_folded, 3);
    // The shared pair dies only after its second user is rewritten
    assert!(!func.is_live(shared.as_inst().unwrap()));
    assert!(!func.is_live(shared_sum.as_inst().unwrap()));
    assert!(!func.is_live(own.as_inst().unwrap()));
    assert!(!func.is_live(own_sum.as_inst().unwrap()));
    assert_eq!(stats.instructions_removed, 4);
    assert_verified(&func);
}

/// The folded add survives when a non-memory instruction also uses it.
#[test]
fn test_folded_add_with_arithmetic_user_survives() {
    let mut func = Function::new("f", vec![Type::i32()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let sum = b.add(Value::Arg(0), Value::int(32, 16));
    let addr = b.int_to_ptr(sum.clone(), Type::ptr_to(Type::i32()));
    let v = b.load(addr.clone());
    let t = b.add(v, sum.clone());
    b.ret(Some(t));

    let stats = run(&mut func).unwrap();
    assert_eq!(stats.instructions_removed, 1);
    assert!(!func.is_live(addr.as_inst().unwrap()));
    assert!(func.is_live(sum.as_inst().unwrap()));
    assert_eq!(func.use_count(sum.as_inst().unwrap()), 1);
}

// ====================
// Module driver and options
// ====================

fn store_module(name: &str) -> Module {
    let mut func = Function::new("store", vec![Type::ptr_to(Type::i32()), Type::i32()], Type::Void);
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    b.store(Value::Arg(1), Value::Arg(0));
    b.ret(None);

    let mut module = Module::new(name);
    module.add_function(Function::new("external", vec![i8_ptr()], Type::Void));
    module.add_function(func);
    module
}

/// The base global is declared and declarations are skipped.
#[test]
fn test_sandbox_module_declares_base() {
    let (module, stats) = sandbox_module(store_module("m"), &SandboxOptions::default()).unwrap();
    let global = module.global(DEFAULT_BASE_SYMBOL).unwrap();
    assert_eq!(global.value_ty, Type::i64());
    assert_eq!(stats.functions, 1);
    assert_eq!(stats.pointers_sandboxed, 1);
    assert!(module.function("external").unwrap().is_declaration());
    assert!(module.to_string().starts_with("@__sfi_memory_base = external global i64\n"));
}

/// An existing base global of the wrong type is an error.
#[test]
fn test_sandbox_module_rejects_mistyped_base() {
    let mut module = store_module("m");
    module.get_or_insert_global(DEFAULT_BASE_SYMBOL, Type::i32()).unwrap();
    let err = sandbox_module(module, &SandboxOptions::default()).unwrap_err();
    assert!(matches!(err, Error::GlobalTypeMismatch { .. }));
}

/// Options parsed from JSON pick the base symbol and disable folding.
#[test]
fn test_options_from_json() {
    let options =
        SandboxOptions::from_json(r#"{"base_symbol": "region", "fold_address_arithmetic": false}"#)
            .unwrap();
    assert!(!options.verify);

    let (module, stats) = sandbox_module(store_module("m"), &options).unwrap();
    assert!(module.global("region").is_some());
    assert!(module.global(DEFAULT_BASE_SYMBOL).is_none());
    assert_eq!(stats.addresses_folded, 0);
    let func = module.function("store").unwrap();
    assert!(Verifier::new("region").verify(func).valid);

    assert!(matches!(
        SandboxOptions::from_json("{\"verify\": 3}"),
        Err(Error::InvalidOptions(_))
    ));
}

/// The verify option re-checks output and accepts what the pass produces.
#[test]
fn test_verify_option() {
    let options = SandboxOptions {
        verify: true,
        ..SandboxOptions::default()
    };
    let (_, stats) = sandbox_module(store_module("m"), &options).unwrap();
    assert_eq!(stats.pointers_sandboxed, 1);
}

/// Statistics serialize for reporting.
#[test]
fn test_stats_serialize() {
    let (_, stats) = sandbox_module(store_module("m"), &SandboxOptions::default()).unwrap();
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["pointers_sandboxed"], 1);
    assert_eq!(json["base_loads"], 1);
}

/// Running the generic path with folding disabled still verifies.
#[test]
fn test_folding_disabled_output_verifies() {
    let mut func = Function::new("f", vec![Type::i32()], Type::i32());
    let bb = func.add_block("entry");
    let mut b = FunctionBuilder::at_end(&mut func, bb);
    let sum = b.add(Value::Arg(0), Value::int(32, 64));
    let addr = b.int_to_ptr(sum, Type::ptr_to(Type::i32()));
    let v = b.load(addr);
    b.ret(Some(v));

    let options = SandboxOptions {
        fold_address_arithmetic: false,
        ..SandboxOptions::default()
    };
    let stats = run_with(&mut func, options).unwrap();
    assert_eq!(stats.addresses_folded, 0);
    assert_eq!(stats.instructions_removed, 0);
    assert_verified(&func);
}
