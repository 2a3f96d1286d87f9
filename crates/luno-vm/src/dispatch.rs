//! The interpreter loop.
//!
//! Calls between Lua functions never recurse into Rust: CALL pushes a
//! frame and RETURN pops it, all inside one loop. Rust recursion only
//! happens for metamethods and natives, which run a nested loop via
//! [`call_function`].

use std::rc::Rc;

use luno_core::error::RuntimeError;
use luno_core::number::fb_to_int;
use luno_core::opcode::{index_k, is_k, Instruction, OpCode, FIELDS_PER_FLUSH};
use luno_core::table::Table;
use luno_core::value::{Closure, LuaClosure, LuaStr, NativeCtx, NativeFunction, Value};

use crate::arith::{self, ArithOp, ArithResult};
use crate::coerce;
use crate::compare::{self, CompareResult};
use crate::metamethod;
use crate::vm::{
    close_upvalues_from, find_or_create_upvalue, pop_frame, push_frame, table_get, table_set,
    unwind_to, upvalue_get, upvalue_set, Vm, MAX_META_CHAIN,
};

/// Run frames until the stack drops below `entry_depth`; the results of
/// the frame that was at `entry_depth` are returned to the Rust caller.
pub(crate) fn execute_from(vm: &mut Vm, entry_depth: usize) -> Result<Vec<Value>, RuntimeError> {
    loop {
        let fi = vm.frames.len() - 1;
        let pc = vm.frames[fi].pc;
        if pc >= vm.frames[fi].proto.code.len() {
            // The emitter always ends a function with RETURN; a chunk
            // that falls off the end simply returns nothing.
            let frame = pop_frame(vm, fi);
            if vm.frames.len() < entry_depth {
                return Ok(Vec::new());
            }
            let caller = vm.frames.len() - 1;
            place_results(vm, caller, frame.ret_reg, frame.want, Vec::new());
            continue;
        }
        let inst = vm.frames[fi].proto.code[pc];
        vm.frames[fi].pc = pc + 1;
        let a = inst.a() as usize;

        match inst.opcode() {
            OpCode::Move => {
                let v = vm.frames[fi].slot(inst.b() as usize);
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::LoadK => {
                let v = vm.frames[fi].proto.constants[inst.bx() as usize].to_value();
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::LoadKX => {
                // Constant index lives in the EXTRAARG that follows.
                let extra = vm.frames[fi].proto.code[vm.frames[fi].pc];
                vm.frames[fi].pc += 1;
                let v = vm.frames[fi].proto.constants[extra.ax_field() as usize].to_value();
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::LoadBool => {
                vm.frames[fi].set_slot(a, Value::Boolean(inst.b() != 0));
                if inst.c() != 0 {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::LoadNil => {
                let b = inst.b() as usize;
                for i in a..=a + b {
                    vm.frames[fi].set_slot(i, Value::Nil);
                }
            }
            OpCode::GetUpval => {
                let cell = Rc::clone(&vm.frames[fi].upvalues[inst.b() as usize]);
                let v = upvalue_get(vm, &cell);
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::SetUpval => {
                let cell = Rc::clone(&vm.frames[fi].upvalues[inst.b() as usize]);
                let v = vm.frames[fi].slot(a);
                upvalue_set(vm, &cell, v);
            }
            OpCode::GetTabUp => {
                let cell = Rc::clone(&vm.frames[fi].upvalues[inst.b() as usize]);
                let t = upvalue_get(vm, &cell);
                let k = rk(vm, fi, inst.c());
                let v = table_get(vm, &t, &k)?;
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::GetTable => {
                let t = vm.frames[fi].slot(inst.b() as usize);
                let k = rk(vm, fi, inst.c());
                let v = table_get(vm, &t, &k)?;
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::SetTabUp => {
                let cell = Rc::clone(&vm.frames[fi].upvalues[a]);
                let t = upvalue_get(vm, &cell);
                let k = rk(vm, fi, inst.b());
                let v = rk(vm, fi, inst.c());
                table_set(vm, &t, k, v)?;
            }
            OpCode::SetTable => {
                let t = vm.frames[fi].slot(a);
                let k = rk(vm, fi, inst.b());
                let v = rk(vm, fi, inst.c());
                table_set(vm, &t, k, v)?;
            }
            OpCode::NewTable => {
                let t = Table::with_capacity(
                    fb_to_int(inst.b()) as usize,
                    fb_to_int(inst.c()) as usize,
                );
                vm.frames[fi].set_slot(a, Value::new_table(t));
            }
            OpCode::Self_ => {
                let recv = vm.frames[fi].slot(inst.b() as usize);
                let k = rk(vm, fi, inst.c());
                let v = table_get(vm, &recv, &k)?;
                let f = &mut vm.frames[fi];
                f.set_slot(a + 1, recv);
                f.set_slot(a, v);
            }
            OpCode::Add => binary_arith(vm, fi, inst, ArithOp::Add)?,
            OpCode::Sub => binary_arith(vm, fi, inst, ArithOp::Sub)?,
            OpCode::Mul => binary_arith(vm, fi, inst, ArithOp::Mul)?,
            OpCode::Mod => binary_arith(vm, fi, inst, ArithOp::Mod)?,
            OpCode::Pow => binary_arith(vm, fi, inst, ArithOp::Pow)?,
            OpCode::Div => binary_arith(vm, fi, inst, ArithOp::Div)?,
            OpCode::IDiv => binary_arith(vm, fi, inst, ArithOp::IDiv)?,
            OpCode::BAnd => binary_arith(vm, fi, inst, ArithOp::BAnd)?,
            OpCode::BOr => binary_arith(vm, fi, inst, ArithOp::BOr)?,
            OpCode::BXor => binary_arith(vm, fi, inst, ArithOp::BXor)?,
            OpCode::Shl => binary_arith(vm, fi, inst, ArithOp::Shl)?,
            OpCode::Shr => binary_arith(vm, fi, inst, ArithOp::Shr)?,
            OpCode::Unm => {
                let vb = vm.frames[fi].slot(inst.b() as usize);
                match arith::arith_unm(&vb) {
                    ArithResult::Ok(v) => vm.frames[fi].set_slot(a, v),
                    ArithResult::NeedMetamethod => {
                        let name = vm.mm.unm.clone();
                        match try_binary_mm(vm, &name, &vb, &vb)? {
                            Some(v) => vm.frames[fi].set_slot(a, v),
                            None => {
                                return Err(vm.rterr(format!(
                                    "attempt to perform arithmetic on a {} value",
                                    vb.type_name()
                                )))
                            }
                        }
                    }
                    ArithResult::Error(e) => return Err(vm.located(e)),
                }
            }
            OpCode::BNot => {
                let vb = vm.frames[fi].slot(inst.b() as usize);
                match arith::arith_bnot(&vb) {
                    ArithResult::Ok(v) => vm.frames[fi].set_slot(a, v),
                    ArithResult::NeedMetamethod => {
                        let name = vm.mm.bnot.clone();
                        match try_binary_mm(vm, &name, &vb, &vb)? {
                            Some(v) => vm.frames[fi].set_slot(a, v),
                            None => return Err(bitwise_type_error(vm, &vb)),
                        }
                    }
                    ArithResult::Error(e) => return Err(vm.located(e)),
                }
            }
            OpCode::Not => {
                let v = vm.frames[fi].slot(inst.b() as usize);
                vm.frames[fi].set_slot(a, Value::Boolean(!v.is_truthy()));
            }
            OpCode::Len => {
                let vb = vm.frames[fi].slot(inst.b() as usize);
                let v = match &vb {
                    Value::Str(s) => Value::Integer(s.len() as i64),
                    Value::Table(t) => match metamethod::get_metamethod(&vb, &vm.mm.len) {
                        Some(h) => {
                            let rs = call_function(vm, h, vec![vb.clone()])?;
                            rs.into_iter().next().unwrap_or(Value::Nil)
                        }
                        None => Value::Integer(t.borrow().length()),
                    },
                    other => {
                        return Err(vm.rterr(format!(
                            "attempt to get length of a {} value",
                            other.type_name()
                        )))
                    }
                };
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::Concat => {
                let b = inst.b() as usize;
                let c = inst.c() as usize;
                let v = concat_range(vm, fi, b, c)?;
                vm.frames[fi].set_slot(a, v);
            }
            OpCode::Jmp => {
                if a > 0 {
                    close_upvalues_from(vm, fi, a - 1);
                }
                let f = &mut vm.frames[fi];
                f.pc = offset_pc(f.pc, inst.sbx());
            }
            OpCode::Eq => {
                let vb = rk(vm, fi, inst.b());
                let vc = rk(vm, fi, inst.c());
                let (mut equal, try_mm) = compare::lua_eq(&vb, &vc);
                if try_mm {
                    let name = vm.mm.eq.clone();
                    if let Some(v) = try_binary_mm(vm, &name, &vb, &vc)? {
                        equal = v.is_truthy();
                    }
                }
                if equal != (inst.a() != 0) {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::Lt => {
                let vb = rk(vm, fi, inst.b());
                let vc = rk(vm, fi, inst.c());
                let res = match compare::lua_lt(&vb, &vc) {
                    CompareResult::Ok(r) => r,
                    CompareResult::NeedMetamethod => {
                        let name = vm.mm.lt.clone();
                        match try_binary_mm(vm, &name, &vb, &vc)? {
                            Some(v) => v.is_truthy(),
                            None => return Err(compare_error(vm, &vb, &vc)),
                        }
                    }
                };
                if res != (inst.a() != 0) {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::Le => {
                let vb = rk(vm, fi, inst.b());
                let vc = rk(vm, fi, inst.c());
                let res = match compare::lua_le(&vb, &vc) {
                    CompareResult::Ok(r) => r,
                    CompareResult::NeedMetamethod => {
                        let le = vm.mm.le.clone();
                        match try_binary_mm(vm, &le, &vb, &vc)? {
                            Some(v) => v.is_truthy(),
                            // No __le: `a <= b` falls back to `not (b < a)`.
                            None => {
                                let lt = vm.mm.lt.clone();
                                match try_binary_mm(vm, &lt, &vc, &vb)? {
                                    Some(v) => !v.is_truthy(),
                                    None => return Err(compare_error(vm, &vb, &vc)),
                                }
                            }
                        }
                    }
                };
                if res != (inst.a() != 0) {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::Test => {
                if vm.frames[fi].slot(a).is_truthy() != (inst.c() != 0) {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::TestSet => {
                let vb = vm.frames[fi].slot(inst.b() as usize);
                if vb.is_truthy() == (inst.c() != 0) {
                    vm.frames[fi].set_slot(a, vb);
                } else {
                    vm.frames[fi].pc += 1;
                }
            }
            OpCode::Call => {
                let b = inst.b();
                let c = inst.c();
                let func = vm.frames[fi].slot(a);
                let args = gather_args(vm, fi, a, b);
                if b == 0 {
                    reset_top(vm, fi);
                }
                let want = if c == 0 { -1 } else { c as i32 - 1 };
                begin_call(vm, func, args, a, want)?;
            }
            OpCode::TailCall => {
                // Runs as an ordinary open call; the RETURN that follows
                // forwards however many results it produced.
                let b = inst.b();
                let func = vm.frames[fi].slot(a);
                let args = gather_args(vm, fi, a, b);
                if b == 0 {
                    reset_top(vm, fi);
                }
                begin_call(vm, func, args, a, -1)?;
            }
            OpCode::Return => {
                let b = inst.b();
                let results: Vec<Value> = {
                    let f = &vm.frames[fi];
                    if b == 0 {
                        (a..f.top.max(a)).map(|i| f.slot(i)).collect()
                    } else {
                        (a..a + b as usize - 1).map(|i| f.slot(i)).collect()
                    }
                };
                let frame = pop_frame(vm, fi);
                if vm.frames.len() < entry_depth {
                    return Ok(results);
                }
                let caller = vm.frames.len() - 1;
                place_results(vm, caller, frame.ret_reg, frame.want, results);
            }
            OpCode::ForPrep => {
                let init = for_number(vm, fi, a, "'for' initial value must be a number")?;
                let limit = for_number(vm, fi, a + 1, "'for' limit must be a number")?;
                let step = for_number(vm, fi, a + 2, "'for' step must be a number")?;
                let start = match arith::arith_op(ArithOp::Sub, &init, &step) {
                    ArithResult::Ok(v) => v,
                    _ => unreachable!("subtracting two numbers"),
                };
                let f = &mut vm.frames[fi];
                f.set_slot(a, start);
                f.set_slot(a + 1, limit);
                f.set_slot(a + 2, step);
                f.pc = offset_pc(f.pc, inst.sbx());
            }
            OpCode::ForLoop => {
                let idx = vm.frames[fi].slot(a);
                let limit = vm.frames[fi].slot(a + 1);
                let step = vm.frames[fi].slot(a + 2);
                let next = match arith::arith_op(ArithOp::Add, &idx, &step) {
                    ArithResult::Ok(v) => v,
                    _ => return Err(vm.rterr("'for' initial value must be a number")),
                };
                let positive = coerce::to_number(&step).map_or(true, |s| s >= 0.0);
                let cont = match if positive {
                    compare::lua_le(&next, &limit)
                } else {
                    compare::lua_le(&limit, &next)
                } {
                    CompareResult::Ok(r) => r,
                    CompareResult::NeedMetamethod => false,
                };
                let f = &mut vm.frames[fi];
                f.set_slot(a, next.clone());
                if cont {
                    f.set_slot(a + 3, next);
                    f.pc = offset_pc(f.pc, inst.sbx());
                }
            }
            OpCode::TForCall => {
                let func = vm.frames[fi].slot(a);
                let args = vec![vm.frames[fi].slot(a + 1), vm.frames[fi].slot(a + 2)];
                begin_call(vm, func, args, a + 3, inst.c() as i32)?;
            }
            OpCode::TForLoop => {
                let ctrl = vm.frames[fi].slot(a + 1);
                if !ctrl.is_nil() {
                    let f = &mut vm.frames[fi];
                    f.set_slot(a, ctrl);
                    f.pc = offset_pc(f.pc, inst.sbx());
                }
            }
            OpCode::SetList => {
                let b = inst.b();
                let c = inst.c();
                let batch = if c == 0 {
                    let extra = vm.frames[fi].proto.code[vm.frames[fi].pc];
                    vm.frames[fi].pc += 1;
                    extra.ax_field()
                } else {
                    c
                };
                let start = ((batch - 1) * FIELDS_PER_FLUSH) as i64;
                let n = if b == 0 {
                    vm.frames[fi].top.saturating_sub(a + 1)
                } else {
                    b as usize
                };
                let tv = vm.frames[fi].slot(a);
                let tbl = match tv.as_table() {
                    Some(t) => Rc::clone(t),
                    None => {
                        return Err(
                            vm.rterr(format!("attempt to index a {} value", tv.type_name()))
                        )
                    }
                };
                for i in 1..=n {
                    let v = vm.frames[fi].slot(a + i);
                    tbl.borrow_mut().raw_seti(start + i as i64, v);
                }
                if b == 0 {
                    reset_top(vm, fi);
                }
            }
            OpCode::Closure => {
                let child = Rc::clone(&vm.frames[fi].proto.protos[inst.bx() as usize]);
                let mut ups = Vec::with_capacity(child.upvalues.len());
                for ud in child.upvalues.iter() {
                    let cell = if ud.in_stack {
                        find_or_create_upvalue(vm, fi, ud.index as usize)
                    } else {
                        Rc::clone(&vm.frames[fi].upvalues[ud.index as usize])
                    };
                    ups.push(cell);
                }
                let f = Closure::Lua(LuaClosure {
                    proto: child,
                    upvalues: ups,
                });
                vm.frames[fi].set_slot(a, Value::Function(Rc::new(f)));
            }
            OpCode::VarArg => {
                let b = inst.b() as usize;
                let varargs = vm.frames[fi].varargs.clone();
                if b == 0 {
                    let n = varargs.len();
                    for (i, v) in varargs.into_iter().enumerate() {
                        vm.frames[fi].set_slot(a + i, v);
                    }
                    vm.frames[fi].top = a + n;
                } else {
                    for i in 0..b - 1 {
                        let v = varargs.get(i).cloned().unwrap_or(Value::Nil);
                        vm.frames[fi].set_slot(a + i, v);
                    }
                }
            }
            // Always consumed by the instruction before it.
            OpCode::ExtraArg => {}
        }
    }
}

/// Call any callable from Rust: resolves `__call`, runs natives
/// directly, and drives Lua closures with a nested dispatch loop. On
/// error every frame this call pushed is unwound.
pub(crate) fn call_function(
    vm: &mut Vm,
    func: Value,
    args: Vec<Value>,
) -> Result<Vec<Value>, RuntimeError> {
    let (closure, args) = resolve_callable(vm, func, args)?;
    match &*closure {
        Closure::Lua(lc) => {
            push_frame(vm, Rc::clone(&lc.proto), lc.upvalues.clone(), args, 0, -1)?;
            let depth = vm.frames.len();
            match execute_from(vm, depth) {
                Ok(results) => Ok(results),
                Err(e) => {
                    unwind_to(vm, depth - 1);
                    Err(e)
                }
            }
        }
        Closure::Native(nf) => run_native(vm, nf, args),
    }
}

/// Start a call from the dispatch loop. A Lua callee becomes a new
/// frame; a native runs here and its results land in the caller.
fn begin_call(
    vm: &mut Vm,
    func: Value,
    args: Vec<Value>,
    ret_reg: usize,
    want: i32,
) -> Result<(), RuntimeError> {
    let (closure, args) = resolve_callable(vm, func, args)?;
    match &*closure {
        Closure::Lua(lc) => push_frame(vm, Rc::clone(&lc.proto), lc.upvalues.clone(), args, ret_reg, want),
        Closure::Native(nf) => {
            let results = run_native(vm, nf, args)?;
            let caller = vm.frames.len() - 1;
            place_results(vm, caller, ret_reg, want, results);
            Ok(())
        }
    }
}

/// Peel `__call` handlers until an actual function appears; each hop
/// prepends the handled value to the arguments.
fn resolve_callable(
    vm: &mut Vm,
    mut func: Value,
    mut args: Vec<Value>,
) -> Result<(Rc<Closure>, Vec<Value>), RuntimeError> {
    for _ in 0..MAX_META_CHAIN {
        match func {
            Value::Function(c) => return Ok((c, args)),
            other => match metamethod::get_metamethod(&other, &vm.mm.call) {
                Some(h) => {
                    args.insert(0, other);
                    func = h;
                }
                None => {
                    return Err(
                        vm.rterr(format!("attempt to call a {} value", other.type_name()))
                    )
                }
            },
        }
    }
    Err(RuntimeError::StackOverflow)
}

fn run_native(
    vm: &mut Vm,
    nf: &NativeFunction,
    args: Vec<Value>,
) -> Result<Vec<Value>, RuntimeError> {
    if vm.native_depth >= vm.max_native_depth {
        return Err(RuntimeError::StackOverflow);
    }
    vm.native_depth += 1;
    let result = {
        let mut ctx = NativeCtx { args, vm };
        (nf.func)(&mut ctx)
    };
    vm.native_depth -= 1;
    result
}

/// Copy call results into the caller's registers. A negative `want`
/// keeps them all and records the extent in `top` for the open-sequence
/// consumer that follows.
fn place_results(vm: &mut Vm, fi: usize, ret_reg: usize, want: i32, results: Vec<Value>) {
    if want < 0 {
        let n = results.len();
        for (i, v) in results.into_iter().enumerate() {
            vm.frames[fi].set_slot(ret_reg + i, v);
        }
        vm.frames[fi].top = ret_reg + n;
    } else {
        let mut it = results.into_iter();
        for i in 0..want as usize {
            let v = it.next().unwrap_or(Value::Nil);
            vm.frames[fi].set_slot(ret_reg + i, v);
        }
    }
}

/// Arguments for CALL/TAILCALL: `b == 0` takes everything from A+1 to
/// the frame's current top.
fn gather_args(vm: &Vm, fi: usize, a: usize, b: u32) -> Vec<Value> {
    let f = &vm.frames[fi];
    if b == 0 {
        (a + 1..f.top.max(a + 1)).map(|i| f.slot(i)).collect()
    } else {
        (a + 1..a + b as usize).map(|i| f.slot(i)).collect()
    }
}

/// After an open sequence is consumed the frame's top returns to its
/// fixed register count.
fn reset_top(vm: &mut Vm, fi: usize) {
    vm.frames[fi].top = vm.frames[fi].proto.max_stack_size as usize;
}

/// An operand that is either a register or a constant.
fn rk(vm: &Vm, fi: usize, arg: u32) -> Value {
    if is_k(arg) {
        vm.frames[fi].proto.constants[index_k(arg) as usize].to_value()
    } else {
        vm.frames[fi].slot(arg as usize)
    }
}

fn offset_pc(pc: usize, sbx: i32) -> usize {
    (pc as i64 + sbx as i64) as usize
}

fn binary_arith(vm: &mut Vm, fi: usize, inst: Instruction, op: ArithOp) -> Result<(), RuntimeError> {
    let a = inst.a() as usize;
    let vb = rk(vm, fi, inst.b());
    let vc = rk(vm, fi, inst.c());
    match arith::arith_op(op, &vb, &vc) {
        ArithResult::Ok(v) => {
            vm.frames[fi].set_slot(a, v);
            Ok(())
        }
        ArithResult::NeedMetamethod => {
            let name = arith_mm_name(vm, op);
            match try_binary_mm(vm, &name, &vb, &vc)? {
                Some(v) => {
                    vm.frames[fi].set_slot(a, v);
                    Ok(())
                }
                None => Err(arith_type_error(vm, op, &vb, &vc)),
            }
        }
        ArithResult::Error(e) => Err(vm.located(e)),
    }
}

fn arith_mm_name(vm: &Vm, op: ArithOp) -> LuaStr {
    match op {
        ArithOp::Add => vm.mm.add.clone(),
        ArithOp::Sub => vm.mm.sub.clone(),
        ArithOp::Mul => vm.mm.mul.clone(),
        ArithOp::Div => vm.mm.div.clone(),
        ArithOp::IDiv => vm.mm.idiv.clone(),
        ArithOp::Mod => vm.mm.mod_.clone(),
        ArithOp::Pow => vm.mm.pow.clone(),
        ArithOp::BAnd => vm.mm.band.clone(),
        ArithOp::BOr => vm.mm.bor.clone(),
        ArithOp::BXor => vm.mm.bxor.clone(),
        ArithOp::Shl => vm.mm.shl.clone(),
        ArithOp::Shr => vm.mm.shr.clone(),
    }
}

/// Call `__name` on whichever operand has it, returning its first result.
fn try_binary_mm(
    vm: &mut Vm,
    name: &LuaStr,
    x: &Value,
    y: &Value,
) -> Result<Option<Value>, RuntimeError> {
    let handler =
        metamethod::get_metamethod(x, name).or_else(|| metamethod::get_metamethod(y, name));
    match handler {
        Some(h) => {
            let results = call_function(vm, h, vec![x.clone(), y.clone()])?;
            Ok(Some(results.into_iter().next().unwrap_or(Value::Nil)))
        }
        None => Ok(None),
    }
}

fn arith_type_error(vm: &Vm, op: ArithOp, vb: &Value, vc: &Value) -> RuntimeError {
    let bitwise = matches!(
        op,
        ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr
    );
    if bitwise {
        let offender = if coerce::to_integer(vb).is_none() { vb } else { vc };
        bitwise_type_error(vm, offender)
    } else {
        let offender = if coerce::to_number_value(vb).is_none() {
            vb
        } else {
            vc
        };
        vm.rterr(format!(
            "attempt to perform arithmetic on a {} value",
            offender.type_name()
        ))
    }
}

/// A float with a fractional part gets the conversion message; anything
/// non-numeric gets the type message.
fn bitwise_type_error(vm: &Vm, offender: &Value) -> RuntimeError {
    if coerce::to_number(offender).is_some() {
        vm.rterr("number has no integer representation")
    } else {
        vm.rterr(format!(
            "attempt to perform bitwise operation on a {} value",
            offender.type_name()
        ))
    }
}

fn compare_error(vm: &Vm, x: &Value, y: &Value) -> RuntimeError {
    let (tx, ty) = (x.type_name(), y.type_name());
    if tx == ty {
        vm.rterr(format!("attempt to compare two {tx} values"))
    } else {
        vm.rterr(format!("attempt to compare {tx} with {ty}"))
    }
}

/// `R(B) .. R(B+1) .. ... .. R(C)`, folded right to left so `__concat`
/// sees the same pairings as the reference interpreter.
fn concat_range(vm: &mut Vm, fi: usize, b: usize, c: usize) -> Result<Value, RuntimeError> {
    let mut vals: Vec<Value> = (b..=c).map(|i| vm.frames[fi].slot(i)).collect();
    while vals.len() > 1 {
        let y = vals.pop().unwrap_or(Value::Nil);
        let x = vals.pop().unwrap_or(Value::Nil);
        let joined = match (coerce::to_concat_bytes(&x), coerce::to_concat_bytes(&y)) {
            (Some(mut xb), Some(yb)) => {
                xb.extend_from_slice(&yb);
                Value::Str(LuaStr::new(xb))
            }
            _ => {
                let name = vm.mm.concat.clone();
                match try_binary_mm(vm, &name, &x, &y)? {
                    Some(v) => v,
                    None => {
                        let offender = if coerce::to_concat_bytes(&x).is_none() { &x } else { &y };
                        return Err(vm.rterr(format!(
                            "attempt to concatenate a {} value",
                            offender.type_name()
                        )));
                    }
                }
            }
        };
        vals.push(joined);
    }
    Ok(vals.pop().unwrap_or(Value::Nil))
}

fn for_number(vm: &Vm, fi: usize, slot: usize, msg: &str) -> Result<Value, RuntimeError> {
    let v = vm.frames[fi].slot(slot);
    coerce::to_number_value(&v).ok_or_else(|| vm.rterr(msg))
}
