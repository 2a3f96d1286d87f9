//! The base library: the handful of globals every chunk can see.

use std::cell::RefCell;
use std::rc::Rc;

use luno_core::error::RuntimeError;
use luno_core::table::Table;
use luno_core::value::{Closure, LuaStr, NativeCtx, NativeFn, NativeFunction, Value};

use crate::coerce;

/// Register the base library into the globals table.
pub fn open_base(globals: &Rc<RefCell<Table>>) {
    let mut g = globals.borrow_mut();
    set_native(&mut g, "print", native_print);
    set_native(&mut g, "type", native_type);
    set_native(&mut g, "tostring", native_tostring);
    set_native(&mut g, "tonumber", native_tonumber);
    set_native(&mut g, "ipairs", native_ipairs);
    set_native(&mut g, "pairs", native_pairs);
    set_native(&mut g, "next", native_next);
    set_native(&mut g, "error", native_error);
    set_native(&mut g, "pcall", native_pcall);
    set_native(&mut g, "select", native_select);
    set_native(&mut g, "rawget", native_rawget);
    set_native(&mut g, "rawset", native_rawset);
    set_native(&mut g, "rawequal", native_rawequal);
    set_native(&mut g, "rawlen", native_rawlen);
    set_native(&mut g, "assert", native_assert);
    set_native(&mut g, "setmetatable", native_setmetatable);
    set_native(&mut g, "getmetatable", native_getmetatable);
    g.raw_set_str(
        LuaStr::from_str("_VERSION"),
        Value::from_str_slice("Lua 5.3"),
    );
    g.raw_set_str(LuaStr::from_str("_G"), Value::Table(Rc::clone(globals)));
}

fn set_native(g: &mut Table, name: &'static str, func: NativeFn) {
    g.raw_set_str(LuaStr::from_str(name), native_value(name, func));
}

fn native_value(name: &'static str, func: NativeFn) -> Value {
    Value::Function(Rc::new(Closure::Native(NativeFunction { name, func })))
}

fn check_any(ctx: &NativeCtx<'_>, i: usize, who: &str) -> Result<Value, RuntimeError> {
    match ctx.args.get(i) {
        Some(v) => Ok(v.clone()),
        None => Err(RuntimeError::msg(format!(
            "bad argument #{} to '{}' (value expected)",
            i + 1,
            who
        ))),
    }
}

fn native_print(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let mut out = String::new();
    for (i, v) in ctx.args.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        out.push_str(&v.to_string());
    }
    println!("{out}");
    Ok(Vec::new())
}

fn native_type(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let v = check_any(ctx, 0, "type")?;
    Ok(vec![Value::from_str_slice(v.type_name())])
}

fn native_tostring(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let v = check_any(ctx, 0, "tostring")?;
    Ok(vec![Value::from_string(v.to_string())])
}

fn native_tonumber(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    if ctx.args.len() >= 2 && !ctx.arg(1).is_nil() {
        let base = coerce::to_integer(&ctx.arg(1)).ok_or_else(|| {
            RuntimeError::msg("bad argument #2 to 'tonumber' (number expected)")
        })?;
        if !(2..=36).contains(&base) {
            return Err(RuntimeError::msg(
                "bad argument #2 to 'tonumber' (base out of range)",
            ));
        }
        let s = match ctx.arg(0) {
            Value::Str(s) => s,
            v => {
                return Err(RuntimeError::msg(format!(
                    "bad argument #1 to 'tonumber' (string expected, got {})",
                    v.type_name()
                )))
            }
        };
        Ok(vec![
            parse_in_base(s.as_bytes(), base).map_or(Value::Nil, Value::Integer),
        ])
    } else {
        let v = check_any(ctx, 0, "tonumber")?;
        Ok(vec![coerce::to_number_value(&v).unwrap_or(Value::Nil)])
    }
}

/// Digits in an explicit base, with optional sign and surrounding
/// whitespace. Overflow wraps like the reference implementation.
fn parse_in_base(bytes: &[u8], base: i64) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    let t = s.trim_matches(|c: char| c.is_ascii_whitespace());
    let (neg, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    if digits.is_empty() {
        return None;
    }
    let mut acc: i64 = 0;
    for ch in digits.bytes() {
        let d = match ch {
            b'0'..=b'9' => (ch - b'0') as i64,
            b'a'..=b'z' => (ch - b'a') as i64 + 10,
            b'A'..=b'Z' => (ch - b'A') as i64 + 10,
            _ => return None,
        };
        if d >= base {
            return None;
        }
        acc = acc.wrapping_mul(base).wrapping_add(d);
    }
    Some(if neg { acc.wrapping_neg() } else { acc })
}

fn native_ipairs(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = check_any(ctx, 0, "ipairs")?;
    Ok(vec![
        native_value("ipairs_iterator", ipairs_iterator),
        t,
        Value::Integer(0),
    ])
}

/// Stateless `ipairs` step: reads `t[i + 1]` through `__index` like an
/// explicit indexing expression would.
fn ipairs_iterator(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = ctx.arg(0);
    let i = match ctx.arg(1) {
        Value::Integer(i) => i,
        _ => 0,
    };
    let next = i.wrapping_add(1);
    let v = ctx.vm.index_get(&t, &Value::Integer(next))?;
    if v.is_nil() {
        Ok(vec![Value::Nil])
    } else {
        Ok(vec![Value::Integer(next), v])
    }
}

fn native_pairs(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = check_any(ctx, 0, "pairs")?;
    Ok(vec![native_value("next", native_next), t, Value::Nil])
}

fn native_next(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = ctx.check_table(0, "next")?;
    let k = ctx.arg(1);
    let step = t.borrow().next(&k);
    match step {
        Ok(Some((k, v))) => Ok(vec![k, v]),
        Ok(None) => Ok(vec![Value::Nil]),
        Err(()) => Err(RuntimeError::msg("invalid key to 'next'")),
    }
}

fn native_error(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let level = if ctx.args.len() >= 2 {
        coerce::to_integer(&ctx.arg(1)).unwrap_or(1)
    } else {
        1
    };
    Err(raise(ctx, ctx.arg(0), level))
}

/// String messages at a positive level pick up the caller's
/// `source:line:` prefix; everything else is raised verbatim.
fn raise(ctx: &NativeCtx<'_>, v: Value, level: i64) -> RuntimeError {
    if level > 0 {
        if let Value::Str(s) = &v {
            let msg = match ctx.vm.where_prefix() {
                Some(p) => format!("{p} {s}"),
                None => s.to_string(),
            };
            return RuntimeError::Message(msg);
        }
    }
    RuntimeError::Value(v)
}

fn native_pcall(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    check_any(ctx, 0, "pcall")?;
    let mut args = std::mem::take(&mut ctx.args);
    let func = args.remove(0);
    match ctx.vm.call_value(func, args) {
        Ok(mut results) => {
            let mut out = Vec::with_capacity(results.len() + 1);
            out.push(Value::Boolean(true));
            out.append(&mut results);
            Ok(out)
        }
        Err(e) => Ok(vec![Value::Boolean(false), e.into_value()]),
    }
}

fn native_select(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let sel = check_any(ctx, 0, "select")?;
    let m = ctx.args.len() as i64 - 1;
    if let Value::Str(s) = &sel {
        if s.as_bytes() == b"#" {
            return Ok(vec![Value::Integer(m)]);
        }
    }
    let i = coerce::to_integer(&sel).ok_or_else(|| {
        RuntimeError::msg("bad argument #1 to 'select' (number expected)")
    })?;
    let start = if i < 0 { m + i + 1 } else { i };
    if start < 1 {
        return Err(RuntimeError::msg(
            "bad argument #1 to 'select' (index out of range)",
        ));
    }
    let mut out = Vec::new();
    let mut j = start;
    while j <= m {
        out.push(ctx.arg(j as usize));
        j += 1;
    }
    Ok(out)
}

fn native_rawget(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = ctx.check_table(0, "rawget")?;
    let k = ctx.arg(1);
    let v = t.borrow().raw_get(&k);
    Ok(vec![v])
}

fn native_rawset(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = ctx.check_table(0, "rawset")?;
    let k = ctx.arg(1);
    let v = ctx.arg(2);
    t.borrow_mut().raw_set(k, v).map_err(RuntimeError::msg)?;
    Ok(vec![ctx.arg(0)])
}

fn native_rawequal(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let a = check_any(ctx, 0, "rawequal")?;
    let b = check_any(ctx, 1, "rawequal")?;
    Ok(vec![Value::Boolean(a.raw_eq(&b))])
}

fn native_rawlen(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    match ctx.arg(0) {
        Value::Table(t) => Ok(vec![Value::Integer(t.borrow().length())]),
        Value::Str(s) => Ok(vec![Value::Integer(s.len() as i64)]),
        _ => Err(RuntimeError::msg(
            "bad argument #1 to 'rawlen' (table or string expected)",
        )),
    }
}

fn native_assert(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    check_any(ctx, 0, "assert")?;
    if ctx.arg(0).is_truthy() {
        return Ok(std::mem::take(&mut ctx.args));
    }
    let msg = if ctx.args.len() >= 2 {
        ctx.arg(1)
    } else {
        Value::from_str_slice("assertion failed!")
    };
    Err(raise(ctx, msg, 1))
}

fn native_setmetatable(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let t = ctx.check_table(0, "setmetatable")?;
    let new_mt = match ctx.arg(1) {
        Value::Nil => None,
        Value::Table(mt) => Some(mt),
        _ => {
            return Err(RuntimeError::msg(
                "bad argument #2 to 'setmetatable' (nil or table expected)",
            ))
        }
    };
    let guard_key = LuaStr::from_str("__metatable");
    let protected = match &t.borrow().metatable {
        Some(mt) => !mt.borrow().raw_get_str(&guard_key).is_nil(),
        None => false,
    };
    if protected {
        return Err(RuntimeError::msg("cannot change a protected metatable"));
    }
    t.borrow_mut().metatable = new_mt;
    Ok(vec![ctx.arg(0)])
}

fn native_getmetatable(ctx: &mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError> {
    let v = check_any(ctx, 0, "getmetatable")?;
    let t = match v.as_table() {
        Some(t) => Rc::clone(t),
        None => return Ok(vec![Value::Nil]),
    };
    let mt = t.borrow().metatable.clone();
    match mt {
        Some(mt) => {
            let guard = mt.borrow().raw_get_str(&LuaStr::from_str("__metatable"));
            if guard.is_nil() {
                Ok(vec![Value::Table(mt)])
            } else {
                Ok(vec![guard])
            }
        }
        None => Ok(vec![Value::Nil]),
    }
}
