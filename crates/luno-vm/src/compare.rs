//! Equality and ordering with Lua 5.3 semantics.

use luno_core::value::Value;

/// Outcome of an ordering comparison.
pub enum CompareResult {
    Ok(bool),
    /// No built-in ordering for this pair; try `__lt`/`__le`.
    NeedMetamethod,
}

/// Primitive equality. Returns `(equal, try_metamethod)`: the second
/// flag is set when both operands are distinct tables, the only case
/// where `__eq` is consulted.
pub fn lua_eq(a: &Value, b: &Value) -> (bool, bool) {
    if a.raw_eq(b) {
        return (true, false);
    }
    if matches!((a, b), (Value::Table(_), Value::Table(_))) {
        return (false, true);
    }
    (false, false)
}

/// Less-than: numbers by value, strings byte-wise lexicographic.
pub fn lua_lt(a: &Value, b: &Value) -> CompareResult {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => CompareResult::Ok(x < y),
        (Value::Float(x), Value::Float(y)) => CompareResult::Ok(x < y),
        (Value::Integer(x), Value::Float(y)) => CompareResult::Ok((*x as f64) < *y),
        (Value::Float(x), Value::Integer(y)) => CompareResult::Ok(*x < (*y as f64)),
        (Value::Str(x), Value::Str(y)) => CompareResult::Ok(x.as_bytes() < y.as_bytes()),
        _ => CompareResult::NeedMetamethod,
    }
}

/// Less-than-or-equal; same pairs as [`lua_lt`].
pub fn lua_le(a: &Value, b: &Value) -> CompareResult {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => CompareResult::Ok(x <= y),
        (Value::Float(x), Value::Float(y)) => CompareResult::Ok(x <= y),
        (Value::Integer(x), Value::Float(y)) => CompareResult::Ok((*x as f64) <= *y),
        (Value::Float(x), Value::Integer(y)) => CompareResult::Ok(*x <= (*y as f64)),
        (Value::Str(x), Value::Str(y)) => CompareResult::Ok(x.as_bytes() <= y.as_bytes()),
        _ => CompareResult::NeedMetamethod,
    }
}
