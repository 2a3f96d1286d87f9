//! Implicit conversions: string-to-number for arithmetic, number-to-string
//! for concatenation, and exact integer narrowing.

use luno_core::number::{float_to_integer, parse_float, parse_integer};
use luno_core::value::{float_to_lua_string, Value};

/// Coerce to a number preserving the subtype: integers stay integers,
/// numeric strings parse the way the lexer would (`"0x10"` is 16,
/// `"1e2"` is 100.0).
pub fn to_number_value(v: &Value) -> Option<Value> {
    match v {
        Value::Integer(_) | Value::Float(_) => Some(v.clone()),
        Value::Str(s) => {
            let text = s.as_utf8()?;
            if let Some(i) = parse_integer(text) {
                Some(Value::Integer(i))
            } else {
                parse_float(text).map(Value::Float)
            }
        }
        _ => None,
    }
}

/// Coerce to f64.
pub fn to_number(v: &Value) -> Option<f64> {
    match to_number_value(v)? {
        Value::Integer(i) => Some(i as f64),
        Value::Float(f) => Some(f),
        _ => None,
    }
}

/// Coerce to i64; floats and float-shaped strings must have an exact
/// integer representation.
pub fn to_integer(v: &Value) -> Option<i64> {
    match to_number_value(v)? {
        Value::Integer(i) => Some(i),
        Value::Float(f) => float_to_integer(f),
        _ => None,
    }
}

/// The bytes a value contributes to `..`: strings as-is, numbers
/// rendered the way `tostring` renders them. Everything else is not
/// concatenable without a metamethod.
pub fn to_concat_bytes(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        Value::Integer(i) => Some(i.to_string().into_bytes()),
        Value::Float(f) => Some(float_to_lua_string(*f).into_bytes()),
        _ => None,
    }
}
