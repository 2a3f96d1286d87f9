//! Arithmetic and bitwise operations with Lua 5.3 semantics.
//!
//! Integers wrap on overflow. `/` and `^` always produce floats; the
//! other operators stay integral when both operands are integers.

use crate::coerce;
use luno_core::error::RuntimeError;
use luno_core::number::{
    float_floor_div, float_mod, int_floor_div, int_mod, shift_left, shift_right,
};
use luno_core::value::Value;

/// Outcome of an operation that may fall back to a metamethod.
pub enum ArithResult {
    Ok(Value),
    /// Type mismatch; the caller should try a metamethod.
    NeedMetamethod,
    /// Hard error (integer division by zero), no fallback.
    Error(RuntimeError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

/// Binary arithmetic. Strings coerce through the number lexer first;
/// anything else reports `NeedMetamethod`.
pub fn arith_op(op: ArithOp, a: &Value, b: &Value) -> ArithResult {
    match op {
        ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr => {
            bitwise_op(op, a, b)
        }
        ArithOp::Div | ArithOp::Pow => match (coerce::to_number(a), coerce::to_number(b)) {
            (Some(x), Some(y)) => ArithResult::Ok(Value::Float(float_arith(op, x, y))),
            _ => ArithResult::NeedMetamethod,
        },
        _ => match (coerce::to_number_value(a), coerce::to_number_value(b)) {
            (Some(Value::Integer(x)), Some(Value::Integer(y))) => match int_arith(op, x, y) {
                Ok(v) => ArithResult::Ok(v),
                Err(e) => ArithResult::Error(e),
            },
            (Some(x), Some(y)) => {
                let (fx, fy) = (number_as_f64(&x), number_as_f64(&y));
                ArithResult::Ok(Value::Float(float_arith(op, fx, fy)))
            }
            _ => ArithResult::NeedMetamethod,
        },
    }
}

/// Bitwise operators need exact integer operands.
pub fn bitwise_op(op: ArithOp, a: &Value, b: &Value) -> ArithResult {
    match (coerce::to_integer(a), coerce::to_integer(b)) {
        (Some(x), Some(y)) => {
            let r = match op {
                ArithOp::BAnd => x & y,
                ArithOp::BOr => x | y,
                ArithOp::BXor => x ^ y,
                ArithOp::Shl => shift_left(x, y),
                ArithOp::Shr => shift_right(x, y),
                _ => return ArithResult::NeedMetamethod,
            };
            ArithResult::Ok(Value::Integer(r))
        }
        _ => ArithResult::NeedMetamethod,
    }
}

fn int_arith(op: ArithOp, x: i64, y: i64) -> Result<Value, RuntimeError> {
    let r = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::IDiv => {
            if y == 0 {
                return Err(RuntimeError::msg("attempt to perform 'n//0'"));
            }
            int_floor_div(x, y)
        }
        ArithOp::Mod => {
            if y == 0 {
                return Err(RuntimeError::msg("attempt to perform 'n%0'"));
            }
            int_mod(x, y)
        }
        _ => unreachable!("float-only operator in integer path"),
    };
    Ok(Value::Integer(r))
}

fn float_arith(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Pow => x.powf(y),
        // Division and modulo by zero follow IEEE 754 here.
        ArithOp::IDiv => float_floor_div(x, y),
        ArithOp::Mod => float_mod(x, y),
        _ => unreachable!("bitwise operator in float path"),
    }
}

fn number_as_f64(v: &Value) -> f64 {
    match v {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        _ => unreachable!("coerced value is numeric"),
    }
}

/// Unary minus. Integers wrap.
pub fn arith_unm(v: &Value) -> ArithResult {
    match coerce::to_number_value(v) {
        Some(Value::Integer(i)) => ArithResult::Ok(Value::Integer(i.wrapping_neg())),
        Some(Value::Float(f)) => ArithResult::Ok(Value::Float(-f)),
        _ => ArithResult::NeedMetamethod,
    }
}

/// Bitwise NOT.
pub fn arith_bnot(v: &Value) -> ArithResult {
    match coerce::to_integer(v) {
        Some(i) => ArithResult::Ok(Value::Integer(!i)),
        None => ArithResult::NeedMetamethod,
    }
}
