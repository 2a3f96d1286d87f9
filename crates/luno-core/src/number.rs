//! Numeral parsing and integer/float conversion shared by the lexer and
//! the runtime string-to-number coercion.

/// Parse an integer literal: decimal, or hex with 64-bit wraparound
/// (`0xFFFFFFFFFFFFFFFF` is -1). Leading/trailing whitespace is accepted,
/// matching `tonumber`.
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        let mut v: u64 = 0;
        for c in hex.bytes() {
            let d = (c as char).to_digit(16)? as u64;
            v = v.wrapping_mul(16).wrapping_add(d);
        }
        let v = v as i64;
        return Some(if neg { v.wrapping_neg() } else { v });
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let v: u64 = digits.parse().ok()?;
    if neg {
        // i64::MIN is representable even though its magnitude is not.
        if v > (i64::MAX as u64) + 1 {
            return None;
        }
        Some((v as i64).wrapping_neg())
    } else {
        if v > i64::MAX as u64 {
            return None;
        }
        Some(v as i64)
    }
}

/// Parse a float literal, including hex floats (`0x1p4` is 16.0).
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let v = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        parse_hex_float(hex)?
    } else {
        // Reject the textual forms Rust accepts but Lua's lexer does not.
        if body.is_empty() || body.contains(['i', 'n', 'N', 'I']) {
            return None;
        }
        body.parse::<f64>().ok()?
    };
    Some(if neg { -v } else { v })
}

/// Hex float body after the `0x` prefix: hex digits with an optional
/// point, times two to an optional decimal `p` exponent.
fn parse_hex_float(s: &str) -> Option<f64> {
    let (mantissa_part, exp_part) = match s.split_once(['p', 'P']) {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };
    let (int_part, frac_part) = match mantissa_part.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_part, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut v = 0.0f64;
    for c in int_part.bytes() {
        v = v * 16.0 + (c as char).to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.bytes() {
        v += (c as char).to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    if let Some(e) = exp_part {
        let exp: i32 = e.parse().ok()?;
        v *= 2.0f64.powi(exp);
    }
    Some(v)
}

/// Integer floor division; rounds toward negative infinity.
/// Caller guarantees `b != 0`.
pub fn int_floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Integer modulo with the sign of the divisor: `a - (a // b) * b`.
/// Caller guarantees `b != 0`.
pub fn int_mod(a: i64, b: i64) -> i64 {
    a.wrapping_sub(int_floor_div(a, b).wrapping_mul(b))
}

pub fn float_floor_div(a: f64, b: f64) -> f64 {
    (a / b).floor()
}

/// Float modulo with the sign of the divisor. An infinite divisor
/// returns `a` when the signs agree and `b` when they differ.
pub fn float_mod(a: f64, b: f64) -> f64 {
    if (a > 0.0 && b == f64::INFINITY) || (a < 0.0 && b == f64::NEG_INFINITY) {
        return a;
    }
    if (a > 0.0 && b == f64::NEG_INFINITY) || (a < 0.0 && b == f64::INFINITY) {
        return b;
    }
    a - (a / b).floor() * b
}

/// Logical left shift. Negative counts shift right; a count of 64 or
/// more in either direction produces 0.
pub fn shift_left(a: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((a as u64) << n) as i64
    } else {
        ((a as u64) >> -n) as i64
    }
}

/// Logical right shift; the mirror of `shift_left`.
pub fn shift_right(a: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((a as u64) >> n) as i64
    } else {
        ((a as u64) << -n) as i64
    }
}

/// Pack a count into the "floating point byte" format used by NEWTABLE
/// size hints: an exponent in the high bits and a 3-bit mantissa.
pub fn int_to_fb(mut x: u32) -> u32 {
    let mut e = 0;
    if x < 8 {
        return x;
    }
    while x >= 8 << 4 {
        x = (x + 0xf) >> 4;
        e += 4;
    }
    while x >= 8 << 1 {
        x = (x + 1) >> 1;
        e += 1;
    }
    ((e + 1) << 3) | (x - 8)
}

/// Unpack a "floating point byte" back into a count.
pub fn fb_to_int(x: u32) -> u32 {
    if x < 8 {
        x
    } else {
        ((x & 7) + 8) << ((x >> 3) - 1)
    }
}

/// Exact float-to-integer conversion; `None` when the float has a
/// fractional part or is out of the 64-bit range.
pub fn float_to_integer(f: f64) -> Option<i64> {
    // 2^63 in f64; the upper bound is exclusive because 2^63 itself
    // rounds into range when cast.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f >= -TWO_POW_63 && f < TWO_POW_63 && f.trunc() == f {
        Some(f as i64)
    } else {
        None
    }
}
