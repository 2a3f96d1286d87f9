//! Dynamic values: the tagged union at the heart of the interpreter.
//!
//! Integers and floats are distinct tags (`1` and `1.0` are different table
//! keys) but compare equal as values when mathematically equal. Strings are
//! immutable byte sequences with a precomputed hash. Tables and closures are
//! reference types; identity is `Rc` pointer identity.

use crate::error::RuntimeError;
use crate::proto::Prototype;
use crate::table::Table;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// PUC Lua compatible string hash (the luaS_hash algorithm).
///
/// Long strings are hashed by sampling every `step` bytes from the end.
pub fn lua_hash(bytes: &[u8]) -> u32 {
    let len = bytes.len();
    let mut h = len as u32;
    let step = (len >> 5) + 1;
    let mut i = len;
    while i >= step {
        h ^= (h << 5).wrapping_add(h >> 2).wrapping_add(bytes[i - 1] as u32);
        i -= step;
    }
    h
}

/// An immutable Lua string: shared byte payload plus its hash.
///
/// Cloning is an `Rc` bump; hashing never rescans the bytes.
#[derive(Clone)]
pub struct LuaStr(Rc<StrPayload>);

struct StrPayload {
    bytes: Vec<u8>,
    hash: u32,
}

impl LuaStr {
    pub fn new(bytes: Vec<u8>) -> LuaStr {
        let hash = lua_hash(&bytes);
        LuaStr(Rc::new(StrPayload { bytes, hash }))
    }

    pub fn from_str(s: &str) -> LuaStr {
        LuaStr::new(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    pub fn len(&self) -> usize {
        self.0.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }

    pub fn hash(&self) -> u32 {
        self.0.hash
    }

    /// The bytes as UTF-8, substituting replacement characters where needed.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.bytes).into_owned()
    }

    /// The bytes as UTF-8, or `None` for binary data.
    pub fn as_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.0.bytes).ok()
    }
}

impl Default for LuaStr {
    fn default() -> LuaStr {
        LuaStr::from_str("")
    }
}

impl PartialEq for LuaStr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash && self.0.bytes == other.0.bytes)
    }
}

impl Eq for LuaStr {}

impl std::hash::Hash for LuaStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.hash);
    }
}

impl fmt::Debug for LuaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_utf8() {
            Some(s) => write!(f, "{s:?}"),
            None => write!(f, "<binary string len={}>", self.len()),
        }
    }
}

impl fmt::Display for LuaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0.bytes))
    }
}

impl From<&str> for LuaStr {
    fn from(s: &str) -> LuaStr {
        LuaStr::from_str(s)
    }
}

impl From<String> for LuaStr {
    fn from(s: String) -> LuaStr {
        LuaStr::new(s.into_bytes())
    }
}

/// A dynamically typed value.
#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(LuaStr),
    Table(Rc<RefCell<Table>>),
    Function(Rc<Closure>),
}

impl Value {
    pub fn from_string(s: String) -> Value {
        Value::Str(LuaStr::from(s))
    }

    pub fn from_str_slice(s: &str) -> Value {
        Value::Str(LuaStr::from(s))
    }

    /// Wrap a fresh table.
    pub fn new_table(t: Table) -> Value {
        Value::Table(Rc::new(RefCell::new(t)))
    }

    /// Type name as error messages spell it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
        }
    }

    /// Lua truthiness: only nil and false are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&LuaStr> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Rc<RefCell<Table>>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Closure>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Raw equality: no metamethods. Integer/float pairs compare by
    /// mathematical value; reference types by identity.
    pub fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::Nil
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.raw_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", float_to_lua_string(*x)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
        }
    }
}

impl fmt::Display for Value {
    /// The `tostring` rendering: `%d` for integers, `%.14g` for floats,
    /// identity addresses for reference types.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", float_to_lua_string(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
        }
    }
}

/// Format a float the way Lua renders it: `%.14g`, with a `.0` suffix
/// when the result would read as an integer.
pub fn float_to_lua_string(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = fmt_g14(v);
    if s.bytes().all(|b| b == b'-' || b.is_ascii_digit()) {
        s.push_str(".0");
    }
    s
}

/// `%.14g` for finite values.
fn fmt_g14(v: f64) -> String {
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    // 14 significant digits in scientific form; the exponent after rounding
    // decides between %e-style and %f-style output.
    let sci = format!("{v:.13e}");
    let (mantissa, exp) = match sci.split_once('e') {
        Some(pair) => pair,
        None => return sci,
    };
    let exp: i32 = match exp.parse() {
        Ok(e) => e,
        Err(_) => return sci,
    };
    if exp < -4 || exp >= 14 {
        let m = mantissa.trim_end_matches('0').trim_end_matches('.');
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{m}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (13 - exp).max(0) as usize;
        let s = format!("{v:.decimals$}");
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

/// A callable value: a compiled function with captured upvalues, or a
/// native function.
pub enum Closure {
    Lua(LuaClosure),
    Native(NativeFunction),
}

impl Closure {
    pub fn name_for_errors(&self) -> &str {
        match self {
            Closure::Lua(_) => "?",
            Closure::Native(n) => n.name,
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Closure::Lua(c) => write!(f, "<function {}>", c.proto.source),
            Closure::Native(n) => write!(f, "<native {}>", n.name),
        }
    }
}

/// A closure over a compiled prototype.
pub struct LuaClosure {
    pub proto: Rc<Prototype>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

/// A native (host) function callable from Lua code.
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

/// Native function signature. Arguments arrive through the context; results
/// are returned as a vector.
pub type NativeFn = fn(&mut NativeCtx<'_>) -> Result<Vec<Value>, RuntimeError>;

/// What a native function sees: its arguments and a narrow handle back
/// into the running machine.
pub struct NativeCtx<'a> {
    pub args: Vec<Value>,
    pub vm: &'a mut dyn VmApi,
}

impl<'a> NativeCtx<'a> {
    /// Argument by position, nil when absent.
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or(Value::Nil)
    }

    /// Argument that must be present and of the right type.
    pub fn check_table(&self, i: usize, who: &str) -> Result<Rc<RefCell<Table>>, RuntimeError> {
        match self.args.get(i) {
            Some(Value::Table(t)) => Ok(Rc::clone(t)),
            Some(v) => Err(RuntimeError::msg(format!(
                "bad argument #{} to '{who}' (table expected, got {})",
                i + 1,
                v.type_name()
            ))),
            None => Err(RuntimeError::msg(format!(
                "bad argument #{} to '{who}' (table expected, got no value)",
                i + 1
            ))),
        }
    }
}

/// The slice of machine behavior native functions may reach: the globals
/// table, re-entrant calls, indexing, and the current source position.
pub trait VmApi {
    fn globals(&self) -> Rc<RefCell<Table>>;

    /// Call a Lua or native function value with the given arguments.
    fn call_value(&mut self, func: Value, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError>;

    /// Read `table[key]` the way the indexing expression does, with
    /// `__index` fallbacks.
    fn index_get(&mut self, table: &Value, key: &Value) -> Result<Value, RuntimeError>;

    /// `source:line:` of the innermost bytecode frame, for error prefixes.
    fn where_prefix(&self) -> Option<String>;
}

/// An upvalue cell. Open cells point into a live frame's register; closed
/// cells own their value. Every closure captured from the same declaration
/// shares one cell, so writes are visible across siblings before and after
/// the close transition.
#[derive(Debug)]
pub enum Upvalue {
    Open { frame: usize, slot: usize },
    Closed(Value),
}
