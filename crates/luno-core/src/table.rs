//! Hybrid array+hash table with an optional metatable.
//!
//! Dense integer keys from 1 live in the array part; everything else lives
//! in an insertion-ordered hash part. Integer and float keys are distinct:
//! `t[1]` and `t[1.0]` address different slots.

use crate::value::{Closure, LuaStr, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A key in the hash part of a table. Nil and NaN are rejected before a
/// key is ever built.
#[derive(Clone)]
pub enum TableKey {
    Boolean(bool),
    Integer(i64),
    /// Float key, stored as raw bits for hashing. Never NaN.
    Float(u64),
    Str(LuaStr),
    /// Identity key: the table object itself.
    Table(Rc<RefCell<Table>>),
    /// Identity key: the closure object itself.
    Function(Rc<Closure>),
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableKey::Boolean(a), TableKey::Boolean(b)) => a == b,
            (TableKey::Integer(a), TableKey::Integer(b)) => a == b,
            (TableKey::Float(a), TableKey::Float(b)) => a == b,
            (TableKey::Str(a), TableKey::Str(b)) => a == b,
            (TableKey::Table(a), TableKey::Table(b)) => Rc::ptr_eq(a, b),
            (TableKey::Function(a), TableKey::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for TableKey {}

impl std::hash::Hash for TableKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            TableKey::Boolean(b) => {
                state.write_u8(0);
                state.write_u8(*b as u8);
            }
            TableKey::Integer(i) => {
                state.write_u8(1);
                state.write_i64(*i);
            }
            TableKey::Float(bits) => {
                state.write_u8(2);
                state.write_u64(*bits);
            }
            TableKey::Str(s) => {
                state.write_u8(3);
                state.write_u32(s.hash());
            }
            TableKey::Table(t) => {
                state.write_u8(4);
                state.write_usize(Rc::as_ptr(t) as usize);
            }
            TableKey::Function(f) => {
                state.write_u8(5);
                state.write_usize(Rc::as_ptr(f) as usize);
            }
        }
    }
}

/// Build a hash key from a value. `Err` carries the raw-set error message.
pub fn value_to_key(v: &Value) -> Result<TableKey, &'static str> {
    match v {
        Value::Nil => Err("table index is nil"),
        Value::Boolean(b) => Ok(TableKey::Boolean(*b)),
        Value::Integer(i) => Ok(TableKey::Integer(*i)),
        Value::Float(f) => {
            if f.is_nan() {
                Err("table index is NaN")
            } else {
                Ok(TableKey::Float(f.to_bits()))
            }
        }
        Value::Str(s) => Ok(TableKey::Str(s.clone())),
        Value::Table(t) => Ok(TableKey::Table(Rc::clone(t))),
        Value::Function(f) => Ok(TableKey::Function(Rc::clone(f))),
    }
}

fn key_to_value(k: &TableKey) -> Value {
    match k {
        TableKey::Boolean(b) => Value::Boolean(*b),
        TableKey::Integer(i) => Value::Integer(*i),
        TableKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
        TableKey::Str(s) => Value::Str(s.clone()),
        TableKey::Table(t) => Value::Table(Rc::clone(t)),
        TableKey::Function(f) => Value::Function(Rc::clone(f)),
    }
}

/// A Lua table: hybrid array + hash map plus an optional metatable.
pub struct Table {
    /// Array part (1-indexed: array[0] corresponds to key 1).
    array: Vec<Value>,
    /// Hash part for everything else (insertion-order preserving). Entries
    /// erased during iteration become nil tombstones so `next` stays stable.
    hash: IndexMap<TableKey, Value>,
    /// Metatable, shared by reference.
    pub metatable: Option<Rc<RefCell<Table>>>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Table {
        Table {
            array: Vec::new(),
            hash: IndexMap::new(),
            metatable: None,
        }
    }

    /// Create a new empty table with size hints (from NEWTABLE operands).
    pub fn with_capacity(narr: usize, nrec: usize) -> Table {
        Table {
            array: Vec::with_capacity(narr),
            hash: IndexMap::with_capacity(nrec),
            metatable: None,
        }
    }

    /// Raw get: no metamethods. Missing keys read as nil.
    pub fn raw_get(&self, key: &Value) -> Value {
        if let Value::Integer(i) = key {
            return self.raw_geti(*i);
        }
        match value_to_key(key) {
            Ok(tk) => self.hash.get(&tk).cloned().unwrap_or(Value::Nil),
            Err(_) => Value::Nil,
        }
    }

    /// Store into the hash part. Nil overwrites an existing key with a
    /// tombstone but is never recorded under an absent one.
    fn hash_put(&mut self, tk: TableKey, value: Value) {
        if !value.is_nil() || self.hash.contains_key(&tk) {
            self.hash.insert(tk, value);
        }
    }

    /// Raw set: no metamethods. Assigning nil erases the key.
    pub fn raw_set(&mut self, key: Value, value: Value) -> Result<(), &'static str> {
        if let Value::Integer(i) = key {
            self.raw_seti(i, value);
            return Ok(());
        }
        let tk = value_to_key(&key)?;
        self.hash_put(tk, value);
        Ok(())
    }

    /// Fast integer get (1-indexed).
    pub fn raw_geti(&self, key: i64) -> Value {
        if key >= 1 && (key as usize) <= self.array.len() {
            self.array[(key - 1) as usize].clone()
        } else {
            self.hash
                .get(&TableKey::Integer(key))
                .cloned()
                .unwrap_or(Value::Nil)
        }
    }

    /// Fast integer set (1-indexed). Appending at `len+1` grows the array
    /// part and pulls any now-contiguous hash keys in after it.
    pub fn raw_seti(&mut self, key: i64, value: Value) {
        let len = self.array.len() as i64;
        if key >= 1 && key <= len {
            self.array[key as usize - 1] = value;
        } else if key == len + 1 && !value.is_nil() {
            self.array.push(value);
            self.migrate_hash_to_array();
        } else {
            self.hash_put(TableKey::Integer(key), value);
        }
    }

    /// Fast string-key get.
    pub fn raw_get_str(&self, key: &LuaStr) -> Value {
        self.hash
            .get(&TableKey::Str(key.clone()))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Fast string-key set.
    pub fn raw_set_str(&mut self, key: LuaStr, value: Value) {
        self.hash_put(TableKey::Str(key), value);
    }

    /// The `#` border: largest n in the array part with t[n] non-nil and
    /// t[n+1] nil. 0 when the array part is empty.
    pub fn length(&self) -> i64 {
        match self.array.last() {
            None => 0,
            Some(v) if !v.is_nil() => self.array.len() as i64,
            // The array part has a trailing hole; any border inside it works.
            _ => self.array.partition_point(|v| !v.is_nil()) as i64,
        }
    }

    /// The next key-value pair after `key`, for `next`/`pairs` iteration.
    /// `Ok(None)` ends iteration; `Err(())` means the key is not in the
    /// table (the caller reports "invalid key to 'next'").
    #[allow(clippy::result_unit_err)]
    pub fn next(&self, key: &Value) -> Result<Option<(Value, Value)>, ()> {
        if key.is_nil() {
            return Ok(self.first_entry(0));
        }
        if let Value::Integer(i) = key {
            let i = *i;
            if i >= 1 && (i as usize) <= self.array.len() {
                for j in (i as usize)..self.array.len() {
                    if !self.array[j].is_nil() {
                        return Ok(Some((Value::Integer((j + 1) as i64), self.array[j].clone())));
                    }
                }
                return Ok(self.first_hash_entry(0));
            }
        }
        let tk = match value_to_key(key) {
            Ok(tk) => tk,
            Err(_) => return Err(()),
        };
        match self.hash.get_index_of(&tk) {
            Some(pos) => Ok(self.first_hash_entry(pos + 1)),
            None => Err(()),
        }
    }

    /// First live entry at or after array index `from` (0-based), falling
    /// through to the hash part.
    fn first_entry(&self, from: usize) -> Option<(Value, Value)> {
        for (i, v) in self.array.iter().enumerate().skip(from) {
            if !v.is_nil() {
                return Some((Value::Integer((i + 1) as i64), v.clone()));
            }
        }
        self.first_hash_entry(0)
    }

    /// First live hash entry at or after slot `pos`, skipping tombstones.
    fn first_hash_entry(&self, pos: usize) -> Option<(Value, Value)> {
        for (k, v) in self.hash.iter().skip(pos) {
            if !v.is_nil() {
                return Some((key_to_value(k), v.clone()));
            }
        }
        None
    }

    /// Move consecutive integer entries from hash into the array part.
    fn migrate_hash_to_array(&mut self) {
        loop {
            let next_idx = self.array.len() as i64 + 1;
            match self.hash.shift_remove(&TableKey::Integer(next_idx)) {
                Some(v) if !v.is_nil() => self.array.push(v),
                _ => break,
            }
        }
    }
}

impl Default for Table {
    fn default() -> Table {
        Table::new()
    }
}
