//! VM state: the frame stack, globals, and the structural operations
//! (indexing, upvalue cells, frame push/unwind) the dispatch loop and
//! native functions are built from.

use std::cell::RefCell;
use std::rc::Rc;

use luno_compiler::compile;
use luno_core::chunk;
use luno_core::error::RuntimeError;
use luno_core::proto::Prototype;
use luno_core::table::Table;
use luno_core::value::{Closure, LuaClosure, Upvalue, Value, VmApi};

use crate::dispatch::call_function;
use crate::error::LuaError;
use crate::frame::Frame;
use crate::metamethod::{self, MetamethodNames};
use crate::stdlib;

/// `__index`/`__newindex` indirection bound before the loop error fires.
pub(crate) const MAX_META_CHAIN: usize = 2000;

/// The Lua virtual machine.
pub struct Vm {
    /// Active Lua call frames, innermost last.
    pub(crate) frames: Vec<Frame>,
    globals: Rc<RefCell<Table>>,
    /// Pre-built metamethod name strings.
    pub(crate) mm: MetamethodNames,
    /// Max Lua frame depth before "stack overflow".
    pub(crate) max_call_depth: usize,
    /// Nesting depth of re-entrant native/metamethod calls.
    pub(crate) native_depth: usize,
    pub(crate) max_native_depth: usize,
}

impl Vm {
    /// A fresh machine with the base library opened on its globals.
    pub fn new() -> Vm {
        let globals = Rc::new(RefCell::new(Table::new()));
        stdlib::open_base(&globals);
        Vm {
            frames: Vec::new(),
            globals,
            mm: MetamethodNames::new(),
            max_call_depth: 200,
            native_depth: 0,
            max_native_depth: 200,
        }
    }

    pub fn globals(&self) -> Rc<RefCell<Table>> {
        Rc::clone(&self.globals)
    }

    /// Instantiate a compiled chunk as a closure, binding upvalue 0
    /// (`_ENV`) to the globals table.
    pub fn load(&mut self, proto: Rc<Prototype>) -> Value {
        let mut upvalues = Vec::with_capacity(proto.upvalues.len());
        for i in 0..proto.upvalues.len() {
            let v = if i == 0 {
                Value::Table(Rc::clone(&self.globals))
            } else {
                Value::Nil
            };
            upvalues.push(Rc::new(RefCell::new(Upvalue::Closed(v))));
        }
        Value::Function(Rc::new(Closure::Lua(LuaClosure { proto, upvalues })))
    }

    /// Load source text or a precompiled binary chunk, sniffed by the
    /// signature byte.
    pub fn load_chunk(&mut self, bytes: &[u8], chunk_name: &str) -> Result<Value, LuaError> {
        let proto = if chunk::is_binary_chunk(bytes) {
            Rc::new(chunk::undump(bytes)?)
        } else {
            compile(bytes, chunk_name)?
        };
        Ok(self.load(proto))
    }

    /// Compile-free entry: instantiate and run a prototype to completion.
    pub fn execute(&mut self, proto: Rc<Prototype>) -> Result<Vec<Value>, RuntimeError> {
        let main = self.load(proto);
        self.call(main, Vec::new())
    }

    /// Call any callable value with the given arguments.
    pub fn call(&mut self, func: Value, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        call_function(self, func, args)
    }

    /// Build a runtime error carrying the current `source:line:` prefix.
    pub(crate) fn rterr(&self, msg: impl Into<String>) -> RuntimeError {
        let m = msg.into();
        match self.position_prefix() {
            Some(p) => RuntimeError::Message(format!("{p} {m}")),
            None => RuntimeError::Message(m),
        }
    }

    /// Prefix a fresh error from a helper that had no frame access.
    pub(crate) fn located(&self, e: RuntimeError) -> RuntimeError {
        match e {
            RuntimeError::Message(m) => self.rterr(m),
            other => other,
        }
    }

    fn position_prefix(&self) -> Option<String> {
        let f = self.frames.last()?;
        let line = f.proto.line_for(f.pc.saturating_sub(1));
        Some(format!(
            "{}:{}:",
            format_source_name(f.proto.source.as_bytes()),
            line
        ))
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

impl VmApi for Vm {
    fn globals(&self) -> Rc<RefCell<Table>> {
        Rc::clone(&self.globals)
    }

    fn call_value(&mut self, func: Value, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        call_function(self, func, args)
    }

    fn index_get(&mut self, table: &Value, key: &Value) -> Result<Value, RuntimeError> {
        table_get(self, table, key)
    }

    fn where_prefix(&self) -> Option<String> {
        self.position_prefix()
    }
}

/// Push a frame for a Lua closure. The frame records where its results
/// go in the caller (`ret_reg`/`want`).
pub(crate) fn push_frame(
    vm: &mut Vm,
    proto: Rc<Prototype>,
    upvalues: Vec<Rc<RefCell<Upvalue>>>,
    args: Vec<Value>,
    ret_reg: usize,
    want: i32,
) -> Result<(), RuntimeError> {
    if vm.frames.len() >= vm.max_call_depth {
        return Err(RuntimeError::StackOverflow);
    }
    vm.frames.push(Frame::new(proto, upvalues, args, ret_reg, want));
    Ok(())
}

/// Read through an upvalue cell.
pub(crate) fn upvalue_get(vm: &Vm, cell: &Rc<RefCell<Upvalue>>) -> Value {
    match &*cell.borrow() {
        Upvalue::Open { frame, slot } => vm.frames[*frame].slot(*slot),
        Upvalue::Closed(v) => v.clone(),
    }
}

/// Write through an upvalue cell.
pub(crate) fn upvalue_set(vm: &mut Vm, cell: &Rc<RefCell<Upvalue>>, v: Value) {
    let open = match &*cell.borrow() {
        Upvalue::Open { frame, slot } => Some((*frame, *slot)),
        Upvalue::Closed(_) => None,
    };
    match open {
        Some((frame, slot)) => vm.frames[frame].set_slot(slot, v),
        None => *cell.borrow_mut() = Upvalue::Closed(v),
    }
}

/// The open cell for a register, shared by every closure capturing it.
pub(crate) fn find_or_create_upvalue(
    vm: &mut Vm,
    fi: usize,
    slot: usize,
) -> Rc<RefCell<Upvalue>> {
    if let Some((_, cell)) = vm.frames[fi].open_upvals.iter().find(|(s, _)| *s == slot) {
        return Rc::clone(cell);
    }
    let cell = Rc::new(RefCell::new(Upvalue::Open { frame: fi, slot }));
    vm.frames[fi].open_upvals.push((slot, Rc::clone(&cell)));
    cell
}

/// Close every open cell of `fi` at or above `from_slot`: the cell takes
/// ownership of the register's current value.
pub(crate) fn close_upvalues_from(vm: &mut Vm, fi: usize, from_slot: usize) {
    let mut closing = Vec::new();
    vm.frames[fi].open_upvals.retain(|(slot, cell)| {
        if *slot >= from_slot {
            closing.push((*slot, Rc::clone(cell)));
            false
        } else {
            true
        }
    });
    for (slot, cell) in closing {
        let v = vm.frames[fi].slot(slot);
        *cell.borrow_mut() = Upvalue::Closed(v);
    }
}

/// Close all of a frame's open cells, then drop the frame. Used both on
/// return and when unwinding after an error.
pub(crate) fn pop_frame(vm: &mut Vm, fi: usize) -> Frame {
    close_upvalues_from(vm, fi, 0);
    match vm.frames.pop() {
        Some(f) => f,
        None => unreachable!("pop_frame on empty frame stack"),
    }
}

/// Unwind frames down to `depth`, closing their upvalues. Keeps cells
/// sound when an error aborts nested calls.
pub(crate) fn unwind_to(vm: &mut Vm, depth: usize) {
    while vm.frames.len() > depth {
        let fi = vm.frames.len() - 1;
        pop_frame(vm, fi);
    }
}

/// `t[k]` with the `__index` chain: raw hit wins; a table field
/// re-indexes (bounded), a function field is called as `(t, k)`.
pub(crate) fn table_get(vm: &mut Vm, t: &Value, k: &Value) -> Result<Value, RuntimeError> {
    let mut cur = t.clone();
    for _ in 0..MAX_META_CHAIN {
        if let Value::Table(tbl) = &cur {
            let raw = tbl.borrow().raw_get(k);
            if !raw.is_nil() {
                return Ok(raw);
            }
            let handler = match metamethod::get_metamethod(&cur, &vm.mm.index) {
                Some(h) => h,
                None => return Ok(Value::Nil),
            };
            if let Value::Function(_) = handler {
                let results = call_function(vm, handler, vec![cur, k.clone()])?;
                return Ok(results.into_iter().next().unwrap_or(Value::Nil));
            }
            cur = handler;
        } else {
            return Err(vm.rterr(format!("attempt to index a {} value", cur.type_name())));
        }
    }
    Err(vm.rterr("'__index' chain too long; possible loop"))
}

/// `t[k] = v` with the `__newindex` chain; only consulted when the raw
/// key is absent.
pub(crate) fn table_set(vm: &mut Vm, t: &Value, k: Value, v: Value) -> Result<(), RuntimeError> {
    let mut cur = t.clone();
    for _ in 0..MAX_META_CHAIN {
        if let Value::Table(tbl) = &cur {
            let present = !tbl.borrow().raw_get(&k).is_nil();
            let handler = if present {
                None
            } else {
                metamethod::get_metamethod(&cur, &vm.mm.newindex)
            };
            match handler {
                None => {
                    return tbl
                        .borrow_mut()
                        .raw_set(k, v)
                        .map_err(|m| vm.rterr(m));
                }
                Some(Value::Function(f)) => {
                    call_function(vm, Value::Function(f), vec![cur, k, v])?;
                    return Ok(());
                }
                Some(next) => cur = next,
            }
        } else {
            return Err(vm.rterr(format!("attempt to index a {} value", cur.type_name())));
        }
    }
    Err(vm.rterr("'__newindex' chain too long; possible loop"))
}

/// Chunk-name display form: `=name` exact, `@file` a filename, anything
/// else shown as `[string "..."]` with its first line.
pub(crate) fn format_source_name(name: &[u8]) -> String {
    const ID_SIZE: usize = 60;
    let text = String::from_utf8_lossy(name);
    if let Some(s) = text.strip_prefix('=') {
        let mut s = s.to_string();
        s.truncate(ID_SIZE - 1);
        s
    } else if let Some(s) = text.strip_prefix('@') {
        if s.len() >= ID_SIZE {
            format!("...{}", &s[s.len() - (ID_SIZE - 4)..])
        } else {
            s.to_string()
        }
    } else {
        let first_line = text.lines().next().unwrap_or("");
        let max_content = ID_SIZE - 15;
        if first_line.len() > max_content || text.contains('\n') {
            let end = first_line.len().min(max_content);
            format!("[string \"{}...\"]", &first_line[..end])
        } else {
            format!("[string \"{first_line}\"]")
        }
    }
}
