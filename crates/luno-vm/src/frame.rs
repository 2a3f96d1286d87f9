//! Call frames: one per active Lua function.

use std::cell::RefCell;
use std::rc::Rc;

use luno_core::proto::Prototype;
use luno_core::value::{Upvalue, Value};

/// Working-area slots allocated past `max_stack_size`, so open result
/// sequences rarely reallocate.
pub const EXTRA_SLOTS: usize = 20;

/// A call frame on the VM call stack. Registers live in `slots`; the
/// region past the last fixed register holds open (multi-value) result
/// sequences, whose live extent is `top`.
pub struct Frame {
    pub proto: Rc<Prototype>,
    /// Upvalue cells captured by the running closure.
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
    pub slots: Vec<Value>,
    /// One past the last live slot of an open result sequence. Only
    /// meaningful between a producer (open CALL/VARARG) and its consumer.
    pub top: usize,
    /// Index of the next instruction to execute.
    pub pc: usize,
    /// Extra arguments beyond the fixed parameters.
    pub varargs: Vec<Value>,
    /// Open upvalue cells pointing into this frame, by slot.
    pub open_upvals: Vec<(usize, Rc<RefCell<Upvalue>>)>,
    /// Caller register where results land when this frame returns.
    pub ret_reg: usize,
    /// Result count the caller wants (-1 = all).
    pub want: i32,
}

impl Frame {
    pub fn new(
        proto: Rc<Prototype>,
        upvalues: Vec<Rc<RefCell<Upvalue>>>,
        args: Vec<Value>,
        ret_reg: usize,
        want: i32,
    ) -> Frame {
        let num_params = proto.num_params as usize;
        let max_stack = proto.max_stack_size as usize;
        let mut slots = vec![Value::Nil; max_stack + EXTRA_SLOTS];
        let varargs = if proto.is_vararg && args.len() > num_params {
            args[num_params..].to_vec()
        } else {
            Vec::new()
        };
        for (i, v) in args.into_iter().take(num_params).enumerate() {
            slots[i] = v;
        }
        Frame {
            proto,
            upvalues,
            slots,
            top: max_stack,
            pc: 0,
            varargs,
            open_upvals: Vec::new(),
            ret_reg,
            want,
        }
    }

    /// Register read; out-of-range slots read as nil.
    pub fn slot(&self, i: usize) -> Value {
        self.slots.get(i).cloned().unwrap_or(Value::Nil)
    }

    /// Register write, growing the slot vector when an open sequence
    /// runs past the preallocated area.
    pub fn set_slot(&mut self, i: usize, v: Value) {
        if i >= self.slots.len() {
            self.slots.resize(i + 1, Value::Nil);
        }
        self.slots[i] = v;
    }
}
