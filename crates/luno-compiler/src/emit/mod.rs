//! Bytecode emission: walks the syntax tree and builds prototypes.

mod exp;
mod stat;

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use luno_core::opcode::{Instruction, OpCode, MAX_BX};
use luno_core::proto::{Constant, LocalVar, Prototype, UpvalDesc};
use luno_core::value::LuaStr;

use crate::ast::{Block, FuncBody};
use crate::CompileError;

/// Compile a parsed chunk into its main prototype.
///
/// The chunk body becomes a vararg function whose first upvalue is `_ENV`;
/// free names compile into indexing operations on that upvalue.
pub fn gen_proto(block: Block, chunk_name: &str) -> Result<Prototype, CompileError> {
    let body = FuncBody {
        line: 0,
        last_line: block.last_line,
        params: Vec::new(),
        is_vararg: true,
        block: Box::new(block),
    };

    let mut emitter = Emitter::new(chunk_name);
    // Synthetic enclosing function owning _ENV in register 0, so the
    // main function captures it like any other closed-over local.
    let mut outer = FuncState::new(None, 0, 0, false);
    outer.add_loc_var("_ENV".to_string(), 0);
    emitter.states.push(outer);
    emitter.compile_func(&body, true)
}

/// Registers, scopes, and code for one function being compiled.
pub(crate) struct FuncState {
    pub(crate) parent: Option<usize>,
    pub(crate) used_regs: u32,
    max_regs: u32,
    reg_overflow: bool,
    scope_lv: usize,
    scopes: Vec<ScopeFrame>,
    /// Every local ever declared, in declaration order.
    loc_vars: Vec<LocalScope>,
    /// Name to the currently visible declaration in `loc_vars`.
    local_names: HashMap<String, usize>,
    active_locals: usize,
    pub(crate) upvalues: Vec<UpvalEntry>,
    constants: IndexMap<ConstKey, u32>,
    code: Vec<Instruction>,
    line_info: Vec<u32>,
    protos: Vec<Rc<Prototype>>,
    num_params: u8,
    pub(crate) is_vararg: bool,
    line: u32,
    last_line: u32,
}

struct ScopeFrame {
    /// Break jump pcs awaiting a patch; `None` marks a non-breakable scope.
    breaks: Option<Vec<u32>>,
    labels: Vec<LabelMark>,
    gotos: Vec<GotoMark>,
    locals_on_entry: usize,
}

struct LabelMark {
    name: String,
    pc: u32,
    num_locals: usize,
}

struct GotoMark {
    name: String,
    pc: u32,
    num_locals: usize,
    line: u32,
}

struct LocalScope {
    name: String,
    /// Shadowed declaration of the same name, if any.
    prev: Option<usize>,
    scope_lv: usize,
    slot: u32,
    start_pc: u32,
    end_pc: u32,
    captured: bool,
}

pub(crate) struct UpvalEntry {
    pub(crate) name: String,
    pub(crate) in_stack: bool,
    pub(crate) index: u32,
}

/// Hashable form of a constant for pool deduplication. Floats key by
/// bit pattern, so 1 and 1.0 stay distinct entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ConstKey {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Str(Vec<u8>),
}

impl ConstKey {
    fn into_constant(self) -> Constant {
        match self {
            ConstKey::Nil => Constant::Nil,
            ConstKey::Boolean(b) => Constant::Boolean(b),
            ConstKey::Integer(i) => Constant::Integer(i),
            ConstKey::Float(bits) => Constant::Float(f64::from_bits(bits)),
            ConstKey::Str(bytes) => Constant::Str(LuaStr::new(bytes)),
        }
    }
}

impl FuncState {
    fn new(parent: Option<usize>, line: u32, last_line: u32, is_vararg: bool) -> Self {
        FuncState {
            parent,
            used_regs: 0,
            max_regs: 0,
            reg_overflow: false,
            scope_lv: 0,
            scopes: vec![ScopeFrame {
                breaks: None,
                labels: Vec::new(),
                gotos: Vec::new(),
                locals_on_entry: 0,
            }],
            loc_vars: Vec::new(),
            local_names: HashMap::new(),
            active_locals: 0,
            upvalues: Vec::new(),
            constants: IndexMap::new(),
            code: Vec::new(),
            line_info: Vec::new(),
            protos: Vec::new(),
            num_params: 0,
            is_vararg,
            line,
            last_line,
        }
    }

    /// Index the next instruction will occupy.
    pub(crate) fn pc(&self) -> u32 {
        self.code.len() as u32
    }

    // ---- Registers ----

    pub(crate) fn alloc_reg(&mut self) -> u32 {
        self.used_regs += 1;
        if self.used_regs >= 255 {
            self.reg_overflow = true;
        }
        if self.used_regs > self.max_regs {
            self.max_regs = self.used_regs;
        }
        self.used_regs - 1
    }

    pub(crate) fn alloc_regs(&mut self, n: u32) -> u32 {
        let first = self.used_regs;
        for _ in 0..n {
            self.alloc_reg();
        }
        first
    }

    pub(crate) fn free_reg(&mut self) {
        self.used_regs -= 1;
    }

    pub(crate) fn free_regs(&mut self, n: u32) {
        self.used_regs -= n;
    }

    // ---- Scopes and locals ----

    pub(crate) fn enter_scope(&mut self, breakable: bool) {
        self.scope_lv += 1;
        self.scopes.push(ScopeFrame {
            breaks: if breakable { Some(Vec::new()) } else { None },
            labels: Vec::new(),
            gotos: Vec::new(),
            locals_on_entry: self.active_locals,
        });
    }

    pub(crate) fn exit_scope(&mut self, end_pc: u32) -> Result<(), CompileError> {
        self.resolve_frame_gotos(false)?;
        let frame = self.scopes.pop().unwrap();

        // Break jumps land just past the scope; their close argument was
        // set when the break was emitted.
        if let Some(breaks) = frame.breaks {
            let here = self.pc();
            for pc in breaks {
                self.code[pc as usize].set_sbx(here as i32 - pc as i32 - 1);
            }
        }

        self.scope_lv -= 1;
        let dying: Vec<usize> = self
            .local_names
            .values()
            .copied()
            .filter(|&i| self.loc_vars[i].scope_lv > self.scope_lv)
            .collect();
        for idx in dying {
            self.remove_loc_var(idx, end_pc);
        }
        Ok(())
    }

    /// Declare a local in the current scope. Shadowed declarations chain
    /// through `prev` and are restored when this one dies.
    pub(crate) fn add_loc_var(&mut self, name: String, start_pc: u32) -> u32 {
        let slot = self.alloc_reg();
        let idx = self.loc_vars.len();
        self.loc_vars.push(LocalScope {
            prev: self.local_names.get(&name).copied(),
            name: name.clone(),
            scope_lv: self.scope_lv,
            slot,
            start_pc,
            end_pc: 0,
            captured: false,
        });
        self.local_names.insert(name, idx);
        self.active_locals += 1;
        slot
    }

    fn remove_loc_var(&mut self, idx: usize, end_pc: u32) {
        self.free_reg();
        self.active_locals -= 1;
        self.loc_vars[idx].end_pc = end_pc;
        let prev = self.loc_vars[idx].prev;
        let scope_lv = self.loc_vars[idx].scope_lv;
        let name = self.loc_vars[idx].name.clone();
        match prev {
            None => {
                self.local_names.remove(&name);
            }
            Some(p) if self.loc_vars[p].scope_lv == scope_lv => {
                // Shadowed in the same scope: the older one dies too
                self.remove_loc_var(p, end_pc);
            }
            Some(p) => {
                self.local_names.insert(name, p);
            }
        }
    }

    pub(crate) fn slot_of_local(&self, name: &str) -> Option<u32> {
        self.local_names.get(name).map(|&i| self.loc_vars[i].slot)
    }

    // ---- Breaks ----

    pub(crate) fn add_break_jmp(&mut self, pc: u32, line: u32) -> Result<(), CompileError> {
        for frame in self.scopes.iter_mut().rev() {
            if let Some(breaks) = &mut frame.breaks {
                breaks.push(pc);
                return Ok(());
            }
        }
        Err(CompileError::new("break outside loop", line))
    }

    /// Scope level of the innermost breakable scope.
    fn break_level(&self) -> Option<usize> {
        self.scopes.iter().rposition(|f| f.breaks.is_some())
    }

    /// The `a` argument for a break's jump: closes upvalues for
    /// captured locals of the enclosing loop, including nested scopes
    /// the jump leaves.
    pub(crate) fn break_close_arg(&self) -> u32 {
        match self.break_level() {
            Some(level) => self.close_arg_at_level(level),
            None => 0,
        }
    }

    // ---- Upvalue closing ----

    /// The `a` argument for a jump leaving scopes at or above `level`:
    /// one past the lowest named slot if any local there was captured,
    /// otherwise 0 (close nothing).
    fn close_arg_at_level(&self, level: usize) -> u32 {
        let mut has_captured = false;
        let mut min_slot = self.max_regs;
        for &head in self.local_names.values() {
            let mut cur = Some(head);
            while let Some(idx) = cur {
                let v = &self.loc_vars[idx];
                if v.scope_lv < level {
                    break;
                }
                if v.captured {
                    has_captured = true;
                }
                if v.slot < min_slot && !v.name.starts_with('(') {
                    min_slot = v.slot;
                }
                cur = v.prev;
            }
        }
        if has_captured {
            min_slot + 1
        } else {
            0
        }
    }

    pub(crate) fn jmp_close_arg(&self) -> u32 {
        self.close_arg_at_level(self.scope_lv)
    }

    /// Emit a jump that only closes upvalues, if the current scope
    /// captured any of its locals.
    pub(crate) fn close_open_upvals(&mut self, line: u32) {
        let a = self.jmp_close_arg();
        if a > 0 {
            self.emit(Instruction::asbx(OpCode::Jmp, a, 0), line);
        }
    }

    // ---- Labels and gotos ----

    pub(crate) fn define_label(&mut self, name: &str, line: u32) -> Result<(), CompileError> {
        let pc = self.pc();
        let num_locals = self.active_locals;
        let frame = self.scopes.last_mut().unwrap();
        if frame.labels.iter().any(|l| l.name == name) {
            return Err(CompileError::new(
                format!("label '{name}' already defined"),
                line,
            ));
        }
        frame.labels.push(LabelMark {
            name: name.to_string(),
            pc,
            num_locals,
        });
        Ok(())
    }

    pub(crate) fn add_goto(&mut self, name: &str, pc: u32, line: u32) {
        let num_locals = self.active_locals;
        let frame = self.scopes.last_mut().unwrap();
        frame.gotos.push(GotoMark {
            name: name.to_string(),
            pc,
            num_locals,
            line,
        });
    }

    /// Resolve the current scope's gotos against its labels. Unmatched
    /// gotos propagate outward; at function level they are errors.
    fn resolve_frame_gotos(&mut self, function_end: bool) -> Result<(), CompileError> {
        let here = self.pc();
        let (labels, gotos, entry_locals) = {
            let frame = self.scopes.last_mut().unwrap();
            // A label at the very end of the scope is reachable even past
            // locals declared before it; they die with the scope anyway.
            for label in &mut frame.labels {
                if label.pc == here {
                    label.num_locals = frame.locals_on_entry;
                }
            }
            let labels: Vec<(String, u32, usize)> = frame
                .labels
                .iter()
                .map(|l| (l.name.clone(), l.pc, l.num_locals))
                .collect();
            (labels, std::mem::take(&mut frame.gotos), frame.locals_on_entry)
        };

        let mut unresolved = Vec::new();
        for goto in gotos {
            match labels.iter().find(|(name, _, _)| *name == goto.name) {
                Some(&(_, label_pc, label_locals)) if goto.num_locals >= label_locals => {
                    self.code[goto.pc as usize].set_sbx(label_pc as i32 - goto.pc as i32 - 1);
                }
                Some(_) => {
                    let local = self.blocking_local_name(goto.pc);
                    return Err(CompileError::new(
                        format!(
                            "'goto {}' jumps into the scope of local '{}'",
                            goto.name, local
                        ),
                        goto.line,
                    ));
                }
                None => unresolved.push(goto),
            }
        }

        if function_end {
            if let Some(goto) = unresolved.into_iter().next() {
                return Err(CompileError::new(
                    format!("no visible label '{}' for goto", goto.name),
                    goto.line,
                ));
            }
        } else {
            let parent = self.scopes.len() - 2;
            for mut goto in unresolved {
                if goto.num_locals > entry_locals {
                    goto.num_locals = entry_locals;
                }
                self.scopes[parent].gotos.push(goto);
            }
        }
        Ok(())
    }

    /// Record the end of life for locals still active when the function
    /// body finishes.
    fn stamp_active_end_pcs(&mut self) {
        let end_pc = self.pc();
        let heads: Vec<usize> = self.local_names.values().copied().collect();
        for head in heads {
            let mut cur = Some(head);
            while let Some(idx) = cur {
                self.loc_vars[idx].end_pc = end_pc;
                cur = self.loc_vars[idx].prev;
            }
        }
    }

    /// Name of the first local declared after the given pc, for the
    /// jump-into-scope error.
    fn blocking_local_name(&self, goto_pc: u32) -> String {
        self.loc_vars
            .iter()
            .filter(|v| v.start_pc > goto_pc && !v.name.starts_with('('))
            .min_by_key(|v| v.start_pc)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "?".to_string())
    }

    // ---- Constants ----

    pub(crate) fn index_of_constant(&mut self, key: ConstKey) -> u32 {
        if let Some(&idx) = self.constants.get(&key) {
            return idx;
        }
        let idx = self.constants.len() as u32;
        self.constants.insert(key, idx);
        idx
    }

    // ---- Instruction emission ----

    pub(crate) fn emit(&mut self, inst: Instruction, line: u32) -> u32 {
        self.code.push(inst);
        self.line_info.push(line);
        self.code.len() as u32 - 1
    }

    pub(crate) fn emit_jmp(&mut self, a: u32, sbx: i32, line: u32) -> u32 {
        self.emit(Instruction::asbx(OpCode::Jmp, a, sbx), line)
    }

    /// Point a previously emitted jump at the next instruction.
    pub(crate) fn patch_jmp_here(&mut self, jmp_pc: u32) {
        let target = self.pc();
        self.code[jmp_pc as usize].set_sbx(target as i32 - jmp_pc as i32 - 1);
    }

    pub(crate) fn patch_jmp_to(&mut self, jmp_pc: u32, target: u32) {
        self.code[jmp_pc as usize].set_sbx(target as i32 - jmp_pc as i32 - 1);
    }

    pub(crate) fn emit_load_k(&mut self, a: u32, key: ConstKey, line: u32) {
        let idx = self.index_of_constant(key);
        if idx <= MAX_BX {
            self.emit(Instruction::abx(OpCode::LoadK, a, idx), line);
        } else {
            // Pool index past the Bx range spills into EXTRAARG
            self.emit(Instruction::abx(OpCode::LoadKX, a, 0), line);
            self.emit(Instruction::ax(OpCode::ExtraArg, idx), line);
        }
    }

    pub(crate) fn emit_load_nil(&mut self, a: u32, n: u32, line: u32) {
        debug_assert!(n >= 1);
        self.emit(Instruction::abc(OpCode::LoadNil, a, n - 1, 0), line);
    }

    pub(crate) fn emit_load_bool(&mut self, a: u32, b: u32, c: u32, line: u32) {
        self.emit(Instruction::abc(OpCode::LoadBool, a, b, c), line);
    }

    /// CALL with `n_args`/`n_results` of -1 meaning "to stack top".
    pub(crate) fn emit_call(&mut self, a: u32, n_args: i32, n_results: i32, line: u32) {
        let b = (n_args + 1) as u32;
        let c = (n_results + 1) as u32;
        self.emit(Instruction::abc(OpCode::Call, a, b, c), line);
    }

    /// RETURN of `n` values starting at `a`; -1 returns to stack top.
    pub(crate) fn emit_return(&mut self, a: u32, n: i32, line: u32) {
        self.emit(Instruction::abc(OpCode::Return, a, (n + 1) as u32, 0), line);
    }

    // ---- Prototype conversion ----

    fn into_proto(self, source: &LuaStr) -> Prototype {
        let mut constants = vec![Constant::Nil; self.constants.len()];
        for (key, idx) in self.constants {
            constants[idx as usize] = key.into_constant();
        }
        let upvalues = self
            .upvalues
            .iter()
            .map(|u| UpvalDesc {
                in_stack: u.in_stack,
                index: u.index as u8,
            })
            .collect();
        let upvalue_names = self
            .upvalues
            .iter()
            .map(|u| LuaStr::from(u.name.as_str()))
            .collect();
        let loc_vars = self
            .loc_vars
            .into_iter()
            .map(|v| LocalVar {
                name: LuaStr::from(v.name.as_str()),
                start_pc: v.start_pc,
                end_pc: v.end_pc,
            })
            .collect();
        Prototype {
            source: source.clone(),
            line_defined: self.line,
            last_line_defined: if self.line == 0 { 0 } else { self.last_line },
            num_params: self.num_params,
            is_vararg: self.is_vararg,
            max_stack_size: self.max_regs.max(2) as u8,
            code: self.code,
            constants,
            upvalues,
            protos: self.protos,
            line_info: self.line_info,
            loc_vars,
            upvalue_names,
        }
    }
}

/// Where a name resolves in the current function.
pub(crate) enum NameLoc {
    Local(u32),
    Upval(u32),
    Global,
}

pub(crate) struct Emitter {
    pub(crate) states: Vec<FuncState>,
    source: LuaStr,
}

impl Emitter {
    fn new(chunk_name: &str) -> Self {
        Emitter {
            states: Vec::new(),
            source: LuaStr::from(chunk_name),
        }
    }

    pub(crate) fn fs(&self) -> &FuncState {
        self.states.last().unwrap()
    }

    pub(crate) fn fs_mut(&mut self) -> &mut FuncState {
        self.states.last_mut().unwrap()
    }

    /// Compile a function body in a fresh state and return its prototype.
    /// `bind_env` forces the _ENV upvalue, used for the main chunk.
    pub(crate) fn compile_func(
        &mut self,
        body: &FuncBody,
        bind_env: bool,
    ) -> Result<Prototype, CompileError> {
        let parent = self.states.len().checked_sub(1);
        let mut fs = FuncState::new(parent, body.line, body.last_line, body.is_vararg);
        fs.num_params = body.params.len() as u8;
        self.states.push(fs);
        if bind_env {
            self.resolve_upvalue(self.states.len() - 1, "_ENV");
        }
        for param in &body.params {
            self.fs_mut().add_loc_var(param.clone(), 0);
        }

        self.emit_block(&body.block)?;

        let fs = self.fs_mut();
        fs.resolve_frame_gotos(true)?;
        fs.emit_return(0, 0, body.last_line);
        fs.stamp_active_end_pcs();
        if fs.reg_overflow {
            return Err(CompileError::new(
                "function or expression needs too many registers",
                body.line.max(1),
            ));
        }
        let fs = self.states.pop().unwrap();
        Ok(fs.into_proto(&self.source))
    }

    /// Find or create the upvalue for `name`, capturing a parent local
    /// or threading through the parent's own upvalues.
    pub(crate) fn resolve_upvalue(&mut self, fs_idx: usize, name: &str) -> Option<u32> {
        if let Some(pos) = self.states[fs_idx]
            .upvalues
            .iter()
            .position(|u| u.name == name)
        {
            return Some(pos as u32);
        }
        let parent_idx = self.states[fs_idx].parent?;
        if let Some(&loc_idx) = self.states[parent_idx].local_names.get(name) {
            let slot = self.states[parent_idx].loc_vars[loc_idx].slot;
            self.states[parent_idx].loc_vars[loc_idx].captured = true;
            let fs = &mut self.states[fs_idx];
            fs.upvalues.push(UpvalEntry {
                name: name.to_string(),
                in_stack: true,
                index: slot,
            });
            return Some(fs.upvalues.len() as u32 - 1);
        }
        let parent_upval = self.resolve_upvalue(parent_idx, name)?;
        let fs = &mut self.states[fs_idx];
        fs.upvalues.push(UpvalEntry {
            name: name.to_string(),
            in_stack: false,
            index: parent_upval,
        });
        Some(fs.upvalues.len() as u32 - 1)
    }

    pub(crate) fn resolve_name(&mut self, name: &str) -> NameLoc {
        if let Some(slot) = self.fs().slot_of_local(name) {
            return NameLoc::Local(slot);
        }
        if let Some(idx) = self.resolve_upvalue(self.states.len() - 1, name) {
            return NameLoc::Upval(idx);
        }
        NameLoc::Global
    }
}
