//! Expression emission and operand reduction.

use std::rc::Rc;

use luno_core::number::int_to_fb;
use luno_core::opcode::{
    rk_as_k, Instruction, OpCode, FIELDS_PER_FLUSH, MAX_C, MAX_INDEX_RK,
};

use crate::ast::{BinOp, Exp, FuncBody, FuncCall, UnOp};
use crate::CompileError;

use super::{ConstKey, Emitter, FuncState, NameLoc};

/// Operand kind masks for [`Emitter::exp_to_op_arg`].
pub(crate) const ARG_CONST: u32 = 1;
pub(crate) const ARG_REG: u32 = 2;
pub(crate) const ARG_UPVAL: u32 = 4;
pub(crate) const ARG_RK: u32 = ARG_REG | ARG_CONST;
pub(crate) const ARG_RU: u32 = ARG_REG | ARG_UPVAL;

impl Emitter {
    /// Compile `exp` so that `n` of its values land starting at register
    /// `a`. `n` of -1 keeps every value a call or vararg produces.
    pub(crate) fn emit_exp(&mut self, exp: &Exp, a: u32, n: i32) -> Result<(), CompileError> {
        match exp {
            Exp::Nil { line } => {
                self.fs_mut().emit_load_nil(a, n.max(1) as u32, *line);
            }
            Exp::False { line } => {
                self.fs_mut().emit_load_bool(a, 0, 0, *line);
            }
            Exp::True { line } => {
                self.fs_mut().emit_load_bool(a, 1, 0, *line);
            }
            Exp::Integer { line, val } => {
                self.fs_mut().emit_load_k(a, ConstKey::Integer(*val), *line);
            }
            Exp::Float { line, val } => {
                self.fs_mut()
                    .emit_load_k(a, ConstKey::Float(val.to_bits()), *line);
            }
            Exp::Str { line, val } => {
                self.fs_mut().emit_load_k(a, ConstKey::Str(val.clone()), *line);
            }
            Exp::Vararg { line } => {
                if !self.fs().is_vararg {
                    return Err(CompileError::new(
                        "cannot use '...' outside a vararg function",
                        *line,
                    ));
                }
                let b = (n + 1) as u32;
                self.fs_mut()
                    .emit(Instruction::abc(OpCode::VarArg, a, b, 0), *line);
            }
            Exp::Parens(inner) => self.emit_exp(inner, a, 1)?,
            Exp::Name { line, name } => self.emit_name(name, *line, a)?,
            Exp::FuncDef(body) => self.emit_func_def(body, a)?,
            Exp::TableCtor {
                line, keys, vals, ..
            } => self.emit_table_ctor(keys, vals, a, *line)?,
            Exp::Unop { line, op, exp } => {
                let saved = self.fs().used_regs;
                let (b, _) = self.exp_to_op_arg(exp, ARG_REG)?;
                let opcode = match op {
                    UnOp::Neg => OpCode::Unm,
                    UnOp::BNot => OpCode::BNot,
                    UnOp::Not => OpCode::Not,
                    UnOp::Len => OpCode::Len,
                };
                self.fs_mut().emit(Instruction::abc(opcode, a, b, 0), *line);
                self.fs_mut().used_regs = saved;
            }
            Exp::Binop { line, op, lhs, rhs } => match op {
                BinOp::And | BinOp::Or => self.emit_and_or(*op, lhs, rhs, a, *line)?,
                _ => self.emit_binop(*op, lhs, rhs, a, *line)?,
            },
            Exp::Concat { line, exps } => {
                for e in exps {
                    let r = self.fs_mut().alloc_reg();
                    self.emit_exp(e, r, 1)?;
                }
                let fs = self.fs_mut();
                fs.free_regs(exps.len() as u32);
                let b = fs.used_regs;
                let c = b + exps.len() as u32 - 1;
                fs.emit(Instruction::abc(OpCode::Concat, a, b, c), *line);
            }
            Exp::TableAccess {
                last_line,
                prefix,
                key,
            } => self.emit_table_access(prefix, key, *last_line, a)?,
            Exp::FuncCall(call) => self.emit_func_call(call, a, n)?,
        }
        Ok(())
    }

    fn emit_name(&mut self, name: &str, line: u32, a: u32) -> Result<(), CompileError> {
        match self.resolve_name(name) {
            NameLoc::Local(slot) => {
                self.fs_mut()
                    .emit(Instruction::abc(OpCode::Move, a, slot, 0), line);
                Ok(())
            }
            NameLoc::Upval(idx) => {
                self.fs_mut()
                    .emit(Instruction::abc(OpCode::GetUpval, a, idx, 0), line);
                Ok(())
            }
            NameLoc::Global => {
                // Free names read through _ENV
                let prefix = Exp::Name {
                    line,
                    name: "_ENV".to_string(),
                };
                let key = Exp::Str {
                    line,
                    val: name.as_bytes().to_vec(),
                };
                self.emit_table_access(&prefix, &key, line, a)
            }
        }
    }

    fn emit_table_access(
        &mut self,
        prefix: &Exp,
        key: &Exp,
        line: u32,
        a: u32,
    ) -> Result<(), CompileError> {
        let saved = self.fs().used_regs;
        let (b, kind_b) = self.exp_to_op_arg(prefix, ARG_RU)?;
        let (c, _) = self.exp_to_op_arg(key, ARG_RK)?;
        self.fs_mut().used_regs = saved;
        let op = if kind_b == ARG_UPVAL {
            OpCode::GetTabUp
        } else {
            OpCode::GetTable
        };
        self.fs_mut().emit(Instruction::abc(op, a, b, c), line);
        Ok(())
    }

    fn emit_func_def(&mut self, body: &FuncBody, a: u32) -> Result<(), CompileError> {
        let proto = self.compile_func(body, false)?;
        let fs = self.fs_mut();
        fs.protos.push(Rc::new(proto));
        let bx = fs.protos.len() as u32 - 1;
        fs.emit(Instruction::abx(OpCode::Closure, a, bx), body.line);
        Ok(())
    }

    fn emit_and_or(
        &mut self,
        op: BinOp,
        lhs: &Exp,
        rhs: &Exp,
        a: u32,
        line: u32,
    ) -> Result<(), CompileError> {
        let saved = self.fs().used_regs;
        let (b, _) = self.exp_to_op_arg(lhs, ARG_REG)?;
        self.fs_mut().used_regs = saved;
        // and short-circuits on false, or on true
        let c = if op == BinOp::And { 0 } else { 1 };
        self.fs_mut()
            .emit(Instruction::abc(OpCode::TestSet, a, b, c), line);
        let jmp = self.fs_mut().emit_jmp(0, 0, line);
        let (b2, _) = self.exp_to_op_arg(rhs, ARG_REG)?;
        self.fs_mut().used_regs = saved;
        self.fs_mut()
            .emit(Instruction::abc(OpCode::Move, a, b2, 0), line);
        self.fs_mut().patch_jmp_here(jmp);
        Ok(())
    }

    fn emit_binop(
        &mut self,
        op: BinOp,
        lhs: &Exp,
        rhs: &Exp,
        a: u32,
        line: u32,
    ) -> Result<(), CompileError> {
        let saved = self.fs().used_regs;
        let (b, _) = self.exp_to_op_arg(lhs, ARG_RK)?;
        let (c, _) = self.exp_to_op_arg(rhs, ARG_RK)?;

        let arith = match op {
            BinOp::Add => Some(OpCode::Add),
            BinOp::Sub => Some(OpCode::Sub),
            BinOp::Mul => Some(OpCode::Mul),
            BinOp::Div => Some(OpCode::Div),
            BinOp::IDiv => Some(OpCode::IDiv),
            BinOp::Mod => Some(OpCode::Mod),
            BinOp::Pow => Some(OpCode::Pow),
            BinOp::BAnd => Some(OpCode::BAnd),
            BinOp::BOr => Some(OpCode::BOr),
            BinOp::BXor => Some(OpCode::BXor),
            BinOp::Shl => Some(OpCode::Shl),
            BinOp::Shr => Some(OpCode::Shr),
            _ => None,
        };
        let fs = self.fs_mut();
        match arith {
            Some(opcode) => {
                fs.emit(Instruction::abc(opcode, a, b, c), line);
            }
            None => {
                // Comparisons compute a boolean: the test skips one of
                // the two LOADBOOLs, and the first LOADBOOL skips the
                // second via its C argument.
                let (opcode, flag, b, c) = match op {
                    BinOp::Eq => (OpCode::Eq, 1, b, c),
                    BinOp::NotEq => (OpCode::Eq, 0, b, c),
                    BinOp::Lt => (OpCode::Lt, 1, b, c),
                    BinOp::Gt => (OpCode::Lt, 1, c, b),
                    BinOp::LtEq => (OpCode::Le, 1, b, c),
                    BinOp::GtEq => (OpCode::Le, 1, c, b),
                    _ => unreachable!("handled above"),
                };
                fs.emit(Instruction::abc(opcode, flag, b, c), line);
                fs.emit_jmp(0, 1, line);
                fs.emit_load_bool(a, 0, 1, line);
                fs.emit_load_bool(a, 1, 0, line);
            }
        }
        self.fs_mut().used_regs = saved;
        Ok(())
    }

    fn emit_table_ctor(
        &mut self,
        keys: &[Option<Exp>],
        vals: &[Exp],
        a: u32,
        line: u32,
    ) -> Result<(), CompileError> {
        let n_arr = keys.iter().filter(|k| k.is_none()).count() as u32;
        let n_exps = keys.len();
        let multret = n_exps > 0
            && keys[n_exps - 1].is_none()
            && vals[n_exps - 1].is_multi_value();

        let b = int_to_fb(n_arr);
        let c = int_to_fb(n_exps as u32 - n_arr);
        self.fs_mut()
            .emit(Instruction::abc(OpCode::NewTable, a, b, c), line);

        let mut arr_idx: u32 = 0;
        for (i, key) in keys.iter().enumerate() {
            let val = &vals[i];
            match key {
                None => {
                    arr_idx += 1;
                    let tmp = self.fs_mut().alloc_reg();
                    let open = i == n_exps - 1 && multret;
                    self.emit_exp(val, tmp, if open { -1 } else { 1 })?;

                    if arr_idx % FIELDS_PER_FLUSH == 0 || arr_idx == n_arr {
                        let mut n = arr_idx % FIELDS_PER_FLUSH;
                        if n == 0 {
                            n = FIELDS_PER_FLUSH;
                        }
                        let fs = self.fs_mut();
                        fs.free_regs(n);
                        let batch = (arr_idx - 1) / FIELDS_PER_FLUSH + 1;
                        let b = if open { 0 } else { n };
                        fs.emit_set_list(a, b, batch, val.line());
                    }
                }
                Some(k) => {
                    let b = self.fs_mut().alloc_reg();
                    self.emit_exp(k, b, 1)?;
                    let c = self.fs_mut().alloc_reg();
                    self.emit_exp(val, c, 1)?;
                    let fs = self.fs_mut();
                    fs.free_regs(2);
                    fs.emit(Instruction::abc(OpCode::SetTable, a, b, c), line);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn emit_func_call(
        &mut self,
        call: &FuncCall,
        a: u32,
        n: i32,
    ) -> Result<(), CompileError> {
        let n_args = self.prep_func_call(call, a)?;
        self.fs_mut().emit_call(a, n_args, n, call.line);
        Ok(())
    }

    /// A `return f(...)` reuses the caller's frame.
    pub(crate) fn emit_tail_call(&mut self, call: &FuncCall, a: u32) -> Result<(), CompileError> {
        let n_args = self.prep_func_call(call, a)?;
        let b = (n_args + 1) as u32;
        self.fs_mut()
            .emit(Instruction::abc(OpCode::TailCall, a, b, 0), call.line);
        Ok(())
    }

    /// Load the callee and arguments into consecutive registers from
    /// `a`; returns the argument count, -1 when the last argument
    /// spreads to the stack top.
    fn prep_func_call(&mut self, call: &FuncCall, a: u32) -> Result<i32, CompileError> {
        let n_fixed = call.args.len();
        let mut n_args = n_fixed as i32;
        let mut last_multi = false;

        self.emit_exp(&call.prefix, a, 1)?;
        if let Some(method) = &call.method {
            // SELF fills a with the method and a+1 with the receiver
            self.fs_mut().alloc_reg();
            let key = Exp::Str {
                line: call.line,
                val: method.as_bytes().to_vec(),
            };
            let (c, kind) = self.exp_to_op_arg(&key, ARG_RK)?;
            self.fs_mut()
                .emit(Instruction::abc(OpCode::Self_, a, a, c), call.line);
            if kind == ARG_REG {
                self.fs_mut().free_reg();
            }
        }
        for (i, arg) in call.args.iter().enumerate() {
            let tmp = self.fs_mut().alloc_reg();
            if i == n_fixed - 1 && arg.is_multi_value() {
                last_multi = true;
                self.emit_exp(arg, tmp, -1)?;
            } else {
                self.emit_exp(arg, tmp, 1)?;
            }
        }
        self.fs_mut().free_regs(n_fixed as u32);
        if call.method.is_some() {
            self.fs_mut().free_reg();
            n_args += 1;
        }
        if last_multi {
            n_args = -1;
        }
        Ok(n_args)
    }

    /// Reduce an expression to an instruction operand. `kinds` is a mask
    /// of acceptable encodings; anything else lands in a fresh register.
    /// Returns the operand value and the kind actually produced.
    pub(crate) fn exp_to_op_arg(
        &mut self,
        exp: &Exp,
        kinds: u32,
    ) -> Result<(u32, u32), CompileError> {
        if kinds & ARG_CONST != 0 {
            let key = match exp {
                Exp::Nil { .. } => Some(ConstKey::Nil),
                Exp::False { .. } => Some(ConstKey::Boolean(false)),
                Exp::True { .. } => Some(ConstKey::Boolean(true)),
                Exp::Integer { val, .. } => Some(ConstKey::Integer(*val)),
                Exp::Float { val, .. } => Some(ConstKey::Float(val.to_bits())),
                Exp::Str { val, .. } => Some(ConstKey::Str(val.clone())),
                _ => None,
            };
            if let Some(key) = key {
                let idx = self.fs_mut().index_of_constant(key);
                if idx <= MAX_INDEX_RK {
                    return Ok((rk_as_k(idx), ARG_CONST));
                }
            }
        }
        if let Exp::Name { name, .. } = exp {
            if kinds & ARG_REG != 0 {
                if let Some(slot) = self.fs().slot_of_local(name) {
                    return Ok((slot, ARG_REG));
                }
            }
            if kinds & ARG_UPVAL != 0 {
                if let Some(idx) = self.resolve_upvalue(self.states.len() - 1, name) {
                    return Ok((idx, ARG_UPVAL));
                }
            }
        }
        let a = self.fs_mut().alloc_reg();
        self.emit_exp(exp, a, 1)?;
        Ok((a, ARG_REG))
    }
}

impl FuncState {
    fn emit_set_list(&mut self, a: u32, b: u32, batch: u32, line: u32) {
        if batch <= MAX_C {
            self.emit(Instruction::abc(OpCode::SetList, a, b, batch), line);
        } else {
            self.emit(Instruction::abc(OpCode::SetList, a, b, 0), line);
            self.emit(Instruction::ax(OpCode::ExtraArg, batch), line);
        }
    }
}
