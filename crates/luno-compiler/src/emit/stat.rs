//! Statement emission.

use luno_core::opcode::{rk_as_k, Instruction, OpCode, MAX_INDEX_RK};

use crate::ast::{Block, Exp, Stat};
use crate::CompileError;

use super::exp::ARG_REG;
use super::{ConstKey, Emitter, NameLoc};

impl Emitter {
    pub(crate) fn emit_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stat in &block.stats {
            self.emit_stat(stat)?;
        }
        if let Some(exps) = &block.ret_exps {
            self.emit_ret_stat(exps, block.last_line)?;
        }
        Ok(())
    }

    fn emit_stat(&mut self, stat: &Stat) -> Result<(), CompileError> {
        match stat {
            Stat::Empty => Ok(()),
            Stat::Break { line } => self.emit_break(*line),
            Stat::Label { line, name } => self.fs_mut().define_label(name, *line),
            Stat::Goto { line, name } => {
                let fs = self.fs_mut();
                let pc = fs.emit_jmp(0, 0, *line);
                fs.add_goto(name, pc, *line);
                Ok(())
            }
            Stat::Do { block } => self.emit_do(block),
            Stat::While { exp, block } => self.emit_while(exp, block),
            Stat::Repeat { block, exp } => self.emit_repeat(block, exp),
            Stat::If { exps, blocks } => self.emit_if(exps, blocks),
            Stat::ForNum {
                line_of_for,
                line_of_do,
                var_name,
                init,
                limit,
                step,
                block,
            } => self.emit_for_num(*line_of_for, *line_of_do, var_name, init, limit, step, block),
            Stat::ForIn {
                line_of_do,
                names,
                exps,
                block,
            } => self.emit_for_in(*line_of_do, names, exps, block),
            Stat::LocalVarDecl {
                last_line,
                names,
                exps,
            } => self.emit_local_decl(names, exps, *last_line),
            Stat::Assign {
                last_line,
                vars,
                exps,
            } => self.emit_assign(vars, exps, *last_line),
            Stat::LocalFuncDef { name, exp } => {
                // The name is in scope inside the body, so recursive
                // calls resolve to the local
                let start = self.fs().pc() + 1;
                let r = self.fs_mut().add_loc_var(name.clone(), start);
                self.emit_exp(exp, r, 1)
            }
            Stat::FuncCall(call) => {
                let r = self.fs_mut().alloc_reg();
                self.emit_func_call(call, r, 0)?;
                self.fs_mut().free_reg();
                Ok(())
            }
        }
    }

    fn emit_break(&mut self, line: u32) -> Result<(), CompileError> {
        let a = self.fs().break_close_arg();
        let fs = self.fs_mut();
        let pc = fs.emit_jmp(a, 0, line);
        fs.add_break_jmp(pc, line)
    }

    fn emit_do(&mut self, block: &Block) -> Result<(), CompileError> {
        self.fs_mut().enter_scope(false);
        self.emit_block(block)?;
        self.fs_mut().close_open_upvals(block.last_line);
        let end = self.fs().pc();
        self.fs_mut().exit_scope(end)
    }

    fn emit_while(&mut self, exp: &Exp, block: &Block) -> Result<(), CompileError> {
        let start = self.fs().pc();
        let saved = self.fs().used_regs;
        let (r, _) = self.exp_to_op_arg(exp, ARG_REG)?;
        self.fs_mut().used_regs = saved;
        let line = exp.line();
        self.fs_mut()
            .emit(Instruction::abc(OpCode::Test, r, 0, 0), line);
        let jmp_to_end = self.fs_mut().emit_jmp(0, 0, line);

        self.fs_mut().enter_scope(true);
        self.emit_block(block)?;
        self.fs_mut().close_open_upvals(block.last_line);
        let back = start as i32 - self.fs().pc() as i32 - 1;
        self.fs_mut().emit_jmp(0, back, block.last_line);
        let end = self.fs().pc();
        self.fs_mut().exit_scope(end)?;
        self.fs_mut().patch_jmp_here(jmp_to_end);
        Ok(())
    }

    fn emit_repeat(&mut self, block: &Block, exp: &Exp) -> Result<(), CompileError> {
        self.fs_mut().enter_scope(true);
        let start = self.fs().pc();
        self.emit_block(block)?;

        // The condition sees the body's locals, so it compiles inside
        // the scope; looping back must close their upvalues.
        let saved = self.fs().used_regs;
        let (r, _) = self.exp_to_op_arg(exp, ARG_REG)?;
        self.fs_mut().used_regs = saved;
        let line = exp.line();
        self.fs_mut()
            .emit(Instruction::abc(OpCode::Test, r, 0, 0), line);
        let a = self.fs().jmp_close_arg();
        let back = start as i32 - self.fs().pc() as i32 - 1;
        self.fs_mut().emit_jmp(a, back, line);
        self.fs_mut().close_open_upvals(line);
        let end = self.fs().pc();
        self.fs_mut().exit_scope(end)
    }

    fn emit_if(&mut self, exps: &[Exp], blocks: &[Block]) -> Result<(), CompileError> {
        let mut jmp_to_ends = Vec::with_capacity(exps.len());
        let mut jmp_to_next: Option<u32> = None;
        for (i, exp) in exps.iter().enumerate() {
            if let Some(pc) = jmp_to_next.take() {
                self.fs_mut().patch_jmp_here(pc);
            }
            let saved = self.fs().used_regs;
            let (r, _) = self.exp_to_op_arg(exp, ARG_REG)?;
            self.fs_mut().used_regs = saved;
            let line = exp.line();
            self.fs_mut()
                .emit(Instruction::abc(OpCode::Test, r, 0, 0), line);
            let jmp = self.fs_mut().emit_jmp(0, 0, line);
            jmp_to_next = Some(jmp);

            let block = &blocks[i];
            self.fs_mut().enter_scope(false);
            self.emit_block(block)?;
            self.fs_mut().close_open_upvals(block.last_line);
            let end = self.fs().pc();
            self.fs_mut().exit_scope(end)?;
            if i < exps.len() - 1 {
                jmp_to_ends.push(self.fs_mut().emit_jmp(0, 0, block.last_line));
            } else {
                // The last condition's miss jump doubles as a jump to end
                jmp_to_ends.push(jmp);
            }
        }
        for pc in jmp_to_ends {
            self.fs_mut().patch_jmp_here(pc);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_for_num(
        &mut self,
        line_of_for: u32,
        line_of_do: u32,
        var_name: &str,
        init: &Exp,
        limit: &Exp,
        step: &Exp,
        block: &Block,
    ) -> Result<(), CompileError> {
        self.fs_mut().enter_scope(true);

        // Three hidden control slots, then the user variable
        let saved = self.fs().used_regs;
        for exp in [init, limit, step] {
            let r = self.fs_mut().alloc_reg();
            self.emit_exp(exp, r, 1)?;
        }
        self.fs_mut().used_regs = saved;
        let hidden_start = self.fs().pc();
        for name in ["(FOR_INDEX)", "(FOR_LIMIT)", "(FOR_STEP)"] {
            self.fs_mut().add_loc_var(name.to_string(), hidden_start);
        }
        let user_start = self.fs().pc() + 1;
        self.fs_mut().add_loc_var(var_name.to_string(), user_start);

        let a = self.fs().used_regs - 4;
        let prep = self
            .fs_mut()
            .emit(Instruction::asbx(OpCode::ForPrep, a, 0), line_of_do);
        self.emit_block(block)?;
        self.fs_mut().close_open_upvals(block.last_line);
        let loop_pc = self
            .fs_mut()
            .emit(Instruction::asbx(OpCode::ForLoop, a, 0), line_of_for);
        self.fs_mut().patch_jmp_to(prep, loop_pc);
        self.fs_mut().patch_jmp_to(loop_pc, prep + 1);
        let end = self.fs().pc();
        self.fs_mut().exit_scope(end)
    }

    fn emit_for_in(
        &mut self,
        line_of_do: u32,
        names: &[String],
        exps: &[Exp],
        block: &Block,
    ) -> Result<(), CompileError> {
        self.fs_mut().enter_scope(true);

        // The generator, state, and control slots fill like a local
        // declaration from the expression list
        let base = self.fs().used_regs;
        let hidden = [
            "(FOR_GEN)".to_string(),
            "(FOR_STATE)".to_string(),
            "(FOR_CTRL)".to_string(),
        ];
        self.emit_local_decl(&hidden, exps, line_of_do)?;
        let user_start = self.fs().pc() + 1;
        for name in names {
            self.fs_mut().add_loc_var(name.clone(), user_start);
        }

        let jmp_to_tfc = self.fs_mut().emit_jmp(0, 0, line_of_do);
        self.emit_block(block)?;
        self.fs_mut().close_open_upvals(block.last_line);
        self.fs_mut().patch_jmp_here(jmp_to_tfc);

        let line = exps[0].line();
        let n_names = names.len() as u32;
        self.fs_mut()
            .emit(Instruction::abc(OpCode::TForCall, base, 0, n_names), line);
        let tfl = self
            .fs_mut()
            .emit(Instruction::asbx(OpCode::TForLoop, base + 2, 0), line);
        self.fs_mut().patch_jmp_to(tfl, jmp_to_tfc + 1);
        let end = self.fs().pc();
        self.fs_mut().exit_scope(end)
    }

    fn emit_ret_stat(&mut self, exps: &[Exp], last_line: u32) -> Result<(), CompileError> {
        if exps.is_empty() {
            self.fs_mut().emit_return(0, 0, last_line);
            return Ok(());
        }
        if exps.len() == 1 {
            if let Exp::Name { name, .. } = &exps[0] {
                if let Some(slot) = self.fs().slot_of_local(name) {
                    self.fs_mut().emit_return(slot, 1, last_line);
                    return Ok(());
                }
            }
            if let Exp::FuncCall(call) = &exps[0] {
                let r = self.fs_mut().alloc_reg();
                self.emit_tail_call(call, r)?;
                self.fs_mut().free_reg();
                self.fs_mut().emit_return(r, -1, last_line);
                return Ok(());
            }
        }

        let n_exps = exps.len();
        let multret = exps[n_exps - 1].is_multi_value();
        for (i, exp) in exps.iter().enumerate() {
            let r = self.fs_mut().alloc_reg();
            if i == n_exps - 1 && multret {
                self.emit_exp(exp, r, -1)?;
            } else {
                self.emit_exp(exp, r, 1)?;
            }
        }
        self.fs_mut().free_regs(n_exps as u32);
        let a = self.fs().used_regs;
        if multret {
            self.fs_mut().emit_return(a, -1, last_line);
        } else {
            self.fs_mut().emit_return(a, n_exps as i32, last_line);
        }
        Ok(())
    }

    fn emit_local_decl(
        &mut self,
        names: &[String],
        exps: &[Exp],
        last_line: u32,
    ) -> Result<(), CompileError> {
        let old_regs = self.fs().used_regs;
        let n_exps = exps.len();
        let n_names = names.len();

        if n_exps == n_names {
            for exp in exps {
                let a = self.fs_mut().alloc_reg();
                self.emit_exp(exp, a, 1)?;
            }
        } else if n_exps > n_names {
            // Extra values evaluate for side effects and are dropped
            for (i, exp) in exps.iter().enumerate() {
                let a = self.fs_mut().alloc_reg();
                if i == n_exps - 1 && exp.is_multi_value() {
                    self.emit_exp(exp, a, 0)?;
                } else {
                    self.emit_exp(exp, a, 1)?;
                }
            }
        } else {
            let mut multret = false;
            for (i, exp) in exps.iter().enumerate() {
                let a = self.fs_mut().alloc_reg();
                if i == n_exps - 1 && exp.is_multi_value() {
                    multret = true;
                    let n = (n_names - n_exps + 1) as i32;
                    self.emit_exp(exp, a, n)?;
                    self.fs_mut().alloc_regs(n as u32 - 1);
                } else {
                    self.emit_exp(exp, a, 1)?;
                }
            }
            if !multret {
                let n = (n_names - n_exps) as u32;
                let a = self.fs_mut().alloc_regs(n);
                self.fs_mut().emit_load_nil(a, n, last_line);
            }
        }

        // The values stay in place; the declarations take over the
        // registers and bind only from the next instruction on
        self.fs_mut().used_regs = old_regs;
        let start_pc = self.fs().pc();
        for name in names {
            self.fs_mut().add_loc_var(name.clone(), start_pc);
        }
        Ok(())
    }

    fn emit_assign(
        &mut self,
        vars: &[Exp],
        exps: &[Exp],
        last_line: u32,
    ) -> Result<(), CompileError> {
        let old_regs = self.fs().used_regs;
        let n_vars = vars.len();
        let n_exps = exps.len();

        // Table targets evaluate their prefix and key before any value
        let mut table_operands: Vec<Option<(u32, u32)>> = vec![None; n_vars];
        let mut spilled_keys: Vec<Option<u32>> = vec![None; n_vars];
        for (i, var) in vars.iter().enumerate() {
            match var {
                Exp::TableAccess { prefix, key, .. } => {
                    let t = self.fs_mut().alloc_reg();
                    self.emit_exp(prefix, t, 1)?;
                    let k = self.fs_mut().alloc_reg();
                    self.emit_exp(key, k, 1)?;
                    table_operands[i] = Some((t, k));
                }
                Exp::Name { name, line } => {
                    if matches!(self.resolve_name(name), NameLoc::Global) {
                        let key = ConstKey::Str(name.as_bytes().to_vec());
                        let idx = self.fs_mut().index_of_constant(key.clone());
                        if idx > MAX_INDEX_RK {
                            // Name constant past the RK range loads into
                            // a register up front
                            let k = self.fs_mut().alloc_reg();
                            self.fs_mut().emit_load_k(k, key, *line);
                            spilled_keys[i] = Some(k);
                        }
                    }
                }
                _ => unreachable!("assignment targets are names or table accesses"),
            }
        }

        let v_base = self.fs().used_regs;
        if n_exps >= n_vars {
            for (i, exp) in exps.iter().enumerate() {
                let a = self.fs_mut().alloc_reg();
                if i >= n_vars && i == n_exps - 1 && exp.is_multi_value() {
                    self.emit_exp(exp, a, 0)?;
                } else {
                    self.emit_exp(exp, a, 1)?;
                }
            }
        } else {
            let mut multret = false;
            for (i, exp) in exps.iter().enumerate() {
                let a = self.fs_mut().alloc_reg();
                if i == n_exps - 1 && exp.is_multi_value() {
                    multret = true;
                    let n = (n_vars - n_exps + 1) as i32;
                    self.emit_exp(exp, a, n)?;
                    self.fs_mut().alloc_regs(n as u32 - 1);
                } else {
                    self.emit_exp(exp, a, 1)?;
                }
            }
            if !multret {
                let n = (n_vars - n_exps) as u32;
                let a = self.fs_mut().alloc_regs(n);
                self.fs_mut().emit_load_nil(a, n, last_line);
            }
        }

        for (i, var) in vars.iter().enumerate() {
            let v = v_base + i as u32;
            if let Some((t, k)) = table_operands[i] {
                self.fs_mut()
                    .emit(Instruction::abc(OpCode::SetTable, t, k, v), last_line);
                continue;
            }
            if let Exp::Name { name, .. } = var {
                match self.resolve_name(name) {
                    NameLoc::Local(slot) => {
                        self.fs_mut()
                            .emit(Instruction::abc(OpCode::Move, slot, v, 0), last_line);
                    }
                    NameLoc::Upval(idx) => {
                        self.fs_mut()
                            .emit(Instruction::abc(OpCode::SetUpval, v, idx, 0), last_line);
                    }
                    NameLoc::Global => {
                        let k = match spilled_keys[i] {
                            Some(reg) => reg,
                            None => {
                                let key = ConstKey::Str(name.as_bytes().to_vec());
                                rk_as_k(self.fs_mut().index_of_constant(key))
                            }
                        };
                        match self.resolve_name("_ENV") {
                            NameLoc::Local(slot) => {
                                self.fs_mut().emit(
                                    Instruction::abc(OpCode::SetTable, slot, k, v),
                                    last_line,
                                );
                            }
                            NameLoc::Upval(idx) => {
                                self.fs_mut().emit(
                                    Instruction::abc(OpCode::SetTabUp, idx, k, v),
                                    last_line,
                                );
                            }
                            NameLoc::Global => unreachable!("_ENV is always in scope"),
                        }
                    }
                }
            }
        }

        self.fs_mut().used_regs = old_regs;
        Ok(())
    }
}
