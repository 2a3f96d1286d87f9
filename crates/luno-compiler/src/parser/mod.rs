//! Recursive-descent parser producing the syntax tree.

mod expr;

use crate::ast::{Block, Exp, FuncBody, Stat};
use crate::lexer::Lexer;
use crate::token::Token;
use crate::CompileError;

/// Parse a whole chunk into a block.
pub fn parse(source: &[u8]) -> Result<Block, CompileError> {
    let mut parser = Parser::new(source);
    let block = parser.block()?;
    parser.expect(&Token::Eof)?;
    Ok(block)
}

pub(crate) struct Parser<'a> {
    pub(crate) lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(source),
        }
    }

    // ---- Token helpers ----

    pub(crate) fn current(&self) -> Result<&Token, CompileError> {
        self.lexer.current()
    }

    pub(crate) fn line(&self) -> u32 {
        self.lexer.current_line()
    }

    pub(crate) fn advance(&mut self) -> Result<Token, CompileError> {
        self.lexer.advance()
    }

    pub(crate) fn check(&self, expected: &Token) -> bool {
        matches!(self.current(), Ok(t) if t == expected)
    }

    /// Consume the current token if it matches.
    pub(crate) fn test_next(&mut self, expected: &Token) -> Result<bool, CompileError> {
        if !self.check(expected) {
            return Ok(false);
        }
        self.advance()?;
        Ok(true)
    }

    pub(crate) fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.check(expected) {
            self.advance()?;
            Ok(())
        } else {
            self.current()?;
            Err(self.error_near(format!("'{expected}' expected")))
        }
    }

    /// Expect an identifier; returns its line and text.
    pub(crate) fn expect_name(&mut self) -> Result<(u32, String), CompileError> {
        let line = self.line();
        match self.current()? {
            Token::Name(_) => match self.advance()? {
                Token::Name(name) => Ok((line, name)),
                _ => unreachable!(),
            },
            _ => Err(self.error_near("<name> expected")),
        }
    }

    /// Error at the current token, with "near '...'" context.
    pub(crate) fn error_near(&self, msg: impl Into<String>) -> CompileError {
        CompileError::new(
            format!("{} near '{}'", msg.into(), self.lexer.token_text),
            self.line(),
        )
    }

    // ---- Blocks and statements ----

    pub(crate) fn block(&mut self) -> Result<Block, CompileError> {
        let stats = self.stats()?;
        let ret_exps = self.ret_exps()?;
        Ok(Block {
            last_line: self.line(),
            stats,
            ret_exps,
        })
    }

    fn stats(&mut self) -> Result<Vec<Stat>, CompileError> {
        let mut stats = Vec::new();
        loop {
            let tok = self.current()?;
            if tok.ends_block() || *tok == Token::Return {
                return Ok(stats);
            }
            let stat = self.stat()?;
            if stat != Stat::Empty {
                stats.push(stat);
            }
        }
    }

    /// The optional trailing `return [explist] [';']`.
    fn ret_exps(&mut self) -> Result<Option<Vec<Exp>>, CompileError> {
        if !self.test_next(&Token::Return)? {
            return Ok(None);
        }
        match self.current()? {
            tok if tok.ends_block() => Ok(Some(Vec::new())),
            Token::Semi => {
                self.advance()?;
                Ok(Some(Vec::new()))
            }
            _ => {
                let exps = self.exp_list()?;
                self.test_next(&Token::Semi)?;
                Ok(Some(exps))
            }
        }
    }

    fn stat(&mut self) -> Result<Stat, CompileError> {
        match self.current()? {
            Token::Semi => {
                self.advance()?;
                Ok(Stat::Empty)
            }
            Token::Break => {
                let line = self.line();
                self.advance()?;
                Ok(Stat::Break { line })
            }
            Token::DoubleColon => self.label_stat(),
            Token::Goto => self.goto_stat(),
            Token::Do => self.do_stat(),
            Token::While => self.while_stat(),
            Token::Repeat => self.repeat_stat(),
            Token::If => self.if_stat(),
            Token::For => self.for_stat(),
            Token::Function => self.func_def_stat(),
            Token::Local => self.local_stat(),
            _ => self.exp_stat(),
        }
    }

    fn label_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::DoubleColon)?;
        let (line, name) = self.expect_name()?;
        self.expect(&Token::DoubleColon)?;
        Ok(Stat::Label { line, name })
    }

    fn goto_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.expect(&Token::Goto)?;
        let (_, name) = self.expect_name()?;
        Ok(Stat::Goto { line, name })
    }

    fn do_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::Do)?;
        let block = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::Do {
            block: Box::new(block),
        })
    }

    fn while_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::While)?;
        let exp = self.exp()?;
        self.expect(&Token::Do)?;
        let block = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::While {
            exp,
            block: Box::new(block),
        })
    }

    fn repeat_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::Repeat)?;
        let block = self.block()?;
        self.expect(&Token::Until)?;
        let exp = self.exp()?;
        Ok(Stat::Repeat {
            block: Box::new(block),
            exp,
        })
    }

    fn if_stat(&mut self) -> Result<Stat, CompileError> {
        let mut exps = Vec::new();
        let mut blocks = Vec::new();

        self.expect(&Token::If)?;
        exps.push(self.exp()?);
        self.expect(&Token::Then)?;
        blocks.push(self.block()?);

        while self.check(&Token::ElseIf) {
            self.advance()?;
            exps.push(self.exp()?);
            self.expect(&Token::Then)?;
            blocks.push(self.block()?);
        }

        // A final else clause is an elseif with a true condition
        if self.check(&Token::Else) {
            let line = self.line();
            self.advance()?;
            exps.push(Exp::True { line });
            blocks.push(self.block()?);
        }

        self.expect(&Token::End)?;
        Ok(Stat::If { exps, blocks })
    }

    fn for_stat(&mut self) -> Result<Stat, CompileError> {
        let line_of_for = self.line();
        self.expect(&Token::For)?;
        let (_, name) = self.expect_name()?;
        if self.check(&Token::Assign) {
            self.finish_for_num_stat(line_of_for, name)
        } else {
            self.finish_for_in_stat(name)
        }
    }

    fn finish_for_num_stat(&mut self, line_of_for: u32, var_name: String) -> Result<Stat, CompileError> {
        self.expect(&Token::Assign)?;
        let init = self.exp()?;
        self.expect(&Token::Comma)?;
        let limit = self.exp()?;
        let step = if self.test_next(&Token::Comma)? {
            self.exp()?
        } else {
            Exp::Integer {
                line: line_of_for,
                val: 1,
            }
        };
        let line_of_do = self.line();
        self.expect(&Token::Do)?;
        let block = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::ForNum {
            line_of_for,
            line_of_do,
            var_name,
            init,
            limit,
            step,
            block: Box::new(block),
        })
    }

    fn finish_for_in_stat(&mut self, first_name: String) -> Result<Stat, CompileError> {
        let mut names = vec![first_name];
        while self.test_next(&Token::Comma)? {
            names.push(self.expect_name()?.1);
        }
        self.expect(&Token::In)?;
        let exps = self.exp_list()?;
        let line_of_do = self.line();
        self.expect(&Token::Do)?;
        let block = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::ForIn {
            line_of_do,
            names,
            exps,
            block: Box::new(block),
        })
    }

    /// `function f...`, `function t.a.b...`, `function t.a.b:c...` all
    /// desugar to an assignment of a function expression.
    fn func_def_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::Function)?;
        let (var, is_method) = self.func_name()?;
        let mut body = self.func_body()?;
        if is_method {
            body.params.insert(0, "self".to_string());
        }
        let last_line = body.line;
        Ok(Stat::Assign {
            last_line,
            vars: vec![var],
            exps: vec![Exp::FuncDef(body)],
        })
    }

    /// funcname ::= Name {'.' Name} [':' Name]
    fn func_name(&mut self) -> Result<(Exp, bool), CompileError> {
        let (line, name) = self.expect_name()?;
        let mut exp = Exp::Name { line, name };

        while self.test_next(&Token::Dot)? {
            let (line, name) = self.expect_name()?;
            exp = Exp::TableAccess {
                last_line: line,
                prefix: Box::new(exp),
                key: Box::new(Exp::Str {
                    line,
                    val: name.into_bytes(),
                }),
            };
        }

        let mut is_method = false;
        if self.test_next(&Token::Colon)? {
            let (line, name) = self.expect_name()?;
            exp = Exp::TableAccess {
                last_line: line,
                prefix: Box::new(exp),
                key: Box::new(Exp::Str {
                    line,
                    val: name.into_bytes(),
                }),
            };
            is_method = true;
        }

        Ok((exp, is_method))
    }

    /// Function literal body, with `function` already consumed.
    pub(crate) fn func_body(&mut self) -> Result<FuncBody, CompileError> {
        let line = self.line();
        self.expect(&Token::LParen)?;
        let (params, is_vararg) = self.param_list()?;
        self.expect(&Token::RParen)?;
        let block = self.block()?;
        let last_line = self.line();
        self.expect(&Token::End)?;
        Ok(FuncBody {
            line,
            last_line,
            params,
            is_vararg,
            block: Box::new(block),
        })
    }

    fn param_list(&mut self) -> Result<(Vec<String>, bool), CompileError> {
        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return Ok((params, false));
        }
        loop {
            match self.current()? {
                Token::Ellipsis => {
                    self.advance()?;
                    return Ok((params, true));
                }
                Token::Name(_) => {
                    params.push(self.expect_name()?.1);
                }
                _ => return Err(self.error_near("<name> expected")),
            }
            if !self.test_next(&Token::Comma)? {
                return Ok((params, false));
            }
        }
    }

    fn local_stat(&mut self) -> Result<Stat, CompileError> {
        self.expect(&Token::Local)?;
        if self.test_next(&Token::Function)? {
            let (_, name) = self.expect_name()?;
            let body = self.func_body()?;
            Ok(Stat::LocalFuncDef {
                name,
                exp: Exp::FuncDef(body),
            })
        } else {
            let mut names = vec![self.expect_name()?.1];
            while self.test_next(&Token::Comma)? {
                names.push(self.expect_name()?.1);
            }
            let exps = if self.test_next(&Token::Assign)? {
                self.exp_list()?
            } else {
                Vec::new()
            };
            Ok(Stat::LocalVarDecl {
                last_line: self.lexer.lastline,
                names,
                exps,
            })
        }
    }

    /// A statement starting with an expression: either a call or the
    /// left side of an assignment.
    fn exp_stat(&mut self) -> Result<Stat, CompileError> {
        let exp = self.prefix_exp()?;
        if self.check(&Token::Assign) || self.check(&Token::Comma) {
            return self.finish_assign_stat(exp);
        }
        match exp {
            Exp::FuncCall(call) => Ok(Stat::FuncCall(call)),
            _ => Err(self.error_near("syntax error")),
        }
    }

    fn finish_assign_stat(&mut self, first: Exp) -> Result<Stat, CompileError> {
        let mut vars = vec![self.check_var(first)?];
        while self.test_next(&Token::Comma)? {
            let exp = self.prefix_exp()?;
            vars.push(self.check_var(exp)?);
        }
        self.expect(&Token::Assign)?;
        let exps = self.exp_list()?;
        Ok(Stat::Assign {
            last_line: self.lexer.lastline,
            vars,
            exps,
        })
    }

    /// Only names and table fields are assignable.
    fn check_var(&self, exp: Exp) -> Result<Exp, CompileError> {
        match exp {
            Exp::Name { .. } | Exp::TableAccess { .. } => Ok(exp),
            _ => Err(self.error_near("syntax error")),
        }
    }
}
