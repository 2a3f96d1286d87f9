//! Expression parsing: the precedence ladder, prefix expressions, and
//! parse-time constant folding.

use super::Parser;
use crate::ast::{BinOp, Exp, FuncCall, UnOp};
use crate::token::Token;
use crate::CompileError;
use luno_core::number;

impl<'a> Parser<'a> {
    pub(crate) fn exp_list(&mut self) -> Result<Vec<Exp>, CompileError> {
        let mut exps = vec![self.exp()?];
        while self.test_next(&Token::Comma)? {
            exps.push(self.exp()?);
        }
        Ok(exps)
    }

    /// Lowest precedence level: `or`.
    pub(crate) fn exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.and_exp()?;
        while self.check(&Token::Or) {
            let line = self.line();
            self.advance()?;
            let rhs = self.and_exp()?;
            exp = fold_or(line, exp, rhs);
        }
        Ok(exp)
    }

    fn and_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.cmp_exp()?;
        while self.check(&Token::And) {
            let line = self.line();
            self.advance()?;
            let rhs = self.cmp_exp()?;
            exp = fold_and(line, exp, rhs);
        }
        Ok(exp)
    }

    /// Comparisons are never folded.
    fn cmp_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.bor_exp()?;
        loop {
            let op = match self.current()? {
                Token::Less => BinOp::Lt,
                Token::Greater => BinOp::Gt,
                Token::LessEq => BinOp::LtEq,
                Token::GreaterEq => BinOp::GtEq,
                Token::NotEqual => BinOp::NotEq,
                Token::Equal => BinOp::Eq,
                _ => return Ok(exp),
            };
            let line = self.line();
            self.advance()?;
            let rhs = self.bor_exp()?;
            exp = Exp::Binop {
                line,
                op,
                lhs: Box::new(exp),
                rhs: Box::new(rhs),
            };
        }
    }

    fn bor_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.bxor_exp()?;
        while self.check(&Token::Pipe) {
            let line = self.line();
            self.advance()?;
            let rhs = self.bxor_exp()?;
            exp = fold_bitwise(line, BinOp::BOr, exp, rhs);
        }
        Ok(exp)
    }

    fn bxor_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.band_exp()?;
        while self.check(&Token::Tilde) {
            let line = self.line();
            self.advance()?;
            let rhs = self.band_exp()?;
            exp = fold_bitwise(line, BinOp::BXor, exp, rhs);
        }
        Ok(exp)
    }

    fn band_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.shift_exp()?;
        while self.check(&Token::Ampersand) {
            let line = self.line();
            self.advance()?;
            let rhs = self.shift_exp()?;
            exp = fold_bitwise(line, BinOp::BAnd, exp, rhs);
        }
        Ok(exp)
    }

    fn shift_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.concat_exp()?;
        loop {
            let op = match self.current()? {
                Token::ShiftLeft => BinOp::Shl,
                Token::ShiftRight => BinOp::Shr,
                _ => return Ok(exp),
            };
            let line = self.line();
            self.advance()?;
            let rhs = self.concat_exp()?;
            exp = fold_bitwise(line, op, exp, rhs);
        }
    }

    /// A run of `..` collects all operands into one concat node.
    fn concat_exp(&mut self) -> Result<Exp, CompileError> {
        let exp = self.add_exp()?;
        if !self.check(&Token::Concat) {
            return Ok(exp);
        }
        let mut line = 0;
        let mut exps = vec![exp];
        while self.check(&Token::Concat) {
            line = self.line();
            self.advance()?;
            exps.push(self.add_exp()?);
        }
        Ok(Exp::Concat { line, exps })
    }

    fn add_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.mul_exp()?;
        loop {
            let op = match self.current()? {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(exp),
            };
            let line = self.line();
            self.advance()?;
            let rhs = self.mul_exp()?;
            exp = fold_arith(line, op, exp, rhs);
        }
    }

    fn mul_exp(&mut self) -> Result<Exp, CompileError> {
        let mut exp = self.unary_exp()?;
        loop {
            let op = match self.current()? {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                Token::DoubleSlash => BinOp::IDiv,
                _ => return Ok(exp),
            };
            let line = self.line();
            self.advance()?;
            let rhs = self.unary_exp()?;
            exp = fold_arith(line, op, exp, rhs);
        }
    }

    fn unary_exp(&mut self) -> Result<Exp, CompileError> {
        let op = match self.current()? {
            Token::Minus => UnOp::Neg,
            Token::Not => UnOp::Not,
            Token::Tilde => UnOp::BNot,
            Token::Hash => UnOp::Len,
            _ => return self.pow_exp(),
        };
        let line = self.line();
        self.advance()?;
        let exp = self.unary_exp()?;
        Ok(fold_unop(line, op, exp))
    }

    /// `^` is right-associative and binds tighter than unary operators
    /// on its left, so the right operand re-enters at the unary level.
    fn pow_exp(&mut self) -> Result<Exp, CompileError> {
        let exp = self.atom_exp()?;
        if self.check(&Token::Caret) {
            let line = self.line();
            self.advance()?;
            let rhs = self.unary_exp()?;
            return Ok(fold_arith(line, BinOp::Pow, exp, rhs));
        }
        Ok(exp)
    }

    fn atom_exp(&mut self) -> Result<Exp, CompileError> {
        let line = self.line();
        match self.current()? {
            Token::Ellipsis => {
                self.advance()?;
                Ok(Exp::Vararg { line })
            }
            Token::Nil => {
                self.advance()?;
                Ok(Exp::Nil { line })
            }
            Token::True => {
                self.advance()?;
                Ok(Exp::True { line })
            }
            Token::False => {
                self.advance()?;
                Ok(Exp::False { line })
            }
            Token::Integer(_) => match self.advance()? {
                Token::Integer(val) => Ok(Exp::Integer { line, val }),
                _ => unreachable!(),
            },
            Token::Float(_) => match self.advance()? {
                Token::Float(val) => Ok(Exp::Float { line, val }),
                _ => unreachable!(),
            },
            Token::Str(_) => match self.advance()? {
                Token::Str(val) => Ok(Exp::Str { line, val }),
                _ => unreachable!(),
            },
            Token::LBrace => self.table_ctor(),
            Token::Function => {
                self.advance()?;
                Ok(Exp::FuncDef(self.func_body()?))
            }
            _ => self.prefix_exp(),
        }
    }

    // ---- Prefix expressions ----

    pub(crate) fn prefix_exp(&mut self) -> Result<Exp, CompileError> {
        let exp = match self.current()? {
            Token::Name(_) => {
                let (line, name) = self.expect_name()?;
                Exp::Name { line, name }
            }
            Token::LParen => self.parens_exp()?,
            _ => return Err(self.error_near("unexpected symbol")),
        };
        self.finish_prefix_exp(exp)
    }

    fn parens_exp(&mut self) -> Result<Exp, CompileError> {
        self.expect(&Token::LParen)?;
        let exp = self.exp()?;
        self.expect(&Token::RParen)?;
        // Keep the parens only where they change meaning: truncating a
        // multi-value expression, or blocking variable interpretation.
        match exp {
            Exp::Vararg { .. } | Exp::FuncCall(_) | Exp::Name { .. } | Exp::TableAccess { .. } => {
                Ok(Exp::Parens(Box::new(exp)))
            }
            _ => Ok(exp),
        }
    }

    fn finish_prefix_exp(&mut self, mut exp: Exp) -> Result<Exp, CompileError> {
        loop {
            match self.current()? {
                Token::LBracket => {
                    self.advance()?;
                    let key = self.exp()?;
                    self.expect(&Token::RBracket)?;
                    exp = Exp::TableAccess {
                        last_line: self.lexer.lastline,
                        prefix: Box::new(exp),
                        key: Box::new(key),
                    };
                }
                Token::Dot => {
                    self.advance()?;
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
                Token::Colon | Token::LParen | Token::LBrace | Token::Str(_) => {
                    exp = Exp::FuncCall(self.finish_func_call(exp)?);
                }
                _ => return Ok(exp),
            }
        }
    }

    fn finish_func_call(&mut self, prefix: Exp) -> Result<FuncCall, CompileError> {
        let method = if self.test_next(&Token::Colon)? {
            Some(self.expect_name()?.1)
        } else {
            None
        };
        let line = self.line();
        let args = self.call_args()?;
        Ok(FuncCall {
            line,
            last_line: self.lexer.lastline,
            prefix: Box::new(prefix),
            method,
            args,
        })
    }

    /// args ::= '(' [explist] ')' | tablector | LiteralString
    fn call_args(&mut self) -> Result<Vec<Exp>, CompileError> {
        match self.current()? {
            Token::LParen => {
                self.advance()?;
                let args = if self.check(&Token::RParen) {
                    Vec::new()
                } else {
                    self.exp_list()?
                };
                self.expect(&Token::RParen)?;
                Ok(args)
            }
            Token::LBrace => Ok(vec![self.table_ctor()?]),
            Token::Str(_) => {
                let line = self.line();
                match self.advance()? {
                    Token::Str(val) => Ok(vec![Exp::Str { line, val }]),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.error_near("function arguments expected")),
        }
    }

    fn table_ctor(&mut self) -> Result<Exp, CompileError> {
        let line = self.line();
        self.expect(&Token::LBrace)?;
        let mut keys = Vec::new();
        let mut vals = Vec::new();
        while !self.check(&Token::RBrace) {
            let (k, v) = self.field()?;
            keys.push(k);
            vals.push(v);
            if !self.test_next(&Token::Comma)? && !self.test_next(&Token::Semi)? {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Exp::TableCtor {
            line,
            last_line: self.lexer.lastline,
            keys,
            vals,
        })
    }

    /// field ::= '[' exp ']' '=' exp | Name '=' exp | exp
    fn field(&mut self) -> Result<(Option<Exp>, Exp), CompileError> {
        if self.test_next(&Token::LBracket)? {
            let k = self.exp()?;
            self.expect(&Token::RBracket)?;
            self.expect(&Token::Assign)?;
            let v = self.exp()?;
            return Ok((Some(k), v));
        }
        let exp = self.exp()?;
        // A bare name followed by '=' was actually a field key
        if let Exp::Name { line, name } = &exp {
            if self.check(&Token::Assign) {
                let (line, name) = (*line, name.clone());
                self.advance()?;
                let v = self.exp()?;
                return Ok((
                    Some(Exp::Str {
                        line,
                        val: name.into_bytes(),
                    }),
                    v,
                ));
            }
        }
        Ok((None, exp))
    }
}

// ---- Constant folding ----

fn is_const_truthy(exp: &Exp) -> bool {
    matches!(
        exp,
        Exp::True { .. } | Exp::Integer { .. } | Exp::Float { .. } | Exp::Str { .. }
    )
}

fn is_const_falsy(exp: &Exp) -> bool {
    matches!(exp, Exp::Nil { .. } | Exp::False { .. })
}

fn cast_to_int(exp: &Exp) -> Option<i64> {
    match exp {
        Exp::Integer { val, .. } => Some(*val),
        Exp::Float { val, .. } => number::float_to_integer(*val),
        _ => None,
    }
}

fn cast_to_float(exp: &Exp) -> Option<f64> {
    match exp {
        Exp::Integer { val, .. } => Some(*val as f64),
        Exp::Float { val, .. } => Some(*val),
        _ => None,
    }
}

/// `and` with a literal left side folds away; a multi-value right side
/// must survive so it still truncates to one value.
fn fold_and(line: u32, lhs: Exp, rhs: Exp) -> Exp {
    if is_const_falsy(&lhs) {
        return lhs;
    }
    if is_const_truthy(&lhs) && !rhs.is_multi_value() {
        return rhs;
    }
    Exp::Binop {
        line,
        op: BinOp::And,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold_or(line: u32, lhs: Exp, rhs: Exp) -> Exp {
    if is_const_truthy(&lhs) {
        return lhs;
    }
    if is_const_falsy(&lhs) && !rhs.is_multi_value() {
        return rhs;
    }
    Exp::Binop {
        line,
        op: BinOp::Or,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold_bitwise(line: u32, op: BinOp, lhs: Exp, rhs: Exp) -> Exp {
    if let (Some(a), Some(b)) = (cast_to_int(&lhs), cast_to_int(&rhs)) {
        let val = match op {
            BinOp::BAnd => a & b,
            BinOp::BOr => a | b,
            BinOp::BXor => a ^ b,
            BinOp::Shl => number::shift_left(a, b),
            BinOp::Shr => number::shift_right(a, b),
            _ => unreachable!("not a bitwise op: {op:?}"),
        };
        return Exp::Integer { line, val };
    }
    Exp::Binop {
        line,
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold_arith(line: u32, op: BinOp, lhs: Exp, rhs: Exp) -> Exp {
    if let (Exp::Integer { val: a, .. }, Exp::Integer { val: b, .. }) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        match op {
            BinOp::Add => {
                return Exp::Integer {
                    line,
                    val: a.wrapping_add(b),
                }
            }
            BinOp::Sub => {
                return Exp::Integer {
                    line,
                    val: a.wrapping_sub(b),
                }
            }
            BinOp::Mul => {
                return Exp::Integer {
                    line,
                    val: a.wrapping_mul(b),
                }
            }
            BinOp::IDiv if b != 0 => {
                return Exp::Integer {
                    line,
                    val: number::int_floor_div(a, b),
                }
            }
            BinOp::Mod if b != 0 => {
                return Exp::Integer {
                    line,
                    val: number::int_mod(a, b),
                }
            }
            _ => {}
        }
    }
    if let (Some(a), Some(b)) = (cast_to_float(&lhs), cast_to_float(&rhs)) {
        match op {
            BinOp::Add => return Exp::Float { line, val: a + b },
            BinOp::Sub => return Exp::Float { line, val: a - b },
            BinOp::Mul => return Exp::Float { line, val: a * b },
            BinOp::Div => return Exp::Float { line, val: a / b },
            BinOp::Pow => {
                return Exp::Float {
                    line,
                    val: a.powf(b),
                }
            }
            _ => {}
        }
    }
    Exp::Binop {
        line,
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold_unop(line: u32, op: UnOp, exp: Exp) -> Exp {
    match op {
        UnOp::Neg => match exp {
            Exp::Integer { line: l, val } => Exp::Integer {
                line: l,
                val: val.wrapping_neg(),
            },
            // Skip 0.0 so negation still produces -0.0 at runtime
            Exp::Float { line: l, val } if val != 0.0 => Exp::Float { line: l, val: -val },
            other => Exp::Unop {
                line,
                op,
                exp: Box::new(other),
            },
        },
        UnOp::Not => match exp {
            Exp::Nil { line: l } | Exp::False { line: l } => Exp::True { line: l },
            Exp::True { line: l }
            | Exp::Integer { line: l, .. }
            | Exp::Float { line: l, .. }
            | Exp::Str { line: l, .. } => Exp::False { line: l },
            other => Exp::Unop {
                line,
                op,
                exp: Box::new(other),
            },
        },
        UnOp::BNot => match exp {
            Exp::Integer { line: l, val } => Exp::Integer { line: l, val: !val },
            Exp::Float { line: l, val } => match number::float_to_integer(val) {
                Some(i) => Exp::Integer { line: l, val: !i },
                None => Exp::Unop {
                    line,
                    op,
                    exp: Box::new(Exp::Float { line: l, val }),
                },
            },
            other => Exp::Unop {
                line,
                op,
                exp: Box::new(other),
            },
        },
        UnOp::Len => Exp::Unop {
            line,
            op,
            exp: Box::new(exp),
        },
    }
}
