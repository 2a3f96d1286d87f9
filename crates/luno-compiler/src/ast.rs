//! Syntax tree produced by the parser and consumed by the code emitter.

/// A sequence of statements with an optional trailing return.
///
/// `ret_exps` is `None` when the block has no `return` statement at all and
/// `Some(vec![])` for a bare `return`.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub last_line: u32,
    pub stats: Vec<Stat>,
    pub ret_exps: Option<Vec<Exp>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stat {
    Empty,
    Break {
        line: u32,
    },
    Label {
        line: u32,
        name: String,
    },
    Goto {
        line: u32,
        name: String,
    },
    Do {
        block: Box<Block>,
    },
    While {
        exp: Exp,
        block: Box<Block>,
    },
    Repeat {
        block: Box<Block>,
        exp: Exp,
    },
    /// `if exps[0] then blocks[0] elseif exps[1] then blocks[1] ... end`.
    /// A final `else` is stored as a `true` condition.
    If {
        exps: Vec<Exp>,
        blocks: Vec<Block>,
    },
    ForNum {
        line_of_for: u32,
        line_of_do: u32,
        var_name: String,
        init: Exp,
        limit: Exp,
        step: Exp,
        block: Box<Block>,
    },
    ForIn {
        line_of_do: u32,
        names: Vec<String>,
        exps: Vec<Exp>,
        block: Box<Block>,
    },
    LocalVarDecl {
        last_line: u32,
        names: Vec<String>,
        exps: Vec<Exp>,
    },
    Assign {
        last_line: u32,
        vars: Vec<Exp>,
        exps: Vec<Exp>,
    },
    /// `local function f() ... end`; the name is in scope inside the body.
    LocalFuncDef {
        name: String,
        exp: Exp,
    },
    FuncCall(FuncCall),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Exp {
    Nil {
        line: u32,
    },
    True {
        line: u32,
    },
    False {
        line: u32,
    },
    Vararg {
        line: u32,
    },
    Integer {
        line: u32,
        val: i64,
    },
    Float {
        line: u32,
        val: f64,
    },
    Str {
        line: u32,
        val: Vec<u8>,
    },
    Name {
        line: u32,
        name: String,
    },
    Unop {
        line: u32,
        op: UnOp,
        exp: Box<Exp>,
    },
    Binop {
        line: u32,
        op: BinOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },
    /// `a .. b .. c` flattened; concat is right-associative but the
    /// operands evaluate left to right into one CONCAT instruction.
    Concat {
        line: u32,
        exps: Vec<Exp>,
    },
    /// Constructor entries in source order; a `None` key is an array item.
    TableCtor {
        line: u32,
        last_line: u32,
        keys: Vec<Option<Exp>>,
        vals: Vec<Exp>,
    },
    FuncDef(FuncBody),
    /// Parenthesized expression: truncates multi-value results to one.
    Parens(Box<Exp>),
    TableAccess {
        last_line: u32,
        prefix: Box<Exp>,
        key: Box<Exp>,
    },
    FuncCall(FuncCall),
}

/// A function literal body (shared by `function` expressions and sugar forms).
#[derive(Clone, Debug, PartialEq)]
pub struct FuncBody {
    pub line: u32,
    pub last_line: u32,
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub block: Box<Block>,
}

/// `f(args)` or `obj:method(args)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FuncCall {
    pub line: u32,
    pub last_line: u32,
    pub prefix: Box<Exp>,
    pub method: Option<String>,
    pub args: Vec<Exp>,
}

impl Exp {
    /// Line to report for errors and debug info involving this expression.
    pub fn line(&self) -> u32 {
        match self {
            Exp::Nil { line }
            | Exp::True { line }
            | Exp::False { line }
            | Exp::Vararg { line }
            | Exp::Integer { line, .. }
            | Exp::Float { line, .. }
            | Exp::Str { line, .. }
            | Exp::Name { line, .. }
            | Exp::Unop { line, .. }
            | Exp::Binop { line, .. }
            | Exp::Concat { line, .. }
            | Exp::TableCtor { line, .. } => *line,
            Exp::FuncDef(body) => body.line,
            Exp::Parens(inner) => inner.line(),
            Exp::TableAccess { last_line, .. } => *last_line,
            Exp::FuncCall(call) => call.line,
        }
    }

    /// True for expressions that can produce multiple values.
    pub fn is_multi_value(&self) -> bool {
        matches!(self, Exp::Vararg { .. } | Exp::FuncCall(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    BNot,
    Not,
    Len,
}
