//! Tokens produced by the lexer.

use std::fmt;

/// All tokens of the language.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Keywords
    And,
    Break,
    Do,
    Else,
    ElseIf,
    End,
    False,
    For,
    Function,
    Goto,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Repeat,
    Return,
    Then,
    True,
    Until,
    While,

    // Literal-carrying tokens
    Integer(i64),
    Float(f64),
    /// String literal bytes (escapes may produce non-UTF-8 data).
    Str(Vec<u8>),
    Name(String),

    // Operators and punctuation
    Plus,        // +
    Minus,       // -
    Star,        // *
    Slash,       // /
    DoubleSlash, // //
    Percent,     // %
    Caret,       // ^
    Hash,        // #
    Ampersand,   // &
    Tilde,       // ~
    Pipe,        // |
    ShiftLeft,   // <<
    ShiftRight,  // >>
    Equal,       // ==
    NotEqual,    // ~=
    LessEq,      // <=
    GreaterEq,   // >=
    Less,        // <
    Greater,     // >
    Assign,      // =
    LParen,      // (
    RParen,      // )
    LBrace,      // {
    RBrace,      // }
    LBracket,    // [
    RBracket,    // ]
    DoubleColon, // ::
    Semi,        // ;
    Colon,       // :
    Comma,       // ,
    Dot,         // .
    Concat,      // ..
    Ellipsis,    // ...

    Eof,
}

impl Token {
    /// The keyword token for `s`, if it names one.
    pub fn keyword(s: &str) -> Option<Token> {
        let tok = match s {
            "and" => Token::And,
            "break" => Token::Break,
            "do" => Token::Do,
            "else" => Token::Else,
            "elseif" => Token::ElseIf,
            "end" => Token::End,
            "false" => Token::False,
            "for" => Token::For,
            "function" => Token::Function,
            "goto" => Token::Goto,
            "if" => Token::If,
            "in" => Token::In,
            "local" => Token::Local,
            "nil" => Token::Nil,
            "not" => Token::Not,
            "or" => Token::Or,
            "repeat" => Token::Repeat,
            "return" => Token::Return,
            "then" => Token::Then,
            "true" => Token::True,
            "until" => Token::Until,
            "while" => Token::While,
            _ => return None,
        };
        Some(tok)
    }

    /// True if this token can begin a block-ending clause.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Token::End | Token::Else | Token::ElseIf | Token::Until | Token::Eof
        )
    }
}

impl fmt::Display for Token {
    /// The token as error messages spell it (`'end' expected near '...'`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::And => "and",
            Token::Break => "break",
            Token::Do => "do",
            Token::Else => "else",
            Token::ElseIf => "elseif",
            Token::End => "end",
            Token::False => "false",
            Token::For => "for",
            Token::Function => "function",
            Token::Goto => "goto",
            Token::If => "if",
            Token::In => "in",
            Token::Local => "local",
            Token::Nil => "nil",
            Token::Not => "not",
            Token::Or => "or",
            Token::Repeat => "repeat",
            Token::Return => "return",
            Token::Then => "then",
            Token::True => "true",
            Token::Until => "until",
            Token::While => "while",
            Token::Integer(i) => return write!(f, "{i}"),
            Token::Float(x) => return write!(f, "{x}"),
            Token::Str(s) => return write!(f, "{}", String::from_utf8_lossy(s)),
            Token::Name(n) => return write!(f, "{n}"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Hash => "#",
            Token::Ampersand => "&",
            Token::Tilde => "~",
            Token::Pipe => "|",
            Token::ShiftLeft => "<<",
            Token::ShiftRight => ">>",
            Token::Equal => "==",
            Token::NotEqual => "~=",
            Token::LessEq => "<=",
            Token::GreaterEq => ">=",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::DoubleColon => "::",
            Token::Semi => ";",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Concat => "..",
            Token::Ellipsis => "...",
            Token::Eof => "<eof>",
        };
        write!(f, "{text}")
    }
}
