//! Pull-based lexer over raw source bytes.

use crate::token::Token;
use crate::CompileError;
use luno_core::number;

/// Lexer with a one-token lookahead window.
///
/// The current token is always primed; `advance` consumes it and scans
/// the next one.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    current: Option<Result<Token, CompileError>>,
    current_line: u32,
    /// Original text of the current token, for "near '...'" messages.
    pub token_text: String,
    /// Line of the last consumed token.
    pub lastline: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Lexer<'a> {
        let mut lexer = Lexer {
            source,
            line: 1,
            pos: 0,
            current: None,
            current_line: 1,
            token_text: String::new(),
            lastline: 1,
        };
        lexer.current = Some(lexer.scan_token());
        lexer
    }

    /// Peek at the current token without consuming it.
    pub fn current(&self) -> Result<&Token, CompileError> {
        match &self.current {
            Some(Ok(tok)) => Ok(tok),
            Some(Err(e)) => Err(e.clone()),
            None => unreachable!("lexer always holds a current token"),
        }
    }

    /// Line on which the current token starts.
    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// Consume the current token and scan the next one.
    pub fn advance(&mut self) -> Result<Token, CompileError> {
        if matches!(self.current, Some(Ok(_))) {
            self.lastline = self.current_line;
        }
        let prev = self.current.take();
        self.current = Some(self.scan_token());
        prev.unwrap()
    }

    /// Line the scanner itself is on (ahead of the current token).
    pub fn line(&self) -> u32 {
        self.line
    }

    // ---- Byte-level scanning ----

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<u8> {
        self.source.get(self.pos + n).copied()
    }

    /// Consume the next byte if it equals `expected`.
    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume bytes while `pred` holds.
    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    /// Consume one byte, folding `\n\r` and `\r\n` pairs into one line.
    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' || ch == b'\r' {
            let pair = if ch == b'\n' { b'\r' } else { b'\n' };
            if self.peek() == Some(pair) {
                self.pos += 1;
            }
            self.line += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            self.skip_while(is_space);

            if self.peek() != Some(b'-') || self.peek_ahead(1) != Some(b'-') {
                return Ok(());
            }
            let comment_line = self.line;
            self.bump();
            self.bump();
            if let Some(level) = self.long_bracket_level() {
                self.skip_long_open(level);
                self.scan_long_content(level, comment_line, "comment")?;
                continue;
            }
            // Short comment runs to end of line
            self.skip_while(|c| c != b'\n' && c != b'\r');
        }
    }

    /// Level of the long bracket `[=*[` at the current position, if any.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_ahead(level + 1) == Some(b'=') {
            level += 1;
        }
        (self.peek_ahead(level + 1) == Some(b'[')).then_some(level)
    }

    /// Consume an opening `[=*[` whose level was already checked.
    fn skip_long_open(&mut self, level: usize) {
        for _ in 0..level + 2 {
            self.bump();
        }
    }

    fn scan_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace_and_comments()?;

        let start = self.pos;
        self.current_line = self.line;
        let result = self.scan_token_inner();
        if start < self.pos && start < self.source.len() {
            self.token_text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        }
        result
    }

    fn scan_token_inner(&mut self) -> Result<Token, CompileError> {
        let line = self.line;

        let Some(ch) = self.peek() else {
            self.token_text = "<eof>".to_string();
            return Ok(Token::Eof);
        };

        match ch {
            b'+' | b'*' | b'^' | b'%' | b'&' | b'|' | b'(' | b')' | b'{' | b'}' | b']' | b';'
            | b',' | b'#' => {
                self.bump();
                Ok(single_byte_token(ch))
            }
            b'-' => {
                // Comments were taken by skip_whitespace_and_comments
                self.bump();
                Ok(Token::Minus)
            }
            b'/' => {
                self.bump();
                Ok(if self.eat(b'/') { Token::DoubleSlash } else { Token::Slash })
            }
            b'<' => {
                self.bump();
                if self.eat(b'<') {
                    Ok(Token::ShiftLeft)
                } else if self.eat(b'=') {
                    Ok(Token::LessEq)
                } else {
                    Ok(Token::Less)
                }
            }
            b'>' => {
                self.bump();
                if self.eat(b'>') {
                    Ok(Token::ShiftRight)
                } else if self.eat(b'=') {
                    Ok(Token::GreaterEq)
                } else {
                    Ok(Token::Greater)
                }
            }
            b'=' => {
                self.bump();
                Ok(if self.eat(b'=') { Token::Equal } else { Token::Assign })
            }
            b'~' => {
                self.bump();
                Ok(if self.eat(b'=') { Token::NotEqual } else { Token::Tilde })
            }
            b':' => {
                self.bump();
                Ok(if self.eat(b':') { Token::DoubleColon } else { Token::Colon })
            }
            b'.' => {
                self.bump();
                if self.eat(b'.') {
                    Ok(if self.eat(b'.') { Token::Ellipsis } else { Token::Concat })
                } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number_after_dot(line)
                } else {
                    Ok(Token::Dot)
                }
            }
            b'[' => {
                if let Some(level) = self.long_bracket_level() {
                    self.scan_long_string(level, line)
                } else {
                    self.bump();
                    Ok(Token::LBracket)
                }
            }
            b'"' | b'\'' => self.scan_short_string(line),
            b'0'..=b'9' => self.scan_number(line),
            _ if is_name_start(ch) => self.scan_name(),
            _ => {
                self.bump();
                let near = if ch.is_ascii_graphic() || ch == b' ' {
                    format!("'{}'", ch as char)
                } else {
                    format!("'<\\{ch}>'")
                };
                Err(self.error(format!("unexpected symbol near {near}"), line))
            }
        }
    }

    fn scan_name(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        self.skip_while(is_name_char);
        // Name bytes are ASCII, so the slice is always valid UTF-8
        let name = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        match Token::keyword(name) {
            Some(keyword) => Ok(keyword),
            None => Ok(Token::Name(name.to_string())),
        }
    }

    fn scan_number(&mut self, line: u32) -> Result<Token, CompileError> {
        let start = self.pos;

        if self.peek() == Some(b'0') && self.peek_ahead(1).is_some_and(|c| c == b'x' || c == b'X') {
            self.bump(); // 0
            self.bump(); // x
            self.scan_hex_number(start, line)
        } else {
            self.scan_decimal_number(start, line)
        }
    }

    fn scan_decimal_number(&mut self, start: usize, line: u32) -> Result<Token, CompileError> {
        let mut is_float = false;

        self.skip_while(|c| c.is_ascii_digit());

        if self.peek() == Some(b'.') && self.peek_ahead(1) != Some(b'.') {
            is_float = true;
            self.bump();
            self.skip_while(|c| c.is_ascii_digit());
        }

        if self.peek().is_some_and(|c| c == b'e' || c == b'E') {
            is_float = true;
            self.bump();
            self.scan_exponent_digits(line)?;
        }

        self.reject_trailing_word(start, line)?;

        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        if !is_float {
            if let Some(i) = number::parse_integer(text) {
                return Ok(Token::Integer(i));
            }
            // Decimal integers past i64 range become floats
        }
        match number::parse_float(text) {
            Some(f) => Ok(Token::Float(f)),
            None => Err(self.error(format!("malformed number near '{text}'"), line)),
        }
    }

    fn scan_hex_number(&mut self, start: usize, line: u32) -> Result<Token, CompileError> {
        let mut is_float = false;

        let digits_start = self.pos;
        self.skip_while(|c| c.is_ascii_hexdigit());

        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            self.skip_while(|c| c.is_ascii_hexdigit());
        }

        if self.peek().is_some_and(|c| c == b'p' || c == b'P') {
            is_float = true;
            self.bump();
            self.scan_exponent_digits(line)?;
        }

        if self.pos == digits_start {
            return Err(self.error("malformed number: no hex digits after '0x'", line));
        }

        self.reject_trailing_word(start, line)?;

        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        if !is_float {
            if let Some(i) = number::parse_integer(text) {
                return Ok(Token::Integer(i));
            }
        }
        match number::parse_float(text) {
            Some(f) => Ok(Token::Float(f)),
            None => Err(self.error(format!("malformed number near '{text}'"), line)),
        }
    }

    /// Scan the digits of an `e`/`p` exponent, optional sign already next.
    fn scan_exponent_digits(&mut self, line: u32) -> Result<(), CompileError> {
        if self.peek().is_some_and(|c| c == b'+' || c == b'-') {
            self.bump();
        }
        let exp_start = self.pos;
        self.skip_while(|c| c.is_ascii_digit());
        if self.pos == exp_start {
            return Err(self.error("malformed number: expected exponent digits", line));
        }
        Ok(())
    }

    /// A number followed directly by a letter or `_` is malformed.
    fn reject_trailing_word(&mut self, start: usize, line: u32) -> Result<(), CompileError> {
        if !self.peek().is_some_and(is_name_start) {
            return Ok(());
        }
        self.skip_while(|c| is_name_char(c) || c == b'.');
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("?");
        Err(self.error(format!("malformed number near '{text}'"), line))
    }

    /// Scan a number whose leading dot was already consumed.
    fn scan_number_after_dot(&mut self, line: u32) -> Result<Token, CompileError> {
        let start = self.pos - 1; // include the dot
        self.skip_while(|c| c.is_ascii_digit());
        if self.peek().is_some_and(|c| c == b'e' || c == b'E') {
            self.bump();
            self.scan_exponent_digits(line)?;
        }
        self.reject_trailing_word(start, line)?;
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match number::parse_float(text) {
            Some(f) => Ok(Token::Float(f)),
            None => Err(self.error(format!("malformed number near '{text}'"), line)),
        }
    }

    /// The "near" text for string diagnostics: everything from the opening
    /// quote to the current position, truncated.
    fn near_text(&self, start: usize, include_current: bool) -> String {
        let mut end = self.pos;
        if include_current {
            end += 1;
        }
        let end = end.min(self.source.len());
        let raw = &self.source[start..end];
        let cut = raw.len().min(50);
        format!("'{}'", String::from_utf8_lossy(&raw[..cut]))
    }

    fn scan_short_string(&mut self, line: u32) -> Result<Token, CompileError> {
        let string_start = self.pos;
        let quote = self.bump().unwrap();
        let mut buf = Vec::new();

        loop {
            let Some(ch) = self.peek() else {
                return Err(self.error("unfinished string near <eof>", line));
            };
            if ch == quote {
                self.bump();
                break;
            }
            match ch {
                b'\n' | b'\r' => {
                    return Err(self.error(
                        format!(
                            "unfinished string near {}",
                            self.near_text(string_start, false)
                        ),
                        line,
                    ));
                }
                b'\\' => {
                    self.bump();
                    self.scan_escape(&mut buf, string_start, line)?;
                }
                _ => {
                    self.bump();
                    buf.push(ch);
                }
            }
        }

        Ok(Token::Str(buf))
    }

    fn scan_escape(
        &mut self,
        buf: &mut Vec<u8>,
        string_start: usize,
        line: u32,
    ) -> Result<(), CompileError> {
        let invalid = |lexer: &Lexer| {
            lexer.error(
                format!(
                    "invalid escape sequence near {}",
                    lexer.near_text(string_start, true)
                ),
                line,
            )
        };

        match self.peek() {
            Some(ch @ (b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' | b'\\' | b'\'' | b'"')) => {
                self.bump();
                buf.push(match ch {
                    b'a' => 0x07,
                    b'b' => 0x08,
                    b'f' => 0x0C,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'v' => 0x0B,
                    other => other,
                });
            }
            Some(b'\n') | Some(b'\r') => {
                // An escaped real newline becomes \n
                self.bump();
                buf.push(b'\n');
            }
            Some(b'x') => {
                self.bump();
                let mut val = 0u8;
                for _ in 0..2 {
                    match self.peek() {
                        Some(ch) if ch.is_ascii_hexdigit() => {
                            self.bump();
                            val = (val << 4) | hex_value(ch);
                        }
                        _ => return Err(invalid(self)),
                    }
                }
                buf.push(val);
            }
            Some(b'u') => {
                self.bump();
                if !self.eat(b'{') {
                    return Err(invalid(self));
                }
                let mut code: u64 = 0;
                let mut count = 0;
                loop {
                    match self.peek() {
                        Some(b'}') => {
                            self.bump();
                            break;
                        }
                        Some(ch) if ch.is_ascii_hexdigit() => {
                            self.bump();
                            code = code * 16 + hex_value(ch) as u64;
                            count += 1;
                            if code > 0x7FFF_FFFF {
                                return Err(self.error(
                                    format!(
                                        "UTF-8 value too large near {}",
                                        self.near_text(string_start, false)
                                    ),
                                    line,
                                ));
                            }
                        }
                        _ => return Err(invalid(self)),
                    }
                }
                if count == 0 {
                    return Err(self.error(
                        format!(
                            "missing unicode value near {}",
                            self.near_text(string_start, true)
                        ),
                        line,
                    ));
                }
                encode_utf8_extended(code as u32, buf);
            }
            Some(b'z') => {
                self.bump();
                self.skip_while(is_space);
            }
            Some(ch) if ch.is_ascii_digit() => {
                // \ddd with up to three decimal digits
                let mut val: u16 = (ch - b'0') as u16;
                self.bump();
                for _ in 0..2 {
                    if let Some(d) = self.peek() {
                        if d.is_ascii_digit() {
                            val = val * 10 + (d - b'0') as u16;
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                if val > 255 {
                    return Err(self.error(
                        format!(
                            "decimal escape too large near {}",
                            self.near_text(string_start, true)
                        ),
                        line,
                    ));
                }
                buf.push(val as u8);
            }
            Some(_) => return Err(invalid(self)),
            None => return Err(self.error("unfinished string near <eof>", line)),
        }
        Ok(())
    }

    fn scan_long_string(&mut self, level: usize, line: u32) -> Result<Token, CompileError> {
        self.skip_long_open(level);
        let content = self.scan_long_content(level, line, "string")?;
        Ok(Token::Str(content))
    }

    /// Scan the body of a long bracket, consuming the closing `]=*]`.
    /// `what` names the construct in the unfinished-input error.
    fn scan_long_content(
        &mut self,
        level: usize,
        line: u32,
        what: &str,
    ) -> Result<Vec<u8>, CompileError> {
        let mut buf = Vec::new();
        let mut leading_newline = true;

        loop {
            match self.peek() {
                None => {
                    return Err(self.error(format!("unfinished long {what} near <eof>"), line));
                }
                Some(b']') => {
                    if self.at_long_close(level) {
                        for _ in 0..level + 2 {
                            self.bump();
                        }
                        return Ok(buf);
                    }
                    self.bump();
                    buf.push(b']');
                }
                Some(b'\n') | Some(b'\r') => {
                    self.bump();
                    if leading_newline && buf.is_empty() {
                        // The first newline of a long string is dropped
                        leading_newline = false;
                        continue;
                    }
                    // Line endings normalize to \n
                    buf.push(b'\n');
                    leading_newline = false;
                }
                Some(ch) => {
                    leading_newline = false;
                    self.bump();
                    buf.push(ch);
                }
            }
        }
    }

    /// True if the current position holds the closing `]=*]` of `level`.
    fn at_long_close(&self, level: usize) -> bool {
        if self.peek() != Some(b']') {
            return false;
        }
        for i in 1..=level {
            if self.peek_ahead(i) != Some(b'=') {
                return false;
            }
        }
        self.peek_ahead(level + 1) == Some(b']')
    }
}

fn single_byte_token(ch: u8) -> Token {
    match ch {
        b'+' => Token::Plus,
        b'*' => Token::Star,
        b'^' => Token::Caret,
        b'%' => Token::Percent,
        b'&' => Token::Ampersand,
        b'|' => Token::Pipe,
        b'(' => Token::LParen,
        b')' => Token::RParen,
        b'{' => Token::LBrace,
        b'}' => Token::RBrace,
        b']' => Token::RBracket,
        b';' => Token::Semi,
        b',' => Token::Comma,
        _ => Token::Hash,
    }
}

fn is_name_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_name_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | b'\x0B' | b'\x0C')
}

/// Value of a byte already known to be a hex digit.
fn hex_value(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        _ => (ch | 0x20) - b'a' + 10,
    }
}

/// Encode a code point as UTF-8. `\u{}` accepts values up to 0x7FFFFFFF,
/// so encodings stretch to six bytes past the Unicode range.
fn encode_utf8_extended(code: u32, buf: &mut Vec<u8>) {
    // Lead-byte mask and payload width per sequence length
    const LEAD: [(u32, u8, u32); 6] = [
        (0x7F, 0x00, 0),
        (0x7FF, 0xC0, 6),
        (0xFFFF, 0xE0, 12),
        (0x1F_FFFF, 0xF0, 18),
        (0x3FF_FFFF, 0xF8, 24),
        (u32::MAX, 0xFC, 30),
    ];
    let (_, lead, shift) = LEAD
        .iter()
        .copied()
        .find(|&(limit, _, _)| code <= limit)
        .unwrap_or(LEAD[5]);
    buf.push(lead | (code >> shift) as u8);
    let mut rest = shift;
    while rest > 0 {
        rest -= 6;
        buf.push(0x80 | ((code >> rest) & 0x3F) as u8);
    }
}
