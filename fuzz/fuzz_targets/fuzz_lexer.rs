#![no_main]

use libfuzzer_sys::fuzz_target;
use luno_compiler::lexer::Lexer;
use luno_compiler::token::Token;

fuzz_target!(|data: &[u8]| {
    // The lexer must never panic on any input: errors are fine, panics are bugs.
    let mut lexer = Lexer::new(data);
    loop {
        match lexer.advance() {
            Ok(Token::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
});
