#![no_main]

use libfuzzer_sys::fuzz_target;
use rotor_core::parser::scanner::{Scanner, TokenKind};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // The scanner must terminate and make progress on arbitrary input;
    // malformed text becomes Illegal tokens, never a panic or a stall.
    let mut scanner = Scanner::new(source);
    let mut last_offset = 0usize;
    loop {
        let tok = scanner.next_token();
        if tok.kind == TokenKind::Eof {
            break;
        }
        assert!(
            tok.span.end.offset > last_offset || tok.span.end.offset >= source.len(),
            "scanner made no progress at offset {last_offset}"
        );
        assert!(tok.span.start.offset <= tok.span.end.offset, "inverted span");
        last_offset = tok.span.end.offset;
    }
});
