#![no_main]

use libfuzzer_sys::fuzz_target;
use rotor_core::parser::parse;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // The parser must always return a program (possibly with Bad nodes and
    // a first error) without panicking or looping, whatever the input.
    let (program, _error) = parse("fuzz.js", source);

    // Hoisted names come from the source text; spot-check the invariant
    // that every program span is well-formed.
    let loc = program.loc;
    assert!(loc.start.offset <= loc.end.offset);
    for stmt in &program.body {
        let loc = stmt.loc();
        assert!(loc.start.offset <= loc.end.offset);
    }
});
