//! `rotor_core` — the core library for the rotor ECMAScript interpreter.
//!
//! rotor executes an ECMAScript-3 / ES5.1-subset scripting language embedded
//! in a Rust host program.  The crate is split into two coupled halves: a
//! recursive-descent parser that turns source text into a closed-enum AST,
//! and a tree-walking evaluator that executes the AST against a runtime.
//!
//! # Crate layout
//!
//! - [`error`] — Host-facing error types and `RotorResult` alias.
//! - [`parser`] — Scanner, AST, scope tracker, and the recursive-descent
//!   parser (`parse(filename, source)`).
//! - [`runtime`] — Values, references, completions, objects, lexical
//!   environments, and the tree-walking evaluator ([`runtime::Runtime`]).
//!
//! # Example
//!
//! ```
//! use rotor_core::parser::parse;
//! use rotor_core::runtime::Runtime;
//!
//! let (program, error) = parse("example.js", "var x = 1; var y = 2; x + y");
//! assert!(error.is_none());
//! let mut runtime = Runtime::new();
//! let value = runtime.run(&program).unwrap();
//! assert_eq!(value.to_number(), 3.0);
//! ```

/// Host-facing error types and [`RotorResult`](error::RotorResult) alias.
pub mod error;
/// JavaScript parser: scanner, AST, scope tracking, recursive descent.
pub mod parser;
/// JavaScript runtime: values, environments, and the evaluator.
pub mod runtime;
