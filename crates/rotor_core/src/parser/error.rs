//! Parse error values.
//!
//! Parse errors are plain values, not panics: the parser appends every error
//! to a list, recovers, and keeps going.  The parse entry point returns the
//! partial AST together with the first error.

use std::fmt;

/// A single parse error, positioned in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// The file name the source was parsed under.
    pub name: String,
    /// 1-based line of the error.
    pub line: u32,
    /// 1-based column of the error.
    pub column: u32,
    /// Human-readable message (see the canonical messages in the parser).
    pub message: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() {
            "(anonymous)"
        } else {
            &self.name
        };
        write!(
            f,
            "{}: Line {}:{} {}",
            name, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for Error {}
