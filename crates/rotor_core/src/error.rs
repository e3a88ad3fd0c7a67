//! Host-facing error types for the rotor engine.

use thiserror::Error;

use crate::parser::error::Error as ParseError;
use crate::runtime::value::Value;

/// All errors that can escape the rotor engine into the host program.
#[derive(Debug, Error)]
pub enum RotorError {
    /// The source text failed to parse.  Carries the first parse error; the
    /// partial AST is available from [`crate::parser::parse`] directly.
    #[error("{0}")]
    Parse(ParseError),

    /// A script exception propagated uncaught out of [`run`][crate::runtime::Runtime::run].
    ///
    /// The payload is the thrown script value (usually an error object with
    /// `name` and `message` properties, but any value can be thrown).
    #[error("uncaught exception: {}", .0.describe())]
    Uncaught(Value),
}

/// Convenient `Result` alias for fallible engine operations.
pub type RotorResult<T> = Result<T, RotorError>;
