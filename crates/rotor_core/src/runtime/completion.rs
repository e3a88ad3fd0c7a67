//! Statement completions and the script exception channel.
//!
//! Every statement evaluates to an explicit [`Completion`] — these are plain
//! return values, never exceptions.  Script `throw` travels a separate typed
//! channel: [`Exception`] as the `Err` arm of [`EvalResult`].  Break,
//! continue, and return completions are always absorbed by an enclosing
//! construct (loop, switch, label, or function call) and never reach the
//! host.

use crate::runtime::value::Value;

/// The result of evaluating a statement.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Normal completion, optionally carrying a statement value (the value
    /// of the last evaluated expression statement).
    Normal(Option<Value>),
    /// A `break`, optionally labelled.
    Break(Option<String>),
    /// A `continue`, optionally labelled.
    Continue(Option<String>),
    /// A `return` with the returned value.
    Return(Value),
}

impl Completion {
    /// The empty normal completion.
    pub fn empty() -> Completion {
        Completion::Normal(None)
    }

    /// Returns `true` for break/continue/return completions.
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }

    /// The carried statement value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Completion::Normal(v) => v.as_ref(),
            Completion::Return(v) => Some(v),
            _ => None,
        }
    }
}

/// A script exception in flight: the thrown value.
///
/// Uncaught exceptions surface to the host as
/// [`RotorError::Uncaught`][crate::error::RotorError::Uncaught].
#[derive(Debug, Clone)]
pub struct Exception(pub Value);

impl Exception {
    /// Wraps `value` as a thrown exception.
    pub fn new(value: Value) -> Exception {
        Exception(value)
    }

    /// The thrown value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwraps the thrown value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Result alias used throughout the evaluator.
pub type EvalResult<T> = Result<T, Exception>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_completion_has_no_value() {
        let completion = Completion::empty();
        assert!(!completion.is_abrupt());
        assert!(completion.value().is_none());
    }

    #[test]
    fn test_abrupt_completions() {
        assert!(Completion::Break(None).is_abrupt());
        assert!(Completion::Continue(Some("l".into())).is_abrupt());
        assert!(Completion::Return(Value::Undefined).is_abrupt());
        assert!(!Completion::Normal(Some(Value::Null)).is_abrupt());
    }

    #[test]
    fn test_return_carries_value() {
        let completion = Completion::Return(Value::Number(7.0));
        assert!(matches!(completion.value(), Some(Value::Number(_))));
    }
}
