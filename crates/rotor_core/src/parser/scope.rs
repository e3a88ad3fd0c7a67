//! Per-function lexical scope tracking for the parser.
//!
//! The parser keeps a stack of [`Scope`] frames, one per function scope
//! (plus the program scope).  A frame records the parse-time context flags
//! that statements consult — whether a bare `break` / `continue` / `return`
//! is legal here, and whether `in` may appear in a binary expression — plus
//! the hoisted declarations and currently-open labels.

use crate::parser::ast::FunctionDecl;

/// One lexical scope frame in the parser's scope stack.
#[derive(Debug, Default)]
pub struct Scope {
    /// The enclosing scope, or `None` for the program scope.
    pub outer: Option<Box<Scope>>,
    /// `false` while parsing the head of `for (init …)`, to disambiguate the
    /// `in` operator from the `for-in` keyword.
    pub allow_in: bool,
    /// `true` inside the body of an iteration statement.
    pub in_iteration: bool,
    /// `true` inside the body of a `switch` statement.
    pub in_switch: bool,
    /// `true` inside a function body (where `return` is legal).
    pub in_function: bool,
    /// Labels currently open in this scope, innermost last.
    pub labels: Vec<String>,
    /// Hoisted `var` names declared in this scope.
    pub variables: Vec<String>,
    /// Hoisted function declarations in this scope.
    pub functions: Vec<FunctionDecl>,
}

impl Scope {
    /// Creates a fresh scope enclosing `outer`.
    pub fn new(outer: Option<Box<Scope>>) -> Self {
        Scope {
            outer,
            allow_in: true,
            ..Scope::default()
        }
    }

    /// Records a hoisted `var` declaration.
    pub fn add_variable(&mut self, name: &str) {
        self.variables.push(name.to_string());
    }

    /// Records a hoisted function declaration.
    pub fn add_function(&mut self, decl: FunctionDecl) {
        self.functions.push(decl);
    }

    /// Returns `true` if `name` is an open label in this scope or an
    /// enclosing one.
    ///
    /// The search never crosses a function boundary: a label outside the
    /// current function is not a legal branch target.
    pub fn has_label(&self, name: &str) -> bool {
        if self.labels.iter().any(|l| l == name) {
            return true;
        }
        if self.in_function {
            return false;
        }
        match &self.outer {
            Some(outer) => outer.has_label(name),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scope_allows_in() {
        let scope = Scope::new(None);
        assert!(scope.allow_in);
        assert!(!scope.in_iteration);
        assert!(!scope.in_switch);
        assert!(!scope.in_function);
    }

    #[test]
    fn test_has_label_in_same_scope() {
        let mut scope = Scope::new(None);
        scope.labels.push("loop".to_string());
        assert!(scope.has_label("loop"));
        assert!(!scope.has_label("other"));
    }

    #[test]
    fn test_has_label_walks_outer_scopes() {
        let mut outer = Scope::new(None);
        outer.labels.push("outer_label".to_string());
        let inner = Scope::new(Some(Box::new(outer)));
        assert!(inner.has_label("outer_label"));
    }

    #[test]
    fn test_has_label_stops_at_function_boundary() {
        let mut outer = Scope::new(None);
        outer.labels.push("outer_label".to_string());
        let mut inner = Scope::new(Some(Box::new(outer)));
        inner.in_function = true;
        assert!(!inner.has_label("outer_label"));
    }
}
