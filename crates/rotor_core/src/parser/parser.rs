//! Recursive-descent parser for the ES5 subset.
//!
//! The parser owns a [`Scanner`], one token of lookahead, a stack of
//! [`Scope`] frames, and a list of collected [`Error`]s.  Binary expressions
//! are parsed by precedence climbing; semicolons are inserted automatically
//! per the ASI rules; parse errors are recorded and recovery resumes at the
//! next statement keyword, so a single call always yields a [`Program`]
//! (possibly containing `Bad` placeholder nodes).
//!
//! [`parse`] is the public entry point.

use std::rc::Rc;

use crate::parser::ast::*;
use crate::parser::error::Error;
use crate::parser::scanner::{cook_string, Scanner, Span, Token, TokenKind, TokenValue};
use crate::parser::scope::Scope;

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

/// Parse `source` (named `filename` in diagnostics) into a [`Program`].
///
/// Always returns a program; when the source contains syntax errors the
/// program holds `Bad` placeholder nodes for the unparseable regions and the
/// first error is returned alongside it.
///
/// # Example
///
/// ```
/// use rotor_core::parser::parse;
///
/// let (program, error) = parse("add.js", "var sum = 1 + 2;");
/// assert!(error.is_none());
/// assert_eq!(program.variables, vec!["sum"]);
/// ```
pub fn parse(filename: &str, source: &str) -> (Program, Option<Error>) {
    let mut parser = Parser::new(filename, source);
    let program = parser.parse_program();
    let first = parser.errors.first().cloned();
    (program, first)
}

// ─────────────────────────────────────────────────────────────────────────────
// Regexp pattern translation
// ─────────────────────────────────────────────────────────────────────────────

/// Translate a JavaScript regular-expression pattern into the dialect of the
/// [`regex`] crate, as far as the two overlap.
///
/// `\uXXXX` escapes become `\x{XXXX}`; everything else passes through.
/// Constructs the `regex` crate rejects (lookaround, backreferences) surface
/// as an *Invalid regular expression* parse error when the translated
/// pattern is compiled.
pub fn transform_regexp(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('u') => {
                chars.next();
                let mut digits = String::new();
                for _ in 0..4 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if digits.len() == 4 {
                    out.push_str("\\x{");
                    out.push_str(&digits);
                    out.push('}');
                } else {
                    // Not a full escape; emit verbatim.
                    out.push_str("\\u");
                    out.push_str(&digits);
                }
            }
            _ => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser state
// ─────────────────────────────────────────────────────────────────────────────

struct Parser<'src> {
    filename: String,
    source: &'src str,
    scanner: Scanner<'src>,
    /// The current (not yet consumed) token.
    token: Token,
    /// The innermost scope frame; `None` only before `parse_program` opens
    /// the program scope.
    scope: Option<Box<Scope>>,
    errors: Vec<Error>,
    /// Error-recovery loop guard: last sync offset and the number of
    /// attempts without progress.
    recover_offset: usize,
    recover_count: u32,
}

impl<'src> Parser<'src> {
    fn new(filename: &str, source: &'src str) -> Self {
        let mut scanner = Scanner::new(source);
        let token = scanner.next_token();
        Self {
            filename: filename.to_string(),
            source,
            scanner,
            token,
            scope: None,
            errors: Vec::new(),
            recover_offset: 0,
            recover_count: 0,
        }
    }

    // ── Token plumbing ──────────────────────────────────────────────────────

    fn next(&mut self) {
        self.token = self.scanner.next_token();
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }

    /// Raw source text of `span`.
    fn slice(&self, span: Span) -> String {
        self.source[span.start.offset..span.end.offset].to_string()
    }

    /// Consume the current token, recording an *Unexpected token* error if it
    /// is not `kind`.  Returns the consumed token's span.
    fn expect(&mut self, kind: TokenKind) -> Span {
        let span = self.token.span;
        if self.token.kind != kind {
            self.error_unexpected_token();
        }
        self.next();
        span
    }

    // ── Automatic semicolon insertion ───────────────────────────────────────

    /// Statement terminator: consumes an explicit `;`, silently accepts an
    /// inserted one (line terminator, `)`, `}`, or EOF), and records an error
    /// otherwise.
    fn semicolon(&mut self) {
        match self.token.kind {
            TokenKind::Semicolon => self.next(),
            TokenKind::RightParen | TokenKind::RightBrace | TokenKind::Eof => {}
            _ if self.token.newline_before => {}
            _ => {
                self.error_unexpected_token();
            }
        }
    }

    /// Like [`semicolon`][Self::semicolon] but for expression statements,
    /// where a following `)` is not a terminator.
    fn optional_semicolon(&mut self) {
        match self.token.kind {
            TokenKind::Semicolon => self.next(),
            TokenKind::RightBrace | TokenKind::Eof => {}
            _ if self.token.newline_before => {}
            _ => {
                self.error_unexpected_token();
            }
        }
    }

    // ── Errors and recovery ─────────────────────────────────────────────────

    fn error_at(&mut self, span: Span, message: String) {
        self.errors.push(Error {
            name: self.filename.clone(),
            line: span.start.line,
            column: span.start.column,
            message,
        });
    }

    /// Record the canonical *Unexpected …* error for the current token.
    fn error_unexpected_token(&mut self) {
        let span = self.token.span;
        let message = match self.token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Identifier => "Unexpected identifier".to_string(),
            TokenKind::Number => "Unexpected number".to_string(),
            TokenKind::String => "Unexpected string".to_string(),
            TokenKind::Boolean | TokenKind::Null => {
                format!("Unexpected token {}", self.slice(span))
            }
            kind => format!("Unexpected token {}", kind),
        };
        self.error_at(span, message);
    }

    /// Skip tokens until the next statement-starting keyword (or EOF).
    ///
    /// A loop guard permits up to ten re-syncs at the same offset before at
    /// least one token is forcibly consumed, so recovery always terminates.
    fn next_statement(&mut self) {
        loop {
            match self.token.kind {
                TokenKind::Break
                | TokenKind::Const
                | TokenKind::Continue
                | TokenKind::For
                | TokenKind::If
                | TokenKind::Return
                | TokenKind::Switch
                | TokenKind::Var
                | TokenKind::Do
                | TokenKind::Try
                | TokenKind::Let
                | TokenKind::With
                | TokenKind::While
                | TokenKind::Throw
                | TokenKind::Catch
                | TokenKind::Finally => {
                    let offset = self.token.span.start.offset;
                    if offset == self.recover_offset && self.recover_count < 10 {
                        self.recover_count += 1;
                        return;
                    }
                    if offset > self.recover_offset {
                        self.recover_offset = offset;
                        self.recover_count = 0;
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
            self.next();
        }
    }

    /// Span from `from` to the current token, for `Bad` placeholder nodes.
    fn bad_span(&self, from: Span) -> Span {
        from.to(self.token.span)
    }

    // ── Scope management ────────────────────────────────────────────────────

    fn open_scope(&mut self) {
        let outer = self.scope.take();
        self.scope = Some(Box::new(Scope::new(outer)));
    }

    fn close_scope(&mut self) -> Scope {
        let mut frame = *self.scope.take().expect("scope stack underflow");
        self.scope = frame.outer.take();
        frame
    }

    fn scope(&mut self) -> &mut Scope {
        self.scope.as_mut().expect("no open scope")
    }

    // ── Program ─────────────────────────────────────────────────────────────

    fn parse_program(&mut self) -> Program {
        self.open_scope();
        let mut body = Vec::new();
        while !self.at(TokenKind::Eof) {
            body.push(self.parse_statement());
        }
        let frame = self.close_scope();
        let loc = match (body.first(), body.last()) {
            (Some(first), Some(last)) => first.loc().to(last.loc()),
            _ => Span::default(),
        };
        Program {
            loc,
            body,
            variables: frame.variables,
            functions: frame.functions,
        }
    }

    // ── Statements ──────────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Stmt {
        match self.token.kind {
            TokenKind::Eof => {
                self.error_unexpected_token();
                Stmt::Bad(BadStmt {
                    loc: self.token.span,
                })
            }
            TokenKind::Semicolon => {
                let loc = self.expect(TokenKind::Semicolon);
                Stmt::Empty(EmptyStmt { loc })
            }
            TokenKind::LeftBrace => Stmt::Block(self.parse_block_statement()),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_or_for_in_statement(),
            TokenKind::Break => self.parse_branch_statement(BranchKind::Break),
            TokenKind::Continue => self.parse_branch_statement(BranchKind::Continue),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Var => self.parse_variable_statement(),
            TokenKind::Function => {
                // Function declarations hoist; the statement slot is empty.
                let function = self.parse_function(true);
                Stmt::Empty(EmptyStmt {
                    loc: function.loc(),
                })
            }
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            _ => {
                let expr = self.parse_expression();

                // `identifier :` introduces a labelled statement.
                if let Expr::Ident(ident) = &expr {
                    if self.at(TokenKind::Colon) {
                        let ident = ident.clone();
                        self.next(); // :
                        return self.parse_labeled_statement(ident);
                    }
                }

                self.optional_semicolon();
                Stmt::Expr(ExprStmt {
                    loc: expr.loc(),
                    expr,
                })
            }
        }
    }

    fn parse_labeled_statement(&mut self, label: Ident) -> Stmt {
        if self.scope().labels.iter().any(|l| l == &label.name) {
            let loc = label.loc;
            self.error_at(loc, format!("Label '{}' already exists", label.name));
        }
        self.scope().labels.push(label.name.clone());
        let body = self.parse_statement();
        self.scope().labels.pop();
        Stmt::Labeled(Box::new(LabeledStmt {
            loc: label.loc.to(body.loc()),
            label,
            body,
        }))
    }

    fn parse_block_statement(&mut self) -> BlockStmt {
        let left = self.expect(TokenKind::LeftBrace);
        let mut body = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::Eof) {
            body.push(self.parse_statement());
        }
        let right = self.expect(TokenKind::RightBrace);
        BlockStmt {
            loc: left.to(right),
            body,
        }
    }

    fn parse_if_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::If);
        self.expect(TokenKind::LeftParen);
        let test = self.parse_expression();
        self.expect(TokenKind::RightParen);
        let consequent = self.parse_statement();
        let mut alternate = None;
        if self.at(TokenKind::Else) {
            self.next();
            alternate = Some(self.parse_statement());
        }
        let end = alternate
            .as_ref()
            .map(|s| s.loc())
            .unwrap_or_else(|| consequent.loc());
        Stmt::If(Box::new(IfStmt {
            loc: start.to(end),
            test,
            consequent,
            alternate,
        }))
    }

    /// Parse a loop body with `in_iteration` set.
    fn parse_iteration_body(&mut self) -> Stmt {
        let in_iteration = self.scope().in_iteration;
        self.scope().in_iteration = true;
        let body = self.parse_statement();
        self.scope().in_iteration = in_iteration;
        body
    }

    fn parse_do_while_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Do);
        let body = self.parse_iteration_body();
        self.expect(TokenKind::While);
        self.expect(TokenKind::LeftParen);
        let test = self.parse_expression();
        let end = self.expect(TokenKind::RightParen);
        // The trailing semicolon after `do … while (…)` is optional.
        if self.at(TokenKind::Semicolon) {
            self.next();
        }
        Stmt::DoWhile(Box::new(DoWhileStmt {
            loc: start.to(end),
            body,
            test,
        }))
    }

    fn parse_while_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::While);
        self.expect(TokenKind::LeftParen);
        let test = self.parse_expression();
        self.expect(TokenKind::RightParen);
        let body = self.parse_iteration_body();
        Stmt::While(Box::new(WhileStmt {
            loc: start.to(body.loc()),
            test,
            body,
        }))
    }

    fn parse_with_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::With);
        self.expect(TokenKind::LeftParen);
        let object = self.parse_expression();
        self.expect(TokenKind::RightParen);
        let body = self.parse_statement();
        Stmt::With(Box::new(WithStmt {
            loc: start.to(body.loc()),
            object,
            body,
        }))
    }

    // ── for / for-in ────────────────────────────────────────────────────────

    fn parse_for_or_for_in_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::For);
        self.expect(TokenKind::LeftParen);

        let mut left: Vec<Expr> = Vec::new();
        let mut is_in = false;

        if !self.at(TokenKind::Semicolon) {
            let allow_in = self.scope().allow_in;
            self.scope().allow_in = false;
            if self.at(TokenKind::Var) {
                self.next();
                let list = self.parse_variable_declaration_list();
                if list.len() == 1 && self.at(TokenKind::In) {
                    self.next(); // in
                    is_in = true;
                }
                left = list;
            } else {
                left.push(self.parse_expression());
                if self.at(TokenKind::In) {
                    self.next();
                    is_in = true;
                }
            }
            self.scope().allow_in = allow_in;
        }

        if !is_in {
            self.expect(TokenKind::Semicolon);
            let init = match left.len() {
                0 => None,
                1 => left.pop(),
                _ => {
                    let loc = left[0].loc().to(left[left.len() - 1].loc());
                    Some(Expr::Sequence(SequenceExpr { loc, exprs: left }))
                }
            };
            return self.parse_for_statement(start, init);
        }

        let into = left.into_iter().next().expect("for-in target");
        match into {
            Expr::Ident(_) | Expr::Dot(_) | Expr::Bracket(_) | Expr::Variable(_) => {}
            _ => {
                self.error_at(start, "Invalid left-hand side in for-in".to_string());
                self.next_statement();
                return Stmt::Bad(BadStmt {
                    loc: self.bad_span(start),
                });
            }
        }
        self.parse_for_in_statement(start, into)
    }

    fn parse_for_statement(&mut self, start: Span, init: Option<Expr>) -> Stmt {
        // Already consumed `for ( init ;`.
        let mut test = None;
        if !self.at(TokenKind::Semicolon) {
            test = Some(self.parse_expression());
        }
        self.expect(TokenKind::Semicolon);

        let mut update = None;
        if !self.at(TokenKind::RightParen) {
            update = Some(self.parse_expression());
        }
        self.expect(TokenKind::RightParen);

        let body = self.parse_iteration_body();
        Stmt::For(Box::new(ForStmt {
            loc: start.to(body.loc()),
            init,
            test,
            update,
            body,
        }))
    }

    fn parse_for_in_statement(&mut self, start: Span, into: Expr) -> Stmt {
        // Already consumed `for ( into in`.
        let source = self.parse_expression();
        self.expect(TokenKind::RightParen);
        let body = self.parse_iteration_body();
        Stmt::ForIn(Box::new(ForInStmt {
            loc: start.to(body.loc()),
            into,
            source,
            body,
        }))
    }

    // ── var ─────────────────────────────────────────────────────────────────

    fn parse_variable_declaration(&mut self) -> Expr {
        if !self.at(TokenKind::Identifier) {
            let span = self.expect(TokenKind::Identifier);
            self.next_statement();
            return Expr::Bad(BadExpr {
                loc: self.bad_span(span),
            });
        }

        let name = self.token.str_value().to_string();
        let start = self.token.span;
        self.next();
        self.scope().add_variable(&name);

        let mut init = None;
        if self.at(TokenKind::Equal) {
            self.next();
            init = Some(self.parse_assignment_expression());
        }
        let end = init.as_ref().map(|e| e.loc()).unwrap_or(start);
        Expr::Variable(Box::new(VariableExpr {
            loc: start.to(end),
            name,
            init,
        }))
    }

    fn parse_variable_declaration_list(&mut self) -> Vec<Expr> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_variable_declaration());
            if !self.at(TokenKind::Comma) {
                break;
            }
            self.next();
        }
        list
    }

    fn parse_variable_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Var);
        let declarations = self.parse_variable_declaration_list();
        self.semicolon();
        let end = declarations
            .last()
            .map(|d| d.loc())
            .unwrap_or(start);
        Stmt::Var(VarStmt {
            loc: start.to(end),
            declarations,
        })
    }

    // ── switch ──────────────────────────────────────────────────────────────

    fn parse_switch_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Switch);
        self.expect(TokenKind::LeftParen);
        let discriminant = self.parse_expression();
        self.expect(TokenKind::RightParen);
        self.expect(TokenKind::LeftBrace);

        let in_switch = self.scope().in_switch;
        self.scope().in_switch = true;

        let mut cases = Vec::new();
        let mut default_index = None;
        let mut end = start;
        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::RightBrace) {
                end = self.token.span;
                self.next();
                break;
            }
            let clause = self.parse_case_clause();
            if clause.test.is_none() {
                if default_index.is_some() {
                    self.error_at(clause.loc, "Already saw a default in switch".to_string());
                } else {
                    default_index = Some(cases.len());
                }
            }
            cases.push(clause);
        }

        self.scope().in_switch = in_switch;

        Stmt::Switch(Box::new(SwitchStmt {
            loc: start.to(end),
            discriminant,
            cases,
            default_index,
        }))
    }

    fn parse_case_clause(&mut self) -> CaseClause {
        let start = self.token.span;
        let mut test = None;
        if self.at(TokenKind::Default) {
            self.next();
        } else {
            self.expect(TokenKind::Case);
            test = Some(self.parse_expression());
        }
        let colon = self.expect(TokenKind::Colon);

        let mut consequent = Vec::new();
        loop {
            match self.token.kind {
                TokenKind::Eof
                | TokenKind::RightBrace
                | TokenKind::Case
                | TokenKind::Default => break,
                _ => consequent.push(self.parse_statement()),
            }
        }
        let end = consequent.last().map(|s| s.loc()).unwrap_or(colon);
        CaseClause {
            loc: start.to(end),
            test,
            consequent,
        }
    }

    // ── return / throw / branch ─────────────────────────────────────────────

    fn parse_return_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Return);

        if !self.scope().in_function {
            self.error_at(start, "Illegal return statement".to_string());
            self.next_statement();
            return Stmt::Bad(BadStmt {
                loc: self.bad_span(start),
            });
        }

        let mut argument = None;
        // A line terminator after `return` terminates the statement.
        if !self.token.newline_before
            && !matches!(
                self.token.kind,
                TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
            )
        {
            argument = Some(self.parse_expression());
        }
        self.semicolon();

        let end = argument.as_ref().map(|e| e.loc()).unwrap_or(start);
        Stmt::Return(ReturnStmt {
            loc: start.to(end),
            argument,
        })
    }

    fn parse_throw_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Throw);

        if self.token.newline_before || self.at(TokenKind::Eof) {
            let message = if self.at(TokenKind::Eof) {
                "Unexpected end of input"
            } else {
                "Illegal newline after throw"
            };
            self.error_at(start, message.to_string());
            self.next_statement();
            return Stmt::Bad(BadStmt {
                loc: self.bad_span(start),
            });
        }

        let argument = self.parse_expression();
        self.semicolon();
        Stmt::Throw(ThrowStmt {
            loc: start.to(argument.loc()),
            argument,
        })
    }

    fn parse_branch_statement(&mut self, kind: BranchKind) -> Stmt {
        let keyword = match kind {
            BranchKind::Break => TokenKind::Break,
            BranchKind::Continue => TokenKind::Continue,
        };
        let start = self.expect(keyword);

        // Bare branch: explicit `;`, inserted semicolon, or block end.
        let mut terminated = self.token.newline_before;
        if self.at(TokenKind::Semicolon) {
            terminated = true;
            self.next();
        } else if self.at(TokenKind::RightBrace) || self.at(TokenKind::Eof) {
            terminated = true;
        }

        if terminated {
            let legal = match kind {
                BranchKind::Break => self.scope().in_iteration || self.scope().in_switch,
                BranchKind::Continue => self.scope().in_iteration,
            };
            if !legal {
                return self.illegal_branch(kind, start);
            }
            return Stmt::Branch(BranchStmt {
                loc: start,
                kind,
                label: None,
            });
        }

        if self.at(TokenKind::Identifier) {
            let label = self.parse_ident();
            if !self.scope().has_label(&label.name) {
                self.error_at(start, format!("Undefined label '{}'", label.name));
                return Stmt::Bad(BadStmt {
                    loc: start.to(label.loc),
                });
            }
            if kind == BranchKind::Continue && !self.scope().in_iteration {
                return self.illegal_branch(kind, start);
            }
            self.semicolon();
            return Stmt::Branch(BranchStmt {
                loc: start.to(label.loc),
                kind,
                label: Some(label),
            });
        }

        self.expect(TokenKind::Identifier);
        self.illegal_branch(kind, start)
    }

    fn illegal_branch(&mut self, kind: BranchKind, start: Span) -> Stmt {
        let what = match kind {
            BranchKind::Break => "break",
            BranchKind::Continue => "continue",
        };
        self.error_at(start, format!("Illegal {what} statement"));
        self.next_statement();
        Stmt::Bad(BadStmt {
            loc: self.bad_span(start),
        })
    }

    // ── try ─────────────────────────────────────────────────────────────────

    fn parse_try_statement(&mut self) -> Stmt {
        let start = self.expect(TokenKind::Try);
        let block = self.parse_block_statement();
        let mut end = block.loc;

        let mut handler = None;
        if self.at(TokenKind::Catch) {
            let catch = self.token.span;
            self.next();
            self.expect(TokenKind::LeftParen);
            if !self.at(TokenKind::Identifier) {
                self.expect(TokenKind::Identifier);
                self.next_statement();
                return Stmt::Bad(BadStmt {
                    loc: self.bad_span(catch),
                });
            }
            let param = self.parse_ident();
            self.expect(TokenKind::RightParen);
            let body = self.parse_block_statement();
            end = body.loc;
            handler = Some(CatchClause {
                loc: catch.to(body.loc),
                param,
                body,
            });
        }

        let mut finalizer = None;
        if self.at(TokenKind::Finally) {
            self.next();
            let body = self.parse_block_statement();
            end = body.loc;
            finalizer = Some(body);
        }

        if handler.is_none() && finalizer.is_none() {
            self.error_at(start, "Missing catch or finally after try".to_string());
            return Stmt::Bad(BadStmt {
                loc: start.to(block.loc),
            });
        }

        Stmt::Try(Box::new(TryStmt {
            loc: start.to(end),
            block,
            handler,
            finalizer,
        }))
    }

    // ── Functions ───────────────────────────────────────────────────────────

    fn parse_function_parameter_list(&mut self) -> Vec<String> {
        let mut list = Vec::new();
        self.expect(TokenKind::LeftParen);
        while !self.at(TokenKind::RightParen) && !self.at(TokenKind::Eof) {
            if !self.at(TokenKind::Identifier) {
                self.expect(TokenKind::Identifier);
                break;
            }
            list.push(self.token.str_value().to_string());
            self.next();
            if !self.at(TokenKind::RightParen) {
                self.expect(TokenKind::Comma);
            }
        }
        self.expect(TokenKind::RightParen);
        list
    }

    /// Parse the body of a function whose header (name and parameters) has
    /// been consumed, and assemble the [`FunctionLiteral`].
    fn finish_function(
        &mut self,
        start: Span,
        name: Option<Ident>,
        params: Vec<String>,
    ) -> Rc<FunctionLiteral> {
        self.open_scope();
        self.scope().in_function = true;
        let body = self.parse_block_statement();
        let frame = self.close_scope();
        let loc = start.to(body.loc);
        Rc::new(FunctionLiteral {
            loc,
            name,
            params,
            body: body.body,
            variables: frame.variables,
            functions: frame.functions,
            source: self.slice(loc),
        })
    }

    fn parse_function(&mut self, declaration: bool) -> Expr {
        let start = self.expect(TokenKind::Function);

        let mut name = None;
        if self.at(TokenKind::Identifier) {
            name = Some(self.parse_ident());
        } else if declaration {
            // A function statement requires a name.
            self.expect(TokenKind::Identifier);
        }

        let params = self.parse_function_parameter_list();
        let literal = self.finish_function(start, name, params);

        if declaration {
            if let Some(n) = &literal.name {
                let decl = FunctionDecl {
                    name: n.clone(),
                    function: literal.clone(),
                };
                self.scope().add_function(decl);
            }
        }

        Expr::Function(literal)
    }

    // ── Expressions: primary ────────────────────────────────────────────────

    fn parse_ident(&mut self) -> Ident {
        let loc = self.token.span;
        let name = self.token.str_value().to_string();
        self.next();
        Ident { loc, name }
    }

    fn parse_primary_expression(&mut self) -> Expr {
        let span = self.token.span;
        match self.token.kind {
            TokenKind::Identifier => Expr::Ident(self.parse_ident()),
            TokenKind::Null => {
                self.next();
                Expr::Null(NullLit { loc: span })
            }
            TokenKind::Boolean => {
                let literal = self.token.str_value().to_string();
                self.next();
                let value = match literal.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        self.error_at(span, "Illegal boolean literal".to_string());
                        false
                    }
                };
                Expr::Boolean(BoolLit { loc: span, value })
            }
            TokenKind::Number => {
                let value = match self.token.value {
                    TokenValue::Number(n) => n,
                    _ => f64::NAN,
                };
                self.next();
                Expr::Number(NumLit { loc: span, value })
            }
            TokenKind::String => {
                let raw = self.token.str_value().to_string();
                self.next();
                // Strip the quotes, then resolve escapes.
                let body = &raw[1..raw.len() - 1];
                let value = match cook_string(body) {
                    Ok(value) => value,
                    Err(_) => {
                        self.error_at(span, "Unexpected token ILLEGAL".to_string());
                        String::new()
                    }
                };
                Expr::String(StringLit { loc: span, value })
            }
            TokenKind::Slash | TokenKind::SlashEqual => self.parse_regexp_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftParen => {
                self.expect(TokenKind::LeftParen);
                let expr = self.parse_expression();
                self.expect(TokenKind::RightParen);
                expr
            }
            TokenKind::This => {
                self.next();
                Expr::This(ThisExpr { loc: span })
            }
            TokenKind::Function => self.parse_function(false),
            _ => {
                self.error_unexpected_token();
                self.next_statement();
                Expr::Bad(BadExpr {
                    loc: self.bad_span(span),
                })
            }
        }
    }

    fn parse_regexp_literal(&mut self) -> Expr {
        let rescanned = self.scanner.rescan_regexp(&self.token);
        let loc = rescanned.span;

        if rescanned.kind != TokenKind::Regexp {
            self.error_at(loc, "Invalid regular expression: missing /".to_string());
            self.next();
            return Expr::Bad(BadExpr { loc });
        }

        // Split `/pattern/flags` at the closing slash.
        let raw = rescanned.str_value();
        let close = raw.rfind('/').expect("regexp literal has a closing slash");
        let pattern = raw[1..close].to_string();
        let flags = raw[close + 1..].to_string();

        // Compile eagerly as a validity check.
        if let Err(err) = regex::Regex::new(&transform_regexp(&pattern)) {
            let reason = match &err {
                regex::Error::Syntax(s) => s
                    .lines()
                    .last()
                    .unwrap_or("invalid pattern")
                    .trim()
                    .to_string(),
                other => other.to_string(),
            };
            self.error_at(loc, format!("Invalid regular expression: {reason}"));
        }

        self.next();
        Expr::Regexp(RegexpLit {
            loc,
            pattern,
            flags,
        })
    }

    // ── Object literals ─────────────────────────────────────────────────────

    /// Returns `true` when the current token can serve as a property name
    /// (`a.b`, `{ b: … }`): an identifier, keyword, or value literal word.
    fn token_is_identifier_name(&self) -> bool {
        let text = &self.source[self.token.span.start.offset..self.token.span.end.offset];
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
    }

    /// Parse one property key; returns `(raw_text, key_value)`.
    fn parse_object_property_key(&mut self) -> (String, String) {
        let span = self.token.span;
        let kind = self.token.kind;
        let raw = self.slice(span);
        let identifier_name = self.token_is_identifier_name();
        self.next();
        let value = match kind {
            TokenKind::Identifier => raw.clone(),
            TokenKind::Number => raw.clone(),
            TokenKind::String => {
                cook_string(&raw[1..raw.len() - 1]).unwrap_or_else(|_| {
                    self.error_at(span, "Unexpected token ILLEGAL".to_string());
                    String::new()
                })
            }
            // Keywords and value literals (`null`, `delete`, …) are legal
            // property names.
            _ if identifier_name => raw.clone(),
            _ => {
                self.error_unexpected_token();
                String::new()
            }
        };
        (raw, value)
    }

    fn parse_object_property(&mut self) -> Property {
        let start = self.token.span;
        let (raw, key) = self.parse_object_property_key();

        if raw == "get" && !self.at(TokenKind::Colon) {
            let (_, key) = self.parse_object_property_key();
            self.expect(TokenKind::LeftParen);
            self.expect(TokenKind::RightParen);
            let function = self.finish_function(start, None, Vec::new());
            return Property {
                key,
                kind: PropertyKind::Get,
                value: Expr::Function(function),
            };
        }
        if raw == "set" && !self.at(TokenKind::Colon) {
            let (_, key) = self.parse_object_property_key();
            let params = self.parse_function_parameter_list();
            let function = self.finish_function(start, None, params);
            return Property {
                key,
                kind: PropertyKind::Set,
                value: Expr::Function(function),
            };
        }

        self.expect(TokenKind::Colon);
        Property {
            key,
            kind: PropertyKind::Value,
            value: self.parse_assignment_expression(),
        }
    }

    fn parse_object_literal(&mut self) -> Expr {
        let left = self.expect(TokenKind::LeftBrace);
        let mut properties = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::Eof) {
            properties.push(self.parse_object_property());
            if self.at(TokenKind::Comma) {
                self.next();
            }
        }
        let right = self.expect(TokenKind::RightBrace);
        Expr::Object(ObjectLit {
            loc: left.to(right),
            properties,
        })
    }

    fn parse_array_literal(&mut self) -> Expr {
        let left = self.expect(TokenKind::LeftBracket);
        let mut elements = Vec::new();
        while !self.at(TokenKind::RightBracket) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Comma) {
                self.next();
                elements.push(None); // elision
                continue;
            }
            elements.push(Some(self.parse_assignment_expression()));
            if !self.at(TokenKind::RightBracket) {
                self.expect(TokenKind::Comma);
            }
        }
        let right = self.expect(TokenKind::RightBracket);
        Expr::Array(ArrayLit {
            loc: left.to(right),
            elements,
        })
    }

    // ── Expressions: left-hand side ─────────────────────────────────────────

    fn parse_argument_list(&mut self) -> (Vec<Expr>, Span) {
        self.expect(TokenKind::LeftParen);
        let mut arguments = Vec::new();
        if !self.at(TokenKind::RightParen) {
            loop {
                arguments.push(self.parse_assignment_expression());
                if !self.at(TokenKind::Comma) {
                    break;
                }
                self.next();
            }
        }
        let right = self.expect(TokenKind::RightParen);
        (arguments, right)
    }

    fn parse_dot_member(&mut self, left: Expr) -> Expr {
        let period = self.expect(TokenKind::Dot);

        if !self.token_is_identifier_name() {
            self.expect(TokenKind::Identifier);
            self.next_statement();
            return Expr::Bad(BadExpr {
                loc: self.bad_span(period),
            });
        }

        let loc = self.token.span;
        let name = self.slice(loc);
        self.next();
        Expr::Dot(Box::new(DotExpr {
            loc: left.loc().to(loc),
            left,
            member: Ident { loc, name },
        }))
    }

    fn parse_bracket_member(&mut self, left: Expr) -> Expr {
        self.expect(TokenKind::LeftBracket);
        let member = self.parse_expression();
        let right = self.expect(TokenKind::RightBracket);
        Expr::Bracket(Box::new(BracketExpr {
            loc: left.loc().to(right),
            left,
            member,
        }))
    }

    fn parse_new_expression(&mut self) -> Expr {
        let start = self.expect(TokenKind::New);
        let callee = self.parse_left_hand_side_expression();
        let mut arguments = None;
        let mut end = callee.loc();
        if self.at(TokenKind::LeftParen) {
            let (args, right) = self.parse_argument_list();
            arguments = Some(args);
            end = right;
        }
        Expr::New(Box::new(NewExpr {
            loc: start.to(end),
            callee,
            arguments,
        }))
    }

    /// Member accesses only — no calls (`new` binds tighter than a call).
    fn parse_left_hand_side_expression(&mut self) -> Expr {
        let mut left = if self.at(TokenKind::New) {
            self.parse_new_expression()
        } else {
            self.parse_primary_expression()
        };

        loop {
            left = match self.token.kind {
                TokenKind::Dot => self.parse_dot_member(left),
                TokenKind::LeftBracket => self.parse_bracket_member(left),
                _ => break,
            };
        }
        left
    }

    fn parse_left_hand_side_expression_allow_call(&mut self) -> Expr {
        let mut left = if self.at(TokenKind::New) {
            self.parse_new_expression()
        } else {
            self.parse_primary_expression()
        };

        loop {
            left = match self.token.kind {
                TokenKind::Dot => self.parse_dot_member(left),
                TokenKind::LeftBracket => self.parse_bracket_member(left),
                TokenKind::LeftParen => {
                    let (arguments, right) = self.parse_argument_list();
                    Expr::Call(Box::new(CallExpr {
                        loc: left.loc().to(right),
                        callee: left,
                        arguments,
                    }))
                }
                _ => break,
            };
        }
        left
    }

    // ── Expressions: unary and postfix ──────────────────────────────────────

    fn parse_postfix_expression(&mut self) -> Expr {
        let operand = self.parse_left_hand_side_expression_allow_call();

        if matches!(self.token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
            // A line terminator before `++` / `--` terminates the statement
            // instead (restricted production).
            && !self.token.newline_before
        {
            let op = self.token.kind;
            let span = self.token.span;
            self.next();
            if !operand.is_reference() {
                self.error_at(span, "Invalid left-hand side in assignment".to_string());
                self.next_statement();
                return Expr::Bad(BadExpr {
                    loc: self.bad_span(span),
                });
            }
            return Expr::Unary(Box::new(UnaryExpr {
                loc: operand.loc().to(span),
                op,
                operand,
                postfix: true,
            }));
        }

        operand
    }

    fn parse_unary_expression(&mut self) -> Expr {
        match self.token.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Delete
            | TokenKind::Void
            | TokenKind::Typeof => {
                let op = self.token.kind;
                let span = self.token.span;
                self.next();
                let operand = self.parse_unary_expression();
                Expr::Unary(Box::new(UnaryExpr {
                    loc: span.to(operand.loc()),
                    op,
                    operand,
                    postfix: false,
                }))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = self.token.kind;
                let span = self.token.span;
                self.next();
                let operand = self.parse_unary_expression();
                if !operand.is_reference() {
                    self.error_at(span, "Invalid left-hand side in assignment".to_string());
                    self.next_statement();
                    return Expr::Bad(BadExpr {
                        loc: self.bad_span(span),
                    });
                }
                Expr::Unary(Box::new(UnaryExpr {
                    loc: span.to(operand.loc()),
                    op,
                    operand,
                    postfix: false,
                }))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    // ── Expressions: binary precedence ladder ───────────────────────────────

    fn binary(op: TokenKind, left: Expr, right: Expr, comparison: bool) -> Expr {
        Expr::Binary(Box::new(BinaryExpr {
            loc: left.loc().to(right.loc()),
            op,
            left,
            right,
            comparison,
        }))
    }

    fn parse_multiplicative_expression(&mut self) -> Expr {
        let mut left = self.parse_unary_expression();
        while matches!(
            self.token.kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let op = self.token.kind;
            self.next();
            let right = self.parse_unary_expression();
            left = Self::binary(op, left, right, false);
        }
        left
    }

    fn parse_additive_expression(&mut self) -> Expr {
        let mut left = self.parse_multiplicative_expression();
        while matches!(self.token.kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.token.kind;
            self.next();
            let right = self.parse_multiplicative_expression();
            left = Self::binary(op, left, right, false);
        }
        left
    }

    fn parse_shift_expression(&mut self) -> Expr {
        let mut left = self.parse_additive_expression();
        while matches!(
            self.token.kind,
            TokenKind::LessLess | TokenKind::GreaterGreater | TokenKind::GreaterGreaterGreater
        ) {
            let op = self.token.kind;
            self.next();
            let right = self.parse_additive_expression();
            left = Self::binary(op, left, right, false);
        }
        left
    }

    fn parse_relational_expression(&mut self) -> Expr {
        let mut left = self.parse_shift_expression();
        loop {
            let allow_in = self.scope().allow_in;
            match self.token.kind {
                TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual => {
                    let op = self.token.kind;
                    self.next();
                    let right = self.parse_shift_expression();
                    left = Self::binary(op, left, right, true);
                }
                TokenKind::Instanceof => {
                    self.next();
                    let right = self.parse_shift_expression();
                    left = Self::binary(TokenKind::Instanceof, left, right, false);
                }
                TokenKind::In if allow_in => {
                    self.next();
                    let right = self.parse_shift_expression();
                    left = Self::binary(TokenKind::In, left, right, false);
                }
                _ => break,
            }
        }
        left
    }

    fn parse_equality_expression(&mut self) -> Expr {
        let mut left = self.parse_relational_expression();
        while matches!(
            self.token.kind,
            TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::EqualEqualEqual
                | TokenKind::BangEqualEqual
        ) {
            let op = self.token.kind;
            self.next();
            let right = self.parse_relational_expression();
            left = Self::binary(op, left, right, true);
        }
        left
    }

    fn parse_bitwise_and_expression(&mut self) -> Expr {
        let mut left = self.parse_equality_expression();
        while self.at(TokenKind::Ampersand) {
            self.next();
            let right = self.parse_equality_expression();
            left = Self::binary(TokenKind::Ampersand, left, right, false);
        }
        left
    }

    fn parse_bitwise_xor_expression(&mut self) -> Expr {
        let mut left = self.parse_bitwise_and_expression();
        while self.at(TokenKind::Caret) {
            self.next();
            let right = self.parse_bitwise_and_expression();
            left = Self::binary(TokenKind::Caret, left, right, false);
        }
        left
    }

    fn parse_bitwise_or_expression(&mut self) -> Expr {
        let mut left = self.parse_bitwise_xor_expression();
        while self.at(TokenKind::Pipe) {
            self.next();
            let right = self.parse_bitwise_xor_expression();
            left = Self::binary(TokenKind::Pipe, left, right, false);
        }
        left
    }

    fn parse_logical_and_expression(&mut self) -> Expr {
        let mut left = self.parse_bitwise_or_expression();
        while self.at(TokenKind::AmpersandAmpersand) {
            self.next();
            let right = self.parse_bitwise_or_expression();
            left = Self::binary(TokenKind::AmpersandAmpersand, left, right, false);
        }
        left
    }

    fn parse_logical_or_expression(&mut self) -> Expr {
        let mut left = self.parse_logical_and_expression();
        while self.at(TokenKind::PipePipe) {
            self.next();
            let right = self.parse_logical_and_expression();
            left = Self::binary(TokenKind::PipePipe, left, right, false);
        }
        left
    }

    fn parse_conditional_expression(&mut self) -> Expr {
        let left = self.parse_logical_or_expression();

        if self.at(TokenKind::Question) {
            self.next();
            let consequent = self.parse_assignment_expression();
            self.expect(TokenKind::Colon);
            let alternate = self.parse_assignment_expression();
            return Expr::Conditional(Box::new(ConditionalExpr {
                loc: left.loc().to(alternate.loc()),
                test: left,
                consequent,
                alternate,
            }));
        }

        left
    }

    fn parse_assignment_expression(&mut self) -> Expr {
        let left = self.parse_conditional_expression();

        let operator = match self.token.kind {
            TokenKind::Equal => Some(None),
            TokenKind::PlusEqual => Some(Some(TokenKind::Plus)),
            TokenKind::MinusEqual => Some(Some(TokenKind::Minus)),
            TokenKind::StarEqual => Some(Some(TokenKind::Star)),
            TokenKind::SlashEqual => Some(Some(TokenKind::Slash)),
            TokenKind::PercentEqual => Some(Some(TokenKind::Percent)),
            TokenKind::AmpersandEqual => Some(Some(TokenKind::Ampersand)),
            TokenKind::PipeEqual => Some(Some(TokenKind::Pipe)),
            TokenKind::CaretEqual => Some(Some(TokenKind::Caret)),
            TokenKind::LessLessEqual => Some(Some(TokenKind::LessLess)),
            TokenKind::GreaterGreaterEqual => Some(Some(TokenKind::GreaterGreater)),
            TokenKind::GreaterGreaterGreaterEqual => {
                Some(Some(TokenKind::GreaterGreaterGreater))
            }
            _ => None,
        };

        if let Some(op) = operator {
            let span = self.token.span;
            self.next();
            if !left.is_reference() {
                self.error_at(left.loc(), "Invalid left-hand side in assignment".to_string());
                self.next_statement();
                return Expr::Bad(BadExpr {
                    loc: self.bad_span(span),
                });
            }
            let right = self.parse_assignment_expression();
            return Expr::Assign(Box::new(AssignExpr {
                loc: left.loc().to(right.loc()),
                op,
                left,
                right,
            }));
        }

        left
    }

    fn parse_expression(&mut self) -> Expr {
        let left = self.parse_assignment_expression();

        if self.at(TokenKind::Comma) {
            let mut exprs = vec![left];
            while self.at(TokenKind::Comma) {
                self.next();
                exprs.push(self.parse_assignment_expression());
            }
            let loc = exprs[0].loc().to(exprs[exprs.len() - 1].loc());
            return Expr::Sequence(SequenceExpr { loc, exprs });
        }

        left
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let (program, error) = parse("test.js", src);
        assert!(error.is_none(), "unexpected parse error: {error:?}");
        program
    }

    fn first_error(src: &str) -> String {
        let (_, error) = parse("test.js", src);
        error.expect("expected a parse error").message
    }

    // ── Statements and precedence ────────────────────────────────────────────

    #[test]
    fn test_simple_var_statement() {
        let program = parse_ok("var x = 1;");
        assert_eq!(program.body.len(), 1);
        assert_eq!(program.variables, vec!["x"]);
        match &program.body[0] {
            Stmt::Var(var) => assert_eq!(var.declarations.len(), 1),
            other => panic!("expected var statement, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_is_right_associative_through_ternary() {
        // a = b ? c : d = e  ⇒  Assign(a, Conditional(b, c, Assign(d, e)))
        let program = parse_ok("a = b ? c : d = e");
        let expr = match &program.body[0] {
            Stmt::Expr(e) => &e.expr,
            other => panic!("expected expression statement, got {other:?}"),
        };
        let assign = match expr {
            Expr::Assign(a) => a,
            other => panic!("expected assignment, got {other:?}"),
        };
        assert!(matches!(assign.left, Expr::Ident(_)));
        let cond = match &assign.right {
            Expr::Conditional(c) => c,
            other => panic!("expected conditional, got {other:?}"),
        };
        match &cond.alternate {
            Expr::Assign(inner) => {
                assert!(matches!(inner.left, Expr::Ident(_)));
                assert!(inner.op.is_none());
            }
            other => panic!("expected nested assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        // 1 + 2 * 3  ⇒  1 + (2 * 3)
        let program = parse_ok("1 + 2 * 3");
        let expr = match &program.body[0] {
            Stmt::Expr(e) => &e.expr,
            _ => unreachable!(),
        };
        let add = match expr {
            Expr::Binary(b) => b,
            other => panic!("expected binary, got {other:?}"),
        };
        assert_eq!(add.op, TokenKind::Plus);
        assert!(matches!(&add.right, Expr::Binary(m) if m.op == TokenKind::Star));
    }

    #[test]
    fn test_comparison_flag() {
        let program = parse_ok("a < b == c");
        let expr = match &program.body[0] {
            Stmt::Expr(e) => &e.expr,
            _ => unreachable!(),
        };
        let eq = match expr {
            Expr::Binary(b) => b,
            _ => unreachable!(),
        };
        assert!(eq.comparison);
        assert!(matches!(&eq.left, Expr::Binary(lt) if lt.comparison));
    }

    #[test]
    fn test_compound_assignment_operator_mapping() {
        let program = parse_ok("a += 1");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Assign(a) => assert_eq!(a.op, Some(TokenKind::Plus)),
                other => panic!("expected assignment, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_new_without_arguments() {
        let program = parse_ok("new Foo");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::New(n) => assert!(n.arguments.is_none()),
                other => panic!("expected new expression, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_new_binds_member_before_call() {
        // new a.b() ⇒ new (a.b)() with the argument list on the new.
        let program = parse_ok("new a.b()");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::New(n) => {
                    assert!(matches!(n.callee, Expr::Dot(_)));
                    assert_eq!(n.arguments.as_ref().map(|a| a.len()), Some(0));
                }
                other => panic!("expected new expression, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sequence_expression() {
        let program = parse_ok("a, b, c");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Sequence(s) => assert_eq!(s.exprs.len(), 3),
                other => panic!("expected sequence, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    // ── Literals ─────────────────────────────────────────────────────────────

    #[test]
    fn test_array_literal_with_holes() {
        let program = parse_ok("[1, , 3]");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Array(a) => {
                    assert_eq!(a.elements.len(), 3);
                    assert!(a.elements[0].is_some());
                    assert!(a.elements[1].is_none());
                    assert!(a.elements[2].is_some());
                }
                other => panic!("expected array literal, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_object_literal_kinds() {
        let program = parse_ok("x = { a: 1, get b() { return 2; }, set b(v) {}, 'c d': 3, 7: 4 }");
        let obj = match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Assign(a) => match &a.right {
                    Expr::Object(o) => o,
                    other => panic!("expected object literal, got {other:?}"),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        let kinds: Vec<PropertyKind> = obj.properties.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PropertyKind::Value,
                PropertyKind::Get,
                PropertyKind::Set,
                PropertyKind::Value,
                PropertyKind::Value,
            ]
        );
        assert_eq!(obj.properties[3].key, "c d");
        assert_eq!(obj.properties[4].key, "7");
    }

    #[test]
    fn test_keyword_property_names() {
        let program = parse_ok("x = { delete: 1 }.delete");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Assign(a) => assert!(matches!(a.right, Expr::Dot(_))),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_regexp_literal() {
        let program = parse_ok("var re = /ab+c/gi;");
        match &program.body[0] {
            Stmt::Var(v) => match &v.declarations[0] {
                Expr::Variable(var) => match var.init.as_ref().unwrap() {
                    Expr::Regexp(re) => {
                        assert_eq!(re.pattern, "ab+c");
                        assert_eq!(re.flags, "gi");
                    }
                    other => panic!("expected regexp literal, got {other:?}"),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_regexp_vs_division() {
        // After an identifier a slash is division; in primary position it is
        // a regexp.
        let program = parse_ok("a / b");
        match &program.body[0] {
            Stmt::Expr(e) => assert!(matches!(&e.expr, Expr::Binary(b) if b.op == TokenKind::Slash)),
            _ => unreachable!(),
        }
        let program = parse_ok("/b/.test");
        match &program.body[0] {
            Stmt::Expr(e) => assert!(matches!(&e.expr, Expr::Dot(_))),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_invalid_regexp_reports_error() {
        let message = first_error("var re = /(/;");
        assert!(
            message.starts_with("Invalid regular expression:"),
            "got: {message}"
        );
    }

    // ── ASI ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_asi_between_statements() {
        let program = parse_ok("var a = 1\nvar b = 2");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_asi_return_restricted_production() {
        let program = parse_ok("function f() { return\n1 }");
        let function = &program.functions[0].function;
        match &function.body[0] {
            Stmt::Return(r) => assert!(r.argument.is_none()),
            other => panic!("expected return, got {other:?}"),
        }
        // The `1` becomes its own expression statement.
        assert!(matches!(function.body[1], Stmt::Expr(_)));
    }

    #[test]
    fn test_asi_postfix_restricted_production() {
        // `a\n++b` is `a; ++b`, not `a++; b`.
        let program = parse_ok("a\n++b");
        assert_eq!(program.body.len(), 2);
        match &program.body[1] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Unary(u) => assert!(!u.postfix),
                other => panic!("expected unary, got {other:?}"),
            },
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_semicolon_without_newline_is_error() {
        let message = first_error("var a = 1 var b = 2");
        assert_eq!(message, "Unexpected token var");
    }

    #[test]
    fn test_asi_before_close_brace() {
        parse_ok("function f() { return 1 }");
    }

    // ── Hoisting ─────────────────────────────────────────────────────────────

    #[test]
    fn test_program_variable_hoisting() {
        let program = parse_ok("var a; if (x) { var b; } for (var c;;) {} var a;");
        assert_eq!(program.variables, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_function_declarations_hoist_out_of_body() {
        let program = parse_ok("function f() {} function g() {}");
        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].name.name, "f");
        assert_eq!(program.functions[1].name.name, "g");
        // Statement slots are empty.
        assert!(program.body.iter().all(|s| matches!(s, Stmt::Empty(_))));
    }

    #[test]
    fn test_nested_function_vars_do_not_leak() {
        let program = parse_ok("var a; function f() { var b; }");
        assert_eq!(program.variables, vec!["a"]);
        assert_eq!(program.functions[0].function.variables, vec!["b"]);
    }

    #[test]
    fn test_function_expression_not_hoisted() {
        let program = parse_ok("var f = function g() {};");
        assert!(program.functions.is_empty());
    }

    #[test]
    fn test_function_source_slice() {
        let program = parse_ok("var f = function (a) { return a; };");
        match &program.body[0] {
            Stmt::Var(v) => match &v.declarations[0] {
                Expr::Variable(var) => match var.init.as_ref().unwrap() {
                    Expr::Function(f) => {
                        assert_eq!(f.source, "function (a) { return a; }");
                    }
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    // ── for / for-in ─────────────────────────────────────────────────────────

    #[test]
    fn test_for_three_clause() {
        let program = parse_ok("for (var i = 0; i < 3; i++) {}");
        match &program.body[0] {
            Stmt::For(f) => {
                assert!(f.init.is_some());
                assert!(f.test.is_some());
                assert!(f.update.is_some());
            }
            other => panic!("expected for, got {other:?}"),
        }
        assert_eq!(program.variables, vec!["i"]);
    }

    #[test]
    fn test_for_empty_clauses() {
        let program = parse_ok("for (;;) break;");
        match &program.body[0] {
            Stmt::For(f) => {
                assert!(f.init.is_none());
                assert!(f.test.is_none());
                assert!(f.update.is_none());
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn test_for_in_with_var() {
        let program = parse_ok("for (var k in o) {}");
        match &program.body[0] {
            Stmt::ForIn(f) => assert!(matches!(f.into, Expr::Variable(_))),
            other => panic!("expected for-in, got {other:?}"),
        }
    }

    #[test]
    fn test_for_in_member_target() {
        let program = parse_ok("for (o.k in src) {}");
        match &program.body[0] {
            Stmt::ForIn(f) => assert!(matches!(f.into, Expr::Dot(_))),
            other => panic!("expected for-in, got {other:?}"),
        }
    }

    #[test]
    fn test_for_in_invalid_lhs() {
        assert_eq!(first_error("for (1 in o) {}"), "Invalid left-hand side in for-in");
    }

    #[test]
    fn test_in_operator_allowed_outside_for_head() {
        let program = parse_ok("x = 'a' in o");
        match &program.body[0] {
            Stmt::Expr(e) => match &e.expr {
                Expr::Assign(a) => {
                    assert!(matches!(&a.right, Expr::Binary(b) if b.op == TokenKind::In));
                }
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    // ── Labels and branches ──────────────────────────────────────────────────

    #[test]
    fn test_labelled_loop_with_break() {
        let program = parse_ok("outer: while (x) { break outer; }");
        assert!(matches!(program.body[0], Stmt::Labeled(_)));
    }

    #[test]
    fn test_undefined_label_is_error() {
        assert_eq!(
            first_error("while (x) { break missing; }"),
            "Undefined label 'missing'"
        );
    }

    #[test]
    fn test_duplicate_label_is_error() {
        assert_eq!(
            first_error("a: a: while (x) {}"),
            "Label 'a' already exists"
        );
    }

    #[test]
    fn test_label_does_not_cross_function_boundary() {
        assert_eq!(
            first_error("a: function f() { while (x) { break a; } } "),
            "Undefined label 'a'"
        );
    }

    #[test]
    fn test_illegal_break_outside_loop() {
        assert_eq!(first_error("break;"), "Illegal break statement");
    }

    #[test]
    fn test_illegal_continue_outside_loop() {
        assert_eq!(first_error("continue;"), "Illegal continue statement");
    }

    #[test]
    fn test_break_legal_in_switch_continue_not() {
        parse_ok("switch (x) { default: break; }");
        assert_eq!(
            first_error("switch (x) { default: continue; }"),
            "Illegal continue statement"
        );
    }

    #[test]
    fn test_illegal_return_outside_function() {
        assert_eq!(first_error("return 1;"), "Illegal return statement");
    }

    // ── switch ───────────────────────────────────────────────────────────────

    #[test]
    fn test_switch_default_index() {
        let program = parse_ok("switch (x) { case 1: break; default: break; case 2: break; }");
        match &program.body[0] {
            Stmt::Switch(s) => {
                assert_eq!(s.cases.len(), 3);
                assert_eq!(s.default_index, Some(1));
            }
            other => panic!("expected switch, got {other:?}"),
        }
    }

    #[test]
    fn test_switch_duplicate_default_is_error() {
        assert_eq!(
            first_error("switch (x) { default: break; default: break; }"),
            "Already saw a default in switch"
        );
    }

    // ── try ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_try_catch_finally() {
        let program = parse_ok("try { a; } catch (e) { b; } finally { c; }");
        match &program.body[0] {
            Stmt::Try(t) => {
                assert!(t.handler.is_some());
                assert!(t.finalizer.is_some());
                assert_eq!(t.handler.as_ref().unwrap().param.name, "e");
            }
            other => panic!("expected try, got {other:?}"),
        }
    }

    #[test]
    fn test_try_without_catch_or_finally_is_error() {
        assert_eq!(
            first_error("try { a; }"),
            "Missing catch or finally after try"
        );
    }

    // ── throw ────────────────────────────────────────────────────────────────

    #[test]
    fn test_throw_newline_is_error() {
        assert_eq!(first_error("throw\n'x';"), "Illegal newline after throw");
    }

    // ── Invalid left-hand sides ──────────────────────────────────────────────

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            first_error("1 = 2"),
            "Invalid left-hand side in assignment"
        );
    }

    #[test]
    fn test_invalid_increment_target() {
        assert_eq!(
            first_error("1++"),
            "Invalid left-hand side in assignment"
        );
        assert_eq!(
            first_error("++1"),
            "Invalid left-hand side in assignment"
        );
    }

    // ── Error recovery ───────────────────────────────────────────────────────

    #[test]
    fn test_recovery_produces_partial_ast() {
        let (program, error) = parse("test.js", "var a = ]; var b = 2;");
        assert!(error.is_some());
        // The second statement still parses.
        assert!(program.variables.contains(&"b".to_string()));
    }

    #[test]
    fn test_unexpected_number_message() {
        assert_eq!(first_error("var 1;"), "Unexpected number");
    }

    #[test]
    fn test_unexpected_string_message() {
        assert_eq!(first_error("var 'x';"), "Unexpected string");
    }

    #[test]
    fn test_unexpected_end_of_input_message() {
        assert_eq!(first_error("var x = "), "Unexpected end of input");
    }

    #[test]
    fn test_error_position() {
        let (_, error) = parse("test.js", "var x = 1;\nvar y = ];");
        let error = error.unwrap();
        assert_eq!(error.line, 2);
        assert_eq!(error.column, 9);
        assert_eq!(error.to_string(), "test.js: Line 2:9 Unexpected token ]");
    }

    #[test]
    fn test_reserved_word_statement_is_error() {
        let (_, error) = parse("test.js", "let x = 1;");
        assert!(error.is_some());
    }

    // ── Spans ────────────────────────────────────────────────────────────────

    /// Asserts `inner` is contained in `outer`.
    fn assert_contained(outer: Span, inner: Span) {
        assert!(
            outer.start.offset <= inner.start.offset && inner.end.offset <= outer.end.offset,
            "span {:?} not contained in {:?}",
            inner,
            outer
        );
    }

    fn walk_expr(expr: &Expr) {
        let loc = expr.loc();
        assert!(loc.start.offset <= loc.end.offset);
        match expr {
            Expr::Unary(u) => {
                assert_contained(loc, u.operand.loc());
                walk_expr(&u.operand);
            }
            Expr::Binary(b) => {
                assert_contained(loc, b.left.loc());
                assert_contained(loc, b.right.loc());
                walk_expr(&b.left);
                walk_expr(&b.right);
            }
            Expr::Assign(a) => {
                assert_contained(loc, a.left.loc());
                assert_contained(loc, a.right.loc());
                walk_expr(&a.left);
                walk_expr(&a.right);
            }
            Expr::Conditional(c) => {
                for e in [&c.test, &c.consequent, &c.alternate] {
                    assert_contained(loc, e.loc());
                    walk_expr(e);
                }
            }
            Expr::Call(c) => {
                assert_contained(loc, c.callee.loc());
                walk_expr(&c.callee);
                for a in &c.arguments {
                    assert_contained(loc, a.loc());
                    walk_expr(a);
                }
            }
            Expr::Dot(d) => {
                assert_contained(loc, d.left.loc());
                walk_expr(&d.left);
            }
            Expr::Bracket(b) => {
                assert_contained(loc, b.left.loc());
                assert_contained(loc, b.member.loc());
                walk_expr(&b.left);
                walk_expr(&b.member);
            }
            Expr::Sequence(s) => {
                for e in &s.exprs {
                    assert_contained(loc, e.loc());
                    walk_expr(e);
                }
            }
            _ => {}
        }
    }

    fn walk_stmt(stmt: &Stmt) {
        let loc = stmt.loc();
        assert!(loc.start.offset <= loc.end.offset);
        match stmt {
            Stmt::Block(b) => {
                for s in &b.body {
                    assert_contained(loc, s.loc());
                    walk_stmt(s);
                }
            }
            Stmt::Expr(e) => walk_expr(&e.expr),
            Stmt::If(i) => {
                assert_contained(loc, i.test.loc());
                assert_contained(loc, i.consequent.loc());
                walk_stmt(&i.consequent);
                if let Some(alt) = &i.alternate {
                    assert_contained(loc, alt.loc());
                    walk_stmt(alt);
                }
            }
            Stmt::While(w) => {
                assert_contained(loc, w.test.loc());
                assert_contained(loc, w.body.loc());
                walk_stmt(&w.body);
            }
            Stmt::For(f) => {
                assert_contained(loc, f.body.loc());
                walk_stmt(&f.body);
            }
            Stmt::Labeled(l) => {
                assert_contained(loc, l.body.loc());
                walk_stmt(&l.body);
            }
            _ => {}
        }
    }

    #[test]
    fn test_span_containment() {
        let program = parse_ok(
            "var x = 1 + 2 * 3;\n\
             outer: for (var i = 0; i < 10; i++) { if (i > 5) { break outer; } }\n\
             f(a, b[c].d ? e : (g, h));",
        );
        for stmt in &program.body {
            walk_stmt(stmt);
        }
    }
}
