//! The tree-walking evaluator.
//!
//! [`Runtime`] holds the global object, the execution-context stack, the
//! evaluator's label stack, and the optional host interrupt channel.
//! Statements evaluate to [`Completion`]s; expressions evaluate to an
//! [`Outcome`] — a value or a [`Reference`] — and `GetValue`/`PutValue`
//! resolve references on demand.  Script `throw` travels as the `Err` arm
//! of every evaluator result and is absorbed by `try`; an exception that
//! reaches [`Runtime::run`] surfaces to the host as
//! [`RotorError::Uncaught`].
//!
//! Interrupt polling happens at loop back-edges and on function entry: the
//! host pushes callbacks through an mpsc channel, and a callback that
//! returns a value aborts evaluation by throwing it.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

use crate::error::{RotorError, RotorResult};
use crate::parser::ast::*;
use crate::parser::parser::transform_regexp;
use crate::parser::scanner::TokenKind;
use crate::runtime::completion::{Completion, EvalResult, Exception};
use crate::runtime::environment::{self, EnvRef, Environment};
use crate::runtime::global::{new_global_environment, new_global_object, Intrinsics};
use crate::runtime::object::{
    ClosureData, FunctionKind, NativeFunction, Object, ObjectKind, ObjectRef,
    PropertyAttributes, PropertyValue, RegexpData,
};
use crate::runtime::reference::Reference;
use crate::runtime::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// The result of evaluating an expression: a concrete value, or a not yet
/// resolved [`Reference`].
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A concrete value.
    Value(Value),
    /// An unresolved reference (identifier or member access).
    Ref(Reference),
}

impl Outcome {
    /// `GetValue`: resolve to a concrete value.
    pub fn get(self, runtime: &mut Runtime) -> EvalResult<Value> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Ref(reference) => reference.get(runtime),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution contexts and interrupts
// ─────────────────────────────────────────────────────────────────────────────

/// One execution context: the environments identifiers resolve against and
/// the `this` binding.
#[derive(Debug)]
struct Context {
    /// The innermost environment for identifier resolution (`with` and
    /// `catch` push transient links here).
    lexical: EnvRef,
    /// The environment `var` and function declarations bind into.
    variable: EnvRef,
    /// The `this` object.
    this: ObjectRef,
}

/// A host interrupt callback, run on the evaluator thread when polled.
///
/// Returning `Some(value)` throws that value, aborting evaluation;
/// returning `None` resumes.
pub type InterruptCallback = Box<dyn FnOnce() -> Option<Value> + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

/// A script runtime instance: global state plus the evaluator.
///
/// Not safe for concurrent use — one evaluation at a time.  Cancellation
/// goes through the interrupt channel ([`Runtime::set_interrupt`]).
///
/// # Example
///
/// ```
/// use rotor_core::parser::parse;
/// use rotor_core::runtime::Runtime;
///
/// let (program, _) = parse("demo.js", "var n = 6; n * 7");
/// let mut runtime = Runtime::new();
/// assert_eq!(runtime.run(&program).unwrap().to_number(), 42.0);
/// ```
pub struct Runtime {
    intrinsics: Intrinsics,
    global_object: ObjectRef,
    contexts: Vec<Context>,
    /// Labels opened by enclosing labelled statements, consumed by the next
    /// iteration statement.
    labels: Vec<String>,
    interrupt: Option<Receiver<InterruptCallback>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with a fresh global object.
    pub fn new() -> Runtime {
        let intrinsics = Intrinsics::new();
        let global_object = new_global_object(&intrinsics);
        let global_env = new_global_environment(global_object.clone());
        Runtime {
            intrinsics,
            global_object: global_object.clone(),
            contexts: vec![Context {
                lexical: global_env.clone(),
                variable: global_env,
                this: global_object,
            }],
            labels: Vec::new(),
            interrupt: None,
        }
    }

    /// The global object.
    pub fn global_object(&self) -> ObjectRef {
        self.global_object.clone()
    }

    /// Defines (or overwrites) a global property from a host value.
    pub fn define_global(&mut self, name: &str, value: impl Into<Value>) {
        self.global_object.borrow_mut().put_data(name, value.into());
    }

    /// Wraps a host callback as a callable function value.
    pub fn native_function(&mut self, f: NativeFunction) -> Value {
        let func = Object::new(
            "Function",
            ObjectKind::Function(FunctionKind::Native(f)),
            Some(self.intrinsics.function_prototype.clone()),
        )
        .into_ref();
        let prototype = Object::plain(Some(self.intrinsics.object_prototype.clone())).into_ref();
        prototype.borrow_mut().define_data_property(
            "constructor",
            Value::Object(func.clone()),
            PropertyAttributes::hidden(),
        );
        func.borrow_mut().define_data_property(
            "prototype",
            Value::Object(prototype),
            PropertyAttributes::WRITABLE,
        );
        Value::Object(func)
    }

    /// Installs the host interrupt channel.
    ///
    /// The evaluator polls it at loop back-edges and on function entry; a
    /// received callback runs on the evaluator thread.
    pub fn set_interrupt(&mut self, channel: Receiver<InterruptCallback>) {
        self.interrupt = Some(channel);
    }

    /// Executes a parsed program and returns its completion value.
    ///
    /// Globals persist between calls, so consecutive `run`s share state.
    /// An uncaught script exception becomes [`RotorError::Uncaught`].
    pub fn run(&mut self, program: &Program) -> RotorResult<Value> {
        match self.run_program(program) {
            Ok(value) => Ok(value),
            Err(exception) => Err(RotorError::Uncaught(exception.into_value())),
        }
    }

    fn run_program(&mut self, program: &Program) -> EvalResult<Value> {
        self.declare_functions(&program.functions)?;
        self.declare_variables(&program.variables);
        let completion = self.eval_body(&program.body)?;
        match completion {
            Completion::Normal(value) => Ok(value.unwrap_or(Value::Undefined)),
            // Break/continue/return cannot reach the top level of a program
            // that passed the parser's legality checks.
            _ => {
                debug_assert!(false, "control-flow sentinel escaped to the program level");
                Ok(Value::Undefined)
            }
        }
    }

    // ── Context helpers ─────────────────────────────────────────────────────

    fn context(&self) -> &Context {
        self.contexts.last().expect("context stack is never empty")
    }

    fn lexical_env(&self) -> EnvRef {
        self.context().lexical.clone()
    }

    fn variable_env(&self) -> EnvRef {
        self.context().variable.clone()
    }

    fn set_lexical_env(&mut self, env: EnvRef) {
        self.contexts
            .last_mut()
            .expect("context stack is never empty")
            .lexical = env;
    }

    fn this_object(&self) -> ObjectRef {
        self.context().this.clone()
    }

    /// Resolves `name` against the current lexical environment chain.
    fn resolve(&mut self, name: &str) -> Reference {
        match environment::resolve(&self.lexical_env(), name) {
            Some(env) => Reference::Env {
                env,
                name: name.to_string(),
            },
            None => Reference::Unresolved {
                name: name.to_string(),
            },
        }
    }

    fn poll_interrupt(&mut self) -> EvalResult<()> {
        if let Some(channel) = &self.interrupt {
            std::thread::yield_now();
            if let Ok(callback) = channel.try_recv() {
                if let Some(value) = callback() {
                    return Err(Exception::new(value));
                }
            }
        }
        Ok(())
    }

    // ── Declaration hoisting ────────────────────────────────────────────────

    fn declare_functions(&mut self, functions: &[FunctionDecl]) -> EvalResult<()> {
        for decl in functions {
            let value = self.new_closure(&decl.function);
            self.variable_env()
                .borrow_mut()
                .create_binding(&decl.name.name, value, false);
        }
        Ok(())
    }

    /// Creates `undefined` bindings for hoisted `var` names that do not
    /// already have a binding (an existing binding is never clobbered).
    fn declare_variables(&mut self, variables: &[String]) {
        let env = self.variable_env();
        for name in variables {
            let exists = env.borrow().has_binding(name);
            if !exists {
                env.borrow_mut().create_binding(name, Value::Undefined, false);
            }
        }
    }

    // ── Errors ──────────────────────────────────────────────────────────────

    /// Builds a script error object with the given name and message.
    pub fn new_error_object(&mut self, name: &str, message: &str) -> Value {
        let prototype = self.intrinsics.error_prototype_for(name);
        let error = Object::new("Error", ObjectKind::Error, Some(prototype)).into_ref();
        {
            let mut error = error.borrow_mut();
            error.define_data_property(
                "name",
                Value::String(name.to_string()),
                PropertyAttributes::hidden(),
            );
            error.define_data_property(
                "message",
                Value::String(message.to_string()),
                PropertyAttributes::hidden(),
            );
        }
        Value::Object(error)
    }

    /// A `TypeError` exception ready to throw.
    pub fn type_error(&mut self, message: &str) -> Exception {
        let value = self.new_error_object("TypeError", message);
        Exception::new(value)
    }

    /// A `ReferenceError` exception ready to throw.
    pub fn reference_error(&mut self, message: &str) -> Exception {
        let value = self.new_error_object("ReferenceError", message);
        Exception::new(value)
    }

    /// A `SyntaxError` exception ready to throw.
    pub fn syntax_error(&mut self, message: &str) -> Exception {
        let value = self.new_error_object("SyntaxError", message);
        Exception::new(value)
    }

    // ── Object operations ───────────────────────────────────────────────────

    /// `[[Get]]`: property read with accessor support.
    pub fn object_get(&mut self, object: &ObjectRef, name: &str) -> EvalResult<Value> {
        let property = object.borrow().lookup_property(name);
        match property {
            None => Ok(Value::Undefined),
            Some(property) => match property.value() {
                PropertyValue::Data(value) => Ok(value.clone()),
                PropertyValue::Accessor {
                    getter: Some(getter),
                    ..
                } => {
                    let getter = getter.clone();
                    self.call_value(&getter, Value::Object(object.clone()), vec![])
                }
                PropertyValue::Accessor { .. } => Ok(Value::Undefined),
            },
        }
    }

    /// `[[Put]]`: property write honouring setters and read-only chain
    /// entries (silently dropped, non-strict).
    pub fn object_put(&mut self, object: &ObjectRef, name: &str, value: Value) -> EvalResult<()> {
        let property = object.borrow().lookup_property(name);
        if let Some(property) = property {
            if let PropertyValue::Accessor { setter, .. } = property.value() {
                if let Some(setter) = setter {
                    let setter = setter.clone();
                    self.call_value(&setter, Value::Object(object.clone()), vec![value])?;
                }
                return Ok(());
            }
        }
        if object.borrow().can_put(name) {
            object.borrow_mut().put_data(name, value);
        }
        Ok(())
    }

    /// Property read on an arbitrary base value (primitives box
    /// transiently).
    pub fn get_property(&mut self, base: &Value, name: &str) -> EvalResult<Value> {
        if base.is_nullish() {
            return Err(self.type_error(&format!(
                "Cannot read property '{}' of {}",
                name,
                base.to_js_string()
            )));
        }
        let object = self.to_object(base)?;
        self.object_get(&object, name)
    }

    /// `ToObject`: objects pass through, primitives box, `null`/`undefined`
    /// raise `TypeError`.
    pub fn to_object(&mut self, value: &Value) -> EvalResult<ObjectRef> {
        let (class, prototype) = match value {
            Value::Object(object) => return Ok(object.clone()),
            Value::String(_) => ("String", self.intrinsics.object_prototype.clone()),
            Value::Number(_) => ("Number", self.intrinsics.object_prototype.clone()),
            Value::Boolean(_) => ("Boolean", self.intrinsics.object_prototype.clone()),
            Value::Null | Value::Undefined => {
                return Err(
                    self.type_error("Cannot convert undefined or null to object")
                );
            }
        };
        Ok(Object::new(class, ObjectKind::Boxed(value.clone()), Some(prototype)).into_ref())
    }

    // ── Abstract conversions that may run script code ───────────────────────

    /// `ToPrimitive`: objects try `valueOf`/`toString` (ordered by `hint`)
    /// and fall back to their default primitive value.
    pub fn to_primitive(&mut self, value: &Value, hint_string: bool) -> EvalResult<Value> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let object = object.clone();
        let methods: [&str; 2] = if hint_string {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for method in methods {
            let f = self.object_get(&object, method)?;
            if f.is_callable() {
                let result = self.call_value(&f, Value::Object(object.clone()), vec![])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Ok(if hint_string {
            Value::String(object.borrow().default_string())
        } else {
            Value::Number(object.borrow().default_number())
        })
    }

    /// `ToString` with script-level `toString` support.
    pub fn to_string_value(&mut self, value: &Value) -> EvalResult<String> {
        Ok(self.to_primitive(value, true)?.to_js_string())
    }

    /// `ToNumber` with script-level `valueOf` support.
    pub fn to_number_value(&mut self, value: &Value) -> EvalResult<f64> {
        Ok(self.to_primitive(value, false)?.to_number())
    }

    // ── Statements ──────────────────────────────────────────────────────────

    /// Evaluates a statement list, tracking the last non-empty statement
    /// value and propagating abrupt completions.
    fn eval_body(&mut self, body: &[Stmt]) -> EvalResult<Completion> {
        let mut result = None;
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Completion::Normal(Some(value)) => result = Some(value),
                Completion::Normal(None) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(result))
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> EvalResult<Completion> {
        match stmt {
            Stmt::Block(block) => self.eval_body(&block.body),
            Stmt::Var(var) => {
                // Bindings exist from hoisting; this runs the initializers.
                for declaration in &var.declarations {
                    self.eval_expr(declaration)?;
                }
                Ok(Completion::empty())
            }
            Stmt::Expr(stmt) => {
                let value = self.eval_expr_value(&stmt.expr)?;
                Ok(Completion::Normal(Some(value)))
            }
            Stmt::If(stmt) => {
                if self.eval_expr_value(&stmt.test)?.to_boolean() {
                    self.eval_stmt(&stmt.consequent)
                } else if let Some(alternate) = &stmt.alternate {
                    self.eval_stmt(alternate)
                } else {
                    Ok(Completion::empty())
                }
            }
            Stmt::While(stmt) => self.eval_while(stmt),
            Stmt::DoWhile(stmt) => self.eval_do_while(stmt),
            Stmt::For(stmt) => self.eval_for(stmt),
            Stmt::ForIn(stmt) => self.eval_for_in(stmt),
            Stmt::Switch(stmt) => self.eval_switch(stmt),
            Stmt::Branch(stmt) => {
                let label = stmt.label.as_ref().map(|l| l.name.clone());
                Ok(match stmt.kind {
                    BranchKind::Break => Completion::Break(label),
                    BranchKind::Continue => Completion::Continue(label),
                })
            }
            Stmt::Return(stmt) => {
                let value = match &stmt.argument {
                    Some(argument) => self.eval_expr_value(argument)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::Throw(stmt) => {
                let value = self.eval_expr_value(&stmt.argument)?;
                Err(Exception::new(value))
            }
            Stmt::Try(stmt) => self.eval_try(stmt),
            Stmt::With(stmt) => self.eval_with(stmt),
            Stmt::Labeled(stmt) => self.eval_labeled(stmt),
            Stmt::Empty(_) => Ok(Completion::empty()),
            Stmt::Bad(_) => Err(self.syntax_error("cannot evaluate malformed program")),
        }
    }

    // ── Labels and loops ────────────────────────────────────────────────────

    /// Takes the labels accumulated by enclosing labelled statements; the
    /// label stack is left empty so nested statements do not inherit them.
    fn take_labels(&mut self) -> Vec<String> {
        std::mem::take(&mut self.labels)
    }

    fn label_matches(labels: &[String], target: &Option<String>) -> bool {
        match target {
            None => true,
            Some(target) => labels.iter().any(|l| l == target),
        }
    }

    fn eval_labeled(&mut self, stmt: &LabeledStmt) -> EvalResult<Completion> {
        let label = stmt.label.name.clone();
        self.labels.push(label.clone());
        let result = self.eval_stmt(&stmt.body);
        // An iteration statement consumes the label stack; pop only if our
        // label is still there.
        if self.labels.last() == Some(&label) {
            self.labels.pop();
        }
        match result? {
            // A labelled break targeting this statement terminates it, loop
            // or not.
            Completion::Break(Some(target)) if target == label => Ok(Completion::empty()),
            Completion::Continue(Some(target)) if target == label => Ok(Completion::empty()),
            other => Ok(other),
        }
    }

    fn eval_while(&mut self, stmt: &WhileStmt) -> EvalResult<Completion> {
        let labels = self.take_labels();
        let mut result = None;
        loop {
            self.poll_interrupt()?;
            if !self.eval_expr_value(&stmt.test)?.to_boolean() {
                break;
            }
            match self.eval_stmt(&stmt.body)? {
                Completion::Normal(Some(value)) => result = Some(value),
                Completion::Normal(None) => {}
                Completion::Break(target) if Self::label_matches(&labels, &target) => break,
                Completion::Continue(target) if Self::label_matches(&labels, &target) => continue,
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(result))
    }

    fn eval_do_while(&mut self, stmt: &DoWhileStmt) -> EvalResult<Completion> {
        let labels = self.take_labels();
        let mut result = None;
        loop {
            self.poll_interrupt()?;
            match self.eval_stmt(&stmt.body)? {
                Completion::Normal(Some(value)) => result = Some(value),
                Completion::Normal(None) => {}
                Completion::Break(target) if Self::label_matches(&labels, &target) => break,
                Completion::Continue(target) if Self::label_matches(&labels, &target) => {}
                abrupt => return Ok(abrupt),
            }
            if !self.eval_expr_value(&stmt.test)?.to_boolean() {
                break;
            }
        }
        Ok(Completion::Normal(result))
    }

    fn eval_for(&mut self, stmt: &ForStmt) -> EvalResult<Completion> {
        let labels = self.take_labels();

        if let Some(init) = &stmt.init {
            // Evaluated for effect; GetValue triggers ReferenceErrors.
            self.eval_expr_value(init)?;
        }

        let mut result = None;
        loop {
            self.poll_interrupt()?;
            if let Some(test) = &stmt.test {
                if !self.eval_expr_value(test)?.to_boolean() {
                    break;
                }
            }
            match self.eval_stmt(&stmt.body)? {
                Completion::Normal(Some(value)) => result = Some(value),
                Completion::Normal(None) => {}
                Completion::Break(target) if Self::label_matches(&labels, &target) => break,
                // A matching continue falls through to the update clause.
                Completion::Continue(target) if Self::label_matches(&labels, &target) => {}
                abrupt => return Ok(abrupt),
            }
            if let Some(update) = &stmt.update {
                self.eval_expr_value(update)?;
            }
        }
        Ok(Completion::Normal(result))
    }

    fn eval_for_in(&mut self, stmt: &ForInStmt) -> EvalResult<Completion> {
        let labels = self.take_labels();

        let source = self.eval_expr_value(&stmt.source)?;
        if source.is_nullish() {
            return Ok(Completion::empty());
        }

        let mut object = Some(self.to_object(&source)?);
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = None;

        'chain: while let Some(current) = object {
            let keys = current.borrow().own_enumerable_keys();
            for key in keys {
                // Names shadowed by a descendant are skipped, as are keys
                // deleted while the loop ran.
                if !seen.insert(key.clone()) {
                    continue;
                }
                if !current.borrow().has_own_property(&key) {
                    continue;
                }
                self.poll_interrupt()?;

                // Re-evaluate the target each iteration; a `var` declarator
                // yields its name, which resolves (or implicitly declares)
                // in the current lexical environment.
                let reference = match self.eval_expr(&stmt.into)? {
                    Outcome::Ref(reference) => reference,
                    Outcome::Value(value) => {
                        let name = value.to_js_string();
                        self.resolve(&name)
                    }
                };
                reference.put(self, Value::String(key.clone()))?;

                match self.eval_stmt(&stmt.body)? {
                    Completion::Normal(Some(value)) => result = Some(value),
                    Completion::Normal(None) => {}
                    Completion::Break(target) if Self::label_matches(&labels, &target) => {
                        break 'chain;
                    }
                    Completion::Continue(target)
                        if Self::label_matches(&labels, &target) => {}
                    abrupt => return Ok(abrupt),
                }
            }
            let next = current.borrow().prototype().cloned();
            object = next;
        }
        Ok(Completion::Normal(result))
    }

    fn eval_switch(&mut self, stmt: &SwitchStmt) -> EvalResult<Completion> {
        let labels = self.take_labels();
        let discriminant = self.eval_expr_value(&stmt.discriminant)?;

        let mut target = stmt.default_index;
        for (index, clause) in stmt.cases.iter().enumerate() {
            if let Some(test) = &clause.test {
                let test = self.eval_expr_value(test)?;
                if discriminant.strict_equals(&test) {
                    target = Some(index);
                    break;
                }
            }
        }

        let mut result = None;
        if let Some(start) = target {
            for clause in &stmt.cases[start..] {
                for s in &clause.consequent {
                    match self.eval_stmt(s)? {
                        Completion::Normal(Some(value)) => result = Some(value),
                        Completion::Normal(None) => {}
                        Completion::Break(target) if Self::label_matches(&labels, &target) => {
                            return Ok(Completion::empty());
                        }
                        abrupt => return Ok(abrupt),
                    }
                }
            }
        }
        Ok(Completion::Normal(result))
    }

    fn eval_try(&mut self, stmt: &TryStmt) -> EvalResult<Completion> {
        let outcome = match (self.eval_body(&stmt.block.body), &stmt.handler) {
            (Err(exception), Some(handler)) => {
                // The catch parameter lives in a transient scope that must
                // not leak past the handler.
                let previous = self.lexical_env();
                let catch_env = Environment::new_declarative(Some(previous.clone()));
                catch_env.borrow_mut().create_binding(
                    &handler.param.name,
                    exception.into_value(),
                    false,
                );
                self.set_lexical_env(catch_env);
                let handled = self.eval_body(&handler.body.body);
                self.set_lexical_env(previous);
                handled
            }
            (other, _) => other,
        };

        if let Some(finalizer) = &stmt.finalizer {
            // A throw inside finally replaces everything.
            let fin = self.eval_body(&finalizer.body)?;
            if !matches!(fin, Completion::Normal(None)) {
                // A non-empty finally completion overrides the pending
                // completion or exception.
                return Ok(fin);
            }
        }

        outcome
    }

    fn eval_with(&mut self, stmt: &WithStmt) -> EvalResult<Completion> {
        let object = self.eval_expr_value(&stmt.object)?;
        let object = self.to_object(&object)?;
        let previous = self.lexical_env();
        let env = Environment::new_object(object, true, Some(previous.clone()));
        self.set_lexical_env(env);
        let result = self.eval_stmt(&stmt.body);
        self.set_lexical_env(previous);
        result
    }

    // ── Expressions ─────────────────────────────────────────────────────────

    /// Evaluates an expression and resolves any reference (`GetValue`).
    pub fn eval_expr_value(&mut self, expr: &Expr) -> EvalResult<Value> {
        let outcome = self.eval_expr(expr)?;
        outcome.get(self)
    }

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Outcome> {
        match expr {
            Expr::Ident(ident) => Ok(Outcome::Ref(self.resolve(&ident.name))),
            Expr::This(_) => Ok(Outcome::Value(Value::Object(self.this_object()))),
            Expr::Null(_) => Ok(Outcome::Value(Value::Null)),
            Expr::Boolean(lit) => Ok(Outcome::Value(Value::Boolean(lit.value))),
            Expr::Number(lit) => Ok(Outcome::Value(Value::Number(lit.value))),
            Expr::String(lit) => Ok(Outcome::Value(Value::String(lit.value.clone()))),
            Expr::Regexp(lit) => {
                let value = self.new_regexp(lit);
                Ok(Outcome::Value(value))
            }
            Expr::Array(lit) => self.eval_array_literal(lit),
            Expr::Object(lit) => self.eval_object_literal(lit),
            Expr::Function(literal) => {
                let value = self.new_closure(literal);
                Ok(Outcome::Value(value))
            }
            Expr::Variable(var) => {
                if let Some(init) = &var.init {
                    let value = self.eval_expr_value(init)?;
                    let reference = self.resolve(&var.name);
                    reference.put(self, value)?;
                }
                // The declarator's value is its name, which for-in turns
                // back into a reference.
                Ok(Outcome::Value(Value::String(var.name.clone())))
            }
            Expr::Unary(unary) => self.eval_unary(unary),
            Expr::Binary(binary) => self.eval_binary(binary),
            Expr::Assign(assign) => self.eval_assign(assign),
            Expr::Conditional(cond) => {
                if self.eval_expr_value(&cond.test)?.to_boolean() {
                    let value = self.eval_expr_value(&cond.consequent)?;
                    Ok(Outcome::Value(value))
                } else {
                    let value = self.eval_expr_value(&cond.alternate)?;
                    Ok(Outcome::Value(value))
                }
            }
            Expr::Call(call) => self.eval_call(call),
            Expr::New(new) => self.eval_new(new),
            Expr::Dot(dot) => {
                let base = self.eval_expr_value(&dot.left)?;
                self.check_coercible(&base, &dot.member.name)?;
                Ok(Outcome::Ref(Reference::Prop {
                    base,
                    name: dot.member.name.clone(),
                }))
            }
            Expr::Bracket(bracket) => {
                let base = self.eval_expr_value(&bracket.left)?;
                let member = self.eval_expr_value(&bracket.member)?;
                let name = self.to_string_value(&member)?;
                self.check_coercible(&base, &name)?;
                Ok(Outcome::Ref(Reference::Prop { base, name }))
            }
            Expr::Sequence(sequence) => {
                let mut value = Value::Undefined;
                for e in &sequence.exprs {
                    value = self.eval_expr_value(e)?;
                }
                Ok(Outcome::Value(value))
            }
            Expr::Bad(_) => Err(self.syntax_error("cannot evaluate malformed program")),
        }
    }

    fn check_coercible(&mut self, base: &Value, name: &str) -> EvalResult<()> {
        if base.is_nullish() {
            return Err(self.type_error(&format!(
                "Cannot read property '{}' of {}",
                name,
                base.to_js_string()
            )));
        }
        Ok(())
    }

    /// Evaluates an expression that the parser guarantees to be a
    /// Reference-producing form.
    fn eval_reference(&mut self, expr: &Expr) -> EvalResult<Reference> {
        match self.eval_expr(expr)? {
            Outcome::Ref(reference) => Ok(reference),
            Outcome::Value(_) => {
                Err(self.reference_error("invalid left-hand side in assignment"))
            }
        }
    }

    // ── Unary operators ─────────────────────────────────────────────────────

    fn eval_unary(&mut self, unary: &UnaryExpr) -> EvalResult<Outcome> {
        if unary.postfix {
            // x++ / x--: store the incremented value, yield the old one.
            let reference = self.eval_reference(&unary.operand)?;
            let old = reference.get(self)?;
            let old = self.to_number_value(&old)?;
            let new = match unary.op {
                TokenKind::PlusPlus => old + 1.0,
                _ => old - 1.0,
            };
            reference.put(self, Value::Number(new))?;
            return Ok(Outcome::Value(Value::Number(old)));
        }

        match unary.op {
            TokenKind::Typeof => {
                // The one GetValue bypass: typeof of an unresolvable name is
                // "undefined", not a ReferenceError.
                let outcome = self.eval_expr(&unary.operand)?;
                let result = match outcome {
                    Outcome::Ref(Reference::Unresolved { .. }) => "undefined".to_string(),
                    other => other.get(self)?.type_of().to_string(),
                };
                Ok(Outcome::Value(Value::String(result)))
            }
            TokenKind::Delete => {
                let outcome = self.eval_expr(&unary.operand)?;
                let result = match outcome {
                    Outcome::Ref(reference) => reference.delete(self)?,
                    Outcome::Value(_) => true,
                };
                Ok(Outcome::Value(Value::Boolean(result)))
            }
            TokenKind::Void => {
                self.eval_expr_value(&unary.operand)?;
                Ok(Outcome::Value(Value::Undefined))
            }
            TokenKind::Bang => {
                let value = self.eval_expr_value(&unary.operand)?;
                Ok(Outcome::Value(Value::Boolean(!value.to_boolean())))
            }
            TokenKind::Plus => {
                let value = self.eval_expr_value(&unary.operand)?;
                let n = self.to_number_value(&value)?;
                Ok(Outcome::Value(Value::Number(n)))
            }
            TokenKind::Minus => {
                let value = self.eval_expr_value(&unary.operand)?;
                let n = self.to_number_value(&value)?;
                Ok(Outcome::Value(Value::Number(-n)))
            }
            TokenKind::Tilde => {
                let value = self.eval_expr_value(&unary.operand)?;
                Ok(Outcome::Value(Value::Number(f64::from(!value.to_int32()))))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let reference = self.eval_reference(&unary.operand)?;
                let old = reference.get(self)?;
                let old = self.to_number_value(&old)?;
                let new = match unary.op {
                    TokenKind::PlusPlus => old + 1.0,
                    _ => old - 1.0,
                };
                reference.put(self, Value::Number(new))?;
                Ok(Outcome::Value(Value::Number(new)))
            }
            op => Err(self.syntax_error(&format!("unsupported unary operator {op}"))),
        }
    }

    // ── Binary operators ────────────────────────────────────────────────────

    fn eval_binary(&mut self, binary: &BinaryExpr) -> EvalResult<Outcome> {
        // Short-circuit operators yield the deciding operand's value.
        match binary.op {
            TokenKind::AmpersandAmpersand => {
                let left = self.eval_expr_value(&binary.left)?;
                if !left.to_boolean() {
                    return Ok(Outcome::Value(left));
                }
                let right = self.eval_expr_value(&binary.right)?;
                return Ok(Outcome::Value(right));
            }
            TokenKind::PipePipe => {
                let left = self.eval_expr_value(&binary.left)?;
                if left.to_boolean() {
                    return Ok(Outcome::Value(left));
                }
                let right = self.eval_expr_value(&binary.right)?;
                return Ok(Outcome::Value(right));
            }
            _ => {}
        }

        let left = self.eval_expr_value(&binary.left)?;
        let right = self.eval_expr_value(&binary.right)?;
        let value = self.binary_op(binary.op, left, right)?;
        Ok(Outcome::Value(value))
    }

    /// Applies a (non-short-circuit) binary operator to two values.  Shared
    /// between binary expressions and compound assignment.
    fn binary_op(&mut self, op: TokenKind, left: Value, right: Value) -> EvalResult<Value> {
        Ok(match op {
            TokenKind::Plus => {
                let lp = self.to_primitive(&left, false)?;
                let rp = self.to_primitive(&right, false)?;
                if lp.is_string() || rp.is_string() {
                    Value::String(format!("{}{}", lp.to_js_string(), rp.to_js_string()))
                } else {
                    Value::Number(lp.to_number() + rp.to_number())
                }
            }
            TokenKind::Minus => {
                let l = self.to_number_value(&left)?;
                let r = self.to_number_value(&right)?;
                Value::Number(l - r)
            }
            TokenKind::Star => {
                let l = self.to_number_value(&left)?;
                let r = self.to_number_value(&right)?;
                Value::Number(l * r)
            }
            TokenKind::Slash => {
                let l = self.to_number_value(&left)?;
                let r = self.to_number_value(&right)?;
                Value::Number(l / r)
            }
            TokenKind::Percent => {
                let l = self.to_number_value(&left)?;
                let r = self.to_number_value(&right)?;
                Value::Number(l % r)
            }
            TokenKind::LessLess => {
                let shift = right.to_uint32() & 31;
                Value::Number(f64::from(left.to_int32().wrapping_shl(shift)))
            }
            TokenKind::GreaterGreater => {
                let shift = right.to_uint32() & 31;
                Value::Number(f64::from(left.to_int32().wrapping_shr(shift)))
            }
            TokenKind::GreaterGreaterGreater => {
                let shift = right.to_uint32() & 31;
                Value::Number(f64::from(left.to_uint32().wrapping_shr(shift)))
            }
            TokenKind::Ampersand => Value::Number(f64::from(left.to_int32() & right.to_int32())),
            TokenKind::Pipe => Value::Number(f64::from(left.to_int32() | right.to_int32())),
            TokenKind::Caret => Value::Number(f64::from(left.to_int32() ^ right.to_int32())),
            TokenKind::EqualEqual => Value::Boolean(self.abstract_equals(&left, &right)?),
            TokenKind::BangEqual => Value::Boolean(!self.abstract_equals(&left, &right)?),
            TokenKind::EqualEqualEqual => Value::Boolean(left.strict_equals(&right)),
            TokenKind::BangEqualEqual => Value::Boolean(!left.strict_equals(&right)),
            TokenKind::Less => {
                Value::Boolean(self.less_than(&left, &right)?.unwrap_or(false))
            }
            TokenKind::Greater => {
                Value::Boolean(self.less_than(&right, &left)?.unwrap_or(false))
            }
            TokenKind::LessEqual => {
                Value::Boolean(!self.less_than(&right, &left)?.unwrap_or(true))
            }
            TokenKind::GreaterEqual => {
                Value::Boolean(!self.less_than(&left, &right)?.unwrap_or(true))
            }
            TokenKind::In => {
                let Value::Object(object) = &right else {
                    let name = self.to_string_value(&left)?;
                    return Err(self.type_error(&format!(
                        "Cannot use 'in' operator to search for '{name}' in {}",
                        right.to_js_string()
                    )));
                };
                let name = self.to_string_value(&left)?;
                Value::Boolean(object.borrow().has_property(&name))
            }
            TokenKind::Instanceof => Value::Boolean(self.has_instance(&left, &right)?),
            op => return Err(self.syntax_error(&format!("unsupported binary operator {op}"))),
        })
    }

    /// The abstract relational comparison; `None` encodes the undefined
    /// result produced by `NaN` operands.
    fn less_than(&mut self, left: &Value, right: &Value) -> EvalResult<Option<bool>> {
        let lp = self.to_primitive(left, false)?;
        let rp = self.to_primitive(right, false)?;
        if let (Value::String(l), Value::String(r)) = (&lp, &rp) {
            return Ok(Some(l < r));
        }
        let l = lp.to_number();
        let r = rp.to_number();
        if l.is_nan() || r.is_nan() {
            return Ok(None);
        }
        Ok(Some(l < r))
    }

    /// The abstract equality comparison (`==`) with its coercion table.
    fn abstract_equals(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => Ok(true),
            (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::Object(_), Value::Object(_)) => Ok(left.strict_equals(right)),
            (Value::Number(l), Value::String(s)) => {
                Ok(*l == Value::String(s.clone()).to_number())
            }
            (Value::String(s), Value::Number(r)) => {
                Ok(Value::String(s.clone()).to_number() == *r)
            }
            (Value::Boolean(_), _) => {
                let l = Value::Number(left.to_number());
                self.abstract_equals(&l, right)
            }
            (_, Value::Boolean(_)) => {
                let r = Value::Number(right.to_number());
                self.abstract_equals(left, &r)
            }
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let l = self.to_primitive(left, false)?;
                self.abstract_equals(&l, right)
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let r = self.to_primitive(right, false)?;
                self.abstract_equals(left, &r)
            }
            _ => Ok(false),
        }
    }

    /// `instanceof`: walks `left`'s prototype chain looking for
    /// `right.prototype`.
    fn has_instance(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        let callable = right.is_callable();
        let Some(constructor) = right.as_object().filter(|_| callable) else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        let constructor = constructor.clone();
        let prototype = self.object_get(&constructor, "prototype")?;
        let Value::Object(prototype) = prototype else {
            return Err(
                self.type_error("Function has non-object prototype in instanceof check")
            );
        };
        let Value::Object(instance) = left else {
            return Ok(false);
        };
        let mut current = instance.borrow().prototype().cloned();
        while let Some(link) = current {
            if Rc::ptr_eq(&link, &prototype) {
                return Ok(true);
            }
            let next = link.borrow().prototype().cloned();
            current = next;
        }
        Ok(false)
    }

    // ── Assignment ──────────────────────────────────────────────────────────

    fn eval_assign(&mut self, assign: &AssignExpr) -> EvalResult<Outcome> {
        let reference = self.eval_reference(&assign.left)?;
        let value = match assign.op {
            None => self.eval_expr_value(&assign.right)?,
            Some(op) => {
                let left = reference.get(self)?;
                let right = self.eval_expr_value(&assign.right)?;
                self.binary_op(op, left, right)?
            }
        };
        reference.put(self, value.clone())?;
        Ok(Outcome::Value(value))
    }

    // ── Literals ────────────────────────────────────────────────────────────

    /// Creates an empty array object.
    pub fn new_array(&mut self) -> ObjectRef {
        let array = Object::new(
            "Array",
            ObjectKind::Array,
            Some(self.intrinsics.array_prototype.clone()),
        )
        .into_ref();
        array.borrow_mut().define_data_property(
            "length",
            Value::Number(0.0),
            PropertyAttributes::WRITABLE,
        );
        array
    }

    fn eval_array_literal(&mut self, lit: &ArrayLit) -> EvalResult<Outcome> {
        let array = self.new_array();
        for (index, element) in lit.elements.iter().enumerate() {
            if let Some(element) = element {
                let value = self.eval_expr_value(element)?;
                array.borrow_mut().put_data(&index.to_string(), value);
            }
        }
        // Trailing holes still count toward length.
        array.borrow_mut().define_data_property(
            "length",
            Value::Number(lit.elements.len() as f64),
            PropertyAttributes::WRITABLE,
        );
        Ok(Outcome::Value(Value::Object(array)))
    }

    fn eval_object_literal(&mut self, lit: &ObjectLit) -> EvalResult<Outcome> {
        let object = Object::plain(Some(self.intrinsics.object_prototype.clone())).into_ref();
        for property in &lit.properties {
            let value = self.eval_expr_value(&property.value)?;
            let mut object = object.borrow_mut();
            match property.kind {
                PropertyKind::Value => {
                    object.define_data_property(&property.key, value, PropertyAttributes::open());
                }
                PropertyKind::Get => {
                    object.define_accessor_property(&property.key, Some(value), None);
                }
                PropertyKind::Set => {
                    object.define_accessor_property(&property.key, None, Some(value));
                }
            }
        }
        Ok(Outcome::Value(Value::Object(object)))
    }

    fn new_regexp(&mut self, lit: &RegexpLit) -> Value {
        let compiled = regex::Regex::new(&transform_regexp(&lit.pattern))
            .ok()
            .map(Rc::new);
        let regexp = Object::new(
            "RegExp",
            ObjectKind::Regexp(RegexpData {
                pattern: lit.pattern.clone(),
                flags: lit.flags.clone(),
                compiled,
            }),
            Some(self.intrinsics.regexp_prototype.clone()),
        )
        .into_ref();
        {
            let mut regexp = regexp.borrow_mut();
            regexp.define_data_property(
                "source",
                Value::String(lit.pattern.clone()),
                PropertyAttributes::empty(),
            );
            regexp.define_data_property(
                "global",
                Value::Boolean(lit.flags.contains('g')),
                PropertyAttributes::empty(),
            );
            regexp.define_data_property(
                "ignoreCase",
                Value::Boolean(lit.flags.contains('i')),
                PropertyAttributes::empty(),
            );
            regexp.define_data_property(
                "multiline",
                Value::Boolean(lit.flags.contains('m')),
                PropertyAttributes::empty(),
            );
            regexp.define_data_property(
                "lastIndex",
                Value::Number(0.0),
                PropertyAttributes::WRITABLE,
            );
        }
        Value::Object(regexp)
    }

    // ── Functions ───────────────────────────────────────────────────────────

    /// Creates a function object (closure) from a parsed function literal,
    /// capturing the current lexical environment.
    pub fn new_closure(&mut self, literal: &Rc<FunctionLiteral>) -> Value {
        let mut scope = self.lexical_env();

        // A named function sees its own name as an immutable binding in a
        // private scope link.
        let self_scope = literal.name.as_ref().map(|_| {
            let env = Environment::new_declarative(Some(scope.clone()));
            scope = env.clone();
            env
        });

        let func = Object::new(
            "Function",
            ObjectKind::Function(FunctionKind::Interpreted(ClosureData {
                literal: literal.clone(),
                scope,
            })),
            Some(self.intrinsics.function_prototype.clone()),
        )
        .into_ref();

        {
            let mut borrowed = func.borrow_mut();
            borrowed.define_data_property(
                "length",
                Value::Number(literal.params.len() as f64),
                PropertyAttributes::empty(),
            );
        }
        let prototype = Object::plain(Some(self.intrinsics.object_prototype.clone())).into_ref();
        prototype.borrow_mut().define_data_property(
            "constructor",
            Value::Object(func.clone()),
            PropertyAttributes::hidden(),
        );
        func.borrow_mut().define_data_property(
            "prototype",
            Value::Object(prototype),
            PropertyAttributes::WRITABLE,
        );

        if let (Some(env), Some(name)) = (self_scope, &literal.name) {
            env.borrow_mut()
                .create_immutable_binding(&name.name, Value::Object(func.clone()));
        }

        Value::Object(func)
    }

    fn eval_call(&mut self, call: &CallExpr) -> EvalResult<Outcome> {
        let callee = self.eval_expr(&call.callee)?;
        let (implicit_this, func) = match callee {
            Outcome::Ref(reference) => {
                let this = reference.implicit_this();
                (this, reference.get(self)?)
            }
            Outcome::Value(value) => (None, value),
        };

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.eval_expr_value(argument)?);
        }

        let this = implicit_this.unwrap_or(Value::Undefined);
        let value = self.call_value(&func, this, arguments)?;
        Ok(Outcome::Value(value))
    }

    /// Calls `func` with the given `this` and arguments.
    ///
    /// A nullish `this` is replaced by the global object and a primitive
    /// `this` is boxed (non-strict call semantics).
    pub fn call_value(
        &mut self,
        func: &Value,
        this: Value,
        arguments: Vec<Value>,
    ) -> EvalResult<Value> {
        let kind = func
            .as_object()
            .and_then(|object| object.borrow().function_kind().cloned());
        let Some(kind) = kind else {
            return Err(self.type_error(&format!("{} is not a function", func.describe())));
        };

        let this = match this {
            Value::Undefined | Value::Null => self.global_object(),
            other => self.to_object(&other)?,
        };

        match kind {
            FunctionKind::Native(native) => native(self, &Value::Object(this), &arguments),
            FunctionKind::Interpreted(closure) => {
                let func_object = func
                    .as_object()
                    .expect("interpreted function is an object")
                    .clone();
                self.call_closure(&closure, &func_object, this, arguments)
            }
        }
    }

    fn call_closure(
        &mut self,
        closure: &ClosureData,
        func_object: &ObjectRef,
        this: ObjectRef,
        arguments: Vec<Value>,
    ) -> EvalResult<Value> {
        self.poll_interrupt()?;

        let literal = closure.literal.clone();
        let env = Environment::new_declarative(Some(closure.scope.clone()));
        self.contexts.push(Context {
            lexical: env.clone(),
            variable: env.clone(),
            this,
        });

        let result = self.run_function_body(&literal, &env, func_object, arguments);
        self.contexts.pop();

        match result? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    /// Function-entry hoisting and body execution: parameters, inner
    /// function declarations, `var` bindings, the `arguments` object, then
    /// the body statements.
    fn run_function_body(
        &mut self,
        literal: &FunctionLiteral,
        env: &EnvRef,
        func_object: &ObjectRef,
        arguments: Vec<Value>,
    ) -> EvalResult<Completion> {
        for (index, param) in literal.params.iter().enumerate() {
            let value = arguments.get(index).cloned().unwrap_or(Value::Undefined);
            env.borrow_mut().create_binding(param, value, false);
        }

        self.declare_functions(&literal.functions)?;
        self.declare_variables(&literal.variables);

        if !env.borrow().has_binding("arguments") {
            let args_object = self.new_arguments_object(&arguments, func_object);
            env.borrow_mut()
                .create_binding("arguments", args_object, false);
        }

        self.eval_body(&literal.body)
    }

    /// Builds the `arguments` object: every supplied argument (extras
    /// included), `length`, and `callee`.
    fn new_arguments_object(&mut self, arguments: &[Value], func_object: &ObjectRef) -> Value {
        let object = Object::new(
            "Arguments",
            ObjectKind::Arguments,
            Some(self.intrinsics.object_prototype.clone()),
        )
        .into_ref();
        {
            let mut object = object.borrow_mut();
            for (index, value) in arguments.iter().enumerate() {
                object.define_data_property(
                    &index.to_string(),
                    value.clone(),
                    PropertyAttributes::open(),
                );
            }
            object.define_data_property(
                "length",
                Value::Number(arguments.len() as f64),
                PropertyAttributes::hidden(),
            );
            object.define_data_property(
                "callee",
                Value::Object(func_object.clone()),
                PropertyAttributes::hidden(),
            );
        }
        Value::Object(object)
    }

    fn eval_new(&mut self, new: &NewExpr) -> EvalResult<Outcome> {
        let callee = self.eval_expr_value(&new.callee)?;
        let mut arguments = Vec::new();
        if let Some(list) = &new.arguments {
            for argument in list {
                arguments.push(self.eval_expr_value(argument)?);
            }
        }
        let value = self.construct(&callee, arguments)?;
        Ok(Outcome::Value(value))
    }

    /// `[[Construct]]`: allocates an object prototyped on
    /// `callee.prototype`, invokes the callee with it as `this`, and keeps
    /// the callee's return value when it is an object.
    pub fn construct(&mut self, callee: &Value, arguments: Vec<Value>) -> EvalResult<Value> {
        if !callee.is_callable() {
            return Err(self.type_error(&format!("{} is not a constructor", callee.describe())));
        }
        let constructor = callee.as_object().expect("callable is an object").clone();
        let prototype = match self.object_get(&constructor, "prototype")? {
            Value::Object(prototype) => prototype,
            _ => self.intrinsics.object_prototype.clone(),
        };
        let instance = Object::plain(Some(prototype)).into_ref();
        let result = self.call_value(callee, Value::Object(instance.clone()), arguments)?;
        Ok(match result {
            Value::Object(object) => Value::Object(object),
            _ => Value::Object(instance),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
