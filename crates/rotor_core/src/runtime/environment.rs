//! Lexical environments.
//!
//! An environment is one link in the scope chain: a *declarative* record (a
//! map from names to bindings) or an *object* record (a host object whose
//! properties are the bindings — the global object, or the operand of a
//! `with` statement).  Records chain outward through `outer`; identifier
//! resolution walks the chain from the innermost link.
//!
//! `with` pushes a transient object record with `provide_this` set so that
//! function calls through it receive the binding object as `this`;
//! `try`/`catch` pushes a transient declarative record binding the caught
//! value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::object::ObjectRef;
use crate::runtime::value::Value;

/// Shared handle to an environment link.
pub type EnvRef = Rc<RefCell<Environment>>;

/// A single name binding in a declarative record.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound value.
    pub value: Value,
    /// `false` for immutable bindings (a named function expression's own
    /// name); assignments to them are silently ignored in non-strict code.
    pub mutable: bool,
    /// Whether `delete` may remove the binding.
    pub deletable: bool,
}

/// The two record kinds an [`Environment`] can hold.
#[derive(Debug)]
pub enum Record {
    /// A map of declared names.
    Declarative(HashMap<String, Binding>),
    /// Bindings backed by an object's properties.
    Object {
        /// The binding object.
        object: ObjectRef,
        /// `true` for `with` environments: calls resolved through this
        /// record use the binding object as `this`.
        provide_this: bool,
    },
}

/// One link of the scope chain.
#[derive(Debug)]
pub struct Environment {
    record: Record,
    outer: Option<EnvRef>,
}

impl Environment {
    /// Creates an empty declarative environment over `outer`.
    pub fn new_declarative(outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            record: Record::Declarative(HashMap::new()),
            outer,
        }))
    }

    /// Creates an object environment whose bindings are `object`'s
    /// properties.
    pub fn new_object(object: ObjectRef, provide_this: bool, outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            record: Record::Object {
                object,
                provide_this,
            },
            outer,
        }))
    }

    /// The enclosing environment, if any.
    pub fn outer(&self) -> Option<EnvRef> {
        self.outer.clone()
    }

    /// The record of this link.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// The binding object of an object record.
    pub fn binding_object(&self) -> Option<ObjectRef> {
        match &self.record {
            Record::Object { object, .. } => Some(object.clone()),
            Record::Declarative(_) => None,
        }
    }

    /// The implicit `this` supplied to calls resolved through this link:
    /// the binding object of a `provide_this` object record.
    pub fn implicit_this(&self) -> Option<ObjectRef> {
        match &self.record {
            Record::Object {
                object,
                provide_this: true,
            } => Some(object.clone()),
            _ => None,
        }
    }

    /// Returns `true` if this record (not the chain) binds `name`.
    pub fn has_binding(&self, name: &str) -> bool {
        match &self.record {
            Record::Declarative(map) => map.contains_key(name),
            Record::Object { object, .. } => object.borrow().has_property(name),
        }
    }

    /// Creates (or overwrites) a binding in this record.
    pub fn create_binding(&mut self, name: &str, value: Value, deletable: bool) {
        match &mut self.record {
            Record::Declarative(map) => {
                map.insert(
                    name.to_string(),
                    Binding {
                        value,
                        mutable: true,
                        deletable,
                    },
                );
            }
            Record::Object { object, .. } => {
                object.borrow_mut().put_data(name, value);
            }
        }
    }

    /// Creates an immutable binding (declarative records only).
    pub fn create_immutable_binding(&mut self, name: &str, value: Value) {
        if let Record::Declarative(map) = &mut self.record {
            map.insert(
                name.to_string(),
                Binding {
                    value,
                    mutable: false,
                    deletable: false,
                },
            );
        }
    }

    /// Sets an existing binding.  Assignments to immutable bindings are
    /// silently ignored.  Object records write through the object's
    /// ordinary `[[Put]]` path via the evaluator, so this only covers the
    /// declarative case; callers route object records separately.
    pub fn set_binding(&mut self, name: &str, value: Value) {
        match &mut self.record {
            Record::Declarative(map) => {
                if let Some(binding) = map.get_mut(name) {
                    if binding.mutable {
                        binding.value = value;
                    }
                }
            }
            Record::Object { object, .. } => {
                object.borrow_mut().put_data(name, value);
            }
        }
    }

    /// Reads a binding from this record (data properties only for object
    /// records; the evaluator routes accessor reads through the object
    /// path).
    pub fn get_binding(&self, name: &str) -> Option<Value> {
        match &self.record {
            Record::Declarative(map) => map.get(name).map(|b| b.value.clone()),
            Record::Object { object, .. } => object
                .borrow()
                .lookup_property(name)
                .and_then(|p| match p.value() {
                    crate::runtime::object::PropertyValue::Data(v) => Some(v.clone()),
                    _ => None,
                }),
        }
    }

    /// Removes a binding.  Returns `true` when the binding is gone
    /// afterwards (missing bindings delete trivially).
    pub fn delete_binding(&mut self, name: &str) -> bool {
        match &mut self.record {
            Record::Declarative(map) => match map.get(name) {
                Some(binding) if !binding.deletable => false,
                Some(_) => {
                    map.remove(name);
                    true
                }
                None => true,
            },
            Record::Object { object, .. } => object.borrow_mut().delete_property(name),
        }
    }
}

/// Walks the chain from `env` outward and returns the first link that binds
/// `name`.
pub fn resolve(env: &EnvRef, name: &str) -> Option<EnvRef> {
    let mut current = Some(env.clone());
    while let Some(link) = current {
        if link.borrow().has_binding(name) {
            return Some(link);
        }
        let outer = link.borrow().outer();
        current = outer;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::Object;

    // ── Declarative records ──────────────────────────────────────────────────

    #[test]
    fn test_create_and_get_binding() {
        let env = Environment::new_declarative(None);
        env.borrow_mut()
            .create_binding("x", Value::Number(1.0), false);
        assert!(env.borrow().has_binding("x"));
        assert_eq!(env.borrow().get_binding("x").unwrap().to_number(), 1.0);
    }

    #[test]
    fn test_set_binding_mutates() {
        let env = Environment::new_declarative(None);
        env.borrow_mut()
            .create_binding("x", Value::Number(1.0), false);
        env.borrow_mut().set_binding("x", Value::Number(2.0));
        assert_eq!(env.borrow().get_binding("x").unwrap().to_number(), 2.0);
    }

    #[test]
    fn test_immutable_binding_ignores_assignment() {
        let env = Environment::new_declarative(None);
        env.borrow_mut()
            .create_immutable_binding("f", Value::Number(1.0));
        env.borrow_mut().set_binding("f", Value::Number(9.0));
        assert_eq!(env.borrow().get_binding("f").unwrap().to_number(), 1.0);
    }

    #[test]
    fn test_delete_binding_respects_deletable_flag() {
        let env = Environment::new_declarative(None);
        env.borrow_mut()
            .create_binding("keep", Value::Null, false);
        env.borrow_mut()
            .create_binding("drop", Value::Null, true);
        assert!(!env.borrow_mut().delete_binding("keep"));
        assert!(env.borrow_mut().delete_binding("drop"));
        assert!(env.borrow().has_binding("keep"));
        assert!(!env.borrow().has_binding("drop"));
    }

    // ── Object records ───────────────────────────────────────────────────────

    #[test]
    fn test_object_record_reads_object_properties() {
        let object = Object::plain(None).into_ref();
        object.borrow_mut().put_data("x", Value::Number(5.0));
        let env = Environment::new_object(object, false, None);
        assert!(env.borrow().has_binding("x"));
        assert_eq!(env.borrow().get_binding("x").unwrap().to_number(), 5.0);
    }

    #[test]
    fn test_provide_this_surfaces_binding_object() {
        let object = Object::plain(None).into_ref();
        let with_env = Environment::new_object(object.clone(), true, None);
        assert!(with_env.borrow().implicit_this().is_some());
        let plain_env = Environment::new_object(object, false, None);
        assert!(plain_env.borrow().implicit_this().is_none());
    }

    // ── Chain resolution ─────────────────────────────────────────────────────

    #[test]
    fn test_resolve_walks_outward() {
        let outer = Environment::new_declarative(None);
        outer
            .borrow_mut()
            .create_binding("x", Value::Number(1.0), false);
        let inner = Environment::new_declarative(Some(outer.clone()));
        let found = resolve(&inner, "x").expect("binding resolves");
        assert!(Rc::ptr_eq(&found, &outer));
        assert!(resolve(&inner, "missing").is_none());
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let outer = Environment::new_declarative(None);
        outer
            .borrow_mut()
            .create_binding("x", Value::Number(1.0), false);
        let inner = Environment::new_declarative(Some(outer));
        inner
            .borrow_mut()
            .create_binding("x", Value::Number(2.0), false);
        let found = resolve(&inner, "x").unwrap();
        assert_eq!(found.borrow().get_binding("x").unwrap().to_number(), 2.0);
    }
}
