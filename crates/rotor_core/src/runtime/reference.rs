//! The Reference type: unresolved l-values.
//!
//! Expressions that can appear on the left of an assignment evaluate to a
//! [`Reference`] instead of a value.  A reference is a `(base, name)` pair
//! with three shapes: a binding found in an environment record, a property
//! of a value, or an identifier that resolved nowhere.  `get` / `put` /
//! `delete` implement `GetValue`, `PutValue`, and the `delete` operator over
//! all three.

use crate::runtime::completion::EvalResult;
use crate::runtime::environment::{EnvRef, Record};
use crate::runtime::interpreter::Runtime;
use crate::runtime::value::Value;

/// An unresolved l-value.
#[derive(Debug, Clone)]
pub enum Reference {
    /// A binding found in an environment record.
    Env {
        /// The environment link holding the binding.
        env: EnvRef,
        /// The bound name.
        name: String,
    },
    /// An identifier that resolved to no binding anywhere in the scope
    /// chain.  Reading raises `ReferenceError`; writing creates a global
    /// property (non-strict semantics).
    Unresolved {
        /// The unresolved name.
        name: String,
    },
    /// A property of a base value.
    Prop {
        /// The base value (object, or a primitive that boxes on access).
        base: Value,
        /// The property name.
        name: String,
    },
}

impl Reference {
    /// The referenced name.
    pub fn name(&self) -> &str {
        match self {
            Reference::Env { name, .. }
            | Reference::Unresolved { name }
            | Reference::Prop { name, .. } => name,
        }
    }

    /// `GetValue`: resolve this reference to a value.
    ///
    /// Raises `ReferenceError` for unresolved identifiers (`typeof` is the
    /// one caller that checks for [`Reference::Unresolved`] first and never
    /// gets here).
    pub fn get(&self, runtime: &mut Runtime) -> EvalResult<Value> {
        match self {
            Reference::Env { env, name } => {
                // Object records route through the ordinary [[Get]] so that
                // accessor properties on `with` objects work.
                let object = env.borrow().binding_object();
                match object {
                    Some(object) => runtime.object_get(&object, name),
                    None => Ok(env
                        .borrow()
                        .get_binding(name)
                        .unwrap_or(Value::Undefined)),
                }
            }
            Reference::Unresolved { name } => {
                Err(runtime.reference_error(&format!("{name} is not defined")))
            }
            Reference::Prop { base, name } => runtime.get_property(base, name),
        }
    }

    /// `PutValue`: assign through this reference.
    ///
    /// Writing an unresolved identifier creates a property on the global
    /// object; writing a property of a primitive base is a silent no-op
    /// (non-strict semantics).
    pub fn put(&self, runtime: &mut Runtime, value: Value) -> EvalResult<()> {
        match self {
            Reference::Env { env, name } => {
                let object = env.borrow().binding_object();
                match object {
                    Some(object) => runtime.object_put(&object, name, value),
                    None => {
                        env.borrow_mut().set_binding(name, value);
                        Ok(())
                    }
                }
            }
            Reference::Unresolved { name } => {
                let global = runtime.global_object();
                runtime.object_put(&global, name, value)
            }
            Reference::Prop { base, name } => match base {
                Value::Object(object) => {
                    let object = object.clone();
                    runtime.object_put(&object, name, value)
                }
                Value::Null | Value::Undefined => Err(runtime.reference_error(&format!(
                    "cannot assign to property '{name}' of {}",
                    base.to_js_string()
                ))),
                // Property writes on primitives vanish with the transient box.
                _ => Ok(()),
            },
        }
    }

    /// The `delete` operator applied to this reference.
    pub fn delete(&self, runtime: &mut Runtime) -> EvalResult<bool> {
        match self {
            Reference::Env { env, name } => {
                let object = env.borrow().binding_object();
                match object {
                    Some(object) => Ok(object.borrow_mut().delete_property(name)),
                    None => Ok(env.borrow_mut().delete_binding(name)),
                }
            }
            Reference::Unresolved { .. } => Ok(true),
            Reference::Prop { base, name } => match base {
                Value::Object(object) => Ok(object.borrow_mut().delete_property(name)),
                _ => Ok(true),
            },
        }
    }

    /// Returns `true` when this reference resolved through a `provide_this`
    /// object record (`with`), whose binding object becomes the `this` of a
    /// call.
    pub fn implicit_this(&self) -> Option<Value> {
        match self {
            Reference::Env { env, .. } => {
                let env = env.borrow();
                if let Record::Object {
                    object,
                    provide_this: true,
                } = env.record()
                {
                    Some(Value::Object(object.clone()))
                } else {
                    None
                }
            }
            Reference::Prop { base, .. } => Some(base.clone()),
            Reference::Unresolved { .. } => None,
        }
    }
}
