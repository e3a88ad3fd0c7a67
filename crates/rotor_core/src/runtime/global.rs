//! Bootstrap of the standard objects: prototypes and the global object.
//!
//! The built-in library proper (methods on `Object.prototype`,
//! `Array.prototype`, …) is out of scope for the core; what is built here is
//! the prototype *skeleton* the evaluator depends on — prototype chains for
//! the objects it creates, error prototypes for the runtime errors it
//! raises, and the global object with its value properties.

use crate::runtime::environment::{EnvRef, Environment};
use crate::runtime::object::{Object, ObjectKind, ObjectRef, PropertyAttributes};
use crate::runtime::value::Value;

/// The built-in prototype objects of one runtime instance.
#[derive(Debug)]
pub struct Intrinsics {
    /// `Object.prototype` — the root of every default prototype chain.
    pub object_prototype: ObjectRef,
    /// `Function.prototype`.
    pub function_prototype: ObjectRef,
    /// `Array.prototype`.
    pub array_prototype: ObjectRef,
    /// `RegExp.prototype`.
    pub regexp_prototype: ObjectRef,
    /// `Error.prototype`.
    pub error_prototype: ObjectRef,
    /// Prototypes of the native error subtypes, keyed by name
    /// (`TypeError`, `ReferenceError`, `SyntaxError`, `RangeError`,
    /// `URIError`).
    native_error_prototypes: Vec<(&'static str, ObjectRef)>,
}

/// Names of the native error subtypes the runtime can raise.
pub const NATIVE_ERROR_NAMES: [&str; 5] = [
    "TypeError",
    "ReferenceError",
    "SyntaxError",
    "RangeError",
    "URIError",
];

impl Intrinsics {
    /// Builds the prototype skeleton.
    pub fn new() -> Intrinsics {
        let object_prototype = Object::plain(None).into_ref();
        let function_prototype =
            Object::plain(Some(object_prototype.clone())).into_ref();
        let array_prototype = Object::plain(Some(object_prototype.clone())).into_ref();
        let regexp_prototype = Object::plain(Some(object_prototype.clone())).into_ref();

        let error_prototype =
            Object::new("Error", ObjectKind::Error, Some(object_prototype.clone())).into_ref();
        error_prototype.borrow_mut().define_data_property(
            "name",
            Value::String("Error".to_string()),
            PropertyAttributes::hidden(),
        );
        error_prototype.borrow_mut().define_data_property(
            "message",
            Value::String(String::new()),
            PropertyAttributes::hidden(),
        );

        let native_error_prototypes = NATIVE_ERROR_NAMES
            .iter()
            .map(|&name| {
                let proto =
                    Object::new("Error", ObjectKind::Error, Some(error_prototype.clone()))
                        .into_ref();
                proto.borrow_mut().define_data_property(
                    "name",
                    Value::String(name.to_string()),
                    PropertyAttributes::hidden(),
                );
                (name, proto)
            })
            .collect();

        Intrinsics {
            object_prototype,
            function_prototype,
            array_prototype,
            regexp_prototype,
            error_prototype,
            native_error_prototypes,
        }
    }

    /// The prototype for an error object named `name`, falling back to
    /// `Error.prototype` for unknown names.
    pub fn error_prototype_for(&self, name: &str) -> ObjectRef {
        self.native_error_prototypes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, proto)| proto.clone())
            .unwrap_or_else(|| self.error_prototype.clone())
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the global object: class `global`, prototyped on
/// `Object.prototype`, carrying the `NaN` / `Infinity` / `undefined` value
/// properties.
pub fn new_global_object(intrinsics: &Intrinsics) -> ObjectRef {
    let global = Object::new(
        "global",
        ObjectKind::Global,
        Some(intrinsics.object_prototype.clone()),
    )
    .into_ref();
    {
        let mut global = global.borrow_mut();
        global.define_data_property(
            "NaN",
            Value::Number(f64::NAN),
            PropertyAttributes::empty(),
        );
        global.define_data_property(
            "Infinity",
            Value::Number(f64::INFINITY),
            PropertyAttributes::empty(),
        );
        global.define_data_property(
            "undefined",
            Value::Undefined,
            PropertyAttributes::empty(),
        );
    }
    global
}

/// Builds the global environment: an object record over the global object.
pub fn new_global_environment(global: ObjectRef) -> EnvRef {
    Environment::new_object(global, false, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prototype_chain_roots_at_object_prototype() {
        let intrinsics = Intrinsics::new();
        assert!(intrinsics.object_prototype.borrow().prototype().is_none());
        let function_proto = intrinsics.function_prototype.borrow();
        assert!(std::rc::Rc::ptr_eq(
            function_proto.prototype().unwrap(),
            &intrinsics.object_prototype
        ));
    }

    #[test]
    fn test_native_error_prototypes_chain_to_error_prototype() {
        let intrinsics = Intrinsics::new();
        let type_error = intrinsics.error_prototype_for("TypeError");
        assert!(std::rc::Rc::ptr_eq(
            type_error.borrow().prototype().unwrap(),
            &intrinsics.error_prototype
        ));
        assert_eq!(
            type_error.borrow().get_own_data("name").unwrap().to_js_string(),
            "TypeError"
        );
    }

    #[test]
    fn test_unknown_error_name_falls_back_to_error_prototype() {
        let intrinsics = Intrinsics::new();
        let proto = intrinsics.error_prototype_for("NotARealError");
        assert!(std::rc::Rc::ptr_eq(&proto, &intrinsics.error_prototype));
    }

    #[test]
    fn test_global_object_value_properties() {
        let intrinsics = Intrinsics::new();
        let global = new_global_object(&intrinsics);
        let global = global.borrow();
        assert_eq!(global.class(), "global");
        assert!(global.get_own_data("NaN").unwrap().to_number().is_nan());
        assert_eq!(
            global.get_own_data("Infinity").unwrap().to_number(),
            f64::INFINITY
        );
        assert!(global.get_own_data("undefined").unwrap().is_undefined());
        // The value properties are not enumerable.
        assert!(global.own_enumerable_keys().is_empty());
    }
}
