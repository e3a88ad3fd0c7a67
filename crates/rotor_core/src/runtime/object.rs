//! Heap objects: ordinary objects, arrays, functions, regexps, errors, and
//! boxed primitives.
//!
//! # Storage model
//!
//! Named properties live in a single insertion-ordered store backed by a
//! [`SmallVec`]: small objects keep their properties inline, larger ones
//! spill to the heap.  Insertion order is load-bearing — `for…in`
//! enumeration yields own enumerable keys in the order they were defined.
//! Array index keys are stored in the same table as their decimal string
//! form; arrays additionally maintain a `length` data property.
//!
//! # Prototype chain
//!
//! Each object optionally holds a reference-counted pointer to a prototype
//! object ([`ObjectRef`]).  Property lookup, existence tests, and
//! write-through checks all walk the chain automatically.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::parser::ast::FunctionLiteral;
use crate::runtime::completion::EvalResult;
use crate::runtime::environment::EnvRef;
use crate::runtime::interpreter::Runtime;
use crate::runtime::value::Value;

/// Shared handle to a heap object.
pub type ObjectRef = Rc<RefCell<Object>>;

/// Number of named-property slots stored inline before the property store
/// spills to the heap.
pub const INLINE_PROPERTIES: usize = 8;

bitflags! {
    /// Attribute flags for a property.
    ///
    /// These correspond directly to the ECMAScript property attribute fields
    /// `[[Writable]]`, `[[Enumerable]]`, and `[[Configurable]]`.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct PropertyAttributes: u8 {
        /// The property value may be changed with an assignment.
        const WRITABLE     = 0b001;
        /// The property key shows up during enumeration (`for…in`).
        const ENUMERABLE   = 0b010;
        /// The property may be reconfigured or deleted.
        const CONFIGURABLE = 0b100;
    }
}

impl PropertyAttributes {
    /// The default attributes of a script-created property: writable,
    /// enumerable, and configurable.
    pub fn open() -> PropertyAttributes {
        PropertyAttributes::WRITABLE
            | PropertyAttributes::ENUMERABLE
            | PropertyAttributes::CONFIGURABLE
    }

    /// Writable and configurable, but hidden from enumeration.
    pub fn hidden() -> PropertyAttributes {
        PropertyAttributes::WRITABLE | PropertyAttributes::CONFIGURABLE
    }
}

/// The payload of a named property: a plain data value or an accessor pair.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// An ordinary data property.
    Data(Value),
    /// A `get`/`set` accessor property; either side may be absent.
    Accessor {
        /// The getter function, if defined.
        getter: Option<Value>,
        /// The setter function, if defined.
        setter: Option<Value>,
    },
}

/// A named property entry: key, payload, and attribute flags.
#[derive(Debug, Clone)]
pub struct Property {
    key: String,
    value: PropertyValue,
    attributes: PropertyAttributes,
}

impl Property {
    /// The property key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The property payload.
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// The property attribute flags.
    pub fn attributes(&self) -> PropertyAttributes {
        self.attributes
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Function payloads
// ──────────────────────────────────────────────────────────────────────────────

/// A host callback implementing a function directly in Rust.
///
/// Receives the runtime, the `this` value, and the argument list.
pub type NativeFunction = fn(&mut Runtime, &Value, &[Value]) -> EvalResult<Value>;

/// A closure created from a `function` expression or declaration: the parsed
/// body plus the lexical scope captured at creation.
#[derive(Debug, Clone)]
pub struct ClosureData {
    /// The parsed function definition.
    pub literal: Rc<FunctionLiteral>,
    /// The scope chain captured when the closure was created.
    pub scope: EnvRef,
}

/// How a function object is implemented.
#[derive(Clone)]
pub enum FunctionKind {
    /// A script function: parsed body + captured scope.
    Interpreted(ClosureData),
    /// A host-side Rust callback.
    Native(NativeFunction),
}

impl std::fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Interpreted(_) => f.write_str("FunctionKind::Interpreted(…)"),
            FunctionKind::Native(_) => f.write_str("FunctionKind::Native(…)"),
        }
    }
}

/// The regexp payload: pattern, flags, and the eagerly compiled program.
#[derive(Debug, Clone)]
pub struct RegexpData {
    /// The pattern text between the slashes.
    pub pattern: String,
    /// The literal flags (`g`, `i`, `m`).
    pub flags: String,
    /// The compiled program, when the pattern is expressible in the host
    /// regex dialect.
    pub compiled: Option<Rc<regex::Regex>>,
}

/// The concrete shape of an [`Object`], with any type-specific payload.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// A plain ordinary object (`{}`).
    Plain,
    /// An `Array` (keeps its `length` property in step with index writes).
    Array,
    /// A callable function.
    Function(FunctionKind),
    /// A `RegExp`.
    Regexp(RegexpData),
    /// An error object (`Error`, `TypeError`, …; the subtype lives in the
    /// `name` property).
    Error,
    /// The `arguments` object of a function activation.
    Arguments,
    /// A boxed primitive produced by `ToObject`.
    Boxed(Value),
    /// The global object.
    Global,
}

// ──────────────────────────────────────────────────────────────────────────────
// Object
// ──────────────────────────────────────────────────────────────────────────────

/// A heap object: class tag, kind payload, insertion-ordered named
/// properties, and an optional prototype link.
#[derive(Debug)]
pub struct Object {
    /// The `[[Class]]` tag (`"Object"`, `"Array"`, `"Function"`, …).
    class: &'static str,
    /// The concrete shape and payload.
    kind: ObjectKind,
    /// Named properties in insertion order.
    properties: SmallVec<[Property; INLINE_PROPERTIES]>,
    /// Prototype object, or `None` at the end of the chain.
    prototype: Option<ObjectRef>,
}

impl Object {
    /// Creates an object with the given class tag, kind, and prototype.
    pub fn new(class: &'static str, kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            class,
            kind,
            properties: SmallVec::new(),
            prototype,
        }
    }

    /// Creates a plain ordinary object.
    pub fn plain(prototype: Option<ObjectRef>) -> Self {
        Self::new("Object", ObjectKind::Plain, prototype)
    }

    /// Wraps this object into a shared [`ObjectRef`] handle.
    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    /// The `[[Class]]` tag.
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// The concrete kind payload.
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Returns the prototype of this object, if any.
    pub fn prototype(&self) -> Option<&ObjectRef> {
        self.prototype.as_ref()
    }

    /// Sets (or removes) the prototype of this object.
    pub fn set_prototype(&mut self, prototype: Option<ObjectRef>) {
        self.prototype = prototype;
    }

    /// Returns `true` if this object can be called as a function.
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// Returns the function payload if this object is callable.
    pub fn function_kind(&self) -> Option<&FunctionKind> {
        match &self.kind {
            ObjectKind::Function(kind) => Some(kind),
            _ => None,
        }
    }

    // ── Own property operations ───────────────────────────────────────────────

    fn position(&self, key: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.key == key)
    }

    /// Returns the full own property entry for `key`.
    pub fn get_own_property(&self, key: &str) -> Option<&Property> {
        self.position(key).map(|i| &self.properties[i])
    }

    /// Returns the value of an own *data* property (accessors yield `None`).
    pub fn get_own_data(&self, key: &str) -> Option<Value> {
        match self.get_own_property(key).map(|p| &p.value) {
            Some(PropertyValue::Data(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Returns `true` if this object has an own property named `key`.
    pub fn has_own_property(&self, key: &str) -> bool {
        self.position(key).is_some() || self.boxed_string_index(key).is_some()
    }

    /// Defines (or redefines) an own property, bypassing writability checks.
    pub fn define_own_property(
        &mut self,
        key: &str,
        value: PropertyValue,
        attributes: PropertyAttributes,
    ) {
        if let Some(i) = self.position(key) {
            self.properties[i].value = value;
            self.properties[i].attributes = attributes;
        } else {
            self.properties.push(Property {
                key: key.to_string(),
                value,
                attributes,
            });
        }
        self.update_array_length(key);
    }

    /// Defines an own data property with the given attributes.
    pub fn define_data_property(
        &mut self,
        key: &str,
        value: Value,
        attributes: PropertyAttributes,
    ) {
        self.define_own_property(key, PropertyValue::Data(value), attributes);
    }

    /// Merges one side of an accessor pair into the property `key`,
    /// preserving the other side if already present.
    pub fn define_accessor_property(
        &mut self,
        key: &str,
        getter: Option<Value>,
        setter: Option<Value>,
    ) {
        let (mut g, mut s) = match self.get_own_property(key).map(|p| &p.value) {
            Some(PropertyValue::Accessor { getter, setter }) => (getter.clone(), setter.clone()),
            _ => (None, None),
        };
        if getter.is_some() {
            g = getter;
        }
        if setter.is_some() {
            s = setter;
        }
        self.define_own_property(
            key,
            PropertyValue::Accessor {
                getter: g,
                setter: s,
            },
            PropertyAttributes::ENUMERABLE | PropertyAttributes::CONFIGURABLE,
        );
    }

    /// Removes the own property `key`.  Returns `false` when the property
    /// exists but is non-configurable.
    pub fn delete_property(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                if !self.properties[i]
                    .attributes
                    .contains(PropertyAttributes::CONFIGURABLE)
                {
                    return false;
                }
                self.properties.remove(i);
                true
            }
            None => true,
        }
    }

    // ── Prototype-chain traversal ─────────────────────────────────────────────

    /// `[[GetProperty]]`: the property entry for `key` found on this object
    /// or anywhere in its prototype chain.
    pub fn lookup_property(&self, key: &str) -> Option<Property> {
        if let Some(p) = self.get_own_property(key) {
            return Some(p.clone());
        }
        if let Some(v) = self.boxed_string_index(key) {
            return Some(Property {
                key: key.to_string(),
                value: PropertyValue::Data(v),
                attributes: PropertyAttributes::ENUMERABLE,
            });
        }
        self.prototype
            .as_ref()
            .and_then(|proto| proto.borrow().lookup_property(key))
    }

    /// `[[HasProperty]]`: `true` if `key` exists on this object or anywhere
    /// in its prototype chain.
    pub fn has_property(&self, key: &str) -> bool {
        self.has_own_property(key)
            || self
                .prototype
                .as_ref()
                .is_some_and(|proto| proto.borrow().has_property(key))
    }

    /// Returns `true` if `key` exists in the chain as a read-only data
    /// property, which blocks write-through.
    fn is_readonly_in_chain(&self, key: &str) -> bool {
        if let Some(p) = self.get_own_property(key) {
            return matches!(p.value, PropertyValue::Data(_))
                && !p.attributes.contains(PropertyAttributes::WRITABLE);
        }
        self.prototype
            .as_ref()
            .is_some_and(|proto| proto.borrow().is_readonly_in_chain(key))
    }

    /// `[[CanPut]]`: whether an ordinary assignment to `key` may proceed.
    pub fn can_put(&self, key: &str) -> bool {
        !self.is_readonly_in_chain(key)
    }

    /// Plain data write used by the evaluator's `[[Put]]` after the
    /// `can_put` and accessor checks: creates or overwrites an own data
    /// property with open attributes.
    pub fn put_data(&mut self, key: &str, value: Value) {
        if let Some(i) = self.position(key) {
            self.properties[i].value = PropertyValue::Data(value);
        } else {
            self.properties.push(Property {
                key: key.to_string(),
                value: PropertyValue::Data(value),
                attributes: PropertyAttributes::open(),
            });
        }
        self.update_array_length(key);
    }

    // ── Enumeration ───────────────────────────────────────────────────────────

    /// Own enumerable property keys, in insertion order.
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|p| p.attributes.contains(PropertyAttributes::ENUMERABLE))
            .map(|p| p.key.clone())
            .collect()
    }

    // ── Array length maintenance ──────────────────────────────────────────────

    /// Parses `key` as an array index (`"0"`, `"1"`, …).
    pub fn array_index(key: &str) -> Option<u32> {
        if key == "0" {
            return Some(0);
        }
        if key.starts_with('0') || key.is_empty() {
            return None;
        }
        key.parse::<u32>().ok()
    }

    /// After an index write on an array, grow `length` to cover it.
    fn update_array_length(&mut self, key: &str) {
        if !matches!(self.kind, ObjectKind::Array) {
            return;
        }
        if let Some(index) = Self::array_index(key) {
            let length = self
                .get_own_data("length")
                .map(|v| v.to_uint32())
                .unwrap_or(0);
            if index >= length {
                let value = Value::Number(f64::from(index) + 1.0);
                if let Some(i) = self.position("length") {
                    self.properties[i].value = PropertyValue::Data(value);
                } else {
                    self.properties.push(Property {
                        key: "length".to_string(),
                        value: PropertyValue::Data(value),
                        attributes: PropertyAttributes::WRITABLE,
                    });
                }
            }
        }
    }

    // ── Boxed-string indexing ─────────────────────────────────────────────────

    /// Character and `length` access on boxed strings (`ToObject("abc")`).
    fn boxed_string_index(&self, key: &str) -> Option<Value> {
        let ObjectKind::Boxed(Value::String(s)) = &self.kind else {
            return None;
        };
        if key == "length" {
            return Some(Value::Number(s.chars().count() as f64));
        }
        Self::array_index(key)
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
    }

    // ── Default primitive values ──────────────────────────────────────────────

    /// The object's fallback string form, used when no script-level
    /// `toString` applies.
    pub fn default_string(&self) -> String {
        match &self.kind {
            ObjectKind::Array => {
                let length = self
                    .get_own_data("length")
                    .map(|v| v.to_uint32())
                    .unwrap_or(0);
                let mut parts = Vec::with_capacity(length as usize);
                for i in 0..length {
                    let element = self.get_own_data(&i.to_string());
                    parts.push(match element {
                        Some(v) if !v.is_nullish() => v.to_js_string(),
                        _ => String::new(),
                    });
                }
                parts.join(",")
            }
            ObjectKind::Function(FunctionKind::Interpreted(closure)) => {
                closure.literal.source.clone()
            }
            ObjectKind::Function(FunctionKind::Native(_)) => {
                "function () { [native code] }".to_string()
            }
            ObjectKind::Regexp(data) => format!("/{}/{}", data.pattern, data.flags),
            ObjectKind::Boxed(primitive) => primitive.to_js_string(),
            _ => format!("[object {}]", self.class),
        }
    }

    /// The object's fallback numeric form, used when no script-level
    /// `valueOf` applies.
    pub fn default_number(&self) -> f64 {
        match &self.kind {
            ObjectKind::Boxed(primitive) => primitive.to_number(),
            ObjectKind::Array => {
                // An array converts through its string form: [] → 0, [7] → 7.
                crate::runtime::value::string_to_number(&self.default_string())
            }
            _ => f64::NAN,
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────────
