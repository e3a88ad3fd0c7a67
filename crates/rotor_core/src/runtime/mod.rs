//! JavaScript runtime: values, environments, and the tree-walking
//! evaluator.
//!
//! - [`value`] — the [`Value`](value::Value) tagged union and abstract
//!   conversions.
//! - [`completion`] — statement completions and the script exception
//!   channel.
//! - [`reference`] — the Reference type for l-value semantics.
//! - [`object`] — heap objects: property storage, prototype chains,
//!   functions, arrays, regexps, errors.
//! - [`environment`] — declarative and object lexical environments.
//! - [`global`] — the prototype skeleton and global object bootstrap.
//! - [`interpreter`] — the evaluator; [`Runtime`] is the embedding entry
//!   point.

/// Statement completions and the exception channel.
pub mod completion;
/// Declarative and object lexical environments.
pub mod environment;
/// Prototype skeleton and global object bootstrap.
pub mod global;
/// The tree-walking evaluator.
pub mod interpreter;
/// Heap objects and property storage.
pub mod object;
/// The Reference type for l-value semantics.
pub mod reference;
/// Value representation and abstract conversions.
pub mod value;

pub use interpreter::Runtime;
pub use value::Value;
