//! Embedded script runtime whose functions can be patched while live.
//!
//! Scripts use a subset of Rust syntax. They are parsed with `syn`, lowered
//! to an IR with statically resolved names ([`compile`]) and run by a
//! tree-walking evaluator ([`eval`]). Every function is a
//! [`FunctionObject`]: a stable identity holding a swappable
//! [`CodeObject`].

pub mod builtins;
pub mod compile;
pub mod errors;
pub mod eval;
pub mod function;
pub mod ir;
pub mod module;
pub mod scope;
pub mod value;

pub use errors::{CompileError, RuntimeError};
pub use function::{Callable, CodeObject, CompileFlags, FunctionObject, MethodKind, Origin};
pub use module::{Globals, Module, ModuleError};
pub use value::{Class, Instance, Value};
