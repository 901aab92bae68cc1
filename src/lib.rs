//! Live Patcher: patch running script functions from source text
//!
//! Functions of the embedded script language (a Rust-syntax subset, see
//! [`runtime`]) can be changed while the program runs: a unified diff,
//! a substring replacement or a whole new body is applied to the function's
//! current source, the result is recompiled in the environment the function
//! was defined in, and the new code is swapped into the live function.
//! Every existing reference observes the change on its next call.
//!
//! # Architecture
//!
//! One patch flows through four parts, all owned by a [`Patcher`]:
//!
//! 1. [`SourceRegistry`] recovers the current source of the function,
//! 2. [`DiffApplier`] applies the patch through a [`PatchBackend`], with a
//!    bidirectional [`PatchCache`] in front,
//! 3. [`UnitRebuilder`] recompiles the new source, keeping the function's
//!    closure cells, private-name mangling and compile flags,
//! 4. [`LiveSwapper`] installs the new code.
//!
//! A failure at any step leaves the function untouched.
//!
//! # Example
//!
//! ```no_run
//! use live_patcher::{Module, Patcher, Value};
//!
//! let module = Module::from_source("demo", "fn answer() -> i64 {\n    1\n}\n")?;
//! let answer = module.callable("answer").expect("answer is defined");
//!
//! let mut patcher = Patcher::default();
//! patcher.patch(&answer, "@@ -1,3 +1,3 @@\n fn answer() -> i64 {\n-    1\n+    9001\n }\n")?;
//! assert_eq!(answer.call(vec![])?, Value::Int(9001));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod diff;
pub mod engine;
pub mod pool;
pub mod rebuild;
pub mod registry;
pub mod resolve;
pub mod runtime;
pub mod swap;
pub mod text;
pub mod ts;
pub mod validate;

// Re-exports
pub use cache::{CacheMiss, PatchCache};
pub use config::{discover, load_from_path, load_from_str, ConfigError, PatcherConfig};
pub use diff::{DiffApplier, Direction, EmbeddedPatcher, PatchBackend, PatchCommand, PatchError};
pub use engine::{Error, Patcher, Target, TempPatch};
pub use rebuild::{CompiledUnit, RebuildError, UnitRebuilder};
pub use registry::{SourceError, SourceRegistry};
pub use resolve::{ModuleResolver, PathResolver, ResolveError};
pub use runtime::{
    Callable, CompileError, CompileFlags, FunctionObject, Module, ModuleError, RuntimeError, Value,
};
pub use swap::{LiveSwapper, SwapError};
pub use ts::TreeSitterError;
pub use validate::ast_equivalent;
