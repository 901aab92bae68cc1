//! Tree-sitter location of function definitions inside module text.
//!
//! Recovering the source of a function that was never patched means finding
//! its `fn` item in the text it was compiled from. The CST keeps comments
//! and formatting intact, so the recovered text is exactly what was written.

pub mod errors;
pub mod locator;
pub mod parser;
pub mod query;

pub use errors::TreeSitterError;
pub use locator::{DefinitionLocator, FunctionSpan};
pub use parser::{ParsedSource, ScriptParser};
pub use query::{QueryEngine, QueryMatch};
