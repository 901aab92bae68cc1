//! Thread-local parser pooling.
//!
//! Source recovery parses a module text every time a never-patched function
//! is decompiled; the parser is created once per thread and reused.

use crate::ts::{ScriptParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static SCRIPT_PARSER: RefCell<Option<ScriptParser>> = const { RefCell::new(None) };
}

/// Execute `f` with the pooled parser, creating it on first use per thread.
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut ScriptParser) -> R,
{
    SCRIPT_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(ScriptParser::new()?);
        }
        match slot.as_mut() {
            Some(parser) => Ok(f(parser)),
            None => Err(TreeSitterError::LanguageSet),
        }
    })
}
