//! Last-known source text of every patched function.
//!
//! Entries are keyed by the identity of the underlying [`FunctionObject`]
//! and hold it weakly: a function that is dropped everywhere else is never
//! kept alive by the registry, and its entry is pruned on the next write.

use crate::runtime::{Callable, FunctionObject};
use crate::text::dedent;
use crate::ts::{DefinitionLocator, TreeSitterError};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("could not find the source of '{name}': it was not compiled from source text")]
    NoOrigin { name: String },

    #[error("could not find the source of '{name}' at line {line} of module '{module}'")]
    NotFound {
        name: String,
        module: String,
        line: usize,
    },

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),
}

struct Entry {
    function: Weak<FunctionObject>,
    source: String,
}

#[derive(Default)]
pub struct SourceRegistry {
    entries: HashMap<usize, Entry>,
}

fn key(function: &Rc<FunctionObject>) -> usize {
    Rc::as_ptr(function) as usize
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source most recently installed for the callable, else the text it
    /// was compiled from.
    pub fn get_source(&self, callable: &Callable) -> Result<String, SourceError> {
        let function = callable.underlying();
        if let Some(source) = self.installed(function) {
            return Ok(source.to_string());
        }
        decompile(function)
    }

    pub fn set_source(&mut self, callable: &Callable, source: impl Into<String>) {
        self.prune();
        let function = callable.underlying();
        self.entries.insert(
            key(function),
            Entry {
                function: Rc::downgrade(function),
                source: source.into(),
            },
        );
    }

    /// Whether the engine has installed source for this function.
    pub fn contains(&self, callable: &Callable) -> bool {
        self.installed(callable.underlying()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.function.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn installed(&self, function: &Rc<FunctionObject>) -> Option<&str> {
        let entry = self.entries.get(&key(function))?;
        // A freed address can be reused by a new function.
        let alive = entry
            .function
            .upgrade()
            .is_some_and(|held| Rc::ptr_eq(&held, function));
        alive.then_some(entry.source.as_str())
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.function.strong_count() > 0);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned source registry entries");
        }
    }
}

/// Recover a function's text from the module it was compiled in.
fn decompile(function: &Rc<FunctionObject>) -> Result<String, SourceError> {
    let code = function.code();
    let origin = code.origin.as_ref().ok_or_else(|| SourceError::NoOrigin {
        name: function.qualname().to_string(),
    })?;

    let locator = DefinitionLocator::new()?;
    let span = locator
        .locate(&origin.source, &code.name, origin.line)
        .map_err(|err| match err {
            TreeSitterError::NoDefinition { .. } | TreeSitterError::AmbiguousDefinition { .. } => {
                SourceError::NotFound {
                    name: function.qualname().to_string(),
                    module: origin.module.clone(),
                    line: origin.line,
                }
            }
            other => SourceError::TreeSitter(other),
        })?;
    Ok(dedent(span.full_lines(&origin.source)))
}
