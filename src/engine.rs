//! The patching facade.
//!
//! A [`Patcher`] owns every piece of state the pipeline needs: the source
//! registry, the diff applier with its cache, and an optional path
//! resolver. One patch runs
//!
//! ```text
//! registry.get_source -> applier.apply -> rebuilder.rebuild -> swapper.install
//! ```
//!
//! and either installs new code or leaves the target exactly as it was.

use crate::cache::PatchCache;
use crate::config::PatcherConfig;
use crate::diff::{DiffApplier, Direction, PatchBackend, PatchError};
use crate::rebuild::{RebuildError, UnitRebuilder};
use crate::registry::{SourceError, SourceRegistry};
use crate::resolve::{PathResolver, ResolveError};
use crate::runtime::{Callable, CompileError, FunctionObject};
use crate::swap::{LiveSwapper, SwapError};
use crate::text::{dedent, fingerprint};
use crate::validate::ast_equivalent;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    NotFoundInSource { message: String },

    #[error(transparent)]
    PatchApplication(#[from] PatchError),

    #[error("The code of '{name}' has changed from expected.\nThe current code is:\n{current}\nThe expected code is:\n{expected}")]
    SourceMismatch {
        name: String,
        current: String,
        expected: String,
    },

    #[error(transparent)]
    Syntax(#[from] CompileError),

    #[error(transparent)]
    Lookup(#[from] SourceError),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Rebuild(RebuildError),

    #[error(transparent)]
    Swap(#[from] SwapError),
}

impl From<RebuildError> for Error {
    fn from(err: RebuildError) -> Self {
        match err {
            RebuildError::Compile(err) => Error::Syntax(err),
            other => Error::Rebuild(other),
        }
    }
}

/// What to patch: a callable in hand, or a dotted path to resolve.
#[derive(Debug, Clone)]
pub enum Target {
    Callable(Callable),
    Path(String),
}

impl From<Callable> for Target {
    fn from(callable: Callable) -> Self {
        Target::Callable(callable)
    }
}

impl From<&Callable> for Target {
    fn from(callable: &Callable) -> Self {
        Target::Callable(callable.clone())
    }
}

impl From<Rc<FunctionObject>> for Target {
    fn from(function: Rc<FunctionObject>) -> Self {
        Target::Callable(Callable::Function(function))
    }
}

impl From<&Rc<FunctionObject>> for Target {
    fn from(function: &Rc<FunctionObject>) -> Self {
        Target::Callable(Callable::Function(function.clone()))
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(path.to_string())
    }
}

impl From<String> for Target {
    fn from(path: String) -> Self {
        Target::Path(path)
    }
}

pub struct Patcher {
    applier: DiffApplier,
    registry: SourceRegistry,
    rebuilder: UnitRebuilder,
    resolver: Option<Box<dyn PathResolver>>,
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new(&PatcherConfig::default())
    }
}

impl fmt::Debug for Patcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher")
            .field("applier", &self.applier)
            .field("registry_entries", &self.registry.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl Patcher {
    pub fn new(config: &PatcherConfig) -> Self {
        Self::with_backend(config, config.backend.build())
    }

    /// Like [`Patcher::new`] with an explicit backend; `config.backend` is
    /// ignored.
    pub fn with_backend(config: &PatcherConfig, backend: Box<dyn PatchBackend>) -> Self {
        Self {
            applier: DiffApplier::new(backend, PatchCache::with_capacity(config.cache.capacity)),
            registry: SourceRegistry::new(),
            rebuilder: UnitRebuilder::new(),
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn applier(&self) -> &DiffApplier {
        &self.applier
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn resolve(&self, target: impl Into<Target>) -> Result<Callable, Error> {
        match target.into() {
            Target::Callable(callable) => Ok(callable),
            Target::Path(path) => {
                let resolver = self
                    .resolver
                    .as_ref()
                    .ok_or_else(|| ResolveError::NoResolver { path: path.clone() })?;
                Ok(resolver.resolve(&path)?)
            }
        }
    }

    /// Current source of `target`: what was last installed, else the text
    /// it was defined with.
    pub fn source_of(&self, target: impl Into<Target>) -> Result<String, Error> {
        let callable = self.resolve(target)?;
        Ok(self.registry.get_source(&callable)?)
    }

    /// Apply a unified diff to the source of `target` and install the result.
    pub fn patch(&mut self, target: impl Into<Target>, patch_text: &str) -> Result<(), Error> {
        self.apply_diff(target.into(), patch_text, Direction::Forwards)
    }

    /// Undo [`Patcher::patch`] by applying the same diff reversed.
    pub fn unpatch(&mut self, target: impl Into<Target>, patch_text: &str) -> Result<(), Error> {
        self.apply_diff(target.into(), patch_text, Direction::Reverse)
    }

    /// Install `new_source` as the code of `target`.
    ///
    /// With `expected`, the current source must be the same code (compared
    /// as syntax trees) or nothing happens.
    pub fn replace(
        &mut self,
        target: impl Into<Target>,
        expected: Option<&str>,
        new_source: &str,
    ) -> Result<(), Error> {
        let callable = self.resolve(target)?;
        if let Some(expected) = expected {
            let current = self.registry.get_source(&callable)?;
            if !ast_equivalent(&current, expected)? {
                return Err(Error::SourceMismatch {
                    name: callable.qualname().to_string(),
                    current: dedent(&current),
                    expected: dedent(expected),
                });
            }
        }
        self.install(&callable, &dedent(new_source), Direction::Forwards)
    }

    /// Replace every occurrence of `find` in the source of `target`.
    ///
    /// `find` and `replacement` are de-indented first, like patch text.
    /// `count` pins the exact number of occurrences. Without `find`,
    /// `replacement` is the whole new source.
    pub fn replace_substring(
        &mut self,
        target: impl Into<Target>,
        find: Option<&str>,
        replacement: &str,
        count: Option<usize>,
    ) -> Result<(), Error> {
        let callable = self.resolve(target)?;
        let Some(find) = find else {
            return self.replace(callable, None, replacement);
        };

        let find = dedent(find);
        let replacement = dedent(replacement);
        let current = self.registry.get_source(&callable)?;
        let found = current.matches(find.as_str()).count();
        if found == 0 {
            return Err(Error::NotFoundInSource {
                message: format!(
                    "'{find}' not found in the source of '{}'",
                    callable.qualname()
                ),
            });
        }
        if let Some(expected) = count {
            if expected != found {
                return Err(Error::NotFoundInSource {
                    message: format!("{expected} occurrences of '{find}' expected, {found} found."),
                });
            }
        }
        let new_source = current.replace(find.as_str(), &replacement);
        self.install(&callable, &new_source, Direction::Forwards)
    }

    /// Apply a patch that is undone when the guard is finished or dropped.
    pub fn temp_patch(
        &mut self,
        target: impl Into<Target>,
        patch_text: &str,
    ) -> Result<TempPatch<'_>, Error> {
        let callable = self.resolve(target)?;
        self.patch(&callable, patch_text)?;
        Ok(TempPatch {
            patcher: self,
            callable,
            patch_text: patch_text.to_string(),
            finished: false,
        })
    }

    /// Run `f` with the patch applied, then undo it.
    pub fn with_patch<R>(
        &mut self,
        target: impl Into<Target>,
        patch_text: &str,
        f: impl FnOnce(&Callable) -> R,
    ) -> Result<R, Error> {
        let callable = self.resolve(target)?;
        self.patch(&callable, patch_text)?;
        let result = f(&callable);
        self.unpatch(&callable, patch_text)?;
        Ok(result)
    }

    pub fn clear_cache(&mut self) {
        self.applier.cache_mut().clear();
    }

    fn apply_diff(&mut self, target: Target, patch_text: &str, direction: Direction) -> Result<(), Error> {
        let callable = self.resolve(target)?;
        let patch_text = dedent(patch_text);
        let source = self.registry.get_source(&callable)?;
        let new_source = self
            .applier
            .apply(&source, &patch_text, direction, callable.qualname())?;
        self.install(&callable, &new_source, direction)
    }

    fn install(&mut self, callable: &Callable, new_source: &str, direction: Direction) -> Result<(), Error> {
        let unit = self.rebuilder.rebuild(callable.underlying(), new_source)?;
        LiveSwapper::new(&mut self.registry).install(callable, unit, new_source)?;
        tracing::info!(
            function = callable.qualname(),
            %direction,
            fingerprint = %fingerprint(new_source),
            "installed patched code"
        );
        Ok(())
    }
}

/// A patch that is reverted when this guard goes away.
///
/// Prefer [`TempPatch::finish`], which reports a failed revert; dropping the
/// guard can only log it.
#[must_use = "the patch is reverted as soon as the guard is dropped"]
pub struct TempPatch<'p> {
    patcher: &'p mut Patcher,
    callable: Callable,
    patch_text: String,
    finished: bool,
}

impl TempPatch<'_> {
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn finish(mut self) -> Result<(), Error> {
        self.finished = true;
        self.patcher.unpatch(&self.callable, &self.patch_text)
    }
}

impl Drop for TempPatch<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.patcher.unpatch(&self.callable, &self.patch_text) {
            tracing::warn!(
                function = self.callable.qualname(),
                error = %err,
                "failed to revert temporary patch"
            );
        }
    }
}
