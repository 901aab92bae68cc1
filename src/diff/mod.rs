//! Patch application in front of a pluggable backend.
//!
//! [`DiffApplier::apply`] is the only entry point used by the engine:
//!
//! 1. normalize the patch text to end with a newline,
//! 2. answer from the [`PatchCache`] if this exact application was seen,
//! 3. parse the text and refuse patches with no hunks or several files,
//! 4. hand the work to the [`PatchBackend`] (forwards or reversed),
//! 5. cache the result in both directions.

pub mod command;
pub mod embedded;
pub mod errors;
pub mod hunk;

pub use command::PatchCommand;
pub use embedded::EmbeddedPatcher;
pub use errors::{BackendError, InvalidPatch, PatchError};
pub use hunk::{Hunk, HunkLine, Patch};

use crate::cache::PatchCache;
use crate::text::ensure_trailing_newline;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a patch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forwards,
    Reverse,
}

impl Direction {
    pub fn is_forwards(self) -> bool {
        matches!(self, Direction::Forwards)
    }

    pub fn flipped(self) -> Direction {
        match self {
            Direction::Forwards => Direction::Reverse,
            Direction::Reverse => Direction::Forwards,
        }
    }

    /// Verb used in failure messages.
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Forwards => "apply",
            Direction::Reverse => "unapply",
        }
    }

    /// Preposition used in failure messages.
    pub fn preposition(self) -> &'static str {
        match self {
            Direction::Forwards => "to",
            Direction::Reverse => "from",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forwards => write!(f, "forwards"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Everything a backend needs for one application.
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    /// Name of the patched unit, used for file names and diagnostics.
    pub name: &'a str,
    pub source: &'a str,
    /// Patch text, guaranteed to end with a newline.
    pub patch_text: &'a str,
    /// The same patch, already parsed (always in its forwards form).
    pub patch: &'a Patch,
    pub direction: Direction,
}

/// Something that can apply a unified diff to a text.
pub trait PatchBackend {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Apply the request, returning the new text.
    fn apply(&self, request: &BackendRequest<'_>) -> Result<String, BackendError>;
}

/// Validates patches, consults the cache and drives a backend.
pub struct DiffApplier {
    backend: Box<dyn PatchBackend>,
    cache: PatchCache,
}

impl Default for DiffApplier {
    fn default() -> Self {
        Self::new(Box::new(PatchCommand::default()), PatchCache::default())
    }
}

impl fmt::Debug for DiffApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffApplier")
            .field("backend", &self.backend.name())
            .field("cache", &self.cache)
            .finish()
    }
}

impl DiffApplier {
    pub fn new(backend: Box<dyn PatchBackend>, cache: PatchCache) -> Self {
        Self { backend, cache }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn set_backend(&mut self, backend: Box<dyn PatchBackend>) {
        self.backend = backend;
    }

    pub fn cache(&self) -> &PatchCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PatchCache {
        &mut self.cache
    }

    /// Apply `patch_text` to `source` in `direction`.
    ///
    /// `name` only appears in diagnostics and scratch file names.
    pub fn apply(
        &mut self,
        source: &str,
        patch_text: &str,
        direction: Direction,
        name: &str,
    ) -> Result<String, PatchError> {
        let normalized = ensure_trailing_newline(patch_text);
        let forwards = direction.is_forwards();

        if let Ok(hit) = self.cache.retrieve(source, &normalized, forwards) {
            tracing::debug!(name, %direction, "patch cache hit");
            return Ok(hit);
        }
        tracing::debug!(name, %direction, backend = self.backend.name(), "patch cache miss");

        let patch = Patch::parse(&normalized).map_err(|reason| PatchError::Invalid {
            name: name.to_string(),
            direction,
            reason,
            code: source.to_string(),
            patch: patch_text.to_string(),
        })?;

        let request = BackendRequest {
            name,
            source,
            patch_text: &normalized,
            patch: &patch,
            direction,
        };

        let result = self.backend.apply(&request).map_err(|error| match error {
            BackendError::Rejected { stdout, stderr } => PatchError::Rejected {
                name: name.to_string(),
                direction,
                stdout,
                stderr,
                code: source.to_string(),
                patch: patch_text.to_string(),
            },
            other => PatchError::Backend {
                name: name.to_string(),
                direction,
                source: other,
            },
        })?;

        self.cache.store(source, &normalized, forwards, &result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const SOURCE: &str = "fn sample() {\n    1\n}\n";
    const PATCH: &str = "@@ -1,3 +1,3 @@\n fn sample() {\n-    1\n+    9001\n }";

    /// Embedded backend that refuses to run more than `budget` times.
    struct Budgeted {
        inner: EmbeddedPatcher,
        calls: Rc<Cell<usize>>,
        budget: usize,
    }

    impl PatchBackend for Budgeted {
        fn name(&self) -> &str {
            "budgeted"
        }

        fn apply(&self, request: &BackendRequest<'_>) -> Result<String, BackendError> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() > self.budget {
                return Err(BackendError::Io(std::io::Error::other("backend unavailable")));
            }
            self.inner.apply(request)
        }
    }

    fn budgeted(budget: usize) -> (DiffApplier, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let backend = Budgeted {
            inner: EmbeddedPatcher::default(),
            calls: calls.clone(),
            budget,
        };
        (DiffApplier::new(Box::new(backend), PatchCache::default()), calls)
    }

    #[test]
    fn forwards_then_reverse_is_a_cache_hit() {
        let (mut applier, calls) = budgeted(1);

        let patched = applier.apply(SOURCE, PATCH, Direction::Forwards, "sample").unwrap();
        assert_eq!(patched, "fn sample() {\n    9001\n}\n");

        let restored = applier.apply(&patched, PATCH, Direction::Reverse, "sample").unwrap();
        assert_eq!(restored, SOURCE);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn repeated_forwards_is_a_cache_hit() {
        let (mut applier, calls) = budgeted(1);
        applier.apply(SOURCE, PATCH, Direction::Forwards, "sample").unwrap();
        applier.apply(SOURCE, PATCH, Direction::Forwards, "sample").unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn trailing_newline_does_not_change_the_cache_key() {
        let (mut applier, calls) = budgeted(1);
        applier.apply(SOURCE, PATCH, Direction::Forwards, "sample").unwrap();
        applier
            .apply(SOURCE, &format!("{PATCH}\n"), Direction::Forwards, "sample")
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn garbage_is_rejected_before_the_backend() {
        let (mut applier, calls) = budgeted(0);
        let err = applier
            .apply(SOURCE, "garbage", Direction::Forwards, "sample")
            .unwrap_err();

        assert_eq!(calls.get(), 0);
        assert_eq!(
            err.to_string(),
            "Could not apply the patch to 'sample'. The patch is invalid: only garbage was found in the patch input\n\
             The code to patch was:\nfn sample() {\n    1\n}\n\nThe patch was:\ngarbage"
        );
    }

    #[test]
    fn rejection_message_echoes_code_and_patch() {
        let mut applier = DiffApplier::new(Box::new(EmbeddedPatcher::default()), PatchCache::default());
        let bad = "@@ -1,2 +1,2 @@\n fn sample() {\n-    2\n+    23";
        let err = applier
            .apply(SOURCE, bad, Direction::Reverse, "sample")
            .unwrap_err();
        let message = err.to_string();

        assert_eq!(err.direction(), Direction::Reverse);
        assert!(message.starts_with("Could not unapply the patch from 'sample'. The message from `patch` was:\n"));
        assert!(message.contains("Hunk #1 FAILED"));
        assert!(message.contains("The code to patch was:\nfn sample() {\n    1\n}\n"));
        assert!(message.ends_with("The patch was:\n@@ -1,2 +1,2 @@\n fn sample() {\n-    2\n+    23"));
        assert!(applier.cache().is_empty());
    }

    #[test]
    fn backend_failure_is_not_cached() {
        let (mut applier, calls) = budgeted(0);
        let err = applier.apply(SOURCE, PATCH, Direction::Forwards, "sample").unwrap_err();
        assert!(matches!(err, PatchError::Backend { .. }));
        assert_eq!(calls.get(), 1);
        assert!(applier.cache().is_empty());
    }

    #[test]
    fn direction_wording() {
        assert_eq!(Direction::Forwards.verb(), "apply");
        assert_eq!(Direction::Forwards.preposition(), "to");
        assert_eq!(Direction::Reverse.verb(), "unapply");
        assert_eq!(Direction::Reverse.preposition(), "from");
        assert_eq!(Direction::Forwards.flipped(), Direction::Reverse);
    }
}
