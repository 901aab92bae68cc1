use crate::diff::Direction;
use std::path::PathBuf;
use thiserror::Error;

/// Structural problems found before any backend runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPatch {
    #[error("only garbage was found in the patch input")]
    NoHunks,

    #[error("patch touches {count} files, expected exactly 1")]
    MultipleFiles { count: usize },

    #[error("malformed patch at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Failure reported by a [`PatchBackend`](crate::diff::PatchBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The hunks did not apply. `stdout`/`stderr` hold the diagnostics.
    #[error("patch was rejected")]
    Rejected { stdout: String, stderr: String },

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error in patch workspace: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from [`DiffApplier::apply`](crate::diff::DiffApplier::apply).
///
/// Every variant echoes the code and the patch verbatim.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error(
        "Could not {} the patch {} '{name}'. The message from `patch` was:\n{stdout}\n{stderr}\nThe code to patch was:\n{code}\nThe patch was:\n{patch}",
        .direction.verb(),
        .direction.preposition()
    )]
    Rejected {
        name: String,
        direction: Direction,
        stdout: String,
        stderr: String,
        code: String,
        patch: String,
    },

    #[error(
        "Could not {} the patch {} '{name}'. The patch is invalid: {reason}\nThe code to patch was:\n{code}\nThe patch was:\n{patch}",
        .direction.verb(),
        .direction.preposition()
    )]
    Invalid {
        name: String,
        direction: Direction,
        reason: InvalidPatch,
        code: String,
        patch: String,
    },

    #[error(
        "Could not {} the patch {} '{name}': {source}",
        .direction.verb(),
        .direction.preposition()
    )]
    Backend {
        name: String,
        direction: Direction,
        #[source]
        source: BackendError,
    },
}

impl PatchError {
    pub fn direction(&self) -> Direction {
        match self {
            PatchError::Rejected { direction, .. }
            | PatchError::Invalid { direction, .. }
            | PatchError::Backend { direction, .. } => *direction,
        }
    }

    /// The diagnostics captured from the backend, if it ran.
    pub fn diagnostics(&self) -> Option<(&str, &str)> {
        match self {
            PatchError::Rejected { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}
