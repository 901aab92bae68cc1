//! Backend that shells out to a `patch`-compatible program.

use crate::diff::errors::BackendError;
use crate::diff::{BackendRequest, PatchBackend};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "patch";

/// Runs `patch --force [--reverse] <name>.rs <name>.patch` in a scratch
/// directory that is removed when the call returns, whatever the outcome.
///
/// The call blocks until the program exits; there is no timeout.
#[derive(Debug, Clone)]
pub struct PatchCommand {
    program: PathBuf,
}

impl Default for PatchCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl PatchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl PatchBackend for PatchCommand {
    fn name(&self) -> &str {
        "command"
    }

    fn apply(&self, request: &BackendRequest<'_>) -> Result<String, BackendError> {
        let workdir = tempfile::Builder::new().prefix("live-patcher").tempdir()?;
        let stem = file_stem(request.name);
        let source_path = workdir.path().join(format!("{stem}.rs"));
        let patch_path = workdir.path().join(format!("{stem}.patch"));

        fs::write(&source_path, request.source)?;
        fs::write(&patch_path, request.patch_text)?;

        let mut command = Command::new(&self.program);
        command.arg("--force");
        if !request.direction.is_forwards() {
            command.arg("--reverse");
        }
        command
            .arg(&source_path)
            .arg(&patch_path)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program = %self.program.display(), reverse = !request.direction.is_forwards(), "running patch program");

        let output = command.output().map_err(|source| BackendError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(BackendError::Rejected {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(fs::read_to_string(&source_path)?)
    }
}

/// File name for a function name, keeping only characters that are safe
/// in a path component.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "unit".to_string()
    } else {
        stem
    }
}

/// Whether `program` can be spawned at all.
pub fn is_available(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
