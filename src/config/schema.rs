use crate::cache::DEFAULT_CAPACITY;
use crate::diff::command::DEFAULT_PROGRAM;
use crate::diff::embedded::DEFAULT_FUZZ;
use crate::diff::{EmbeddedPatcher, PatchBackend, PatchCommand};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Largest fuzz factor accepted for the embedded backend.
pub const MAX_FUZZ: usize = 3;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.cache.capacity < 2 {
            issues.push(ValidationIssue::CacheTooSmall {
                capacity: self.cache.capacity,
            });
        }
        if self.backend.kind == BackendKind::Command
            && self.backend.program.as_os_str().is_empty()
        {
            issues.push(ValidationIssue::MissingField {
                field: "backend.program",
            });
        }
        if self.backend.fuzz > MAX_FUZZ {
            issues.push(ValidationIssue::FuzzTooLarge {
                fuzz: self.backend.fuzz,
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Program run by the `command` backend.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Context lines the `embedded` backend may ignore per hunk.
    #[serde(default = "default_fuzz")]
    pub fuzz: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            program: default_program(),
            fuzz: default_fuzz(),
        }
    }
}

impl BackendConfig {
    pub fn build(&self) -> Box<dyn PatchBackend> {
        match self.kind {
            BackendKind::Command => Box::new(PatchCommand::new(self.program.clone())),
            BackendKind::Embedded => Box::new(EmbeddedPatcher::new(self.fuzz)),
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from(DEFAULT_PROGRAM)
}

fn default_fuzz() -> usize {
    DEFAULT_FUZZ
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Command,
    Embedded,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Command => write!(f, "command"),
            BackendKind::Embedded => write!(f, "embedded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    CacheTooSmall { capacity: usize },
    MissingField { field: &'static str },
    FuzzTooLarge { fuzz: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::CacheTooSmall { capacity } => write!(
                f,
                "cache.capacity must hold at least one patch in both directions (2), got {capacity}"
            ),
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::FuzzTooLarge { fuzz } => {
                write!(f, "backend.fuzz must be at most {MAX_FUZZ}, got {fuzz}")
            }
        }
    }
}
