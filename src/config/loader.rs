use crate::config::schema::{PatcherConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LIVE_PATCHER_CONFIG";
/// File name looked up in the working directory.
pub const LOCAL_FILE: &str = "live-patcher.toml";
/// File name looked up in the home directory.
pub const HOME_FILE: &str = ".live-patcher.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read patcher config from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse patcher config TOML{}: {source}", in_file(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid patcher config{}: {source}", in_file(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

fn in_file(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Record the file a parse or validation error came from.
    fn in_path(mut self, file: &Path) -> Self {
        if let ConfigError::Toml { path, .. } | ConfigError::Validation { path, .. } = &mut self {
            path.get_or_insert_with(|| file.to_path_buf());
        }
        self
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.in_path(path))
}

/// Candidate config files in lookup order.
pub fn candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(PathBuf::from(LOCAL_FILE));
    if let Some(home) = home::home_dir() {
        paths.push(home.join(HOME_FILE));
    }
    paths
}

/// Load the first config file that exists, or the defaults.
///
/// A file named by the environment variable must exist.
pub fn discover() -> Result<PatcherConfig, ConfigError> {
    let explicit = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty());
    for (idx, path) in candidates().into_iter().enumerate() {
        let required = idx == 0 && explicit.is_some();
        if required || path.is_file() {
            tracing::debug!(path = %path.display(), "loading patcher config");
            return load_from_path(&path);
        }
    }
    Ok(PatcherConfig::default())
}
