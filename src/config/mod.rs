pub mod loader;
pub mod schema;

pub use loader::{discover, load_from_path, load_from_str, ConfigError};
pub use schema::{
    BackendConfig, BackendKind, CacheConfig, PatcherConfig, ValidationError, ValidationIssue,
};
