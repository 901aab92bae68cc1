//! Dotted paths (`package.module.Class.method`) to callables.

use crate::runtime::{Callable, Module, ModuleError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Suggestions scoring below this are not offered.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no module found for '{path}'{}", did_you_mean(.suggestion))]
    UnknownModule {
        path: String,
        suggestion: Option<String>,
    },

    #[error("module '{module}' has no attribute '{attribute}'{}", did_you_mean(.suggestion))]
    UnknownAttribute {
        module: String,
        attribute: String,
        suggestion: Option<String>,
    },

    #[error("cannot resolve '{path}': no path resolver is configured")]
    NoResolver { path: String },

    #[error("'{path}' is a {found}, not a function")]
    NotCallable { path: String, found: String },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Load(#[from] ModuleError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

/// Closest candidate to `wanted`, if any is close enough.
fn suggest<'a>(wanted: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .map(|candidate| (strsim::jaro_winkler(wanted, candidate), candidate))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Turns a dotted path into a callable.
pub trait PathResolver {
    fn resolve(&self, path: &str) -> Result<Callable, ResolveError>;
}

/// Resolves against a fixed set of loaded modules.
///
/// The longest registered module name that prefixes the path wins; the rest
/// of the path is looked up inside that module.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    modules: BTreeMap<String, Module>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under its own name.
    pub fn add(&mut self, module: Module) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Load every `.rs` file below `root`.
    ///
    /// `root/pkg/shapes.rs` becomes module `pkg.shapes`; a `mod.rs` names
    /// its directory.
    pub fn load_dir(root: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let root = root.as_ref();
        let mut resolver = Self::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| ResolveError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Some(name) = module_name(root, path) else {
                continue;
            };
            let module = Module::load_named(name, path)?;
            tracing::debug!(module = module.name(), path = %path.display(), "registered module");
            resolver.add(module);
        }
        Ok(resolver)
    }

    fn split<'p>(&self, path: &'p str) -> Option<(&Module, &'p str)> {
        let mut end = path.len();
        loop {
            let prefix = &path[..end];
            if let Some(module) = self.modules.get(prefix) {
                let rest = path.get(end + 1..).unwrap_or("");
                return Some((module, rest));
            }
            end = prefix.rfind('.')?;
        }
    }
}

fn module_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut parts: Vec<String> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() > 1 && parts.last().is_some_and(|last| last == "mod") {
        parts.pop();
    }
    (!parts.is_empty()).then(|| parts.join("."))
}

impl PathResolver for ModuleResolver {
    fn resolve(&self, path: &str) -> Result<Callable, ResolveError> {
        let (module, rest) = self.split(path).ok_or_else(|| ResolveError::UnknownModule {
            path: path.to_string(),
            suggestion: suggest(path.split('.').next().unwrap_or(path), self.module_names()),
        })?;

        if rest.is_empty() {
            return Err(ResolveError::NotCallable {
                path: path.to_string(),
                found: "module".to_string(),
            });
        }

        let value = module.get(rest).ok_or_else(|| {
            let names = module.globals().names();
            let head = rest.split('.').next().unwrap_or(rest);
            let mut candidates: Vec<String> = names.clone();
            candidates.extend(module.functions().iter().map(|f| f.qualname().to_string()));
            ResolveError::UnknownAttribute {
                module: module.name().to_string(),
                attribute: rest.to_string(),
                suggestion: if names.iter().any(|name| name == head) {
                    suggest(rest, candidates.iter().map(String::as_str))
                } else {
                    suggest(head, names.iter().map(String::as_str))
                },
            }
        })?;

        Callable::from_value(&value).ok_or_else(|| ResolveError::NotCallable {
            path: path.to_string(),
            found: value.type_name(),
        })
    }
}
