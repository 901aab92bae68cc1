//! Modules: a source text, the namespace its items populate, and the flags
//! its `#![feature(...)]` attributes selected.

use crate::runtime::compile::{module_flags, Compiler};
use crate::runtime::errors::{CompileError, RuntimeError};
use crate::runtime::eval::{self, Frame};
use crate::runtime::function::{Callable, CompileFlags, FunctionObject};
use crate::runtime::value::{Class, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("failed to read module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile module '{module}': {source}")]
    Compile {
        module: String,
        #[source]
        source: CompileError,
    },

    #[error("failed to initialize module '{module}': {source}")]
    Runtime {
        module: String,
        #[source]
        source: RuntimeError,
    },
}

/// A module's live namespace, shared by every function defined in it.
#[derive(Clone, Default)]
pub struct Globals(Rc<RefCell<HashMap<String, Value>>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Independent namespace holding the same values.
    pub fn snapshot(&self) -> Globals {
        Globals(Rc::new(RefCell::new(self.0.borrow().clone())))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &Globals) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Globals").field(&self.names()).finish()
    }
}

/// Compile `file` and run its items against `globals`.
///
/// With `origin` set, compiled functions remember that text as where they
/// came from.
pub fn exec_file(
    file: &syn::File,
    module: &str,
    globals: &Globals,
    flags: CompileFlags,
    origin: Option<Rc<str>>,
) -> Result<(), ModuleError> {
    let items = Compiler::new(module, origin, flags)
        .compile_file(file)
        .map_err(|source| ModuleError::Compile {
            module: module.to_string(),
            source,
        })?;
    Frame::module(globals.clone(), flags)
        .exec_items(&items)
        .map_err(|source| ModuleError::Runtime {
            module: module.to_string(),
            source,
        })
}

#[derive(Debug)]
pub struct Module {
    name: String,
    source: Rc<str>,
    globals: Globals,
    flags: CompileFlags,
    path: Option<PathBuf>,
}

impl Module {
    pub fn from_source(name: impl Into<String>, source: &str) -> Result<Module, ModuleError> {
        let name = name.into();
        let source: Rc<str> = Rc::from(source);
        let compile_error = |source: CompileError| ModuleError::Compile {
            module: name.clone(),
            source,
        };

        let file = syn::parse_file(&source).map_err(|err| compile_error(err.into()))?;
        let flags = module_flags(&file).map_err(compile_error)?;
        let globals = Globals::new();
        exec_file(&file, &name, &globals, flags, Some(source.clone()))?;

        tracing::debug!(module = %name, names = globals.names().len(), "loaded module");
        Ok(Module {
            name,
            source,
            globals,
            flags,
            path: None,
        })
    }

    /// Load a module from disk; its name is the file stem.
    pub fn load(path: impl AsRef<Path>) -> Result<Module, ModuleError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());
        Module::load_named(name, path)
    }

    pub fn load_named(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Module, ModuleError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut module = Module::from_source(name, &text)?;
        module.path = Some(path.to_path_buf());
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn flags(&self) -> CompileFlags {
        self.flags
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a dotted name inside the module (`Class.method`).
    pub fn get(&self, dotted: &str) -> Option<Value> {
        let mut parts = dotted.split('.');
        let mut value = self.globals.get(parts.next()?)?;
        for part in parts {
            value = eval::get_attribute(&value, part).ok()?;
        }
        Some(value)
    }

    pub fn function(&self, dotted: &str) -> Option<Rc<FunctionObject>> {
        match self.get(dotted)? {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn callable(&self, dotted: &str) -> Option<Callable> {
        self.get(dotted).as_ref().and_then(Callable::from_value)
    }

    pub fn class(&self, name: &str) -> Option<Rc<Class>> {
        match self.globals.get(name)? {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn call(&self, dotted: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let callee = self.get(dotted).ok_or_else(|| RuntimeError::NameNotDefined {
            name: dotted.to_string(),
        })?;
        eval::call_value(&callee, args)
    }

    /// Every function reachable from the module namespace: top-level
    /// functions and the methods of top-level structs, sorted by qualname.
    pub fn functions(&self) -> Vec<Rc<FunctionObject>> {
        let mut functions = Vec::new();
        for name in self.globals.names() {
            match self.globals.get(&name) {
                Some(Value::Function(function)) => functions.push(function),
                Some(Value::Class(class)) => {
                    for member in class.member_names() {
                        if let Some(Value::Function(function)) = class.member(&member) {
                            functions.push(function);
                        }
                    }
                }
                _ => {}
            }
        }
        functions.sort_by(|a, b| a.qualname().cmp(b.qualname()));
        functions.dedup_by(|a, b| Rc::ptr_eq(a, b));
        functions
    }
}
