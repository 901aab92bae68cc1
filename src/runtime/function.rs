//! Functions as stable objects with a swappable code payload.
//!
//! A [`FunctionObject`] is what every reference to a script function holds.
//! Its identity (the `Rc` allocation) never changes; its [`CodeObject`] sits
//! behind a `RefCell` and is read afresh on every call, so replacing it
//! changes the behavior seen by every holder at once.

use crate::runtime::errors::RuntimeError;
use crate::runtime::ir::Block;
use crate::runtime::module::Globals;
use crate::runtime::value::{Cell, Value};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

/// Opt-in language behaviors, enabled per module with
/// `#![feature(...)]` and recorded on every code object compiled there.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompileFlags(u32);

impl CompileFlags {
    /// `/` on two integers yields a float.
    pub const TRUE_DIVISION: CompileFlags = CompileFlags(0x0001);
    /// Integer overflow wraps instead of raising.
    pub const WRAPPING_ARITHMETIC: CompileFlags = CompileFlags(0x0002);

    const KNOWN: [(&'static str, CompileFlags); 2] = [
        ("true_division", Self::TRUE_DIVISION),
        ("wrapping_arithmetic", Self::WRAPPING_ARITHMETIC),
    ];

    pub const fn empty() -> Self {
        CompileFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CompileFlags) {
        self.0 |= other.0;
    }

    /// Flag for a feature name as written in `#![feature(name)]`.
    pub fn from_feature(name: &str) -> Option<CompileFlags> {
        Self::KNOWN
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, flag)| *flag)
    }

    pub fn feature_names(self) -> Vec<&'static str> {
        Self::KNOWN
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for CompileFlags {
    type Output = CompileFlags;

    fn bitor(self, rhs: CompileFlags) -> CompileFlags {
        CompileFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for CompileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompileFlags({:?})", self.feature_names())
    }
}

impl Serialize for CompileFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.feature_names().serialize(serializer)
    }
}

/// How a function is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    /// Free function, nested function or closure.
    Function,
    /// `impl` item taking `self`.
    Instance,
    /// `impl` item without a receiver.
    Static,
}

/// Where a piece of code was defined, for recovering its text later.
#[derive(Clone)]
pub struct Origin {
    pub module: String,
    pub source: Rc<str>,
    /// 1-based line of the function's name.
    pub line: usize,
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("module", &self.module)
            .field("line", &self.line)
            .finish()
    }
}

/// Compiled body of a function plus the static facts about its scope.
#[derive(Debug)]
pub struct CodeObject {
    pub name: String,
    pub params: Vec<String>,
    pub receiver: bool,
    /// Every name bound in the function's own scope, parameters included.
    pub locals: Vec<String>,
    /// Names captured from enclosing functions, sorted.
    pub freevars: Vec<String>,
    pub body: Block,
    pub flags: CompileFlags,
    /// Class whose context the body was compiled in (drives name mangling).
    pub class_name: Option<String>,
    pub origin: Option<Origin>,
}

impl CodeObject {
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.receiver)
    }
}

pub struct FunctionObject {
    name: String,
    qualname: String,
    kind: MethodKind,
    code: RefCell<Rc<CodeObject>>,
    closure: Vec<(String, Cell)>,
    globals: Globals,
}

impl FunctionObject {
    pub fn new(
        qualname: impl Into<String>,
        kind: MethodKind,
        code: Rc<CodeObject>,
        closure: Vec<(String, Cell)>,
        globals: Globals,
    ) -> Rc<FunctionObject> {
        Rc::new(FunctionObject {
            name: code.name.clone(),
            qualname: qualname.into(),
            kind,
            code: RefCell::new(code),
            closure,
            globals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// The code currently installed.
    pub fn code(&self) -> Rc<CodeObject> {
        self.code.borrow().clone()
    }

    /// Install new code. Running invocations keep the code they started with.
    pub fn set_code(&self, code: Rc<CodeObject>) -> Rc<CodeObject> {
        std::mem::replace(&mut *self.code.borrow_mut(), code)
    }

    pub fn closure(&self) -> &[(String, Cell)] {
        &self.closure
    }

    pub fn closure_names(&self) -> Vec<&str> {
        self.closure.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Class segment of the qualified name, unless the function sits
    /// directly in a function body.
    pub fn class_name(&self) -> Option<&str> {
        let mut parts = self.qualname.rsplit('.');
        parts.next()?;
        match parts.next() {
            Some("<locals>") | None => None,
            Some(class) => Some(class),
        }
    }

    pub fn call(self: &Rc<Self>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        crate::runtime::eval::call_function(self, None, args)
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionObject")
            .field("qualname", &self.qualname)
            .field("kind", &self.kind)
            .field("closure", &self.closure_names())
            .finish()
    }
}

/// Any way of reaching a function: directly, through its class, or bound
/// to a receiver. All views share the underlying [`FunctionObject`].
#[derive(Clone)]
pub enum Callable {
    Function(Rc<FunctionObject>),
    Bound {
        receiver: Value,
        function: Rc<FunctionObject>,
    },
}

impl Callable {
    pub fn from_value(value: &Value) -> Option<Callable> {
        match value {
            Value::Function(function) => Some(Callable::Function(function.clone())),
            Value::BoundMethod { receiver, function } => Some(Callable::Bound {
                receiver: (**receiver).clone(),
                function: function.clone(),
            }),
            _ => None,
        }
    }

    pub fn underlying(&self) -> &Rc<FunctionObject> {
        match self {
            Callable::Function(function) | Callable::Bound { function, .. } => function,
        }
    }

    pub fn name(&self) -> &str {
        self.underlying().name()
    }

    pub fn qualname(&self) -> &str {
        self.underlying().qualname()
    }

    pub fn to_value(&self) -> Value {
        match self {
            Callable::Function(function) => Value::Function(function.clone()),
            Callable::Bound { receiver, function } => Value::BoundMethod {
                receiver: Box::new(receiver.clone()),
                function: function.clone(),
            },
        }
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(function) => crate::runtime::eval::call_function(function, None, args),
            Callable::Bound { receiver, function } => {
                crate::runtime::eval::call_function(function, Some(receiver.clone()), args)
            }
        }
    }
}

impl From<Rc<FunctionObject>> for Callable {
    fn from(function: Rc<FunctionObject>) -> Self {
        Callable::Function(function)
    }
}

impl From<&Rc<FunctionObject>> for Callable {
    fn from(function: &Rc<FunctionObject>) -> Self {
        Callable::Function(function.clone())
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(function) => write!(f, "Callable::Function({})", function.qualname()),
            Callable::Bound { function, .. } => write!(f, "Callable::Bound({})", function.qualname()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_from_feature_names() {
        assert_eq!(CompileFlags::from_feature("true_division"), Some(CompileFlags::TRUE_DIVISION));
        assert_eq!(CompileFlags::from_feature("async_closures"), None);

        let flags = CompileFlags::TRUE_DIVISION | CompileFlags::WRAPPING_ARITHMETIC;
        assert!(flags.contains(CompileFlags::TRUE_DIVISION));
        assert_eq!(flags.feature_names(), vec!["true_division", "wrapping_arithmetic"]);
        assert!(!CompileFlags::empty().contains(CompileFlags::WRAPPING_ARITHMETIC));
    }

    #[test]
    fn flags_insert() {
        let mut flags = CompileFlags::empty();
        flags.insert(CompileFlags::WRAPPING_ARITHMETIC);
        assert_eq!(flags.bits(), 0x0002);
    }
}
