use thiserror::Error;

/// Errors raised while turning script text into executable code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid syntax at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("unsupported syntax at line {line}: {what}")]
    Unsupported { what: String, line: usize },

    #[error("no binding for nonlocal '{name}' found")]
    NonlocalUnbound { name: String, line: usize },

    #[error("unknown feature '{name}'")]
    UnknownFeature { name: String },

    #[error("expected a function definition, found {found}")]
    NotAFunction { found: String },

    #[error("new code defines '{found}', expected '{expected}'")]
    NameMismatch { expected: String, found: String },
}

impl CompileError {
    pub fn unsupported(what: impl Into<String>, line: usize) -> Self {
        Self::Unsupported {
            what: what.into(),
            line,
        }
    }

    /// Line the error points at, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Syntax { line, .. }
            | CompileError::Unsupported { line, .. }
            | CompileError::NonlocalUnbound { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<syn::Error> for CompileError {
    fn from(error: syn::Error) -> Self {
        let start = error.span().start();
        CompileError::Syntax {
            message: error.to_string(),
            line: start.line,
            column: start.column + 1,
        }
    }
}

/// Errors raised while running script code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("name '{name}' is not defined")]
    NameNotDefined { name: String },

    #[error("local variable '{name}' referenced before assignment")]
    UnboundLocal { name: String },

    #[error("free variable '{name}' referenced before assignment in enclosing scope")]
    UnboundFree { name: String },

    #[error("type error: cannot {operation} {left} and {right}")]
    BinaryType {
        operation: &'static str,
        left: String,
        right: String,
    },

    #[error("type error: {operation} requires {expected}, got {actual}")]
    Type {
        operation: String,
        expected: &'static str,
        actual: String,
    },

    #[error("'{type_name}' has no attribute '{attribute}'")]
    NoAttribute { type_name: String, attribute: String },

    #[error("'{name}' takes {expected} arguments but {got} were given")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("'{type_name}' is not callable")]
    NotCallable { type_name: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("{operation} would build a string of more than {limit} bytes")]
    StringTooLong { operation: &'static str, limit: usize },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("'{keyword}' is not allowed here")]
    LoopControl { keyword: &'static str },

    #[error("maximum call depth of {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("panicked: {0}")]
    Panic(String),
}

impl RuntimeError {
    pub fn type_error(operation: impl Into<String>, expected: &'static str, actual: impl Into<String>) -> Self {
        Self::Type {
            operation: operation.into(),
            expected,
            actual: actual.into(),
        }
    }

    pub fn no_attribute(type_name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::NoAttribute {
            type_name: type_name.into(),
            attribute: attribute.into(),
        }
    }
}
