use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("invalid tree-sitter query: {message}")]
    InvalidQuery { message: String },

    #[error("no definition of '{name}' starts at line {line}")]
    NoDefinition { name: String, line: usize },

    #[error("{count} definitions of '{name}' start at line {line}, expected exactly 1")]
    AmbiguousDefinition {
        name: String,
        line: usize,
        count: usize,
    },
}
