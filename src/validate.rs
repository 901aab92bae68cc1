//! Structural comparison of source texts.
//!
//! Two texts are the same code when `syn` parses them to equal trees:
//! whitespace, line breaks and ordinary comments do not matter, while
//! every token does.

use crate::runtime::CompileError;
use crate::text::dedent;

/// Parse source text as a sequence of items.
pub fn parse_source(code: &str) -> Result<syn::File, CompileError> {
    Ok(syn::parse_file(code)?)
}

/// Whether `left` and `right` parse to the same syntax tree after
/// de-indenting both.
pub fn ast_equivalent(left: &str, right: &str) -> Result<bool, CompileError> {
    let left = parse_source(&dedent(left))?;
    let right = parse_source(&dedent(right))?;
    Ok(left == right)
}
