use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitter parser for script modules, which use Rust syntax.
pub struct ScriptParser {
    inner: Parser,
}

impl ScriptParser {
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut inner = Parser::new();
        inner
            .set_language(&SupportLang::Rust.get_ts_language())
            .map_err(|_| TreeSitterError::LanguageSet)?;
        Ok(Self { inner })
    }

    /// Parse a module text. Syntax errors do not fail the parse; they show
    /// up as ERROR nodes in the tree.
    pub fn parse<'a>(&mut self, source: &'a str) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self
            .inner
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A module text together with its concrete syntax tree.
pub struct ParsedSource<'a> {
    source: &'a str,
    tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.root().has_error()
    }

    pub fn text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}
