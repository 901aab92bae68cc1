use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Query, QueryCursor, StreamingIterator};

/// Every `fn` item, whether top level, nested or inside an `impl`.
pub const FUNCTION_ITEMS: &str = r#"(function_item
    name: (identifier) @name
) @function"#;

/// Position and text of one captured node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    /// 0-based rows, as tree-sitter reports them.
    pub start_row: usize,
    pub end_row: usize,
    pub text: String,
}

/// The named captures of one query match.
#[derive(Debug, Clone, Default)]
pub struct QueryMatch {
    captures: Vec<(String, CapturedNode)>,
}

impl QueryMatch {
    pub fn get(&self, capture: &str) -> Option<&CapturedNode> {
        self.captures
            .iter()
            .find(|(name, _)| name == capture)
            .map(|(_, node)| node)
    }
}

/// A compiled query over script source.
pub struct QueryEngine {
    query: Query,
}

impl QueryEngine {
    pub fn new(pattern: &str) -> Result<Self, TreeSitterError> {
        let query = Query::new(&SupportLang::Rust.get_ts_language(), pattern).map_err(|e| {
            TreeSitterError::InvalidQuery {
                message: e.to_string(),
            }
        })?;
        Ok(Self { query })
    }

    pub fn find_all(&self, parsed: &ParsedSource<'_>) -> Vec<QueryMatch> {
        let names = self.query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, parsed.root(), parsed.source().as_bytes());

        let mut found = Vec::new();
        // StreamingIterator, not Iterator, since tree-sitter 0.25
        while let Some(m) = matches.next() {
            let captures: Vec<(String, CapturedNode)> = m
                .captures
                .iter()
                .map(|capture| {
                    let node = capture.node;
                    let captured = CapturedNode {
                        byte_start: node.start_byte(),
                        byte_end: node.end_byte(),
                        start_row: node.start_position().row,
                        end_row: node.end_position().row,
                        text: parsed.text(node).to_string(),
                    };
                    (names[capture.index as usize].to_string(), captured)
                })
                .collect();
            if !captures.is_empty() {
                found.push(QueryMatch { captures });
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parser::ScriptParser;

    #[test]
    fn captures_name_and_item() {
        let mut parser = ScriptParser::new().unwrap();
        let source = "\nfn helper() {}\n\nfn main() {\n    helper();\n}\n";
        let parsed = parser.parse(source).unwrap();
        let engine = QueryEngine::new(FUNCTION_ITEMS).unwrap();

        let matches = engine.find_all(&parsed);
        assert_eq!(matches.len(), 2);

        let main = matches
            .iter()
            .find(|m| m.get("name").is_some_and(|name| name.text == "main"))
            .unwrap();
        assert_eq!(main.get("name").unwrap().start_row, 3);
        assert_eq!(main.get("function").unwrap().end_row, 5);
        assert!(main.get("missing").is_none());
    }

    #[test]
    fn finds_methods_and_nested_functions() {
        let mut parser = ScriptParser::new().unwrap();
        let source = "struct A;\nimpl A {\n    fn m(&self) {\n        fn inner() {}\n    }\n}\n";
        let parsed = parser.parse(source).unwrap();
        let engine = QueryEngine::new(FUNCTION_ITEMS).unwrap();

        let mut names: Vec<_> = engine
            .find_all(&parsed)
            .iter()
            .filter_map(|m| m.get("name").map(|name| name.text.clone()))
            .collect();
        names.sort();
        assert_eq!(names, vec!["inner", "m"]);
    }

    #[test]
    fn invalid_query_is_rejected() {
        assert!(matches!(
            QueryEngine::new("(function_item"),
            Err(TreeSitterError::InvalidQuery { .. })
        ));
    }
}
