use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;
use crate::ts::query::{QueryEngine, QueryMatch, FUNCTION_ITEMS};

/// A located `fn` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// Byte range of the whole item, from `fn` (or its qualifiers) to `}`.
    pub byte_start: usize,
    pub byte_end: usize,
    /// 1-based line holding the function's name.
    pub name_line: usize,
    /// 1-based last line of the item.
    pub end_line: usize,
}

impl FunctionSpan {
    fn from_match(m: &QueryMatch) -> Option<FunctionSpan> {
        let name = m.get("name")?;
        let function = m.get("function")?;
        Some(FunctionSpan {
            name: name.text.clone(),
            byte_start: function.byte_start,
            byte_end: function.byte_end,
            name_line: name.start_row + 1,
            end_line: function.end_row + 1,
        })
    }

    /// The item extended to whole lines: leading indentation and anything
    /// sharing its first or last line are included.
    pub fn full_lines<'a>(&self, source: &'a str) -> &'a str {
        let start = source[..self.byte_start]
            .rfind('\n')
            .map_or(0, |idx| idx + 1);
        let end = source[self.byte_end..]
            .find('\n')
            .map_or(source.len(), |idx| self.byte_end + idx + 1);
        &source[start..end]
    }
}

/// Finds function definitions in module text by name and line.
pub struct DefinitionLocator {
    engine: QueryEngine,
}

impl DefinitionLocator {
    pub fn new() -> Result<Self, TreeSitterError> {
        Ok(Self {
            engine: QueryEngine::new(FUNCTION_ITEMS)?,
        })
    }

    /// Every `fn` item in `source`, in source order.
    pub fn definitions(&self, source: &str) -> Result<Vec<FunctionSpan>, TreeSitterError> {
        let parsed = with_parser(|parser| parser.parse(source))??;
        let mut spans: Vec<FunctionSpan> = self
            .engine
            .find_all(&parsed)
            .iter()
            .filter_map(FunctionSpan::from_match)
            .collect();
        spans.sort_by_key(|span| span.byte_start);
        Ok(spans)
    }

    /// The single definition of `name` whose name sits on `line` (1-based).
    pub fn locate(&self, source: &str, name: &str, line: usize) -> Result<FunctionSpan, TreeSitterError> {
        let mut found: Vec<FunctionSpan> = self
            .definitions(source)?
            .into_iter()
            .filter(|span| span.name == name && span.name_line == line)
            .collect();

        match found.len() {
            0 => Err(TreeSitterError::NoDefinition {
                name: name.to_string(),
                line,
            }),
            1 => Ok(found.remove(0)),
            count => Err(TreeSitterError::AmbiguousDefinition {
                name: name.to_string(),
                line,
                count,
            }),
        }
    }
}
