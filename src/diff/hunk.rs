//! Unified diff parsing.
//!
//! Only the parts of the format that matter for single-function patches are
//! understood: optional `---`/`+++` file headers, `@@ -a,b +c,d @@` hunk
//! headers and the ` `, `-`, `+` and `\` body lines. Anything outside a hunk
//! (`diff --git`, `index ...`, commentary) is skipped, the way `patch` does.

use crate::diff::errors::InvalidPatch;

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl HunkLine {
    pub fn text(&self) -> &str {
        match self {
            HunkLine::Context(text) | HunkLine::Remove(text) | HunkLine::Add(text) => text,
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, HunkLine::Context(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first line of the old side (0 when the old side is empty).
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects to find (context and removals).
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| !matches!(line, HunkLine::Add(_)))
            .map(HunkLine::text)
            .collect()
    }

    /// Lines the hunk leaves behind (context and additions).
    pub fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| !matches!(line, HunkLine::Remove(_)))
            .map(HunkLine::text)
            .collect()
    }

    pub fn leading_context(&self) -> usize {
        self.lines.iter().take_while(|line| line.is_context()).count()
    }

    pub fn trailing_context(&self) -> usize {
        self.lines.iter().rev().take_while(|line| line.is_context()).count()
    }

    /// The same hunk seen from the other side: additions become removals.
    pub fn reversed(&self) -> Hunk {
        Hunk {
            old_start: self.new_start,
            old_len: self.new_len,
            new_start: self.old_start,
            new_len: self.old_len,
            lines: self
                .lines
                .iter()
                .map(|line| match line {
                    HunkLine::Context(text) => HunkLine::Context(text.clone()),
                    HunkLine::Remove(text) => HunkLine::Add(text.clone()),
                    HunkLine::Add(text) => HunkLine::Remove(text.clone()),
                })
                .collect(),
        }
    }
}

/// A parsed single-file patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub old_file: Option<String>,
    pub new_file: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl Patch {
    pub fn parse(text: &str) -> Result<Patch, InvalidPatch> {
        let lines: Vec<&str> = text.lines().collect();
        let mut old_file = None;
        let mut new_file = None;
        let mut files = 0usize;
        let mut hunks = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];

            if let (Some(old), Some(new)) = (
                line.strip_prefix("--- "),
                lines.get(idx + 1).and_then(|next| next.strip_prefix("+++ ")),
            ) {
                files += 1;
                if files > 1 {
                    return Err(InvalidPatch::MultipleFiles { count: count_file_headers(&lines) });
                }
                old_file = Some(header_path(old));
                new_file = Some(header_path(new));
                idx += 2;
                continue;
            }

            if line.starts_with("@@") {
                let (hunk, consumed) = parse_hunk(&lines[idx..], idx + 1)?;
                hunks.push(hunk);
                idx += consumed;
                continue;
            }

            idx += 1;
        }

        if hunks.is_empty() {
            return Err(InvalidPatch::NoHunks);
        }

        Ok(Patch {
            old_file,
            new_file,
            hunks,
        })
    }

    pub fn reversed(&self) -> Patch {
        Patch {
            old_file: self.new_file.clone(),
            new_file: self.old_file.clone(),
            hunks: self.hunks.iter().map(Hunk::reversed).collect(),
        }
    }
}

fn count_file_headers(lines: &[&str]) -> usize {
    lines
        .windows(2)
        .filter(|pair| pair[0].starts_with("--- ") && pair[1].starts_with("+++ "))
        .count()
}

fn header_path(rest: &str) -> String {
    // Drop a trailing timestamp separated by a tab.
    rest.split('\t').next().unwrap_or(rest).trim().to_string()
}

/// Parse the hunk starting at `lines[0]`; returns it and the number of lines consumed.
fn parse_hunk(lines: &[&str], line_no: usize) -> Result<(Hunk, usize), InvalidPatch> {
    let (old_start, old_len, new_start, new_len) =
        parse_header(lines[0]).ok_or_else(|| InvalidPatch::Malformed {
            line: line_no,
            message: format!("bad hunk header `{}`", lines[0]),
        })?;

    let mut body = Vec::new();
    let mut old_left = old_len;
    let mut new_left = new_len;
    let mut idx = 1;

    while old_left > 0 || new_left > 0 {
        // A hunk cut short by the end of input or by the next header keeps
        // the lines it has, as `patch` does.
        let Some(&line) = lines.get(idx) else {
            break;
        };
        if line.starts_with("@@") {
            break;
        }

        let parsed = match line.chars().next() {
            None => HunkLine::Context(String::new()),
            Some(' ') => HunkLine::Context(line[1..].to_string()),
            Some('-') => HunkLine::Remove(line[1..].to_string()),
            Some('+') => HunkLine::Add(line[1..].to_string()),
            Some('\\') => {
                idx += 1;
                continue;
            }
            Some(_) => {
                return Err(InvalidPatch::Malformed {
                    line: line_no + idx,
                    message: format!("unexpected line in hunk `{line}`"),
                })
            }
        };

        match parsed {
            HunkLine::Context(_) => {
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            }
            HunkLine::Remove(_) => old_left = old_left.saturating_sub(1),
            HunkLine::Add(_) => new_left = new_left.saturating_sub(1),
        }
        body.push(parsed);
        idx += 1;
    }

    while lines.get(idx).is_some_and(|line| line.starts_with('\\')) {
        idx += 1;
    }

    let mut hunk = Hunk {
        old_start,
        old_len,
        new_start,
        new_len,
        lines: body,
    };
    if old_left > 0 || new_left > 0 {
        hunk.old_len = hunk.old_lines().len();
        hunk.new_len = hunk.new_lines().len();
    }

    Ok((hunk, idx))
}

fn parse_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    let mut ranges = rest[..end].split_whitespace();
    let (old_start, old_len) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_len) = parse_range(ranges.next()?.strip_prefix('+')?)?;
    Some((old_start, old_len, new_start, new_len))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
