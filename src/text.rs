//! Source text helpers shared by the patch pipeline.

use xxhash_rust::xxh3::xxh3_64;

/// Remove the common leading whitespace from every line of `text`.
///
/// Lines made only of whitespace are normalized to empty lines and do not
/// take part in computing the margin. Tabs and spaces are compared literally,
/// so `"\t"` and `"    "` have no common prefix.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }

    let margin = margin.unwrap_or("");
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if body.trim().is_empty() {
            out.push_str(newline);
            continue;
        }
        out.push_str(body.strip_prefix(margin).unwrap_or(body));
        out.push_str(newline);
    }

    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| a.len().min(b.len()));
    &a[..len]
}

/// Return `text` guaranteed to end with a newline.
pub fn ensure_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Short stable fingerprint of a source text, used in log output.
pub fn fingerprint(text: &str) -> String {
    format!("{:016x}", xxh3_64(text.as_bytes()))
}
