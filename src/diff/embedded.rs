//! In-process hunk application.
//!
//! Mirrors what `patch --force` does for a single file: each hunk is looked
//! for at its stated line (shifted by the drift of earlier hunks), then at
//! increasing distances from it, then again with up to `fuzz` outer context
//! lines ignored. Either every hunk applies or the text is left alone.

use crate::diff::errors::BackendError;
use crate::diff::hunk::{Hunk, Patch};
use crate::diff::{BackendRequest, PatchBackend};

/// Default number of outer context lines that may be ignored.
pub const DEFAULT_FUZZ: usize = 2;

#[derive(Debug, Clone)]
pub struct EmbeddedPatcher {
    fuzz: usize,
}

impl Default for EmbeddedPatcher {
    fn default() -> Self {
        Self { fuzz: DEFAULT_FUZZ }
    }
}

impl EmbeddedPatcher {
    pub fn new(fuzz: usize) -> Self {
        Self { fuzz }
    }

    pub fn fuzz(&self) -> usize {
        self.fuzz
    }
}

impl PatchBackend for EmbeddedPatcher {
    fn name(&self) -> &str {
        "embedded"
    }

    fn apply(&self, request: &BackendRequest<'_>) -> Result<String, BackendError> {
        let patch = if request.direction.is_forwards() {
            request.patch.clone()
        } else {
            request.patch.reversed()
        };
        apply_patch(request.source, &patch, self.fuzz, &format!("{}.rs", request.name))
    }
}

/// Where a hunk landed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    /// 0-based index of the first matched line.
    start: usize,
    /// Context lines dropped from the front and back.
    fuzz: usize,
    offset: isize,
}

/// Apply every hunk of `patch` to `source`.
///
/// On failure the diagnostics are returned in the shape `patch` prints them.
pub fn apply_patch(
    source: &str,
    patch: &Patch,
    fuzz: usize,
    file_name: &str,
) -> Result<String, BackendError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut report = vec![format!("patching file {file_name}")];
    let mut placements = Vec::with_capacity(patch.hunks.len());
    let mut failed = 0usize;
    let mut drift: isize = 0;
    let mut floor = 0usize;

    for (idx, hunk) in patch.hunks.iter().enumerate() {
        let number = idx + 1;
        match place_hunk(&lines, hunk, drift, floor, fuzz) {
            Some(placement) => {
                if placement.fuzz > 0 || placement.offset != 0 {
                    report.push(describe_success(number, &placement));
                }
                drift = placement.offset;
                let (old, _) = trimmed_sides(hunk, placement.fuzz);
                floor = placement.start + old.len();
                placements.push((hunk, placement));
            }
            None => {
                failed += 1;
                report.push(format!(
                    "Hunk #{number} FAILED at {}.",
                    stated_start(hunk) as isize + drift + 1
                ));
            }
        }
    }

    if failed > 0 {
        let total = patch.hunks.len();
        let noun = if total == 1 { "hunk" } else { "hunks" };
        report.push(format!("{failed} out of {total} {noun} FAILED"));
        return Err(BackendError::Rejected {
            stdout: report.join("\n"),
            stderr: String::new(),
        });
    }

    let mut result: Vec<&str> = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    for (hunk, placement) in &placements {
        let (old, new) = trimmed_sides(hunk, placement.fuzz);
        result.extend_from_slice(&lines[cursor..placement.start]);
        result.extend(new);
        cursor = placement.start + old.len();
    }
    result.extend_from_slice(&lines[cursor..]);

    // `lines()` drops `\r\n` and `\n` alike; write back the source's own ending.
    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let mut text = result.join(newline);
    if !text.is_empty() && (source.ends_with('\n') || source.is_empty()) {
        text.push_str(newline);
    }
    tracing::trace!(hunks = placements.len(), "applied patch in process");
    Ok(text)
}

/// 0-based line the hunk's old side claims to start at.
fn stated_start(hunk: &Hunk) -> usize {
    if hunk.old_len == 0 {
        hunk.old_start
    } else {
        hunk.old_start.saturating_sub(1)
    }
}

fn trimmed_sides(hunk: &Hunk, fuzz: usize) -> (Vec<&str>, Vec<&str>) {
    let lead = hunk.leading_context().min(fuzz);
    let trail = hunk.trailing_context().min(fuzz);
    (
        trim(hunk.old_lines(), lead, trail),
        trim(hunk.new_lines(), lead, trail),
    )
}

fn trim(side: Vec<&str>, lead: usize, trail: usize) -> Vec<&str> {
    if lead + trail >= side.len() {
        return Vec::new();
    }
    side[lead..side.len() - trail].to_vec()
}

fn place_hunk(
    lines: &[&str],
    hunk: &Hunk,
    drift: isize,
    floor: usize,
    max_fuzz: usize,
) -> Option<Placement> {
    let context = hunk.leading_context().max(hunk.trailing_context());
    for fuzz in 0..=max_fuzz.min(context) {
        let (old, _) = trimmed_sides(hunk, fuzz);
        if old.is_empty() && fuzz > 0 {
            break;
        }
        let lead = hunk.leading_context().min(fuzz);
        let expected = stated_start(hunk) as isize + drift + lead as isize;
        if let Some(start) = search(lines, &old, expected, floor) {
            return Some(Placement {
                start,
                fuzz,
                offset: start as isize - lead as isize - stated_start(hunk) as isize,
            });
        }
    }
    None
}

/// Find `needle` in `lines` at or after `floor`, closest to `expected` first.
fn search(lines: &[&str], needle: &[&str], expected: isize, floor: usize) -> Option<usize> {
    if needle.len() > lines.len() {
        return None;
    }
    let last = lines.len() - needle.len();
    if floor > last {
        return None;
    }
    let expected = expected.clamp(floor as isize, last as isize) as usize;
    let matches_at = |start: usize| lines[start..start + needle.len()] == *needle;

    for distance in 0..=last - floor {
        if let Some(before) = expected.checked_sub(distance).filter(|line| *line >= floor) {
            if matches_at(before) {
                return Some(before);
            }
        }
        let after = expected + distance;
        if distance > 0 && after <= last && matches_at(after) {
            return Some(after);
        }
    }
    None
}

fn describe_success(number: usize, placement: &Placement) -> String {
    let line = placement.start + 1;
    match (placement.fuzz, placement.offset) {
        (0, offset) => format!(
            "Hunk #{number} succeeded at {line} (offset {offset} {}).",
            plural_lines(offset)
        ),
        (fuzz, 0) => format!("Hunk #{number} succeeded at {line} with fuzz {fuzz}."),
        (fuzz, offset) => format!(
            "Hunk #{number} succeeded at {line} with fuzz {fuzz} (offset {offset} {}).",
            plural_lines(offset)
        ),
    }
}

fn plural_lines(offset: isize) -> &'static str {
    if offset.abs() == 1 {
        "line"
    } else {
        "lines"
    }
}
