use crate::error::{Result, RiskError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap());

/// Inclusive 1-indexed line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn overlaps(&self, line_start: usize, line_end: usize) -> bool {
        self.start <= line_end && line_start <= self.end
    }
}

/// One hunk of a unified diff
///
/// `added` ranges carry new-side line numbers, `removed` ranges old-side
/// ones. A pure deletion has only `removed` entries, a pure insertion
/// only `added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub file: String,
    pub added: Vec<LineRange>,
    pub removed: Vec<LineRange>,
}

impl DiffHunk {
    /// Whether the hunk touches any line in `[line_start, line_end]`
    #[must_use]
    pub fn overlaps(&self, line_start: usize, line_end: usize) -> bool {
        self.added
            .iter()
            .chain(self.removed.iter())
            .any(|range| range.overlaps(line_start, line_end))
    }
}

/// Target file of a `+++` header line
enum Target {
    Unset,
    Deleted,
    File(String),
}

/// Parse a unified diff into per-file hunks
///
/// Only the headers matter: `+++ b/<path>` names the file and
/// `@@ -a,b +c,d @@` gives the removed and added ranges. Content lines
/// are skipped; hunks of a deleted file (`+++ /dev/null`) are dropped.
/// Anything that breaks the format is a [`RiskError::MalformedDiff`].
pub fn parse_unified_diff(diff: &str) -> Result<Vec<DiffHunk>> {
    let mut hunks = Vec::new();
    let mut target = Target::Unset;

    for (idx, line) in diff.lines().enumerate() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            target = parse_target(rest, idx + 1)?;
        } else if line.starts_with("@@") {
            let caps = HUNK_HEADER.captures(line).ok_or_else(|| {
                RiskError::malformed_diff(format!("line {}: bad hunk header {line:?}", idx + 1))
            })?;
            let old_start = parse_number(caps.get(1).map_or("", |m| m.as_str()), idx + 1)?;
            let old_count = match caps.get(2) {
                Some(m) => parse_number(m.as_str(), idx + 1)?,
                None => 1,
            };
            let new_start = parse_number(caps.get(3).map_or("", |m| m.as_str()), idx + 1)?;
            let new_count = match caps.get(4) {
                Some(m) => parse_number(m.as_str(), idx + 1)?,
                None => 1,
            };
            match &target {
                Target::Unset => {
                    return Err(RiskError::malformed_diff(format!(
                        "line {}: hunk before any +++ header",
                        idx + 1
                    )));
                }
                Target::Deleted => {}
                Target::File(file) => {
                    let mut hunk = DiffHunk {
                        file: file.clone(),
                        added: Vec::new(),
                        removed: Vec::new(),
                    };
                    if new_count > 0 {
                        hunk.added.push(LineRange::new(new_start, new_start + new_count - 1));
                    }
                    if old_count > 0 {
                        hunk.removed.push(LineRange::new(old_start, old_start + old_count - 1));
                    }
                    hunks.push(hunk);
                }
            }
        }
    }
    Ok(hunks)
}

fn parse_target(rest: &str, line_no: usize) -> Result<Target> {
    let rest = rest.split('\t').next().unwrap_or(rest).trim();
    if rest == "/dev/null" {
        return Ok(Target::Deleted);
    }
    let path = rest.strip_prefix("b/").unwrap_or(rest);
    if path.is_empty() {
        return Err(RiskError::malformed_diff(format!(
            "line {line_no}: empty +++ target"
        )));
    }
    Ok(Target::File(path.to_string()))
}

fn parse_number(text: &str, line_no: usize) -> Result<usize> {
    text.parse::<usize>().map_err(|_| {
        RiskError::malformed_diff(format!("line {line_no}: bad line number {text:?}"))
    })
}
