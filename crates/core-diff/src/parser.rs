//! Diff-block parser.
//!
//! Assistant output embeds edits as fenced blocks tagged `latex-diff`, each
//! holding a single unified-diff style hunk:
//!
//! ```text
//! @@ -<origStart>[,<origCount>] +<newStart>[,<newCount>] @@
//! -removed line
//! +added line
//! ```
//!
//! Only `-` and `+` lines carry meaning; everything else in the body is
//! ignored (no context lines in this format). Leading ignored lines shift the
//! real start of the edit, so the start line is corrected by the body index of
//! the first change line.
//!
//! Parsing never fails as a whole. A block without a usable header is logged
//! and skipped; the remaining blocks still produce suggestions.

use crate::suggestion::EditSuggestion;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

/// Fence tag marking a suggestion block.
pub const DIFF_FENCE_TAG: &str = "latex-diff";

pub(crate) static FENCED_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```latex-diff[ \t]*\r?\n(.*?)^[ \t]*```")
        .expect("fenced block pattern is valid")
});

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
        .expect("hunk header pattern is valid")
});

/// Per-block failure. Never escapes `parse`; surfaced only through logs and
/// `DiffHunk::from_block` for callers that want the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("diff block is empty")]
    EmptyBlock,
    #[error("invalid hunk header: {0:?}")]
    InvalidHeader(String),
}

/// Parsed `@@ -a,b +c,d @@` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub orig_start: usize,
    pub orig_count: Option<usize>,
    pub new_start: usize,
    pub new_count: Option<usize>,
}

impl HunkHeader {
    pub fn parse(line: &str) -> Option<Self> {
        let caps = HUNK_HEADER.captures(line.trim_end())?;
        let number = |i: usize| caps.get(i).map(|m| m.as_str().parse::<usize>());
        Some(Self {
            orig_start: number(1)?.ok()?,
            orig_count: number(2).transpose().ok()?,
            new_start: number(3)?.ok()?,
            new_count: number(4).transpose().ok()?,
        })
    }
}

/// One hunk: header plus the body lines that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub header: HunkHeader,
    pub body: Vec<String>,
}

impl DiffHunk {
    /// Read a hunk from the inside of a fenced block. Blank lines before the
    /// header are tolerated; any other first line is an invalid header.
    pub fn from_block(block: &str) -> Result<Self, ParseError> {
        let mut lines = block.lines().skip_while(|l| l.trim().is_empty());
        let header_line = lines.next().ok_or(ParseError::EmptyBlock)?;
        let header = HunkHeader::parse(header_line)
            .ok_or_else(|| ParseError::InvalidHeader(header_line.to_string()))?;
        Ok(Self {
            header,
            body: lines.map(str::to_string).collect(),
        })
    }

    /// Fold the body into a suggestion. `None` when the hunk changes nothing.
    pub fn into_suggestion(self) -> Option<EditSuggestion> {
        let mut original = String::new();
        let mut suggested = String::new();
        let mut removed_lines = 0usize;
        let mut first_change: Option<usize> = None;
        for (idx, line) in self.body.iter().enumerate() {
            if let Some(rest) = line.strip_prefix('-') {
                original.push_str(rest);
                original.push('\n');
                removed_lines += 1;
            } else if let Some(rest) = line.strip_prefix('+') {
                suggested.push_str(rest);
                suggested.push('\n');
            } else {
                continue;
            }
            first_change.get_or_insert(idx);
        }
        trim_one_newline(&mut original);
        trim_one_newline(&mut suggested);
        if original.is_empty() && suggested.is_empty() {
            return None;
        }
        let offset = first_change.unwrap_or(0);
        let Some(start_line) = self.header.orig_start.checked_add(offset) else {
            warn!(
                target: "diff.parse",
                orig_start = self.header.orig_start,
                offset,
                "hunk_start_overflow"
            );
            return None;
        };
        let original_line_count = match (removed_lines, self.header.orig_count) {
            (0, Some(declared)) if declared > 0 => declared,
            (observed, _) => observed,
        };
        Some(EditSuggestion::new(
            original,
            suggested,
            start_line,
            original_line_count,
        ))
    }
}

fn trim_one_newline(s: &mut String) {
    if s.ends_with('\n') {
        s.pop();
    }
}

/// Contents of every closed `latex-diff` fence, in document order.
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCED_BLOCK_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Parse one block body, logging and swallowing failures.
pub(crate) fn parse_block(block: &str) -> Option<EditSuggestion> {
    match DiffHunk::from_block(block) {
        Ok(hunk) => {
            let header = hunk.header;
            let suggestion = hunk.into_suggestion();
            match &suggestion {
                Some(s) => trace!(
                    target: "diff.parse",
                    id = %s.id,
                    orig_start = header.orig_start,
                    start_line = s.start_line,
                    line_count = s.original_line_count,
                    "hunk_parsed"
                ),
                None => debug!(target: "diff.parse", orig_start = header.orig_start, "hunk_without_changes"),
            }
            suggestion
        }
        Err(e) => {
            warn!(target: "diff.parse", error = %e, "diff_block_skipped");
            None
        }
    }
}

/// Extract every edit suggestion from an assistant response, in document order.
pub fn parse(response_text: &str) -> Vec<EditSuggestion> {
    let blocks = fenced_blocks(response_text);
    let out: Vec<EditSuggestion> = blocks.iter().filter_map(|b| parse_block(b)).collect();
    debug!(
        target: "diff.parse",
        blocks = blocks.len(),
        suggestions = out.len(),
        "response_parsed"
    );
    out
}

/// Render a suggestion back into the fenced wire format.
pub fn format_block(suggestion: &EditSuggestion) -> String {
    let mut out = String::new();
    out.push_str("```");
    out.push_str(DIFF_FENCE_TAG);
    out.push('\n');
    let new_count = suggestion.suggested_line_count();
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        suggestion.start_line, suggestion.original_line_count, suggestion.start_line, new_count
    ));
    if suggestion.original_line_count > 0 {
        for line in suggestion.original.split('\n') {
            out.push('-');
            out.push_str(line);
            out.push('\n');
        }
    }
    if !suggestion.suggested.is_empty() {
        for line in suggestion.suggested.split('\n') {
            out.push('+');
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("```\n");
    out
}
