//! Rope-based text model.
//!
//! The suggestion pipeline addresses text the way a browser code editor does:
//! 1-based line numbers and 1-based columns, where a column counts Unicode
//! scalar values and `line_max_column(n)` is the column just past the last
//! character of line `n`. Content is expected to be LF-normalized before it
//! enters a `Buffer` (see `core_state::normalize_line_endings`).
//!
//! Mutation happens through `Buffer::apply_edits`, which validates every edit
//! before touching the rope so a batch is applied entirely or not at all.

use ropey::Rope;

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

/// A 1-based (line, column) location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Half-open span between two positions, editor style (`[start, end)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl TextRange {
    pub const fn new(
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Zero-width range at a single position.
    pub const fn collapsed(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn start(&self) -> TextPosition {
        TextPosition::new(self.start_line, self.start_column)
    }

    pub fn end(&self) -> TextPosition {
        TextPosition::new(self.end_line, self.end_column)
    }

    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }
}

/// One range replacement inside an atomic edit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleEdit {
    pub range: TextRange,
    pub text: String,
    /// Markers sitting exactly on the range boundary move with the inserted text.
    pub force_move_markers: bool,
}

impl SingleEdit {
    pub fn replace(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
            force_move_markers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("line {line} is outside the buffer ({line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },
    #[error("column {column} is outside line {line} (max column {max_column})")]
    ColumnOutOfRange {
        line: usize,
        column: usize,
        max_column: usize,
    },
    #[error("range end {end:?} precedes start {start:?}")]
    Inverted {
        start: TextPosition,
        end: TextPosition,
    },
    #[error("edits overlap inside one batch")]
    OverlappingEdits,
}

/// Read surface of an editor text model.
///
/// Implemented by `Buffer`; projection and bounds validation only need this
/// much, so they stay usable against any editor widget that can answer it.
pub trait TextModel {
    /// Full content.
    fn value(&self) -> String;
    /// Content inside `range`.
    fn value_in_range(&self, range: &TextRange) -> Result<String, TextError>;
    /// Number of lines; an empty buffer still has one line.
    fn line_count(&self) -> usize;
    /// Column just past the last character of `line`, or `None` if the line does not exist.
    fn line_max_column(&self, line: usize) -> Option<usize>;
    /// Content of `line` without its line break.
    fn line_content(&self, line: usize) -> Option<String>;
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice.
    pub fn from_str(name: impl Into<String>, content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            name: name.into(),
        }
    }

    /// Total length in chars.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Char length of a 0-based line excluding its trailing break.
    fn line_text_chars(&self, idx: usize) -> usize {
        let line = self.rope.line(idx);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && line.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    fn char_index(&self, pos: TextPosition) -> Result<usize, TextError> {
        let line_count = self.rope.len_lines();
        if pos.line == 0 || pos.line > line_count {
            return Err(TextError::LineOutOfRange {
                line: pos.line,
                line_count,
            });
        }
        let max_column = self.line_text_chars(pos.line - 1) + 1;
        if pos.column == 0 || pos.column > max_column {
            return Err(TextError::ColumnOutOfRange {
                line: pos.line,
                column: pos.column,
                max_column,
            });
        }
        Ok(self.rope.line_to_char(pos.line - 1) + pos.column - 1)
    }

    /// Resolve a range into a validated char span.
    pub fn char_span(&self, range: &TextRange) -> Result<std::ops::Range<usize>, TextError> {
        if range.end() < range.start() {
            return Err(TextError::Inverted {
                start: range.start(),
                end: range.end(),
            });
        }
        let start = self.char_index(range.start())?;
        let end = self.char_index(range.end())?;
        Ok(start..end)
    }

    /// Apply a batch of replacements atomically.
    ///
    /// All ranges are resolved against the current content first. Any invalid
    /// or overlapping range rejects the whole batch and leaves the rope as it was.
    pub fn apply_edits(&mut self, edits: &[SingleEdit]) -> Result<(), TextError> {
        let mut spans = edits
            .iter()
            .map(|e| self.char_span(&e.range).map(|span| (span, e.text.as_str())))
            .collect::<Result<Vec<_>, _>>()?;
        spans.sort_by_key(|(span, _)| span.start);
        for pair in spans.windows(2) {
            if pair[0].0.end > pair[1].0.start {
                return Err(TextError::OverlappingEdits);
            }
        }
        // Back to front so earlier char indices stay valid.
        for (span, text) in spans.into_iter().rev() {
            if !span.is_empty() {
                self.rope.remove(span.clone());
            }
            if !text.is_empty() {
                self.rope.insert(span.start, text);
            }
        }
        Ok(())
    }

    /// Replace the whole content.
    pub fn set_value(&mut self, content: &str) {
        self.rope = Rope::from_str(content);
    }
}

impl TextModel for Buffer {
    fn value(&self) -> String {
        self.rope.to_string()
    }

    fn value_in_range(&self, range: &TextRange) -> Result<String, TextError> {
        let span = self.char_span(range)?;
        Ok(self.rope.slice(span).to_string())
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_max_column(&self, line: usize) -> Option<usize> {
        if line == 0 || line > self.rope.len_lines() {
            return None;
        }
        Some(self.line_text_chars(line - 1) + 1)
    }

    fn line_content(&self, line: usize) -> Option<String> {
        if line == 0 || line > self.rope.len_lines() {
            return None;
        }
        let len = self.line_text_chars(line - 1);
        Some(self.rope.line(line - 1).slice(..len).to_string())
    }
}
