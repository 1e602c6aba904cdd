//! Editor state: the open document, attributed undo history, selection,
//! user-visible notices, and the suggestion store.
//!
//! All buffer mutations go through `EditorState::execute_edits`, which applies
//! a batch atomically, records one undo snapshot labeled with the edit source,
//! and bumps the content `version`. Listeners compare versions to detect
//! content changes (the projector re-renders on every bump).
//!
//! Notices are the non-blocking surface for failures and hints (limit reached,
//! save failed, more suggestions available). They queue here and the UI
//! drains them; nothing in the editing path waits on them.

use core_diff::SuggestionId;
use core_text::{Buffer, SingleEdit, TextError, TextModel, TextRange};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

pub mod queue;
pub mod undo;

pub use queue::{Advance, DEFAULT_BATCH_SIZE, SuggestionQueue};
use undo::UndoEngine;
pub use undo::UNDO_HISTORY_MAX;

/// Edit source label for accepted assistant suggestions.
pub const ACCEPT_SUGGESTION_SOURCE: &str = "accept-ai-suggestion";
/// Edit source label for direct typing.
pub const USER_EDIT_SOURCE: &str = "user";

/// Oldest notices are dropped beyond this many.
pub const NOTICE_CAPACITY: usize = 64;

/// User-visible, non-blocking message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Edit-limit gate denied an accept; the user needs to upgrade.
    LimitReached,
    /// Buffer mutation failed; accept can be retried.
    ApplyFailed { id: SuggestionId, message: String },
    /// Stale suggestion could not be re-anchored and was dropped.
    ConflictUnresolved { id: SuggestionId, message: String },
    /// Stale suggestion was replaced by a re-anchored one.
    ConflictResolved {
        old: SuggestionId,
        new: SuggestionId,
    },
    SaveFailed { message: String },
    /// Assistant request failed or timed out.
    AssistantFailed { message: String },
    CompileFailed {
        message: String,
        log: Option<String>,
    },
    /// Displayed batch finished; `remaining` wait behind a continue action.
    MoreSuggestions { remaining: usize },
    BatchComplete,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LimitReached => {
                write!(f, "edit limit reached; upgrade your plan to accept more suggestions")
            }
            Notice::ApplyFailed { message, .. } => write!(f, "could not apply suggestion: {message}"),
            Notice::ConflictUnresolved { message, .. } => {
                write!(f, "suggestion no longer applies and was dropped: {message}")
            }
            Notice::ConflictResolved { .. } => {
                write!(f, "suggestion was out of date and has been re-anchored")
            }
            Notice::SaveFailed { message } => write!(f, "save failed: {message}"),
            Notice::AssistantFailed { message } => write!(f, "assistant request failed: {message}"),
            Notice::CompileFailed { message, .. } => write!(f, "compilation failed: {message}"),
            Notice::MoreSuggestions { remaining } => {
                write!(f, "{remaining} more suggestion(s) available; `continue` to show them")
            }
            Notice::BatchComplete => write!(f, "all suggestions reviewed"),
        }
    }
}

/// Line ending style detected from source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// Result of normalizing line endings.
pub struct NormalizedText {
    pub normalized: String,   // LF-only content
    pub original: LineEnding, // majority style
    pub mixed: bool,          // more than one style encountered
}

/// Normalize `input` to LF-only, remembering the majority style (ties resolved
/// CRLF > LF > CR) so it can be restored on save.
pub fn normalize_line_endings(input: &str) -> NormalizedText {
    let bytes = input.as_bytes();
    let (mut crlf, mut lf, mut cr) = (0usize, 0usize, 0usize);
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                crlf += 1;
                i += 2;
                continue;
            }
            b'\r' => cr += 1,
            b'\n' => lf += 1,
            _ => {}
        }
        i += 1;
    }
    let mut original = LineEnding::Lf;
    let mut max = 0usize;
    for (style, count) in [
        (LineEnding::Crlf, crlf),
        (LineEnding::Lf, lf),
        (LineEnding::Cr, cr),
    ] {
        if count > max {
            max = count;
            original = style;
        }
    }
    let mixed = [crlf, lf, cr].iter().filter(|c| **c > 0).count() > 1;
    let normalized = if crlf == 0 && cr == 0 {
        input.to_string()
    } else {
        input.replace("\r\n", "\n").replace('\r', "\n")
    };
    NormalizedText {
        normalized,
        original,
        mixed,
    }
}

/// Top-level state for one open document.
pub struct EditorState {
    buffer: Buffer,
    pub document_id: String,
    pub dirty: bool,
    pub original_line_ending: LineEnding,
    version: u64,
    undo: UndoEngine,
    selection: Option<TextRange>,
    notices: VecDeque<Notice>,
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("document_id", &self.document_id)
            .field("lines", &self.buffer.line_count())
            .field("version", &self.version)
            .field("dirty", &self.dirty)
            .field("selection", &self.selection)
            .field("notices", &self.notices.len())
            .finish_non_exhaustive()
    }
}

impl EditorState {
    pub fn new(document_id: impl Into<String>, buffer: Buffer) -> Self {
        Self {
            buffer,
            document_id: document_id.into(),
            dirty: false,
            original_line_ending: LineEnding::Lf,
            version: 0,
            undo: UndoEngine::new(),
            selection: None,
            notices: VecDeque::new(),
        }
    }

    /// Open raw document text, normalizing line endings.
    pub fn open(document_id: impl Into<String>, raw: &str) -> Self {
        let document_id = document_id.into();
        let norm = normalize_line_endings(raw);
        debug!(target: "state", document = document_id.as_str(), mixed = norm.mixed, bytes = raw.len(), "document_opened");
        let mut state = Self::new(document_id.clone(), Buffer::from_str(document_id, &norm.normalized));
        state.original_line_ending = norm.original;
        state
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Monotonic content version; bumps on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Content with the document's original line endings restored.
    pub fn serialized_content(&self) -> String {
        let content = self.buffer.value();
        match self.original_line_ending {
            LineEnding::Lf => content,
            other => content.replace('\n', other.as_str()),
        }
    }

    /// Apply `edits` as one atomic, undoable unit attributed to `source`.
    /// On error nothing changes (no snapshot, no version bump).
    pub fn execute_edits(&mut self, source: &str, edits: &[SingleEdit]) -> Result<(), TextError> {
        let mut working = self.buffer.clone();
        working.apply_edits(edits)?;
        self.undo.push_snapshot(source, &self.buffer);
        self.buffer = working;
        self.content_changed(source);
        Ok(())
    }

    /// Replace the whole document as one undoable edit.
    pub fn set_value(&mut self, source: &str, content: &str) {
        self.undo.push_snapshot(source, &self.buffer);
        self.buffer.set_value(content);
        self.content_changed(source);
    }

    fn content_changed(&mut self, source: &str) {
        self.version += 1;
        self.dirty = true;
        if let Some(sel) = self.selection
            && self.buffer.value_in_range(&sel).is_err()
        {
            self.selection = None;
        }
        trace!(target: "state", version = self.version, source, lines = self.buffer.line_count(), "content_changed");
    }

    /// Undo the last edit unit. Returns its source label.
    pub fn undo(&mut self) -> Option<String> {
        let source = self.undo.undo(&mut self.buffer)?;
        self.content_changed("undo");
        Some(source)
    }

    pub fn redo(&mut self) -> Option<String> {
        let source = self.undo.redo(&mut self.buffer)?;
        self.content_changed("redo");
        Some(source)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.undo.redo_depth()
    }

    pub fn last_edit_source(&self) -> Option<&str> {
        self.undo.last_source()
    }

    /// Selection change from the editor. Ranges outside the buffer clear it.
    pub fn set_selection(&mut self, range: Option<TextRange>) {
        self.selection = range.filter(|r| self.buffer.value_in_range(r).is_ok());
    }

    pub fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    /// Selected text, if any non-empty selection exists.
    pub fn selected_text(&self) -> Option<String> {
        let range = self.selection?;
        self.buffer
            .value_in_range(&range)
            .ok()
            .filter(|s| !s.is_empty())
    }

    pub fn push_notice(&mut self, notice: Notice) {
        debug!(target: "state.notice", ?notice, "notice");
        if self.notices.len() == NOTICE_CAPACITY {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}
