//! Edit suggestion data model.
//!
//! An `EditSuggestion` anchors a proposed replacement to a 1-based line range
//! of the document as the assistant saw it. Status is monotonic: a suggestion
//! leaves `Pending` at most once and never returns to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier assigned at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(Uuid);

impl SuggestionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSuggestion {
    pub id: SuggestionId,
    /// Text believed to occupy the target lines (empty for pure insertions).
    pub original: String,
    /// Replacement text (empty for pure deletions).
    pub suggested: String,
    /// 1-based first line of the target range.
    pub start_line: usize,
    /// Lines covered by `original`; 0 means insert without deleting.
    pub original_line_count: usize,
    pub status: SuggestionStatus,
}

impl EditSuggestion {
    /// Build a pending suggestion with a fresh id.
    pub fn new(
        original: impl Into<String>,
        suggested: impl Into<String>,
        start_line: usize,
        original_line_count: usize,
    ) -> Self {
        Self {
            id: SuggestionId::new(),
            original: original.into(),
            suggested: suggested.into(),
            start_line: start_line.max(1),
            original_line_count,
            status: SuggestionStatus::Pending,
        }
    }

    /// Last line of the target range; equals `start_line` for insertions.
    pub fn end_line(&self) -> usize {
        self.start_line
            .saturating_add(self.original_line_count)
            .saturating_sub(1)
            .max(self.start_line)
    }

    pub fn is_insertion(&self) -> bool {
        self.original_line_count == 0
    }

    pub fn is_pending(&self) -> bool {
        self.status == SuggestionStatus::Pending
    }

    /// Number of lines the replacement text spans (0 when empty).
    pub fn suggested_line_count(&self) -> usize {
        if self.suggested.is_empty() {
            0
        } else {
            self.suggested.split('\n').count()
        }
    }

    /// Move a pending suggestion into a terminal state. Returns `false` (and
    /// changes nothing) when the suggestion already left `Pending` or `to` is
    /// not terminal.
    pub fn transition(&mut self, to: SuggestionStatus) -> bool {
        if self.status.is_terminal() || !to.is_terminal() {
            return false;
        }
        self.status = to;
        true
    }

    /// Copy of this suggestion forced back to `Pending`, for loading a fresh turn.
    pub fn into_pending(mut self) -> Self {
        self.status = SuggestionStatus::Pending;
        self
    }

    /// Human label for the target range.
    pub fn range_label(&self) -> String {
        if self.is_insertion() {
            format!("Insert at Line {}", self.start_line)
        } else {
            format!("Replace Lines {}-{}", self.start_line, self.end_line())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_line_for_insertion_and_replacement() {
        let ins = EditSuggestion::new("", "x", 4, 0);
        assert_eq!(ins.end_line(), 4);
        let rep = EditSuggestion::new("a\nb\nc", "z", 4, 3);
        assert_eq!(rep.end_line(), 6);
        let single = EditSuggestion::new("a", "b", 1, 1);
        assert_eq!(single.end_line(), 1);
    }

    #[test]
    fn end_line_saturates_instead_of_wrapping() {
        let s = EditSuggestion::new("a", "b", usize::MAX - 1, 10);
        assert_eq!(s.end_line(), usize::MAX - 1);
        let s = EditSuggestion::new("a", "b", 2, usize::MAX);
        assert_eq!(s.end_line(), usize::MAX);
    }

    #[test]
    fn transition_is_one_way() {
        let mut s = EditSuggestion::new("a", "b", 1, 1);
        assert!(!s.transition(SuggestionStatus::Pending));
        assert!(s.transition(SuggestionStatus::Accepted));
        assert!(!s.transition(SuggestionStatus::Rejected));
        assert_eq!(s.status, SuggestionStatus::Accepted);
    }

    #[test]
    fn ids_are_unique() {
        let a = EditSuggestion::new("a", "b", 1, 1);
        let b = EditSuggestion::new("a", "b", 1, 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn start_line_never_zero() {
        let s = EditSuggestion::new("", "x", 0, 0);
        assert_eq!(s.start_line, 1);
    }

    #[test]
    fn labels() {
        assert_eq!(EditSuggestion::new("", "x", 7, 0).range_label(), "Insert at Line 7");
        assert_eq!(
            EditSuggestion::new("a\nb", "x", 7, 2).range_label(),
            "Replace Lines 7-8"
        );
    }

    #[test]
    fn suggested_line_count_counts_breaks() {
        assert_eq!(EditSuggestion::new("a", "", 1, 1).suggested_line_count(), 0);
        assert_eq!(EditSuggestion::new("a", "x\ny", 1, 1).suggested_line_count(), 2);
    }
}
