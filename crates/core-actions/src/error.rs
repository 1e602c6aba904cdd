//! Error types for accept and conflict resolution.

use core_diff::SuggestionId;
use core_text::TextError;

/// Why an accept did not mutate the buffer.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("edit limit reached")]
    LimitExceeded,
    /// The gate itself failed; treated as a denial.
    #[error("edit limit check failed: {0}")]
    Gate(String),
    #[error("suggestion {0} is not pending")]
    NotPending(SuggestionId),
    /// Anchored lines no longer fit the buffer (or no longer hold `original`).
    #[error("lines {start_line}-{end_line} no longer match the document ({line_count} lines)")]
    Bounds {
        start_line: usize,
        end_line: usize,
        line_count: usize,
    },
    #[error("applying edit failed: {0}")]
    Edit(#[from] TextError),
}

impl ApplyError {
    /// Denials stop `accept_all`; other failures only affect one suggestion.
    pub fn is_limit(&self) -> bool {
        matches!(self, ApplyError::LimitExceeded | ApplyError::Gate(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("assistant request failed: {0}")]
    Assistant(#[source] anyhow::Error),
    #[error("assistant did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("assistant response contained no usable diff block")]
    NoSuggestion,
}
