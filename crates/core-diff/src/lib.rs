//! Edit suggestions and the `latex-diff` block format the assistant speaks.
//!
//! `parse` turns a complete response into suggestions; `ResponseAccumulator`
//! does the same incrementally for streamed responses.

pub mod parser;
pub mod stream;
pub mod suggestion;

pub use parser::{DIFF_FENCE_TAG, DiffHunk, HunkHeader, ParseError, fenced_blocks, format_block, parse};
pub use stream::ResponseAccumulator;
pub use suggestion::{EditSuggestion, SuggestionId, SuggestionStatus};
