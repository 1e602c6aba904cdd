//! Turning a suggestion into one buffer edit.
//!
//! Bounds are always recomputed against the buffer as it is *now*; the
//! projection that showed the suggestion may be stale. A suggestion that no
//! longer fits yields `ApplyError::Bounds`, which the session routes to
//! conflict resolution instead of mutating anything.
//!
//! Edit shapes (1-based lines, `s..=e` the anchored range, `L` the line count):
//! * replacement: `[s,1]..[e,max(e)]` becomes the suggested text.
//! * insertion: the suggested text plus a line break goes in at `[s,1]`.
//! * deletion: the whole lines go, line break included. When `e == L` the
//!   break before line `s` is taken instead.

use crate::error::ApplyError;
use core_diff::EditSuggestion;
use core_render::anchor_span;
use core_text::{SingleEdit, TextModel, TextRange};

/// Validated edit plus the line bookkeeping needed to rebase later anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub edit: SingleEdit,
    /// First line whose anchor moves after the edit lands.
    pub rebase_from: usize,
    /// Net line count change.
    pub line_delta: isize,
}

fn bounds_error(suggestion: &EditSuggestion, model: &impl TextModel) -> ApplyError {
    ApplyError::Bounds {
        start_line: suggestion.start_line,
        end_line: suggestion.end_line(),
        line_count: model.line_count(),
    }
}

/// Build the edit for `suggestion` against the current buffer.
///
/// With `verify_original` the text currently at the anchor must equal
/// `suggestion.original`; otherwise only the line bounds are checked.
pub fn plan_edit(
    suggestion: &EditSuggestion,
    model: &impl TextModel,
    verify_original: bool,
) -> Result<EditPlan, ApplyError> {
    let span = anchor_span(suggestion, model).ok_or_else(|| bounds_error(suggestion, model))?;
    let (s, e) = (span.start_line, span.end_line);

    if suggestion.is_insertion() {
        let text = if suggestion.suggested.is_empty() {
            String::new()
        } else {
            format!("{}\n", suggestion.suggested)
        };
        return Ok(EditPlan {
            edit: SingleEdit::replace(TextRange::collapsed(s, 1), text),
            rebase_from: s,
            line_delta: suggestion.suggested_line_count() as isize,
        });
    }

    if verify_original {
        let current = model.value_in_range(&span.range())?;
        if current != suggestion.original {
            return Err(bounds_error(suggestion, model));
        }
    }

    let removed = (e - s + 1) as isize;
    if !suggestion.suggested.is_empty() {
        return Ok(EditPlan {
            edit: SingleEdit::replace(span.range(), suggestion.suggested.clone()),
            rebase_from: e + 1,
            line_delta: suggestion.suggested_line_count() as isize - removed,
        });
    }

    let line_count = model.line_count();
    let range = if e < line_count {
        TextRange::new(s, 1, e + 1, 1)
    } else if s > 1 {
        let prev_end = model
            .line_max_column(s - 1)
            .ok_or_else(|| bounds_error(suggestion, model))?;
        TextRange::new(s - 1, prev_end, e, span.end_column)
    } else {
        span.range()
    };
    Ok(EditPlan {
        edit: SingleEdit::replace(range, String::new()),
        rebase_from: e + 1,
        line_delta: -removed,
    })
}

/// Text occupying the suggestion's target lines right now, clamped to the
/// buffer. Empty when the anchor starts past the end.
pub fn current_text_at(suggestion: &EditSuggestion, model: &impl TextModel) -> String {
    let line_count = model.line_count();
    let start = suggestion.start_line;
    if start == 0 || start > line_count {
        return String::new();
    }
    let end = suggestion.end_line().min(line_count);
    (start..=end)
        .filter_map(|line| model.line_content(line))
        .collect::<Vec<_>>()
        .join("\n")
}
