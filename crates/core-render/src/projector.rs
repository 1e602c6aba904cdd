//! Decoration projector.
//!
//! `project` is a pure function of the pending suggestions and the current
//! buffer geometry. `DecorationProjector` owns the ids of the decorations it
//! last installed and swaps in a fresh projection on every refresh, so old
//! markers never linger after the suggestion set or the text changes.
//!
//! Out-of-bounds anchors are skipped, not clamped: after concurrent typing a
//! stale suggestion simply disappears from view until it is resolved.

use crate::decoration::{
    Decoration, DecorationHost, DecorationId, DecorationKind, DecorationSet, LINE_BREAK_GLYPH,
    Stickiness,
};
use core_diff::EditSuggestion;
use core_text::{TextModel, TextRange};
use tracing::{trace, warn};

/// Line span of a suggestion validated against the live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSpan {
    pub start_line: usize,
    pub end_line: usize,
    /// Column just past the last character of `end_line`.
    pub end_column: usize,
}

impl AnchorSpan {
    /// Whole-line range covered by the suggestion's original text.
    pub fn range(&self) -> TextRange {
        TextRange::new(self.start_line, 1, self.end_line, self.end_column)
    }
}

/// Resolve the anchored line span of `suggestion` against `model`, or `None`
/// when either end falls outside the buffer.
pub fn anchor_span(suggestion: &EditSuggestion, model: &impl TextModel) -> Option<AnchorSpan> {
    let start_line = suggestion.start_line;
    let end_line = suggestion.end_line();
    let line_count = model.line_count();
    if start_line == 0 || end_line == 0 || start_line > line_count || end_line > line_count {
        return None;
    }
    let end_column = model.line_max_column(end_line)?;
    Some(AnchorSpan {
        start_line,
        end_line,
        end_column,
    })
}

/// Project pending suggestions onto decorations for the current buffer.
pub fn project<'a>(
    pending: impl IntoIterator<Item = &'a EditSuggestion>,
    model: &impl TextModel,
) -> DecorationSet {
    let mut set = DecorationSet::new();
    for s in pending.into_iter().filter(|s| s.is_pending()) {
        let Some(span) = anchor_span(s, model) else {
            warn!(
                target: "render.decorations",
                id = %s.id,
                start_line = s.start_line,
                end_line = s.end_line(),
                line_count = model.line_count(),
                "decoration_out_of_bounds"
            );
            continue;
        };
        let anchor = if s.is_insertion() {
            set.push(decoration(
                s,
                TextRange::collapsed(span.start_line, 1),
                DecorationKind::MarginIndicator,
                Some(s.range_label()),
            ));
            TextRange::collapsed(span.start_line, 1)
        } else {
            set.push(decoration(s, span.range(), DecorationKind::DeletedRange, None));
            set.push(decoration(
                s,
                span.range(),
                DecorationKind::MarginIndicator,
                Some(s.range_label()),
            ));
            TextRange::collapsed(span.end_line, span.end_column)
        };
        if !s.suggested.is_empty() {
            set.push(decoration(
                s,
                anchor,
                DecorationKind::InlineAddition {
                    text: s.suggested.replace('\n', LINE_BREAK_GLYPH),
                },
                None,
            ));
        }
    }
    set
}

fn decoration(
    s: &EditSuggestion,
    range: TextRange,
    kind: DecorationKind,
    hover: Option<String>,
) -> Decoration {
    Decoration {
        suggestion: s.id,
        range,
        kind,
        hover,
        stickiness: Stickiness::NeverGrowsWhenTypingAtEdges,
    }
}

/// Keeps the installed decoration ids and performs the atomic swap.
#[derive(Debug, Default)]
pub struct DecorationProjector {
    live: Vec<DecorationId>,
    current: DecorationSet,
}

impl DecorationProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-project and replace whatever was installed before.
    pub fn refresh<'a>(
        &mut self,
        pending: impl IntoIterator<Item = &'a EditSuggestion>,
        model: &impl TextModel,
        host: &mut impl DecorationHost,
    ) -> &DecorationSet {
        let set = project(pending, model);
        self.live = host.delta_decorations(&self.live, set.decorations());
        trace!(target: "render.decorations", live = self.live.len(), "decorations_swapped");
        self.current = set;
        &self.current
    }

    /// Remove every installed decoration.
    pub fn clear(&mut self, host: &mut impl DecorationHost) {
        self.live = host.delta_decorations(&self.live, &[]);
        self.current = DecorationSet::new();
    }

    pub fn current(&self) -> &DecorationSet {
        &self.current
    }

    pub fn live_ids(&self) -> &[DecorationId] {
        &self.live
    }
}
