//! Projection of parsed suggestions onto a live buffer.

use core_diff::{EditSuggestion, parse};
use core_render::{
    DecorationKind, DecorationLayer, DecorationProjector, LINE_BREAK_GLYPH, Stickiness, project,
};
use core_text::{Buffer, TextRange};
use pretty_assertions::assert_eq;

const DOC: &str = "\\documentclass{article}\n\\begin{document}\nHello\nWorld\n\\end{document}\n";

#[test]
fn replacement_emits_deleted_margin_and_inline() {
    let buffer = Buffer::from_str("main.tex", DOC);
    let s = EditSuggestion::new("Hello\nWorld", "Hi\nthere", 3, 2);
    let set = project([&s], &buffer);
    let kinds: Vec<_> = set.decorations().iter().map(|d| d.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            DecorationKind::DeletedRange,
            DecorationKind::MarginIndicator,
            DecorationKind::InlineAddition {
                text: format!("Hi{LINE_BREAK_GLYPH}there"),
            },
        ]
    );
    let deleted = &set.decorations()[0];
    assert_eq!(deleted.range, TextRange::new(3, 1, 4, 6));
    assert_eq!(set.decorations()[1].hover.as_deref(), Some("Replace Lines 3-4"));
    assert_eq!(set.decorations()[2].range, TextRange::collapsed(4, 6));
    assert!(
        set.decorations()
            .iter()
            .all(|d| d.stickiness == Stickiness::NeverGrowsWhenTypingAtEdges)
    );
}

#[test]
fn insertion_is_zero_width() {
    let buffer = Buffer::from_str("main.tex", DOC);
    let s = EditSuggestion::new("", "\\section{Intro}", 3, 0);
    let set = project([&s], &buffer);
    assert_eq!(set.len(), 2);
    assert!(set.decorations().iter().all(|d| d.range.is_empty()));
    assert_eq!(set.decorations()[0].hover.as_deref(), Some("Insert at Line 3"));
}

#[test]
fn pure_deletion_has_no_inline_addition() {
    let buffer = Buffer::from_str("main.tex", DOC);
    let s = EditSuggestion::new("World", "", 4, 1);
    let set = project([&s], &buffer);
    assert_eq!(set.len(), 2);
    assert!(
        !set.decorations()
            .iter()
            .any(|d| matches!(d.kind, DecorationKind::InlineAddition { .. }))
    );
}

#[test]
fn out_of_bounds_suggestion_is_skipped() {
    let buffer = Buffer::from_str("main.tex", "one\ntwo");
    let far = EditSuggestion::new("x", "y", 40, 1);
    let ok = EditSuggestion::new("two", "TWO", 2, 1);
    let set = project([&far, &ok], &buffer);
    assert!(set.for_suggestion(far.id).next().is_none());
    assert_eq!(set.for_suggestion(ok.id).count(), 3);
}

#[test]
fn projection_is_idempotent() {
    let buffer = Buffer::from_str("main.tex", DOC);
    let text = "```latex-diff\n@@ -3,1 +3,1 @@\n-Hello\n+Howdy\n```\n";
    let parsed = parse(text);
    assert_eq!(project(&parsed, &buffer), project(&parsed, &buffer));
}

#[test]
fn resolved_suggestions_are_not_projected() {
    let buffer = Buffer::from_str("main.tex", DOC);
    let mut s = EditSuggestion::new("Hello", "Hi", 3, 1);
    s.status = core_diff::SuggestionStatus::Rejected;
    assert!(project([&s], &buffer).is_empty());
}

#[test]
fn buffer_shrink_drops_stale_markers_on_refresh() {
    let mut buffer = Buffer::from_str("main.tex", DOC);
    let mut layer = DecorationLayer::new();
    let mut projector = DecorationProjector::new();
    let pending = vec![EditSuggestion::new("World", "Earth", 4, 1)];
    projector.refresh(&pending, &buffer, &mut layer);
    assert_eq!(layer.len(), 3);
    buffer.set_value("only line");
    projector.refresh(&pending, &buffer, &mut layer);
    assert!(layer.is_empty());
}
