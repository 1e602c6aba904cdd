//! Suggestion decorations.
//!
//! Pending suggestions are projected onto the live buffer as three kinds of
//! markers: the struck-through span the suggestion removes, a margin
//! indicator carrying the "Replace Lines S-E" / "Insert at Line N" label, and
//! an inline preview of the suggested text. The projection is recomputed from
//! scratch whenever the suggestion set or the buffer changes and swapped into
//! the host in one `delta_decorations` call.
//!
//! Exposed Components:
//! - `decoration`: value types plus the `DecorationHost` seam and the
//!   in-memory `DecorationLayer` host.
//! - `projector`: pure `project` function and the stateful `DecorationProjector`.
//! - `preview`: line-oriented preview used by terminal front ends.

pub mod decoration;
pub mod preview;
pub mod projector;

pub use decoration::{
    Decoration, DecorationHost, DecorationId, DecorationKind, DecorationLayer, DecorationSet,
    LINE_BREAK_GLYPH, Stickiness,
};
pub use preview::preview_lines;
pub use projector::{AnchorSpan, DecorationProjector, anchor_span, project};
