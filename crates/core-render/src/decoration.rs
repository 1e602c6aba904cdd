//! Decoration primitives and the host surface they are swapped into.
//!
//! Design invariants:
//! * A `DecorationSet` is a value: two projections of the same inputs compare
//!   equal even though the host hands out different ids each time.
//! * Hosts replace decorations atomically through `delta_decorations`; the old
//!   ids are removed and the new ones added in a single call.
//! * Markers never grow when text is typed at their edges.

use core_diff::SuggestionId;
use core_text::TextRange;
use std::collections::BTreeMap;

/// Visible glyph substituted for line breaks in inline previews.
pub const LINE_BREAK_GLYPH: &str = "\u{21b5}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stickiness {
    AlwaysGrowsWhenTypingAtEdges,
    NeverGrowsWhenTypingAtEdges,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    /// Text that the suggestion removes (struck through).
    DeletedRange,
    /// Gutter marker carrying the hover label.
    MarginIndicator,
    /// Suggested text rendered after the anchor, line breaks shown as glyphs.
    InlineAddition { text: String },
}

impl DecorationKind {
    /// Style class a host maps to concrete colors.
    pub fn class_name(&self) -> &'static str {
        match self {
            DecorationKind::DeletedRange => "octree-suggestion-deleted",
            DecorationKind::MarginIndicator => "octree-suggestion-margin",
            DecorationKind::InlineAddition { .. } => "octree-suggestion-added",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decoration {
    pub suggestion: SuggestionId,
    pub range: TextRange,
    pub kind: DecorationKind,
    pub hover: Option<String>,
    pub stickiness: Stickiness,
}

/// Ordered decorations derived from the pending suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, decoration: Decoration) {
        self.decorations.push(decoration);
    }
    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }
    pub fn len(&self) -> usize {
        self.decorations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }
    pub fn for_suggestion(&self, id: SuggestionId) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter().filter(move |d| d.suggestion == id)
    }
}

/// Handle assigned by a host to one live decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// Editor capability for decorations: remove `old`, add `new`, as one swap.
pub trait DecorationHost {
    fn delta_decorations(&mut self, old: &[DecorationId], new: &[Decoration]) -> Vec<DecorationId>;
}

/// In-memory decoration host. Stands in for the editor widget in headless
/// sessions and tests.
#[derive(Debug, Default)]
pub struct DecorationLayer {
    live: BTreeMap<DecorationId, Decoration>,
    next_id: u64,
}

impl DecorationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live decorations in insertion order.
    pub fn live(&self) -> impl Iterator<Item = &Decoration> {
        self.live.values()
    }

    pub fn get(&self, id: DecorationId) -> Option<&Decoration> {
        self.live.get(&id)
    }
}

impl DecorationHost for DecorationLayer {
    fn delta_decorations(&mut self, old: &[DecorationId], new: &[Decoration]) -> Vec<DecorationId> {
        for id in old {
            self.live.remove(id);
        }
        new.iter()
            .map(|d| {
                self.next_id += 1;
                let id = DecorationId(self.next_id);
                self.live.insert(id, d.clone());
                id
            })
            .collect()
    }
}
