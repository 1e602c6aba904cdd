#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use core_actions::{EditorSession, SessionOptions};
use core_diff::{EditSuggestion, format_block};
use core_services::{Assistant, DocumentStore, EditLimitGate};
use core_state::EditorState;

pub const DOC: &str = "\\documentclass{article}\n\\begin{document}\nHello\nWorld\n\\section{Intro}\nText here.\n\\end{document}\n";

/// Assistant-style response wrapping one `latex-diff` block per suggestion.
pub fn response(suggestions: &[EditSuggestion]) -> String {
    let mut text = String::from("Here are my suggestions:\n\n");
    for s in suggestions {
        text.push_str(&format_block(s));
        text.push('\n');
    }
    text.push_str("Let me know if you need anything else.");
    text
}

pub fn session<G, S, A>(doc: &str, gate: G, store: S, assistant: A) -> EditorSession<G, S, A>
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
{
    EditorSession::new(
        EditorState::open("main.tex", doc),
        gate,
        store,
        assistant,
        SessionOptions::default(),
    )
}
