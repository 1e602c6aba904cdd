mod common;

use common::{DOC, response, session};
use core_actions::AcceptOutcome;
use core_diff::EditSuggestion;
use core_services::{AllowAllEdits, EditQuota, MemoryDocumentStore, ScriptedAssistant};
use core_state::Notice;
use core_text::{SingleEdit, TextModel, TextRange};
use std::sync::Arc;
use std::time::Duration;

/// Cut everything after `\begin{document}`, leaving three lines.
fn truncate_document() -> SingleEdit {
    SingleEdit::replace(TextRange::new(3, 1, 8, 1), "")
}

#[tokio::test]
async fn stale_anchor_is_reanchored_with_the_fast_model() {
    let fresh = EditSuggestion::new("", "Better text.", 3, 0);
    let assistant = Arc::new(ScriptedAssistant::new().respond(response(&[fresh])));
    let mut s = session(DOC, AllowAllEdits, MemoryDocumentStore::new(), assistant.clone());
    s.receive_response(&response(&[EditSuggestion::new("Text here.", "Better text.", 6, 1)]));
    let stale = s.queue().displayed()[0].id;

    s.user_edit(&[truncate_document()]).unwrap();
    assert_eq!(s.state().buffer().line_count(), 3);
    assert!(s.decorations().is_empty());

    let outcome = s.accept(stale).await.unwrap();
    let AcceptOutcome::Rerouted {
        replacement: Some(new_id),
    } = outcome
    else {
        panic!("expected a re-anchored suggestion, got {outcome:?}");
    };
    assert_ne!(new_id, stale);
    assert!(s.queue().get(stale).is_none());
    let replacement = s.queue().get(new_id).unwrap();
    assert!(replacement.is_pending());
    assert_eq!(replacement.start_line, 3);
    assert_eq!(
        s.drain_notices(),
        vec![Notice::ConflictResolved {
            old: stale,
            new: new_id
        }]
    );

    let requests = assistant.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4o-mini");
    assert!(requests[0].prompt.contains("startLine: 6"));
    assert!(requests[0].file_content.starts_with("\\documentclass{article}"));

    // The buffer only changes once the replacement is accepted.
    assert_eq!(s.state().buffer().line_count(), 3);
    s.accept(new_id).await.unwrap();
    assert_eq!(s.state().buffer().line_content(3).as_deref(), Some("Better text."));
}

#[tokio::test]
async fn unresolved_conflict_drops_the_suggestion() {
    let assistant = ScriptedAssistant::new().fail("model overloaded");
    let mut s = session(DOC, AllowAllEdits, MemoryDocumentStore::new(), assistant);
    s.receive_response(&response(&[EditSuggestion::new("Text here.", "Better text.", 6, 1)]));
    let stale = s.queue().displayed()[0].id;
    s.user_edit(&[truncate_document()]).unwrap();
    let before = s.state().buffer().value();

    let outcome = s.accept(stale).await.unwrap();
    assert_eq!(outcome, AcceptOutcome::Rerouted { replacement: None });
    assert!(s.queue().get(stale).is_none());
    assert_eq!(s.state().buffer().value(), before);
    let notices = s.drain_notices();
    assert!(matches!(
        &notices[0],
        Notice::ConflictUnresolved { id, message } if *id == stale && message.contains("overloaded")
    ));
    assert_eq!(notices[1], Notice::BatchComplete);
}

#[tokio::test]
async fn reply_without_a_diff_block_is_unresolved() {
    let assistant = ScriptedAssistant::new().respond("I could not find that text anymore.");
    let mut s = session(DOC, AllowAllEdits, MemoryDocumentStore::new(), assistant);
    s.receive_response(&response(&[EditSuggestion::new("Text here.", "Better.", 6, 1)]));
    let stale = s.queue().displayed()[0].id;
    s.user_edit(&[truncate_document()]).unwrap();
    let outcome = s.accept(stale).await.unwrap();
    assert_eq!(outcome, AcceptOutcome::Rerouted { replacement: None });
}

#[tokio::test(start_paused = true)]
async fn slow_assistant_times_out() {
    let assistant = ScriptedAssistant::new()
        .with_delay(Duration::from_secs(120))
        .respond(response(&[EditSuggestion::new("", "x", 1, 0)]));
    let mut s = session(DOC, AllowAllEdits, MemoryDocumentStore::new(), assistant);
    s.receive_response(&response(&[EditSuggestion::new("Text here.", "Better.", 6, 1)]));
    let stale = s.queue().displayed()[0].id;
    s.user_edit(&[truncate_document()]).unwrap();
    let outcome = s.accept(stale).await.unwrap();
    assert_eq!(outcome, AcceptOutcome::Rerouted { replacement: None });
    assert!(matches!(
        s.drain_notices().first(),
        Some(Notice::ConflictUnresolved { .. })
    ));
}

#[tokio::test]
async fn rerouted_accept_still_consumes_an_edit() {
    let quota = Arc::new(EditQuota::new(1));
    let assistant = ScriptedAssistant::new().fail("unavailable");
    let mut s = session(DOC, quota.clone(), MemoryDocumentStore::new(), assistant);
    s.receive_response(&response(&[EditSuggestion::new("Text here.", "Better.", 6, 1)]));
    let stale = s.queue().displayed()[0].id;
    s.user_edit(&[truncate_document()]).unwrap();
    s.accept(stale).await.unwrap();
    assert_eq!(quota.remaining(), 0);
}

#[tokio::test]
async fn ask_sends_selection_and_starts_a_new_turn() {
    let first = response(&[EditSuggestion::new("Hello", "Hi", 3, 1)]);
    let second = response(&[
        EditSuggestion::new("World", "Earth", 4, 1),
        EditSuggestion::new("Text here.", "Prose.", 6, 1),
    ]);
    let assistant = Arc::new(ScriptedAssistant::new().respond(first).respond(second));
    let mut s = session(DOC, AllowAllEdits, MemoryDocumentStore::new(), assistant.clone());

    assert_eq!(s.ask("greet better").await.unwrap(), 1);
    s.select_lines(3, 4);
    assert_eq!(s.ask("improve these lines").await.unwrap(), 2);
    assert_eq!(s.queue().displayed()[0].suggested, "Earth");
    assert_eq!(s.queue().turn(), 2);

    let requests = assistant.requests();
    assert_eq!(requests[0].selection, None);
    assert_eq!(requests[1].selection.as_deref(), Some("Hello\nWorld"));
    assert_eq!(requests[1].model, "gpt-4o");
}

#[tokio::test]
async fn ask_failure_keeps_current_suggestions() {
    let mut s = session(
        DOC,
        AllowAllEdits,
        MemoryDocumentStore::new(),
        ScriptedAssistant::new().fail("rate limited"),
    );
    s.receive_response(&response(&[EditSuggestion::new("Hello", "Hi", 3, 1)]));
    assert!(s.ask("anything").await.is_err());
    assert_eq!(s.queue().displayed().len(), 1);
    assert!(matches!(
        s.drain_notices().as_slice(),
        [Notice::AssistantFailed { message }] if message.contains("rate limited")
    ));
}
