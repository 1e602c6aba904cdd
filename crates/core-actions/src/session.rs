//! `EditorSession`: one open document plus everything the suggestion workflow
//! needs around it.
//!
//! Ordering rules the session enforces:
//! * the edit-limit gate answers before the buffer is touched;
//! * the edit is applied, then the document is saved, then a compile is
//!   requested; a failed save never rolls the edit back;
//! * decorations are re-projected after every change to the buffer or the
//!   suggestion set, replacing the previous projection wholesale.
//!
//! Failures that the user should see become `Notice`s on the editor state.
//! Only the caller-facing result of an operation is returned as an error.

use crate::applicator::{EditPlan, current_text_at, plan_edit};
use crate::compile::CompileHandle;
use crate::conflict::{ConflictRequest, ConflictResolver, is_small_change};
use crate::error::ApplyError;
use core_config::Config;
use core_diff::{EditSuggestion, SuggestionId, parse};
use core_events::{CompileReport, CompileStatus};
use core_render::{DecorationHost, DecorationLayer, DecorationProjector, DecorationSet};
use core_services::{Assistant, AssistantRequest, DocumentStore, EditLimitGate};
use core_state::{
    ACCEPT_SUGGESTION_SOURCE, Advance, EditorState, Notice, SuggestionQueue, USER_EDIT_SOURCE,
};
use core_text::{SingleEdit, TextError, TextModel, TextRange};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Behavior switches, normally taken from `octree.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub batch_size: usize,
    pub verify_original_text: bool,
    pub rebase_on_accept: bool,
    pub fast_model: String,
    pub capable_model: String,
    pub assistant_timeout: Duration,
    pub small_change_lines: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        let file = &config.file;
        Self {
            batch_size: config.batch_size(),
            verify_original_text: file.suggestions.verify_original_text,
            rebase_on_accept: file.suggestions.rebase_on_accept,
            fast_model: file.assistant.fast_model.clone(),
            capable_model: file.assistant.capable_model.clone(),
            assistant_timeout: config.assistant_timeout(),
            small_change_lines: file.assistant.small_change_lines,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The edit landed. `saved` is false when persistence failed.
    Applied { advance: Advance, saved: bool },
    /// The anchor was stale. The suggestion was swapped for a re-anchored
    /// one (`Some`) or dropped (`None`).
    Rerouted { replacement: Option<SuggestionId> },
}

#[derive(Debug, Default)]
pub struct AcceptAllSummary {
    pub applied: usize,
    pub rerouted: usize,
    pub failed: usize,
    /// Set when the edit-limit gate stopped the run.
    pub stopped: Option<ApplyError>,
}

pub struct EditorSession<G, S, A, H = DecorationLayer> {
    state: EditorState,
    queue: SuggestionQueue,
    projector: DecorationProjector,
    host: H,
    gate: G,
    store: S,
    resolver: ConflictResolver<A>,
    compile: Option<CompileHandle>,
    options: SessionOptions,
    projected_version: Option<u64>,
    applied_compile: u64,
    pdf: Option<Vec<u8>>,
}

impl<G, S, A> EditorSession<G, S, A, DecorationLayer>
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
{
    /// Session rendering decorations into an in-memory layer.
    pub fn new(state: EditorState, gate: G, store: S, assistant: A, options: SessionOptions) -> Self {
        Self::with_host(state, gate, store, assistant, options, DecorationLayer::new())
    }
}

impl<G, S, A, H> EditorSession<G, S, A, H>
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
    H: DecorationHost,
{
    pub fn with_host(
        state: EditorState,
        gate: G,
        store: S,
        assistant: A,
        options: SessionOptions,
        host: H,
    ) -> Self {
        let resolver = ConflictResolver::new(
            assistant,
            options.fast_model.clone(),
            options.capable_model.clone(),
            options.assistant_timeout,
        );
        let mut session = Self {
            state,
            queue: SuggestionQueue::new(options.batch_size),
            projector: DecorationProjector::new(),
            host,
            gate,
            store,
            resolver,
            compile: None,
            options,
            projected_version: None,
            applied_compile: 0,
            pdf: None,
        };
        session.reproject();
        session
    }

    /// Route compile requests to a background worker.
    pub fn attach_compiler(&mut self, handle: CompileHandle) {
        self.compile = Some(handle);
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn queue(&self) -> &SuggestionQueue {
        &self.queue
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn decorations(&self) -> &DecorationSet {
        self.projector.current()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn assistant(&self) -> &A {
        self.resolver.assistant()
    }

    /// Latest successfully compiled PDF.
    pub fn pdf(&self) -> Option<&[u8]> {
        self.pdf.as_deref()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.state.drain_notices()
    }

    /// Id of the displayed suggestion at 1-based `position`.
    pub fn suggestion_at(&self, position: usize) -> Option<SuggestionId> {
        position
            .checked_sub(1)
            .and_then(|idx| self.queue.displayed().get(idx))
            .map(|s| s.id)
    }

    fn reproject(&mut self) {
        self.projector
            .refresh(self.queue.pending(), self.state.buffer(), &mut self.host);
        self.projected_version = Some(self.state.version());
    }

    /// Re-project if the buffer changed since the last projection (typing
    /// through a host widget). Returns whether a projection ran.
    pub fn on_content_changed(&mut self) -> bool {
        if self.projected_version == Some(self.state.version()) {
            return false;
        }
        self.reproject();
        true
    }

    fn settle(&mut self) -> Advance {
        let advance = self.queue.advance();
        match advance {
            Advance::InProgress => {}
            Advance::MoreAvailable { remaining } => {
                self.state.push_notice(Notice::MoreSuggestions { remaining })
            }
            Advance::Complete => self.state.push_notice(Notice::BatchComplete),
        }
        advance
    }

    fn request_compile(&mut self) -> Option<u64> {
        let handle = self.compile.as_ref()?;
        Some(handle.request(self.state.serialized_content()))
    }

    /// Start a new assistant turn from a complete response. Returns the number
    /// of suggestions now displayed.
    pub fn receive_response(&mut self, response: &str) -> usize {
        let suggestions = parse(response);
        let total = suggestions.len();
        let displayed = self.queue.load_turn(suggestions);
        info!(target: "actions.accept", total, displayed, turn = self.queue.turn(), "response_received");
        self.reproject();
        displayed
    }

    /// Ask the assistant about the document. The reply starts a new turn.
    pub async fn ask(&mut self, prompt: &str) -> anyhow::Result<usize> {
        let request = AssistantRequest {
            file_content: self.state.buffer().value(),
            prompt: prompt.to_string(),
            selection: self.state.selected_text(),
            model: self.options.capable_model.clone(),
        };
        let timeout = self.options.assistant_timeout;
        let reply = match tokio::time::timeout(timeout, self.resolver.assistant().complete(request))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                self.state.push_notice(Notice::AssistantFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
            Err(_) => {
                let message = format!("no answer within {}s", timeout.as_secs());
                self.state.push_notice(Notice::AssistantFailed {
                    message: message.clone(),
                });
                anyhow::bail!(message);
            }
        };
        Ok(self.receive_response(&reply))
    }

    /// Accept one displayed suggestion.
    pub async fn accept(&mut self, id: SuggestionId) -> Result<AcceptOutcome, ApplyError> {
        if !self.queue.get(id).is_some_and(EditSuggestion::is_pending) {
            return Err(ApplyError::NotPending(id));
        }

        match self.gate.can_perform_edit().await {
            Ok(true) => {}
            Ok(false) => {
                info!(target: "actions.accept", id = %id, "edit_limit_denied");
                self.state.push_notice(Notice::LimitReached);
                return Err(ApplyError::LimitExceeded);
            }
            Err(e) => {
                warn!(target: "actions.accept", id = %id, error = %e, "edit_limit_check_failed");
                let message = e.to_string();
                self.state.push_notice(Notice::ApplyFailed {
                    id,
                    message: format!("edit limit check failed: {message}"),
                });
                return Err(ApplyError::Gate(message));
            }
        }

        // The gate await is a suspension point; re-read the suggestion.
        let Some(suggestion) = self.queue.get(id).filter(|s| s.is_pending()).cloned() else {
            return Err(ApplyError::NotPending(id));
        };

        let plan = match plan_edit(&suggestion, self.state.buffer(), self.options.verify_original_text) {
            Ok(plan) => plan,
            Err(ApplyError::Bounds {
                start_line,
                end_line,
                line_count,
            }) => {
                info!(target: "actions.accept", id = %id, start_line, end_line, line_count, "accept_routed_to_conflict");
                let replacement = self.resolve_conflict(suggestion).await;
                return Ok(AcceptOutcome::Rerouted { replacement });
            }
            Err(e) => return Err(self.apply_failed(id, e)),
        };

        self.commit_plan(id, &plan).await
    }

    /// Apply, save, compile, settle. A failed apply leaves the suggestion
    /// pending with its error recorded and skips the rest.
    async fn commit_plan(
        &mut self,
        id: SuggestionId,
        plan: &EditPlan,
    ) -> Result<AcceptOutcome, ApplyError> {
        self.apply_plan(id, plan)?;
        let saved = self.persist().await;
        self.request_compile();
        let advance = self.settle();
        self.reproject();
        Ok(AcceptOutcome::Applied { advance, saved })
    }

    fn apply_failed(&mut self, id: SuggestionId, err: ApplyError) -> ApplyError {
        warn!(target: "actions.accept", id = %id, error = %err, "accept_failed");
        let message = err.to_string();
        self.queue.record_apply_error(id, message.clone());
        self.state.push_notice(Notice::ApplyFailed { id, message });
        err
    }

    fn apply_plan(&mut self, id: SuggestionId, plan: &EditPlan) -> Result<(), ApplyError> {
        if let Err(e) = self
            .state
            .execute_edits(ACCEPT_SUGGESTION_SOURCE, std::slice::from_ref(&plan.edit))
        {
            return Err(self.apply_failed(id, e.into()));
        }
        self.queue.complete_accept(id);
        if self.options.rebase_on_accept {
            self.queue.rebase_from(plan.rebase_from, plan.line_delta);
        }
        debug!(
            target: "actions.accept",
            id = %id,
            rebase_from = plan.rebase_from,
            line_delta = plan.line_delta,
            version = self.state.version(),
            "suggestion_applied"
        );
        Ok(())
    }

    /// Save the current content. Failure leaves the buffer as is and surfaces
    /// a notice.
    async fn persist(&mut self) -> bool {
        let content = self.state.serialized_content();
        match self.store.save(&self.state.document_id, &content).await {
            Ok(()) => {
                self.state.dirty = false;
                trace!(target: "io", document = self.state.document_id.as_str(), bytes = content.len(), "document_saved");
                true
            }
            Err(e) => {
                warn!(target: "io", document = self.state.document_id.as_str(), error = %e, "document_save_failed");
                self.state.push_notice(Notice::SaveFailed {
                    message: e.to_string(),
                });
                false
            }
        }
    }

    async fn resolve_conflict(&mut self, stale: EditSuggestion) -> Option<SuggestionId> {
        let id = stale.id;
        let current_text = current_text_at(&stale, self.state.buffer());
        let request = ConflictRequest {
            file_content: self.state.buffer().value(),
            small_change: is_small_change(&stale, &current_text, self.options.small_change_lines),
            current_text,
            suggestion: stale,
        };
        let replacement = match self.resolver.resolve(request).await {
            Ok(fresh) => {
                let new = fresh.id;
                if self.queue.replace(id, fresh) {
                    info!(target: "actions.conflict", old = %id, new = %new, "conflict_resolved");
                    self.state.push_notice(Notice::ConflictResolved { old: id, new });
                    Some(new)
                } else {
                    None
                }
            }
            Err(e) => {
                warn!(target: "actions.conflict", id = %id, error = %e, "conflict_unresolved");
                self.queue.discard(id);
                self.state.push_notice(Notice::ConflictUnresolved {
                    id,
                    message: e.to_string(),
                });
                self.settle();
                None
            }
        };
        self.reproject();
        replacement
    }

    /// Reject one displayed suggestion; the buffer is untouched.
    pub fn reject(&mut self, id: SuggestionId) -> Result<Advance, ApplyError> {
        if self.queue.reject(id).is_none() {
            return Err(ApplyError::NotPending(id));
        }
        let advance = self.settle();
        self.reproject();
        Ok(advance)
    }

    /// Accept every displayed pending suggestion in order. Stops at the first
    /// edit-limit denial; other failures skip to the next suggestion.
    pub async fn accept_all(&mut self) -> AcceptAllSummary {
        let ids: Vec<SuggestionId> = self.queue.pending().map(|s| s.id).collect();
        let mut summary = AcceptAllSummary::default();
        for id in ids {
            if !self.queue.get(id).is_some_and(EditSuggestion::is_pending) {
                continue;
            }
            match self.accept(id).await {
                Ok(AcceptOutcome::Applied { .. }) => summary.applied += 1,
                Ok(AcceptOutcome::Rerouted { .. }) => summary.rerouted += 1,
                Err(e) if e.is_limit() => {
                    summary.stopped = Some(e);
                    break;
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Show the next batch once the current one is settled.
    pub fn continue_suggestions(&mut self) -> usize {
        let moved = self.queue.continue_batch();
        if moved > 0 {
            self.reproject();
        }
        moved
    }

    /// Direct user edit (typing). Attributed to the user for undo.
    pub fn user_edit(&mut self, edits: &[SingleEdit]) -> Result<(), TextError> {
        self.state.execute_edits(USER_EDIT_SOURCE, edits)?;
        self.on_content_changed();
        self.request_compile();
        Ok(())
    }

    /// Replace the content of one existing line.
    pub fn replace_line(&mut self, line: usize, text: &str) -> Result<(), TextError> {
        let line_count = self.state.buffer().line_count();
        let max_column = self
            .state
            .buffer()
            .line_max_column(line)
            .ok_or(TextError::LineOutOfRange { line, line_count })?;
        self.user_edit(&[SingleEdit::replace(
            TextRange::new(line, 1, line, max_column),
            text,
        )])
    }

    pub fn set_selection(&mut self, range: Option<TextRange>) {
        self.state.set_selection(range);
    }

    /// Select whole lines `start..=end`.
    pub fn select_lines(&mut self, start_line: usize, end_line: usize) {
        let range = self
            .state
            .buffer()
            .line_max_column(end_line)
            .map(|col| TextRange::new(start_line, 1, end_line, col));
        self.state.set_selection(range);
    }

    pub fn undo(&mut self) -> Option<String> {
        let source = self.state.undo()?;
        self.on_content_changed();
        self.request_compile();
        Some(source)
    }

    pub fn redo(&mut self) -> Option<String> {
        let source = self.state.redo()?;
        self.on_content_changed();
        self.request_compile();
        Some(source)
    }

    /// Explicit save (retry after a failed automatic save).
    pub async fn save(&mut self) -> bool {
        self.persist().await
    }

    /// Compile now-ish: only the quiet period applies.
    pub fn recompile(&mut self) -> Option<u64> {
        self.request_compile()
    }

    /// Apply a compile report unless a newer one was applied already.
    pub fn on_compile_report(&mut self, report: CompileReport) -> bool {
        if report.generation <= self.applied_compile {
            debug!(target: "compile", generation = report.generation, applied = self.applied_compile, "compile_report_stale");
            return false;
        }
        self.applied_compile = report.generation;
        match report.status {
            CompileStatus::Succeeded { pdf } => self.pdf = Some(pdf),
            CompileStatus::Failed { message, log } => {
                self.state.push_notice(Notice::CompileFailed { message, log })
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_services::{AllowAllEdits, MemoryDocumentStore, ScriptedAssistant};

    type TestSession = EditorSession<AllowAllEdits, MemoryDocumentStore, ScriptedAssistant>;

    fn session(doc: &str) -> TestSession {
        EditorSession::new(
            EditorState::open("main.tex", doc),
            AllowAllEdits,
            MemoryDocumentStore::new(),
            ScriptedAssistant::new(),
            SessionOptions::default(),
        )
    }

    #[tokio::test]
    async fn failed_apply_keeps_suggestion_pending_and_skips_save() {
        let mut s = session("a\nb\n");
        let (handle, _worker) = crate::compile::compile_channel(
            core_services::EchoCompiler::new(),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        s.attach_compiler(handle.clone());
        s.receive_response("```latex-diff\n@@ -2,1 +2,1 @@\n-b\n+B\n```");
        let id = s.queue().displayed()[0].id;
        let mut plan = plan_edit(&s.queue().displayed()[0], s.state().buffer(), false).unwrap();
        // The buffer shrank between planning and applying.
        s.state.set_value(USER_EDIT_SOURCE, "a");
        s.drain_notices();
        let version = s.state().version();
        plan.edit = SingleEdit::replace(TextRange::new(2, 1, 2, 2), "B");

        let err = s.commit_plan(id, &plan).await.unwrap_err();
        assert!(matches!(err, ApplyError::Edit(_)));
        assert_eq!(s.state().buffer().value(), "a");
        assert_eq!(s.state().version(), version);
        assert!(s.queue().get(id).is_some_and(EditSuggestion::is_pending));
        assert!(s.queue().apply_error(id).is_some());
        assert_eq!(s.store().save_count(), 0);
        assert_eq!(handle.latest_generation(), 0);
        assert!(matches!(
            s.drain_notices().as_slice(),
            [Notice::ApplyFailed { id: failed, .. }] if *failed == id
        ));
    }

    #[test]
    fn suggestion_at_is_one_based() {
        let mut s = session("a\nb\n");
        s.receive_response("```latex-diff\n@@ -1,1 +1,1 @@\n-a\n+A\n```");
        assert!(s.suggestion_at(0).is_none());
        assert_eq!(s.suggestion_at(1), Some(s.queue().displayed()[0].id));
        assert!(s.suggestion_at(2).is_none());
    }

    #[test]
    fn stale_compile_reports_are_ignored() {
        let mut s = session("a");
        let report = |generation, pdf: &[u8]| CompileReport {
            generation,
            status: CompileStatus::Succeeded { pdf: pdf.to_vec() },
        };
        assert!(s.on_compile_report(report(2, b"new")));
        assert!(!s.on_compile_report(report(1, b"old")));
        assert_eq!(s.pdf(), Some(&b"new"[..]));
    }

    #[test]
    fn typing_reprojects_once() {
        let mut s = session("a\nb\n");
        s.receive_response("```latex-diff\n@@ -2,1 +2,1 @@\n-b\n+B\n```");
        assert_eq!(s.decorations().len(), 3);
        s.replace_line(1, "").unwrap();
        assert!(!s.on_content_changed());
        s.state.set_value(USER_EDIT_SOURCE, "a");
        assert!(s.on_content_changed());
        assert!(s.decorations().is_empty());
    }
}
