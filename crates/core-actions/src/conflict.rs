//! Re-anchoring stale suggestions through the assistant.
//!
//! When an accept finds the anchored lines gone or changed, the assistant is
//! asked for a fresh diff block against the document as it is now. The reply
//! goes back through the regular diff parser; the first suggestion it yields
//! replaces the stale one. Failures are final for that suggestion: the caller
//! drops it instead of retrying.

use crate::error::ConflictError;
use core_diff::{DIFF_FENCE_TAG, EditSuggestion, parse};
use core_services::{Assistant, AssistantRequest};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything the assistant needs to re-anchor one suggestion.
#[derive(Debug, Clone)]
pub struct ConflictRequest {
    pub file_content: String,
    pub suggestion: EditSuggestion,
    /// Text now occupying the suggestion's target lines.
    pub current_text: String,
    pub small_change: bool,
}

/// Both the proposed and the current text fit within `threshold` lines.
pub fn is_small_change(suggestion: &EditSuggestion, current_text: &str, threshold: usize) -> bool {
    let current_lines = if current_text.is_empty() {
        0
    } else {
        current_text.split('\n').count()
    };
    suggestion.original_line_count.max(suggestion.suggested_line_count()) <= threshold
        && current_lines <= threshold
}

/// File content with 1-based line numbers, one `N: text` per line.
pub fn numbered_lines(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + content.len() / 8);
    for (idx, line) in content.split('\n').enumerate() {
        let _ = writeln!(out, "{}: {}", idx + 1, line);
    }
    out
}

pub fn build_prompt(request: &ConflictRequest) -> String {
    let s = &request.suggestion;
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "A suggested edit no longer applies because the document changed after it was made."
    );
    let _ = writeln!(prompt, "\nCurrent document with line numbers:\n");
    prompt.push_str(&numbered_lines(&request.file_content));
    let _ = writeln!(prompt, "\nOriginal suggestion:");
    let _ = writeln!(prompt, "- startLine: {}", s.start_line);
    let _ = writeln!(prompt, "- originalLineCount: {}", s.original_line_count);
    let _ = writeln!(prompt, "- original:\n{}", s.original);
    let _ = writeln!(prompt, "- suggested:\n{}", s.suggested);
    let _ = writeln!(
        prompt,
        "\nText currently at lines {}-{}:\n{}",
        s.start_line,
        s.end_line(),
        request.current_text
    );
    let _ = writeln!(
        prompt,
        "\nReply with exactly one ```{DIFF_FENCE_TAG} block containing a single hunk \
         (`@@ -start,count +start,count @@`, `-` removed lines, `+` added lines). \
         Use the current line numbers above and keep the change minimal."
    );
    prompt
}

/// Issues re-anchoring requests against an assistant with a time bound.
#[derive(Debug)]
pub struct ConflictResolver<A> {
    assistant: A,
    fast_model: String,
    capable_model: String,
    timeout: Duration,
}

impl<A: Assistant> ConflictResolver<A> {
    pub fn new(
        assistant: A,
        fast_model: impl Into<String>,
        capable_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            assistant,
            fast_model: fast_model.into(),
            capable_model: capable_model.into(),
            timeout,
        }
    }

    pub fn assistant(&self) -> &A {
        &self.assistant
    }

    pub fn model_for(&self, small_change: bool) -> &str {
        if small_change {
            &self.fast_model
        } else {
            &self.capable_model
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn resolve(&self, request: ConflictRequest) -> Result<EditSuggestion, ConflictError> {
        let model = self.model_for(request.small_change).to_string();
        debug!(
            target: "actions.conflict",
            id = %request.suggestion.id,
            model = model.as_str(),
            small_change = request.small_change,
            "conflict_resolution_started"
        );
        let assistant_request = AssistantRequest {
            prompt: build_prompt(&request),
            selection: Some(request.current_text),
            file_content: request.file_content,
            model,
        };
        let reply = match tokio::time::timeout(
            self.timeout,
            self.assistant.complete(assistant_request),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(target: "actions.conflict", error = %e, "conflict_assistant_failed");
                return Err(ConflictError::Assistant(e));
            }
            Err(_) => {
                warn!(target: "actions.conflict", timeout_ms = self.timeout.as_millis() as u64, "conflict_assistant_timeout");
                return Err(ConflictError::Timeout(self.timeout));
            }
        };
        parse(&reply)
            .into_iter()
            .next()
            .ok_or(ConflictError::NoSuggestion)
    }
}
