//! AI assistant seam.

use anyhow::anyhow;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// One request to the assistant: full file plus the user's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    pub file_content: String,
    pub prompt: String,
    /// Selected excerpt, when the user had a selection.
    pub selection: Option<String>,
    pub model: String,
}

/// Returns the assistant's full response text, which may embed
/// `latex-diff` blocks.
pub trait Assistant: Send + Sync {
    fn complete(
        &self,
        request: AssistantRequest,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

impl<T: Assistant> Assistant for std::sync::Arc<T> {
    fn complete(
        &self,
        request: AssistantRequest,
    ) -> impl Future<Output = anyhow::Result<String>> + Send {
        (**self).complete(request)
    }
}

/// Replays canned responses in order and records every request it saw.
/// An empty script answers with an error.
#[derive(Debug, Default)]
pub struct ScriptedAssistant {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<AssistantRequest>>,
    delay: Option<Duration>,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering (timeouts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, entry: Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    pub fn requests(&self) -> Vec<AssistantRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Assistant for ScriptedAssistant {
    async fn complete(&self, request: AssistantRequest) -> anyhow::Result<String> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("assistant script poisoned"))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("assistant has no scripted response")),
        }
    }
}
