//! Document persistence.

use anyhow::bail;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Overwrite-semantics store: the last write wins, no concurrency token.
pub trait DocumentStore: Send + Sync {
    fn save(
        &self,
        document_id: &str,
        content: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: DocumentStore> DocumentStore for std::sync::Arc<T> {
    fn save(
        &self,
        document_id: &str,
        content: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).save(document_id, content)
    }
}

/// In-process store. `set_failing(true)` makes every save fail until reset.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, String>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get(&self, document_id: &str) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(document_id).cloned())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, document_id: &str, content: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("document store unavailable");
        }
        let Ok(mut docs) = self.documents.lock() else {
            bail!("document store poisoned");
        };
        docs.insert(document_id.to_string(), content.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
