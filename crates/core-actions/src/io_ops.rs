//! File IO: opening `.tex` documents and the file-backed document store.
//!
//! Documents are normalized to LF on open; `EditorState::serialized_content`
//! restores the original line endings before anything is written back.

use anyhow::Context;
use core_services::DocumentStore;
use core_state::EditorState;
use std::path::{Path, PathBuf};

/// Read `path` into a fresh editor state. The document id is the file name.
pub async fn open_document(path: &Path) -> anyhow::Result<EditorState> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let id = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document.tex")
        .to_string();
    tracing::debug!(target: "io", path = %path.display(), bytes = raw.len(), "document_read");
    Ok(EditorState::open(id, &raw))
}

/// Stores documents as files named by their id under a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }
}

impl DocumentStore for FsDocumentStore {
    async fn save(&self, document_id: &str, content: &str) -> anyhow::Result<()> {
        let path = self.path_for(document_id);
        tokio::fs::write(&path, content.as_bytes())
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::TextModel;

    #[tokio::test]
    async fn open_normalizes_and_save_restores_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.tex");
        std::fs::write(&path, "line1\r\nline2\r\n").unwrap();
        let state = open_document(&path).await.unwrap();
        assert_eq!(state.document_id, "paper.tex");
        assert_eq!(state.buffer().value(), "line1\nline2\n");

        let store = FsDocumentStore::new(dir.path());
        store
            .save(&state.document_id, &state.serialized_content())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line1\r\nline2\r\n");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_document(&dir.path().join("nope.tex")).await.unwrap_err();
        assert!(err.to_string().contains("nope.tex"));
    }

    #[tokio::test]
    async fn save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("absent"));
        assert!(store.save("a.tex", "x").await.is_err());
    }
}
