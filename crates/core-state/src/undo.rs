use core_text::{Buffer, TextModel};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Maximum number of snapshots retained in undo history.
pub const UNDO_HISTORY_MAX: usize = 200;

/// Pre-edit snapshot. `source` names the edit origin so one accepted
/// suggestion (or one user edit batch) undoes as a unit.
#[derive(Clone)]
pub struct EditSnapshot {
    pub source: String,
    pub buffer: Buffer,
    /// Content hash of the buffer at snapshot capture.
    pub hash: u64,
}

pub struct UndoEngine {
    undo_stack: Vec<EditSnapshot>,
    redo_stack: Vec<EditSnapshot>,
    /// Count of snapshots skipped due to identical successive state.
    undo_snapshots_skipped: AtomicU64,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoEngine {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undo_snapshots_skipped: AtomicU64::new(0),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.undo_snapshots_skipped.load(Ordering::Relaxed)
    }
    /// Source label of the edit the next `undo` would revert.
    pub fn last_source(&self) -> Option<&str> {
        self.undo_stack.last().map(|s| s.source.as_str())
    }

    pub fn push_snapshot(&mut self, source: &str, buffer: &Buffer) {
        let current_hash = buffer_hash(buffer);
        if let Some(last) = self.undo_stack.last()
            && last.hash == current_hash
            && last.source == source
        {
            self.undo_snapshots_skipped.fetch_add(1, Ordering::Relaxed);
            trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), hash = current_hash, source, "snapshot_dedupe_skip");
            return;
        }
        self.undo_stack.push(EditSnapshot {
            source: source.to_string(),
            buffer: buffer.clone(),
            hash: current_hash,
        });
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), lines = buffer.line_count(), hash = current_hash, source, "push_snapshot");
        if self.undo_stack.len() > UNDO_HISTORY_MAX {
            let _ = self.undo_stack.remove(0);
            trace!(target: "state.undo", "undo_stack_trimmed");
        }
        self.redo_stack.clear();
    }

    /// Restore the most recent snapshot. Returns the source label of the undone edit.
    pub fn undo(&mut self, buffer: &mut Buffer) -> Option<String> {
        let last = self.undo_stack.pop()?;
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), source = last.source.as_str(), "undo_pop");
        self.redo_stack.push(EditSnapshot {
            source: last.source.clone(),
            buffer: buffer.clone(),
            hash: buffer_hash(buffer),
        });
        *buffer = last.buffer;
        Some(last.source)
    }

    pub fn redo(&mut self, buffer: &mut Buffer) -> Option<String> {
        let next = self.redo_stack.pop()?;
        trace!(target: "state.undo", redo_depth = self.redo_stack.len(), undo_depth = self.undo_stack.len(), source = next.source.as_str(), "redo_pop");
        self.undo_stack.push(EditSnapshot {
            source: next.source.clone(),
            buffer: buffer.clone(),
            hash: buffer_hash(buffer),
        });
        *buffer = next.buffer;
        Some(next.source)
    }
}

fn buffer_hash(buf: &Buffer) -> u64 {
    let mut h = DefaultHasher::new();
    h.write(buf.value().as_bytes());
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_restores_and_reports_source() {
        let mut engine = UndoEngine::new();
        let mut buf = Buffer::from_str("t", "before");
        engine.push_snapshot("accept-ai-suggestion", &buf);
        buf.set_value("after");
        assert_eq!(engine.undo(&mut buf).as_deref(), Some("accept-ai-suggestion"));
        assert_eq!(buf.value(), "before");
        assert_eq!(engine.redo(&mut buf).as_deref(), Some("accept-ai-suggestion"));
        assert_eq!(buf.value(), "after");
    }

    #[test]
    fn identical_successive_snapshots_are_skipped() {
        let mut engine = UndoEngine::new();
        let buf = Buffer::from_str("t", "same");
        engine.push_snapshot("user", &buf);
        engine.push_snapshot("user", &buf);
        assert_eq!(engine.undo_depth(), 1);
        assert_eq!(engine.snapshots_skipped(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut engine = UndoEngine::new();
        let mut buf = Buffer::from_str("t", "");
        for i in 0..(UNDO_HISTORY_MAX + 10) {
            buf.set_value(&i.to_string());
            engine.push_snapshot("user", &buf);
        }
        assert_eq!(engine.undo_depth(), UNDO_HISTORY_MAX);
    }

    #[test]
    fn new_snapshot_clears_redo() {
        let mut engine = UndoEngine::new();
        let mut buf = Buffer::from_str("t", "a");
        engine.push_snapshot("user", &buf);
        buf.set_value("b");
        engine.undo(&mut buf);
        assert_eq!(engine.redo_depth(), 1);
        engine.push_snapshot("user", &buf);
        assert_eq!(engine.redo_depth(), 0);
    }
}
