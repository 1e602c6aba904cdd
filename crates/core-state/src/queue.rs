//! Suggestion store: the displayed batch plus the backlog behind it.
//!
//! Invariants:
//! * A live suggestion sits in exactly one of `displayed` or `backlog`.
//!   Accepted, rejected and discarded suggestions leave both.
//! * Order is the parser's emission order; batching never reorders.
//! * A new turn replaces everything from the previous turn.
//! * The next batch is only moved in on an explicit `continue_batch` once the
//!   displayed batch has no pending entries left.

use core_diff::{EditSuggestion, SuggestionId, SuggestionStatus};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// Suggestions shown at once unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Queue state after an accept/reject settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The displayed batch still has pending suggestions.
    InProgress,
    /// Batch finished, more are waiting behind a continue action.
    MoreAvailable { remaining: usize },
    /// Nothing left in this turn.
    Complete,
}

#[derive(Debug)]
pub struct SuggestionQueue {
    displayed: Vec<EditSuggestion>,
    backlog: VecDeque<EditSuggestion>,
    batch_size: usize,
    continue_available: bool,
    turn: u64,
    apply_errors: HashMap<SuggestionId, String>,
}

impl Default for SuggestionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SuggestionQueue {
    pub fn new(batch_size: usize) -> Self {
        Self {
            displayed: Vec::new(),
            backlog: VecDeque::new(),
            batch_size: batch_size.max(1),
            continue_available: false,
            turn: 0,
            apply_errors: HashMap::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of assistant turns loaded so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn displayed(&self) -> &[EditSuggestion] {
        &self.displayed
    }

    pub fn backlog(&self) -> impl Iterator<Item = &EditSuggestion> {
        self.backlog.iter()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Displayed suggestions still awaiting a decision, in order.
    pub fn pending(&self) -> impl Iterator<Item = &EditSuggestion> {
        self.displayed.iter().filter(|s| s.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.displayed.iter().any(EditSuggestion::is_pending)
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty() && self.backlog.is_empty()
    }

    pub fn get(&self, id: SuggestionId) -> Option<&EditSuggestion> {
        self.displayed.iter().find(|s| s.id == id)
    }

    fn position(&self, id: SuggestionId) -> Option<usize> {
        self.displayed.iter().position(|s| s.id == id)
    }

    /// Whether the "more suggestions" affordance is showing.
    pub fn continue_available(&self) -> bool {
        self.continue_available
    }

    /// Last failure recorded against a displayed suggestion (retry affordance).
    pub fn apply_error(&self, id: SuggestionId) -> Option<&str> {
        self.apply_errors.get(&id).map(String::as_str)
    }

    /// Replace all state with a new turn's suggestions. An empty turn clears.
    /// Returns the number displayed.
    pub fn load_turn(&mut self, suggestions: Vec<EditSuggestion>) -> usize {
        self.turn += 1;
        self.apply_errors.clear();
        self.continue_available = false;
        let mut all: VecDeque<EditSuggestion> =
            suggestions.into_iter().map(EditSuggestion::into_pending).collect();
        let take = all.len().min(self.batch_size);
        self.displayed = all.drain(..take).collect();
        self.backlog = all;
        debug!(
            target: "state.queue",
            turn = self.turn,
            displayed = self.displayed.len(),
            backlog = self.backlog.len(),
            "turn_loaded"
        );
        self.displayed.len()
    }

    /// Drop every suggestion (plain chat turn, document switch).
    pub fn clear(&mut self) {
        self.load_turn(Vec::new());
    }

    /// Reject a displayed pending suggestion; it leaves the batch immediately.
    pub fn reject(&mut self, id: SuggestionId) -> Option<EditSuggestion> {
        let idx = self.position(id)?;
        if !self.displayed[idx].transition(SuggestionStatus::Rejected) {
            return None;
        }
        self.apply_errors.remove(&id);
        let removed = self.displayed.remove(idx);
        trace!(target: "state.queue", id = %id, "suggestion_rejected");
        Some(removed)
    }

    /// Record a successful application: mark accepted and remove from the batch.
    pub fn complete_accept(&mut self, id: SuggestionId) -> Option<EditSuggestion> {
        let idx = self.position(id)?;
        if !self.displayed[idx].transition(SuggestionStatus::Accepted) {
            return None;
        }
        self.apply_errors.remove(&id);
        let removed = self.displayed.remove(idx);
        trace!(target: "state.queue", id = %id, "suggestion_accepted");
        Some(removed)
    }

    /// Keep a suggestion pending after a failed application and remember why.
    pub fn record_apply_error(&mut self, id: SuggestionId, message: impl Into<String>) {
        if self.get(id).is_some_and(EditSuggestion::is_pending) {
            self.apply_errors.insert(id, message.into());
        }
    }

    /// Remove a displayed suggestion without a terminal decision (stale anchor
    /// that could not be resolved).
    pub fn discard(&mut self, id: SuggestionId) -> Option<EditSuggestion> {
        let idx = self.position(id)?;
        self.apply_errors.remove(&id);
        Some(self.displayed.remove(idx))
    }

    /// Swap a stale suggestion for a freshly resolved one at the same position.
    pub fn replace(&mut self, id: SuggestionId, replacement: EditSuggestion) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        self.apply_errors.remove(&id);
        debug!(target: "state.queue", old = %id, new = %replacement.id, "suggestion_replaced");
        self.displayed[idx] = replacement.into_pending();
        true
    }

    /// Settle the queue after a decision. Never moves suggestions by itself.
    pub fn advance(&mut self) -> Advance {
        if self.has_pending() {
            return Advance::InProgress;
        }
        if self.backlog.is_empty() {
            self.continue_available = false;
            Advance::Complete
        } else {
            self.continue_available = true;
            Advance::MoreAvailable {
                remaining: self.backlog.len(),
            }
        }
    }

    /// User asked for the next batch. Returns how many suggestions moved in.
    pub fn continue_batch(&mut self) -> usize {
        if self.has_pending() || self.backlog.is_empty() {
            return 0;
        }
        let take = self.backlog.len().min(self.batch_size);
        self.displayed = self
            .backlog
            .drain(..take)
            .map(EditSuggestion::into_pending)
            .collect();
        self.continue_available = false;
        debug!(
            target: "state.queue",
            displayed = self.displayed.len(),
            backlog = self.backlog.len(),
            "batch_continued"
        );
        take
    }

    /// Shift anchors of every live suggestion starting at or after `from_line`
    /// by `delta` lines, keeping them at line 1 or later.
    pub fn rebase_from(&mut self, from_line: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        let mut moved = 0usize;
        for s in self.displayed.iter_mut().chain(self.backlog.iter_mut()) {
            if s.start_line >= from_line {
                s.start_line = s.start_line.saturating_add_signed(delta).max(1);
                moved += 1;
            }
        }
        trace!(target: "state.queue", from_line, delta, moved, "anchors_rebased");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestions(n: usize) -> Vec<EditSuggestion> {
        (0..n)
            .map(|i| EditSuggestion::new(format!("o{i}"), format!("s{i}"), i + 1, 1))
            .collect()
    }

    #[test]
    fn load_splits_into_batch_and_backlog() {
        let mut q = SuggestionQueue::new(5);
        assert_eq!(q.load_turn(suggestions(7)), 5);
        assert_eq!(q.displayed().len(), 5);
        assert_eq!(q.backlog_len(), 2);
        assert_eq!(q.turn(), 1);
    }

    #[test]
    fn empty_turn_clears_everything() {
        let mut q = SuggestionQueue::new(5);
        q.load_turn(suggestions(8));
        q.load_turn(Vec::new());
        assert!(q.is_empty());
        assert!(!q.continue_available());
    }

    #[test]
    fn load_forces_pending() {
        let mut q = SuggestionQueue::new(2);
        let mut input = suggestions(3);
        input[0].status = SuggestionStatus::Rejected;
        input[2].status = SuggestionStatus::Accepted;
        q.load_turn(input);
        assert!(q.displayed().iter().all(EditSuggestion::is_pending));
        assert!(q.backlog().all(EditSuggestion::is_pending));
    }

    #[test]
    fn reject_removes_and_is_idempotent() {
        let mut q = SuggestionQueue::new(5);
        q.load_turn(suggestions(2));
        let id = q.displayed()[0].id;
        let removed = q.reject(id).unwrap();
        assert_eq!(removed.status, SuggestionStatus::Rejected);
        assert_eq!(q.displayed().len(), 1);
        assert!(q.reject(id).is_none());
        assert!(q.complete_accept(id).is_none());
    }

    #[test]
    fn continue_requires_explicit_action() {
        let mut q = SuggestionQueue::new(2);
        q.load_turn(suggestions(3));
        let ids: Vec<_> = q.displayed().iter().map(|s| s.id).collect();
        q.reject(ids[0]);
        assert_eq!(q.advance(), Advance::InProgress);
        assert_eq!(q.continue_batch(), 0);
        q.complete_accept(ids[1]);
        assert_eq!(q.advance(), Advance::MoreAvailable { remaining: 1 });
        assert!(q.continue_available());
        assert!(q.displayed().is_empty());
        assert_eq!(q.continue_batch(), 1);
        assert!(!q.continue_available());
        assert_eq!(q.displayed()[0].original, "o2");
        let last = q.displayed()[0].id;
        q.reject(last);
        assert_eq!(q.advance(), Advance::Complete);
    }

    #[test]
    fn apply_error_kept_until_decision() {
        let mut q = SuggestionQueue::new(5);
        q.load_turn(suggestions(1));
        let id = q.displayed()[0].id;
        q.record_apply_error(id, "edit failed");
        assert_eq!(q.apply_error(id), Some("edit failed"));
        assert!(q.get(id).unwrap().is_pending());
        q.complete_accept(id);
        assert_eq!(q.apply_error(id), None);
    }

    #[test]
    fn replace_keeps_position() {
        let mut q = SuggestionQueue::new(5);
        q.load_turn(suggestions(3));
        let stale = q.displayed()[1].id;
        let fresh = EditSuggestion::new("x", "y", 9, 1);
        let fresh_id = fresh.id;
        assert!(q.replace(stale, fresh));
        assert_eq!(q.displayed()[1].id, fresh_id);
        assert!(q.get(stale).is_none());
    }

    #[test]
    fn rebase_shifts_only_later_anchors() {
        let mut q = SuggestionQueue::new(2);
        q.load_turn(vec![
            EditSuggestion::new("a", "b", 2, 1),
            EditSuggestion::new("c", "d", 10, 1),
            EditSuggestion::new("e", "f", 20, 1),
        ]);
        q.rebase_from(5, 3);
        assert_eq!(q.displayed()[0].start_line, 2);
        assert_eq!(q.displayed()[1].start_line, 13);
        assert_eq!(q.backlog().next().unwrap().start_line, 23);
        q.rebase_from(5, -30);
        assert_eq!(q.displayed()[1].start_line, 1);
    }
}
