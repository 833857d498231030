//! Undo/redo history with input coalescing.
//!
//! [`History`] keeps bounded undo and redo stacks of document+selection
//! snapshots. Pushes arriving within `batch_delay_ms` of the last recorded
//! push are coalesced (dropped), so a typing burst costs one entry and undo
//! reaches back past the whole burst. The wall clock is injectable so
//! batching behavior is deterministic under test.
//!
//! The manager never errors: `undo`/`redo` return `None` on empty stacks.
//! Callers own the swap discipline, pushing the pre-undo state onto the
//! opposite stack via [`History::push_redo`]/[`History::push_undo`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::doc_model::Document;
use crate::doc_patch::types::{origin, EditorState, Transaction};
use crate::doc_position::EditorSelection;

// ── Clock ─────────────────────────────────────────────────────────────────

/// Millisecond wall-clock source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A settable clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ── History ───────────────────────────────────────────────────────────────

/// A saved document + selection snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub doc: Document,
    pub selection: EditorSelection,
    pub timestamp: u64,
}

pub struct History<C: Clock = SystemClock> {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
    batch_delay_ms: u64,
    last_push_ms: Option<u64>,
    clock: C,
}

impl History<SystemClock> {
    pub fn with_system_clock(max_entries: usize, batch_delay_ms: u64) -> Self {
        Self::new(max_entries, batch_delay_ms, SystemClock)
    }
}

impl<C: Clock> History<C> {
    pub fn new(max_entries: usize, batch_delay_ms: u64, clock: C) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries,
            batch_delay_ms,
            last_push_ms: None,
            clock,
        }
    }

    /// Record a snapshot, unless the previous recorded push is still inside
    /// the batching window. A recorded push clears the redo stack and
    /// evicts the oldest entry past `max_entries`. The window is anchored
    /// at the last *recorded* push: coalesced pushes do not slide it.
    pub fn push(&mut self, doc: &Document, selection: &EditorSelection) {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_push_ms {
            if now.saturating_sub(last) < self.batch_delay_ms {
                tracing::trace!(target: "richdoc::history", now, last, "push coalesced");
                return;
            }
        }
        self.undo_stack.push(HistoryEntry {
            doc: doc.clone(),
            selection: selection.clone(),
            timestamp: now,
        });
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
        self.last_push_ms = Some(now);
    }

    /// Push straight onto the undo stack (the pre-redo state), bypassing
    /// coalescing and redo clearing.
    pub fn push_undo(&mut self, doc: &Document, selection: &EditorSelection) {
        self.undo_stack.push(HistoryEntry {
            doc: doc.clone(),
            selection: selection.clone(),
            timestamp: self.clock.now_ms(),
        });
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    /// Push straight onto the redo stack (the pre-undo state).
    pub fn push_redo(&mut self, doc: &Document, selection: &EditorSelection) {
        self.redo_stack.push(HistoryEntry {
            doc: doc.clone(),
            selection: selection.clone(),
            timestamp: self.clock.now_ms(),
        });
        if self.redo_stack.len() > self.max_entries {
            self.redo_stack.remove(0);
        }
    }

    pub fn undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop()
    }

    pub fn redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_push_ms = None;
    }

    /// Transaction hook: record the state *before* the transaction applies,
    /// except for history replays and remote edits.
    pub fn on_transaction(&mut self, state_before: &EditorState, tr: &Transaction) {
        if matches!(
            tr.origin.as_str(),
            origin::HISTORY_UNDO | origin::HISTORY_REDO | origin::REMOTE
        ) {
            return;
        }
        self.push(&state_before.doc, &state_before.selection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_model::{Document, SequentialIdGenerator};
    use crate::doc_patch::types::Transaction;
    use crate::doc_position::{EditorSelection, Position};

    fn doc(version: u64) -> Document {
        let ids = SequentialIdGenerator::new(1 + version * 10);
        let mut d = Document::empty(&ids);
        d.version = version;
        d
    }

    #[test]
    fn undo_redo_round_trip_restores_exact_state() {
        let mut h = History::new(10, 0, ManualClock::new(0));
        let sel = EditorSelection::collapsed(Position::new(0, 3));
        let d0 = doc(0);
        h.push(&d0, &sel);

        let entry = h.undo().expect("entry");
        assert_eq!(entry.doc, d0);
        assert_eq!(entry.selection, sel);
        assert!(!h.can_undo());

        // Caller pushes the pre-undo state to redo, then redoes.
        let d1 = doc(1);
        h.push_redo(&d1, &sel);
        assert!(h.can_redo());
        let back = h.redo().expect("entry");
        assert_eq!(back.doc, d1);
        assert!(!h.can_redo());
    }

    #[test]
    fn empty_stacks_return_none() {
        let mut h = History::new(10, 0, ManualClock::new(0));
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
    }

    #[test]
    fn pushes_within_batch_delay_coalesce() {
        let mut h = History::new(100, 500, ManualClock::new(1_000));
        let sel = EditorSelection::default();

        h.push(&doc(0), &sel);
        // Simulate a typing burst: every push inside the window drops.
        for v in 1..5 {
            h.push(&doc(v), &sel);
        }
        assert_eq!(h.undo_stack.len(), 1);
        // The preserved entry is the one taken before the burst.
        assert_eq!(h.undo_stack[0].doc.version, 0);
    }

    #[test]
    fn push_after_window_records_again() {
        let clock = ManualClock::new(1_000);
        let mut h = History::new(100, 500, clock);
        let sel = EditorSelection::default();
        h.push(&doc(0), &sel);
        h.clock.advance(499);
        h.push(&doc(1), &sel); // coalesced
        h.clock.advance(1);
        h.push(&doc(2), &sel); // 500ms since the recorded push
        assert_eq!(h.undo_stack.len(), 2);
        assert_eq!(h.undo_stack[1].doc.version, 2);
    }

    #[test]
    fn coalesced_pushes_do_not_slide_the_window() {
        let clock = ManualClock::new(0);
        let mut h = History::new(100, 500, clock);
        let sel = EditorSelection::default();
        h.push(&doc(0), &sel);
        // Keep typing every 300ms: the window is anchored at the recorded
        // push, so the 600ms push records.
        h.clock.advance(300);
        h.push(&doc(1), &sel);
        h.clock.advance(300);
        h.push(&doc(2), &sel);
        assert_eq!(h.undo_stack.len(), 2);
    }

    #[test]
    fn recorded_push_clears_redo() {
        let mut h = History::new(10, 0, ManualClock::new(0));
        let sel = EditorSelection::default();
        h.push(&doc(0), &sel);
        let _ = h.undo();
        h.push_redo(&doc(1), &sel);
        assert!(h.can_redo());
        h.push(&doc(2), &sel);
        assert!(!h.can_redo());
    }

    #[test]
    fn oldest_entry_evicted_past_max() {
        let clock = ManualClock::new(0);
        let mut h = History::new(3, 0, clock);
        let sel = EditorSelection::default();
        for v in 0..5 {
            h.clock.advance(1);
            h.push(&doc(v), &sel);
        }
        assert_eq!(h.undo_stack.len(), 3);
        assert_eq!(h.undo_stack[0].doc.version, 2);
    }

    #[test]
    fn transaction_hook_skips_history_and_remote_origins() {
        let mut h = History::new(10, 0, ManualClock::new(0));
        let state = EditorState::new(doc(0));

        for skipped in ["history:undo", "history:redo", "remote"] {
            h.on_transaction(&state, &Transaction::new(vec![], skipped, 1));
        }
        assert!(!h.can_undo());

        h.on_transaction(&state, &Transaction::new(vec![], "input", 1));
        assert!(h.can_undo());
    }

    #[test]
    fn clear_empties_everything() {
        let mut h = History::new(10, 0, ManualClock::new(0));
        let sel = EditorSelection::default();
        h.push(&doc(0), &sel);
        h.push_redo(&doc(1), &sel);
        h.clear();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.last_push_ms, None);
    }
}
