//! Authoritative record of an in-flight automation.
//!
//! The store lives in the long-lived background process, never in the
//! per-page content script, because page navigation destroys all page-local
//! state. All mutation goes through the operations here; readers only ever
//! see an immutable [`ProgressSnapshot`], which prevents partial-update
//! races between the state-query read path and the advancement write path.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use formpilot_core_types::{Action, Sequence, TabId};

#[derive(Debug, Default)]
struct ProgressState {
    is_active: bool,
    current_sequence: Option<Sequence>,
    current_step_index: usize,
    pending_actions: Vec<Action>,
    target_tab_id: Option<TabId>,
    last_url: Option<String>,
}

/// Immutable copy of the store handed to readers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub is_active: bool,
    pub current_sequence: Option<Sequence>,
    pub current_step_index: usize,
    pub pending_actions: Vec<Action>,
    pub target_tab_id: Option<TabId>,
    pub last_url: Option<String>,
}

impl ProgressSnapshot {
    /// The next undispatched action, if the run is still going.
    pub fn next_action(&self) -> Option<&Action> {
        self.pending_actions.first()
    }

    pub fn is_complete(&self) -> bool {
        self.is_active && self.pending_actions.is_empty()
    }
}

/// Progress store. Invariants:
///
/// - `pending_actions` is always `current_sequence.actions` sliced from
///   `current_step_index`.
/// - `is_active` is false iff no sequence is loaded.
/// - `current_step_index` only grows, by exactly one per completed step,
///   and never exceeds the sequence length.
#[derive(Default)]
pub struct ProgressStore {
    state: Mutex<ProgressState>,
    /// Last observed navigation target per tab, used to judge whether a
    /// later content-script-ready message matches an expected in-sequence
    /// navigation.
    last_urls: DashMap<TabId, String>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically load a sequence: active, step 0, full action list pending.
    pub fn initialize(&self, sequence: Sequence, tab_id: TabId) {
        let mut state = self.state.lock();
        debug!(sequence = %sequence.id, tab = %tab_id, steps = sequence.len(), "progress initialized");
        state.pending_actions = sequence.actions.clone();
        state.current_sequence = Some(sequence);
        state.current_step_index = 0;
        state.target_tab_id = Some(tab_id);
        state.last_url = None;
        state.is_active = true;
    }

    /// Advance past a confirmed-complete step.
    ///
    /// Idempotent with respect to the completed index: a duplicate
    /// completion notification recomputes the same slice. A stale index
    /// (lower than what has already been passed) is ignored so the step
    /// index stays monotone.
    pub fn advance(&self, completed_step_index: usize) {
        let mut state = self.state.lock();
        if !state.is_active {
            debug!(completed_step_index, "advance ignored; store inactive");
            return;
        }
        let Some(sequence) = state.current_sequence.as_ref() else {
            return;
        };
        let next = (completed_step_index + 1).min(sequence.len());
        if next < state.current_step_index {
            warn!(
                completed_step_index,
                current = state.current_step_index,
                "stale completion ignored"
            );
            return;
        }
        let actions = sequence.actions.clone();
        state.current_step_index = next;
        state.pending_actions = actions[next..].to_vec();
        debug!(
            step = state.current_step_index,
            pending = state.pending_actions.len(),
            "progress advanced"
        );
    }

    /// Track the last observed navigation target for a tab.
    pub fn record_url(&self, tab_id: TabId, url: impl Into<String>) {
        let url = url.into();
        self.last_urls.insert(tab_id, url.clone());
        let mut state = self.state.lock();
        if state.target_tab_id == Some(tab_id) {
            state.last_url = Some(url);
        }
    }

    pub fn last_url(&self, tab_id: TabId) -> Option<String> {
        self.last_urls.get(&tab_id).map(|entry| entry.clone())
    }

    /// Clear everything back to the empty, inactive state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = ProgressState::default();
        debug!("progress reset");
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock();
        ProgressSnapshot {
            is_active: state.is_active,
            current_sequence: state.current_sequence.clone(),
            current_step_index: state.current_step_index,
            pending_actions: state.pending_actions.clone(),
            target_tab_id: state.target_tab_id,
            last_url: state.last_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core_types::Action;

    fn sequence(n: usize) -> Sequence {
        let actions = (0..n)
            .map(|i| Action::Wait {
                description: Some(format!("step {i}")),
                delay_ms: Some(10),
            })
            .collect();
        Sequence::new("seq-1", "Test Sequence", actions)
    }

    #[test]
    fn initialize_populates_everything_atomically() {
        let store = ProgressStore::new();
        store.initialize(sequence(3), TabId(9));
        let snap = store.snapshot();
        assert!(snap.is_active);
        assert_eq!(snap.current_step_index, 0);
        assert_eq!(snap.pending_actions.len(), 3);
        assert_eq!(snap.target_tab_id, Some(TabId(9)));
    }

    #[test]
    fn full_run_advances_in_unit_increments() {
        let n = 5;
        let store = ProgressStore::new();
        store.initialize(sequence(n), TabId(1));
        for step in 0..n {
            let before = store.snapshot();
            assert_eq!(before.current_step_index, step);
            assert_eq!(before.pending_actions.len(), n - step);
            store.advance(step);
            let after = store.snapshot();
            assert_eq!(after.current_step_index, step + 1);
            assert_eq!(after.pending_actions.len(), n - step - 1);
        }
        assert!(store.snapshot().is_complete());
    }

    #[test]
    fn advance_is_idempotent_for_duplicate_completions() {
        let store = ProgressStore::new();
        store.initialize(sequence(4), TabId(1));
        store.advance(0);
        let once = store.snapshot();
        store.advance(0);
        let twice = store.snapshot();
        assert_eq!(once, twice);
    }

    #[test]
    fn stale_completion_never_moves_the_index_backwards() {
        let store = ProgressStore::new();
        store.initialize(sequence(4), TabId(1));
        store.advance(0);
        store.advance(1);
        store.advance(0);
        assert_eq!(store.snapshot().current_step_index, 2);
    }

    #[test]
    fn advance_never_exceeds_sequence_length() {
        let store = ProgressStore::new();
        store.initialize(sequence(2), TabId(1));
        store.advance(7);
        let snap = store.snapshot();
        assert_eq!(snap.current_step_index, 2);
        assert!(snap.pending_actions.is_empty());
    }

    #[test]
    fn advance_on_inactive_store_is_a_noop() {
        let store = ProgressStore::new();
        store.advance(0);
        assert!(!store.snapshot().is_active);
    }

    #[test]
    fn reset_clears_to_inactive() {
        let store = ProgressStore::new();
        store.initialize(sequence(3), TabId(2));
        store.advance(0);
        store.reset();
        let snap = store.snapshot();
        assert!(!snap.is_active);
        assert!(snap.current_sequence.is_none());
        assert_eq!(snap.current_step_index, 0);
        assert!(snap.pending_actions.is_empty());
        assert!(snap.target_tab_id.is_none());
    }

    #[test]
    fn record_url_tracks_per_tab_and_target_tab() {
        let store = ProgressStore::new();
        store.initialize(sequence(1), TabId(3));
        store.record_url(TabId(3), "https://example.com/a");
        store.record_url(TabId(8), "https://example.com/b");
        assert_eq!(
            store.last_url(TabId(3)).as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            store.last_url(TabId(8)).as_deref(),
            Some("https://example.com/b")
        );
        assert_eq!(
            store.snapshot().last_url.as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn snapshots_are_detached_copies() {
        let store = ProgressStore::new();
        store.initialize(sequence(2), TabId(1));
        let mut snap = store.snapshot();
        snap.pending_actions.clear();
        assert_eq!(store.snapshot().pending_actions.len(), 2);
    }
}
