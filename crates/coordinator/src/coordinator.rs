//! Background coordinator state machine.
//!
//! The coordinator owns the run lifecycle. It receives every message the
//! background context sees, mutates the progress store, and returns the
//! messages to send out in response. It never talks to a channel itself,
//! which keeps the whole state machine testable message-by-message.
//!
//! Phases: `Idle -> Running -> (Completed | Failed)`, with a transient
//! `AwaitingContentScript` while a navigation tears the page (and with it
//! the content script) down. Steps are dispatched one at a time; the next
//! step goes out only after the previous one's progress report lands.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use formpilot_core_types::{Sequence, TabId};
use formpilot_progress_store::ProgressStore;
use formpilot_protocol::Message;

use crate::session::SessionManager;

/// Where a run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    /// A navigation destroyed the page's content script; the run is parked
    /// until a fresh instance announces itself.
    AwaitingContentScript,
    Completed,
    Failed,
}

/// A message the coordinator wants delivered.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    ToTab(TabId, Message),
    ToPopup(Message),
}

pub struct Coordinator {
    store: Arc<ProgressStore>,
    sessions: SessionManager,
    phase: RunPhase,
}

impl Coordinator {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            store: Arc::new(ProgressStore::new()),
            sessions,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.store)
    }

    /// Feed one inbound message through the state machine.
    #[instrument(skip_all, fields(message = message.kind()))]
    pub async fn handle(&mut self, message: Message) -> Vec<Outbound> {
        match message {
            Message::ExecuteSequence { sequence, tab_id } => self.start(sequence, tab_id),
            Message::StepProgressUpdate {
                sequence_id,
                completed_step_index,
            } => self.on_step_progress(&sequence_id, completed_step_index),
            Message::NavigationDetected { tab_id, to_url } => {
                self.on_navigation(tab_id, &to_url);
                Vec::new()
            }
            Message::ContentScriptReady { tab_id, url } => self.on_content_ready(tab_id, &url),
            Message::SequenceError {
                sequence_id,
                error,
                step_index,
            } => {
                let snapshot = self.store.snapshot();
                let matches = snapshot
                    .current_sequence
                    .as_ref()
                    .is_some_and(|seq| seq.id == sequence_id);
                if !snapshot.is_active || !matches {
                    // A report for a run that was already stopped or
                    // replaced. The reset state wins.
                    debug!(sequence_id = %sequence_id, "discarding stale error report");
                    return Vec::new();
                }
                warn!(sequence_id = %sequence_id, step_index, %error, "run failed");
                self.store.reset();
                self.phase = RunPhase::Failed;
                vec![Outbound::ToPopup(Message::SequenceError {
                    sequence_id,
                    error,
                    step_index,
                })]
            }
            Message::StopAutomation => {
                info!("stop requested, resetting run state");
                self.store.reset();
                self.phase = RunPhase::Idle;
                if let Err(err) = self.sessions.clear().await {
                    warn!(error = %err, "failed to clear session on stop");
                }
                Vec::new()
            }
            Message::AutomationStateRequest => {
                let snapshot = self.store.snapshot();
                vec![Outbound::ToPopup(Message::AutomationStateResponse {
                    has_active_automation: snapshot.is_active,
                    current_sequence: snapshot.current_sequence,
                    current_step_index: snapshot.current_step_index,
                    pending_actions: snapshot.pending_actions,
                })]
            }
            Message::InitSession { objective } => {
                let response = match self.sessions.initialize(&objective).await {
                    Ok(session_id) => Message::InitSessionResponse {
                        session_id: Some(session_id),
                        success: true,
                        error: None,
                    },
                    Err(err) => Message::InitSessionResponse {
                        session_id: None,
                        success: false,
                        error: Some(err.to_string()),
                    },
                };
                vec![Outbound::ToPopup(response)]
            }
            Message::StartAutomation { objective } => {
                // A new objective always gets a fresh planner session.
                let response = match self.sessions.initialize(&objective).await {
                    Ok(session_id) => Message::StartAutomationResponse {
                        session_id: Some(session_id),
                        success: true,
                        error: None,
                    },
                    Err(err) => Message::StartAutomationResponse {
                        session_id: None,
                        success: false,
                        error: Some(err.to_string()),
                    },
                };
                vec![Outbound::ToPopup(response)]
            }
            other => {
                debug!(message = other.kind(), "coordinator ignoring message");
                Vec::new()
            }
        }
    }

    fn start(&mut self, sequence: Sequence, tab_id: TabId) -> Vec<Outbound> {
        info!(sequence_id = %sequence.id, steps = sequence.actions.len(), tab = tab_id.0, "starting run");
        self.store.initialize(sequence, tab_id);
        self.phase = RunPhase::Running;
        self.dispatch_next(tab_id)
    }

    fn on_step_progress(
        &mut self,
        sequence_id: &formpilot_core_types::SequenceId,
        completed_step_index: usize,
    ) -> Vec<Outbound> {
        let snapshot = self.store.snapshot();
        let matches = snapshot
            .current_sequence
            .as_ref()
            .is_some_and(|seq| &seq.id == sequence_id);
        if !snapshot.is_active || !matches {
            debug!(sequence_id = %sequence_id, "discarding stale progress report");
            return Vec::new();
        }
        self.store.advance(completed_step_index);

        let snapshot = self.store.snapshot();
        if snapshot.is_complete() {
            return self.finish();
        }
        if self.phase == RunPhase::AwaitingContentScript {
            // The page is (about to be) gone. The advanced index is parked
            // in the store; the next content script resumes from it.
            debug!(
                step_index = snapshot.current_step_index,
                "progress recorded while awaiting content script"
            );
            return Vec::new();
        }
        match snapshot.target_tab_id {
            Some(tab) => self.dispatch_next(tab),
            None => Vec::new(),
        }
    }

    fn on_navigation(&mut self, tab_id: TabId, to_url: &str) {
        self.store.record_url(tab_id, to_url);
        let snapshot = self.store.snapshot();
        if snapshot.is_active && snapshot.target_tab_id == Some(tab_id) {
            debug!(to_url, "navigation on target tab, parking dispatch");
            self.phase = RunPhase::AwaitingContentScript;
        }
    }

    fn on_content_ready(&mut self, tab_id: TabId, url: &str) -> Vec<Outbound> {
        let snapshot = self.store.snapshot();
        if !snapshot.is_active || snapshot.target_tab_id != Some(tab_id) {
            debug!(tab = tab_id.0, "content script ready, no run to resume");
            return Vec::new();
        }
        if let Some(expected) = &snapshot.last_url {
            if expected != url {
                // Resume anyway: redirects and URL rewrites are routine.
                warn!(expected = %expected, actual = url, "content script URL differs from last recorded URL");
            }
        }
        info!(step_index = snapshot.current_step_index, "content script ready, resuming run");
        self.phase = RunPhase::Running;
        if snapshot.is_complete() {
            return self.finish();
        }
        self.dispatch_next(tab_id)
    }

    /// Send exactly the current step to the tab. If the step will tear the
    /// page down, park the run before the report even arrives.
    fn dispatch_next(&mut self, tab_id: TabId) -> Vec<Outbound> {
        let snapshot = self.store.snapshot();
        let Some(sequence) = snapshot.current_sequence.as_ref() else {
            return Vec::new();
        };
        let Some(action) = snapshot.next_action() else {
            return self.finish();
        };
        if action.causes_navigation() {
            self.phase = RunPhase::AwaitingContentScript;
        }
        debug!(
            step_index = snapshot.current_step_index,
            kind = action.kind(),
            "dispatching step"
        );
        vec![Outbound::ToTab(
            tab_id,
            Message::ExecuteStep {
                sequence_id: sequence.id.clone(),
                step_index: snapshot.current_step_index,
                action: action.clone(),
            },
        )]
    }

    fn finish(&mut self) -> Vec<Outbound> {
        let snapshot = self.store.snapshot();
        let Some(sequence) = snapshot.current_sequence else {
            return Vec::new();
        };
        info!(sequence_id = %sequence.id, "run complete");
        self.store.reset();
        self.phase = RunPhase::Completed;
        vec![Outbound::ToPopup(Message::SequenceComplete {
            sequence_id: sequence.id,
        })]
    }
}
