//! Dry-run harness: execute a sequence end to end against a simulated page.
//!
//! The harness provisions a page world from the sequence itself: every
//! selector a step references exists on every document, and every navigate
//! target is a registered document. That makes any well-formed sequence
//! runnable without a browser, which is what a dry run is for: exercising
//! the full pipeline (coordinator, content scripts, waits, typing cadence)
//! and timing it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::info;

use action_exec::ExecConfig;
use automation_coordinator::{
    spawn, Coordinator, MemoryStore, RuntimeConfig, SessionManager, SessionPlanner,
};
use formpilot_core_types::{Action, Sequence, SessionId, TabId};
use formpilot_protocol::Message;
use page_sim::{DocumentSpec, ElementSpec, RecordingCursor, SimPage, SimPageBuilder};
use planner_client::ApiError;

const RUN_DEADLINE: Duration = Duration::from_secs(300);
const FAST_DELAY_CAP_MS: u64 = 50;

#[derive(Clone, Debug)]
pub struct HarnessOptions {
    pub start_url: Option<String>,
    pub seed: Option<u64>,
    pub speed: f64,
    /// Clamp planner-specified post-action delays for quick iterations.
    pub fast: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            start_url: None,
            seed: None,
            speed: 1.0,
            fast: false,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub sequence_id: String,
    pub steps: usize,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed { step_index: usize, error: String },
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }
}

/// Dry runs never talk to a backend; the coordinator still wants a session
/// manager, so give it one that answers locally.
struct LocalPlanner;

#[async_trait]
impl SessionPlanner for LocalPlanner {
    async fn init_session(&self, _objective: &str) -> Result<SessionId, ApiError> {
        Ok(SessionId::generate())
    }
}

pub async fn run_sequence(mut sequence: Sequence, opts: &HarnessOptions) -> Result<RunReport> {
    if opts.fast {
        for action in &mut sequence.actions {
            clamp_delay(action);
        }
    }

    let page = provision_page(&sequence, opts.start_url.as_deref());
    let cursor = Arc::new(RecordingCursor::default());

    let mut exec = ExecConfig::default();
    exec.typing.seed = opts.seed;
    if opts.speed > 0.0 {
        exec.typing.speed_multiplier = opts.speed;
    }
    if opts.fast {
        exec.wait.quiet_window = Duration::from_millis(30);
        exec.wait.poll_interval = Duration::from_millis(10);
    }

    let sessions = SessionManager::new(Arc::new(MemoryStore::new()), Arc::new(LocalPlanner));
    let mut handle = spawn(
        Coordinator::new(sessions),
        page.clone(),
        cursor,
        TabId(1),
        RuntimeConfig {
            exec,
            channel_capacity: 64,
        },
    );

    let sequence_id = sequence.id.to_string();
    let steps = sequence.actions.len();
    info!(sequence_id = %sequence_id, steps, "starting dry run");
    let started = Instant::now();
    handle
        .send(Message::ExecuteSequence {
            sequence,
            tab_id: TabId(1),
        })
        .await;

    let outcome = loop {
        let message = timeout(RUN_DEADLINE, handle.recv_popup())
            .await
            .context("run deadline exceeded")?;
        match message {
            Some(Message::SequenceComplete { .. }) => break RunOutcome::Completed,
            Some(Message::SequenceError {
                error, step_index, ..
            }) => {
                break RunOutcome::Failed {
                    step_index,
                    error: error.to_string(),
                }
            }
            Some(other) => info!(message = other.kind(), "popup message"),
            None => bail!("background task ended before the run finished"),
        }
    };
    let elapsed = started.elapsed();
    handle.shutdown().await;

    Ok(RunReport {
        sequence_id,
        steps,
        elapsed,
        outcome,
    })
}

fn clamp_delay(action: &mut Action) {
    let delay = match action {
        Action::Navigate { delay_ms, .. }
        | Action::Click { delay_ms, .. }
        | Action::Type { delay_ms, .. }
        | Action::Wait { delay_ms, .. } => delay_ms,
    };
    if let Some(ms) = delay {
        *ms = (*ms).min(FAST_DELAY_CAP_MS);
    }
}

fn provision_page(sequence: &Sequence, start_url: Option<&str>) -> Arc<SimPage> {
    let mut clicked = BTreeSet::new();
    let mut typed = BTreeSet::new();
    let mut nav_targets = Vec::new();
    for action in &sequence.actions {
        match action {
            Action::Click { selector, .. } => {
                clicked.insert(selector.clone());
            }
            Action::Type { selector, .. } => {
                typed.insert(selector.clone());
            }
            Action::Navigate { url, .. } => nav_targets.push(url.clone()),
            Action::Wait { .. } => {}
        }
    }

    let elements = || -> Vec<ElementSpec> {
        let mut specs: Vec<ElementSpec> = typed
            .iter()
            .map(|s| ElementSpec::text_input(s.clone()))
            .collect();
        specs.extend(
            clicked
                .iter()
                .filter(|s| !typed.contains(*s))
                .map(|s| ElementSpec::button(s.clone())),
        );
        specs
    };

    let start = start_url
        .map(str::to_owned)
        .unwrap_or_else(|| "https://dry-run.formpilot.local/start".to_owned());
    let mut builder =
        SimPageBuilder::new(start.clone()).document(start, DocumentSpec::new(elements()));
    for url in nav_targets {
        builder = builder.document(url, DocumentSpec::new(elements()));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_completes_a_mixed_sequence() {
        let sequence = Sequence::new(
            "dry-run",
            "Mixed steps",
            vec![
                Action::Navigate {
                    url: "https://app.test/builder".into(),
                    description: None,
                    delay_ms: Some(2000),
                },
                Action::Type {
                    selector: "#text".into(),
                    text: "Course Registration".into(),
                    description: None,
                    delay_ms: Some(500),
                },
                Action::Click {
                    selector: "#question-settings-close-btn".into(),
                    description: None,
                    delay_ms: Some(500),
                },
            ],
        );
        let opts = HarnessOptions {
            fast: true,
            seed: Some(7),
            speed: 25.0,
            ..Default::default()
        };
        let report = run_sequence(sequence, &opts).await.unwrap();
        assert!(report.succeeded(), "outcome: {:?}", report.outcome);
        assert_eq!(report.steps, 3);
    }

    #[tokio::test]
    async fn dry_run_reports_failures_with_the_step() {
        let sequence = Sequence::new(
            "dry-run-fail",
            "Click a blank selector",
            vec![
                Action::Wait {
                    description: None,
                    delay_ms: Some(10),
                },
                Action::Click {
                    selector: "   ".into(),
                    description: None,
                    delay_ms: None,
                },
            ],
        );
        let report = run_sequence(sequence, &HarnessOptions::default())
            .await
            .unwrap();
        match report.outcome {
            RunOutcome::Failed { step_index, .. } => assert_eq!(step_index, 1),
            RunOutcome::Completed => panic!("blank selector should fail the run"),
        }
    }
}
