use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use automation_coordinator::{FileStore, SessionManager};
use formpilot_cli::{run_sequence, sequence_for, DemoKind, HarnessOptions, RunOutcome};
use formpilot_core_types::Sequence;
use planner_client::{
    planner_turn_to_directives, NextActionRequest, PlannerClient, PlannerConfig, VisibleElement,
};

#[derive(Parser)]
#[command(name = "formpilot", version, about = "Planner-driven web form automation")]
struct Cli {
    /// Log filter, e.g. `info` or `action_exec=debug`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run a sequence JSON file against a simulated page.
    Run {
        /// Path to a sequence file (`{"sequenceId": ..., "steps": [...]}`).
        sequence: PathBuf,
        /// URL the simulated page starts on.
        #[arg(long)]
        start_url: Option<String>,
        /// Pin the typing randomness for reproducible timing.
        #[arg(long)]
        seed: Option<u64>,
        /// Typing speed multiplier; 2.0 types twice as fast.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Clamp planner delays so the run finishes quickly.
        #[arg(long)]
        fast: bool,
    },
    /// Dry-run one of the canned demo sequences.
    Demo {
        #[arg(value_enum)]
        kind: DemoKind,
        #[arg(long)]
        fast: bool,
    },
    /// Open a planner session and fetch the first turn.
    Plan {
        /// Planner backend base URL.
        #[arg(long)]
        backend: Url,
        /// What the automation should accomplish.
        #[arg(long)]
        objective: String,
        /// File with one visible element's outer HTML per line.
        #[arg(long)]
        elements: Option<PathBuf>,
        /// Discard any persisted session and open a new one.
        #[arg(long)]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Run {
            sequence,
            start_url,
            seed,
            speed,
            fast,
        } => {
            let raw = std::fs::read_to_string(&sequence)
                .with_context(|| format!("reading {}", sequence.display()))?;
            let sequence: Sequence =
                serde_json::from_str(&raw).context("sequence file is not valid sequence JSON")?;
            let opts = HarnessOptions {
                start_url,
                seed,
                speed,
                fast,
            };
            report(run_sequence(sequence, &opts).await?)
        }
        Command::Demo { kind, fast } => {
            let opts = HarnessOptions {
                fast,
                ..Default::default()
            };
            report(run_sequence(sequence_for(kind), &opts).await?)
        }
        Command::Plan {
            backend,
            objective,
            elements,
            fresh,
        } => plan(backend, &objective, elements.as_deref(), fresh).await,
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.to_owned()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn report(report: formpilot_cli::RunReport) -> Result<()> {
    match &report.outcome {
        RunOutcome::Completed => {
            info!(
                sequence_id = %report.sequence_id,
                steps = report.steps,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "run completed"
            );
            println!(
                "completed {} ({} steps) in {:.2}s",
                report.sequence_id,
                report.steps,
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        RunOutcome::Failed { step_index, error } => {
            bail!(
                "sequence {} failed at step {}: {}",
                report.sequence_id,
                step_index,
                error
            )
        }
    }
}

async fn plan(
    backend: Url,
    objective: &str,
    elements: Option<&std::path::Path>,
    fresh: bool,
) -> Result<()> {
    let client = Arc::new(PlannerClient::new(PlannerConfig::new(backend))?);
    let store = Arc::new(FileStore::new(session_dir())?);
    let mut sessions = SessionManager::new(store, client.clone());
    if fresh {
        sessions.clear().await?;
    }

    // Repeated invocations continue the same planner conversation; the
    // persisted record carries the session across processes.
    let session_id = match sessions.current_session_id().await {
        Some(id) => {
            println!("resuming session: {id}");
            id
        }
        None => {
            let id = sessions.initialize(objective).await?;
            println!("session: {id}");
            id
        }
    };

    let Some(path) = elements else {
        return Ok(());
    };
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let visible: Vec<VisibleElement> = html
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| VisibleElement {
            // Without a live page there is nothing to resolve against, so
            // index-based placeholder selectors stand in.
            selector: format!("[data-element-index=\"{i}\"]"),
            html: line.trim().to_owned(),
        })
        .collect();

    let request = NextActionRequest {
        session_id: session_id.to_string(),
        visible_elements_html: visible.iter().map(|e| e.html.clone()).collect(),
        last_turn_outcome: Vec::new(),
        user_response: None,
    };
    let turn = client.next_action(&request).await?;
    sessions.touch().await?;
    if !turn.overall_explanation.is_empty() {
        println!("planner: {}", turn.overall_explanation);
    }
    for directive in planner_turn_to_directives(&turn, &visible)? {
        println!("- {directive:?}");
    }
    Ok(())
}

fn session_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("formpilot")
}
