//! Element wait and DOM stabilization primitives.
//!
//! Form-builder pages are highly dynamic SPAs, so fixed sleeps are
//! unreliable. Stability is inferred from mutation silence: the page is
//! considered settled once its mutation counter has stood still for a quiet
//! window, with a hard cap so an eternally-mutating page (live telemetry
//! widgets and the like) cannot stall the pipeline forever.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use formpilot_core_types::AutomationError;

use crate::ports::{ElementHandle, PagePort, ReadyState};

#[derive(Clone, Debug)]
pub struct WaitConfig {
    /// Fixed polling interval for element and readiness checks.
    pub poll_interval: Duration,
    /// How long an element may take to appear before the caller decides.
    pub element_timeout: Duration,
    /// Mutation silence required before the page counts as stable.
    pub quiet_window: Duration,
    /// Hard cap on any stabilization wait.
    pub stability_timeout: Duration,
    /// Consecutive quiet samples required after a navigation before the new
    /// document counts as stable. Debounces staggered async renders.
    pub stable_polls: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            element_timeout: Duration::from_secs(10),
            quiet_window: Duration::from_millis(500),
            stability_timeout: Duration::from_secs(10),
            stable_polls: 3,
        }
    }
}

/// Poll until `selector` resolves or `timeout` elapses.
///
/// Returns `None` on timeout rather than erroring; whether a missing element
/// is fatal is the caller's decision.
pub async fn wait_for_element(
    page: &dyn PagePort,
    selector: &str,
    timeout: Duration,
    cfg: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<Option<ElementHandle>, AutomationError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(element) = page.query(selector).await? {
            return Ok(Some(element));
        }
        if Instant::now() >= deadline {
            debug!(selector, "element did not appear before timeout");
            return Ok(None);
        }
        tick(cfg.poll_interval, cancel).await?;
    }
}

/// Wait until no DOM mutation has been observed for `cfg.quiet_window`.
///
/// Resolves Ok even when the hard cap fires; a page that never goes quiet is
/// treated as "as stable as it gets", not as a failure.
pub async fn wait_for_page_stabilization(
    page: &dyn PagePort,
    cfg: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<(), AutomationError> {
    let started = Instant::now();
    let mut last_count = page.mutation_count().await?;
    let mut quiet_since = Instant::now();

    loop {
        tick(cfg.poll_interval, cancel).await?;

        let count = page.mutation_count().await?;
        if count != last_count {
            last_count = count;
            quiet_since = Instant::now();
        } else if quiet_since.elapsed() >= cfg.quiet_window {
            return Ok(());
        }

        if started.elapsed() >= cfg.stability_timeout {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "page never went quiet; giving up on stabilization"
            );
            return Ok(());
        }
    }
}

/// Wait for a fresh document to be usable: `readyState === "complete"` first,
/// then several consecutive quiet samples rather than a single one.
pub async fn wait_for_navigation_complete(
    page: &dyn PagePort,
    cfg: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<(), AutomationError> {
    let started = Instant::now();
    loop {
        if matches!(page.ready_state().await?, ReadyState::Complete) {
            break;
        }
        if started.elapsed() >= cfg.stability_timeout {
            warn!("document never reached readyState complete");
            break;
        }
        tick(cfg.poll_interval, cancel).await?;
    }

    let mut quiet_streak = 0u32;
    let mut last_count = page.mutation_count().await?;
    loop {
        tick(cfg.poll_interval, cancel).await?;

        let count = page.mutation_count().await?;
        if count == last_count {
            quiet_streak += 1;
            if quiet_streak >= cfg.stable_polls {
                return Ok(());
            }
        } else {
            quiet_streak = 0;
            last_count = count;
        }

        if started.elapsed() >= cfg.stability_timeout {
            warn!("navigation stabilization hit the hard cap");
            return Ok(());
        }
    }
}

/// One cancellable poll-interval sleep.
async fn tick(interval: Duration, cancel: &CancellationToken) -> Result<(), AutomationError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AutomationError::Cancelled),
        _ = sleep(interval) => Ok(()),
    }
}

/// Cancellable flat sleep used by the wait action and post-action delays.
pub(crate) async fn cancellable_sleep(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), AutomationError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AutomationError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
