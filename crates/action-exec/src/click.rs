use std::time::Duration;

use tracing::{debug, instrument};

use formpilot_core_types::AutomationError;

use crate::model::{validate_selector, ExecConfig, ExecCtx};
use crate::ports::{CursorPort, PagePort};
use crate::wait::{cancellable_sleep, wait_for_element, wait_for_page_stabilization};

/// Click executor: wait for the target, move the simulated cursor, dispatch
/// a genuine click, then wait for the page to settle.
///
/// The click may trigger navigation; the caller must not assume the DOM is
/// unchanged after this returns.
#[instrument(skip_all, fields(action = %ctx.action_id.0, selector))]
pub async fn execute(
    ctx: &ExecCtx,
    selector: &str,
    page: &dyn PagePort,
    cursor: &dyn CursorPort,
    cfg: &ExecConfig,
) -> Result<(), AutomationError> {
    let selector = validate_selector(selector)?;

    let element = wait_for_element(page, selector, cfg.wait.element_timeout, &cfg.wait, &ctx.cancel)
        .await?
        .ok_or_else(|| AutomationError::ElementNotFound {
            selector: selector.to_string(),
        })?;

    cursor.move_to(&element).await;
    cursor.click_pulse(&element).await;

    // Transient DOM flux around dispatch gets a small bounded retry; a
    // clearly classified failure surfaces immediately.
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match page.dispatch_click(&element).await {
            Ok(()) => break,
            Err(err) if err.is_transient() && attempt < cfg.click_attempts.max(1) => {
                debug!(attempt, error = %err, "click dispatch flaked; retrying");
                cancellable_sleep(Duration::from_millis(cfg.click_retry_delay_ms), &ctx.cancel)
                    .await?;
            }
            Err(err) => return Err(err),
        }
    }

    wait_for_page_stabilization(page, &cfg.wait, &ctx.cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SinglePage;
    use tokio_util::sync::CancellationToken;

    use crate::ports::NullCursor;

    fn fast_config() -> ExecConfig {
        let mut cfg = ExecConfig::default();
        cfg.wait.poll_interval = Duration::from_millis(5);
        cfg.wait.element_timeout = Duration::from_millis(50);
        cfg.wait.quiet_window = Duration::from_millis(10);
        cfg.wait.stability_timeout = Duration::from_millis(200);
        cfg
    }

    #[tokio::test]
    async fn missing_element_is_element_not_found_never_silent_success() {
        let page = SinglePage::empty("https://example.com");
        let ctx = ExecCtx::new(0, CancellationToken::new());
        let err = execute(&ctx, "#never", &page, &NullCursor, &fast_config())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AutomationError::ElementNotFound {
                selector: "#never".into()
            }
        );
    }

    #[tokio::test]
    async fn click_dispatches_and_settles() {
        let page = SinglePage::with_button("https://example.com", "#go");
        let ctx = ExecCtx::new(0, CancellationToken::new());
        execute(&ctx, "#go", &page, &NullCursor, &fast_config())
            .await
            .unwrap();
        assert_eq!(page.clicks("#go"), 1);
    }

    #[tokio::test]
    async fn transient_dispatch_failure_is_retried_once() {
        let page = SinglePage::with_button("https://example.com", "#go");
        page.fail_next_click();
        let ctx = ExecCtx::new(0, CancellationToken::new());
        execute(&ctx, "#go", &page, &NullCursor, &fast_config())
            .await
            .unwrap();
        assert_eq!(page.clicks("#go"), 1);
    }

    #[tokio::test]
    async fn cancellation_surfaces_mid_wait() {
        let page = SinglePage::empty("https://example.com");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ExecCtx::new(0, cancel);
        let err = execute(&ctx, "#never", &page, &NullCursor, &fast_config())
            .await
            .unwrap_err();
        assert_eq!(err, AutomationError::Cancelled);
    }
}
