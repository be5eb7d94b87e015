use std::time::Duration;

use tracing::{debug, instrument};

use formpilot_core_types::AutomationError;

use crate::model::{validate_selector, ExecConfig, ExecCtx};
use crate::ports::{CursorPort, PagePort};
use crate::tempo::{plan_typing, scale};
use crate::wait::{cancellable_sleep, wait_for_element, wait_for_page_stabilization};

/// Type executor: wait for the target, validate it can accept text, clear it
/// with simulated backspaces, then insert characters one at a time on a
/// human-like cadence. Each keystroke fires the port's input-changed
/// notification so page-side reactive frameworks observe incremental typing.
#[instrument(skip_all, fields(action = %ctx.action_id.0, selector, chars = text.chars().count()))]
pub async fn execute(
    ctx: &ExecCtx,
    selector: &str,
    text: &str,
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

    if !page.element_kind(&element).await?.is_text_capable() {
        return Err(AutomationError::InvalidTypingTarget {
            selector: selector.to_string(),
        });
    }

    cursor.move_to(&element).await;
    page.focus(&element).await?;
    page.dispatch_click(&element).await?;

    // Clear whatever is already there, one backspace per character.
    let existing = page.value(&element).await?;
    let backspace_delay = Duration::from_millis(scale(
        cfg.typing.backspace_delay_ms,
        cfg.typing.speed_multiplier.max(f64::MIN_POSITIVE),
    ));
    for _ in 0..existing.chars().count() {
        cancellable_sleep(backspace_delay, &ctx.cancel).await?;
        page.delete_backward(&element).await?;
    }

    let plan = plan_typing(text, &cfg.typing);
    debug!(total_delay_ms = plan.total_delay_ms(), "typing plan built");
    for step in &plan.steps {
        cancellable_sleep(Duration::from_millis(step.delay_ms), &ctx.cancel).await?;
        page.insert_char(&element, step.ch).await?;
    }

    wait_for_page_stabilization(page, &cfg.wait, &ctx.cancel).await
}
