//! Exhaustive action dispatch.
//!
//! The match below is the registry: adding an action variant without an
//! executor arm is a compile error, so a silently-missing handler cannot
//! exist. Unknown discriminants can only arrive through raw wire data and
//! are rejected in [`action_from_raw`] with `UnknownActionType`.

use std::time::Duration;

use tracing::debug;

use formpilot_core_types::{Action, AutomationError};

use crate::model::{ExecConfig, ExecCtx};
use crate::ports::{CursorPort, PagePort};
use crate::wait::cancellable_sleep;
use crate::{click, navigate, type_text, wait_step};

/// Execute one action, wrapping any non-classified failure into
/// `ActionExecution` with the step context, and honoring the planner's
/// post-action delay on success.
pub async fn execute_action(
    action: &Action,
    step_index: usize,
    page: &dyn PagePort,
    cursor: &dyn CursorPort,
    cfg: &ExecConfig,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<(), AutomationError> {
    let ctx = ExecCtx::new(step_index, cancel.clone());
    debug!(
        step_index,
        kind = action.kind(),
        description = action.description().unwrap_or(""),
        "executing action"
    );

    let outcome = match action {
        Action::Navigate { url, .. } => navigate::execute(&ctx, url, page).await,
        Action::Click { selector, .. } => {
            click::execute(&ctx, selector, page, cursor, cfg).await
        }
        Action::Type { selector, text, .. } => {
            type_text::execute(&ctx, selector, text, page, cursor, cfg).await
        }
        Action::Wait { delay_ms, .. } => wait_step::execute(&ctx, *delay_ms).await,
    };

    outcome.map_err(|err| err.wrap_for_step(action.kind(), step_index))?;

    if let Some(delay) = action.delay_ms() {
        if delay > 0 {
            cancellable_sleep(Duration::from_millis(delay), cancel).await?;
        }
    }
    Ok(())
}

/// Parse a raw planner step object into an [`Action`], classifying an
/// unrecognized `action` discriminant as `UnknownActionType` instead of a
/// generic parse failure.
pub fn action_from_raw(value: &serde_json::Value) -> Result<Action, AutomationError> {
    let tag = value
        .get("action")
        .and_then(|t| t.as_str())
        .ok_or_else(|| AutomationError::message("step has no 'action' field"))?;
    if !matches!(tag, "navigate" | "click" | "type" | "wait") {
        return Err(AutomationError::UnknownActionType(tag.to_string()));
    }
    serde_json::from_value(value.clone())
        .map_err(|err| AutomationError::message(format!("malformed {tag} step: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NullCursor;
    use crate::testing::SinglePage;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn fast_config() -> ExecConfig {
        let mut cfg = ExecConfig::default();
        cfg.wait.poll_interval = Duration::from_millis(5);
        cfg.wait.element_timeout = Duration::from_millis(40);
        cfg.wait.quiet_window = Duration::from_millis(10);
        cfg.wait.stability_timeout = Duration::from_millis(200);
        cfg.typing.speed_multiplier = 50.0;
        cfg.typing.seed = Some(5);
        cfg
    }

    #[tokio::test]
    async fn classified_errors_pass_through_unwrapped() {
        let page = SinglePage::empty("https://example.com");
        let action = Action::Click {
            selector: "#missing".into(),
            description: None,
            delay_ms: None,
        };
        let err = execute_action(
            &action,
            4,
            &page,
            &NullCursor,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            AutomationError::ElementNotFound {
                selector: "#missing".into()
            }
        );
    }

    #[tokio::test]
    async fn unclassified_failures_are_wrapped_with_step_context() {
        let page = SinglePage::empty("https://example.com");
        let action = Action::Navigate {
            url: "  ".into(),
            description: None,
            delay_ms: None,
        };
        let err = execute_action(
            &action,
            2,
            &page,
            &NullCursor,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            AutomationError::ActionExecution {
                action_type,
                step_index,
                ..
            } => {
                assert_eq!(action_type, "navigate");
                assert_eq!(step_index, 2);
            }
            other => panic!("expected ActionExecution, got {other:?}"),
        }
    }

    #[test]
    fn raw_step_with_unknown_tag_is_unknown_action_type() {
        let raw = json!({"action": "hover", "selector": "#x"});
        assert_eq!(
            action_from_raw(&raw).unwrap_err(),
            AutomationError::UnknownActionType("hover".into())
        );
    }

    #[test]
    fn raw_step_with_known_tag_parses() {
        let raw = json!({
            "action": "type",
            "selector": "#text",
            "text": "Course Registration",
            "delay": 500
        });
        let action = action_from_raw(&raw).unwrap();
        assert_eq!(action.kind(), "type");
        assert_eq!(action.delay_ms(), Some(500));
    }
}
