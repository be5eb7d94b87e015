use std::time::Duration;

use tracing::instrument;

use formpilot_core_types::AutomationError;

use crate::model::ExecCtx;
use crate::wait::cancellable_sleep;

/// Wait executor: plain cancellable sleep. A missing or zero delay is a
/// no-op.
#[instrument(skip_all, fields(action = %ctx.action_id.0, delay_ms))]
pub async fn execute(ctx: &ExecCtx, delay_ms: Option<u64>) -> Result<(), AutomationError> {
    match delay_ms {
        Some(ms) if ms > 0 => cancellable_sleep(Duration::from_millis(ms), &ctx.cancel).await,
        _ => Ok(()),
    }
}
