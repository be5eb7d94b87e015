use tracing::{info, instrument};

use formpilot_core_types::AutomationError;

use crate::model::ExecCtx;
use crate::ports::PagePort;

/// Navigate executor: change the page location and return immediately.
///
/// Navigation destroys the executing context, so load completion is never
/// awaited here; the coordinator observes it through the next content-script
/// readiness announcement.
#[instrument(skip_all, fields(action = %ctx.action_id.0, url))]
pub async fn execute(ctx: &ExecCtx, url: &str, page: &dyn PagePort) -> Result<(), AutomationError> {
    if ctx.cancel.is_cancelled() {
        return Err(AutomationError::Cancelled);
    }
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AutomationError::message("navigation url is empty"));
    }
    info!(url = trimmed, "navigating");
    page.navigate(trimmed).await
}
