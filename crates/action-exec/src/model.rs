use tokio_util::sync::CancellationToken;

use formpilot_core_types::{ActionId, AutomationError};

use crate::wait::WaitConfig;

/// Per-action execution context threaded through every executor.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub action_id: ActionId,
    pub step_index: usize,
    pub cancel: CancellationToken,
}

impl ExecCtx {
    pub fn new(step_index: usize, cancel: CancellationToken) -> Self {
        Self {
            action_id: ActionId::new(),
            step_index,
            cancel,
        }
    }
}

/// Typing cadence knobs. Delays are randomized per character; the optional
/// seed pins the randomness for deterministic tests and replays.
#[derive(Clone, Debug)]
pub struct TypingConfig {
    /// Multiplier applied to all typing delays. 2.0 types twice as fast.
    pub speed_multiplier: f64,
    /// Base inter-character delay range in milliseconds before scaling.
    pub char_delay_ms: (u64, u64),
    /// Chance of a longer "thinking" pause after a character.
    pub pause_probability: f64,
    /// Pause length range in milliseconds before scaling.
    pub pause_ms: (u64, u64),
    /// Delay between simulated backspaces while clearing a field.
    pub backspace_delay_ms: u64,
    pub seed: Option<u64>,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            char_delay_ms: (40, 120),
            pause_probability: 0.1,
            pause_ms: (250, 600),
            backspace_delay_ms: 25,
            seed: None,
        }
    }
}

/// Bundle of tuning for the whole engine.
#[derive(Clone, Debug)]
pub struct ExecConfig {
    pub wait: WaitConfig,
    pub typing: TypingConfig,
    /// Click dispatch attempts before a transient page error surfaces.
    pub click_attempts: u32,
    /// Pause between click dispatch retries.
    pub click_retry_delay_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            wait: WaitConfig::default(),
            typing: TypingConfig::default(),
            click_attempts: 2,
            click_retry_delay_ms: 150,
        }
    }
}

/// Trim-only selector validation. Selectors may be arbitrarily complex, so
/// no structural checks are applied; only the empty string is rejected.
pub fn validate_selector(selector: &str) -> Result<&str, AutomationError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(AutomationError::message("selector is empty"));
    }
    Ok(trimmed)
}
