//! Shared primitives for the FormPilot automation core.
//!
//! Everything that crosses a crate boundary lives here: identifiers, the
//! action/sequence model produced by the planner, and the classified error
//! type the executors and coordinator agree on.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of an automation sequence, assigned by the planner backend.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub String);

impl SequenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a planner conversation session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Browser tab the automation is bound to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique id stamped on a single dispatched action, for log correlation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One abstract automation step, produced by the planner and consumed exactly
/// once by an executor.
///
/// The wire shape matches the planner backend's sequence JSON:
/// `{"action": "click", "selector": "...", "description": "...", "delay": 500}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "delay", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "delay", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "delay", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "delay", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
}

impl Action {
    /// Stable discriminant string, used in error reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Wait { .. } => "wait",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Action::Navigate { description, .. }
            | Action::Click { description, .. }
            | Action::Type { description, .. }
            | Action::Wait { description, .. } => description.as_deref(),
        }
    }

    /// Post-action settle delay requested by the planner, if any.
    pub fn delay_ms(&self) -> Option<u64> {
        match self {
            Action::Navigate { delay_ms, .. }
            | Action::Click { delay_ms, .. }
            | Action::Type { delay_ms, .. }
            | Action::Wait { delay_ms, .. } => *delay_ms,
        }
    }

    /// Whether executing this action is expected to destroy the page context.
    pub fn causes_navigation(&self) -> bool {
        matches!(self, Action::Navigate { .. })
    }
}

/// Ordered list of actions with an identifier and display name. Read-only
/// during execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(rename = "sequenceId")]
    pub id: SequenceId,
    pub name: String,
    #[serde(rename = "steps")]
    pub actions: Vec<Action>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            id: SequenceId::new(id),
            name: name.into(),
            actions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// One conversation with the planner backend. Created on initialization,
/// touched on every planner round-trip, cleared on stop or a new objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub objective: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_action_at: chrono::DateTime<chrono::Utc>,
}

impl SessionRecord {
    pub fn new(session_id: SessionId, objective: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            session_id,
            objective: objective.into(),
            created_at: now,
            last_action_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_action_at = chrono::Utc::now();
    }
}

/// Classified errors shared across the automation crates.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum AutomationError {
    /// The target selector never resolved before the wait timeout.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Type action targeted an element that cannot accept text.
    #[error("element is not a typeable input: {selector}")]
    InvalidTypingTarget { selector: String },

    /// The wire format carried an action discriminant no executor handles.
    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    /// Catch-all wrapper carrying the failing step's context.
    #[error("action '{action_type}' failed at step {step_index}: {message}")]
    ActionExecution {
        action_type: String,
        message: String,
        step_index: usize,
    },

    /// The enclosing run was stopped while the action was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// Transient page/port failure (DOM flux, dispatch hiccup).
    #[error("page error: {0}")]
    Page(String),

    #[error("{0}")]
    Message(String),
}

impl AutomationError {
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page(message.into())
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap a non-classified failure with step context, leaving already
    /// classified errors untouched.
    pub fn wrap_for_step(self, action_type: &str, step_index: usize) -> Self {
        match self {
            err @ (AutomationError::ElementNotFound { .. }
            | AutomationError::InvalidTypingTarget { .. }
            | AutomationError::UnknownActionType(_)
            | AutomationError::ActionExecution { .. }
            | AutomationError::Cancelled) => err,
            other => AutomationError::ActionExecution {
                action_type: action_type.to_string(),
                message: other.to_string(),
                step_index,
            },
        }
    }

    /// Transient failures are worth a bounded retry inside an executor.
    pub fn is_transient(&self) -> bool {
        matches!(self, AutomationError::Page(_))
    }
}
