//! Wire contract for the runtime messaging channel.
//!
//! Every message is a JSON object discriminated by its `type` field. The
//! popup, the background coordinator, and the per-page content script all
//! speak this contract and nothing else; there is no shared memory between
//! the three contexts.
//!
//! Unknown `type` tags are tolerated rather than fatal so that version skew
//! between contexts degrades gracefully: [`Message::parse`] returns
//! `Ok(None)` for a well-formed envelope whose tag this build does not know.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use formpilot_core_types::{Action, AutomationError, Sequence, SequenceId, SessionId, TabId};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message has no string 'type' field")]
    MissingType,
}

/// All messages exchanged over the runtime channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// popup -> background: start a run on the given tab.
    ExecuteSequence { sequence: Sequence, tab_id: TabId },

    /// background -> content: execute exactly one step.
    ExecuteStep {
        sequence_id: SequenceId,
        step_index: usize,
        action: Action,
    },

    /// popup -> background: abort whatever is in flight.
    StopAutomation,

    /// content -> background: a (re)loaded content script announces itself.
    ContentScriptReady { tab_id: TabId, url: String },

    /// content -> background: in-page navigation observed.
    NavigationDetected { tab_id: TabId, to_url: String },

    /// content -> background: a step finished successfully.
    StepProgressUpdate {
        sequence_id: SequenceId,
        completed_step_index: usize,
    },

    /// background -> popup: the run finished; every step completed.
    SequenceComplete { sequence_id: SequenceId },

    /// content -> background: terminal failure at a step.
    SequenceError {
        sequence_id: SequenceId,
        error: AutomationError,
        step_index: usize,
    },

    /// popup -> background: introspection request.
    AutomationStateRequest,

    /// background -> popup: store snapshot for the popup UI.
    AutomationStateResponse {
        has_active_automation: bool,
        current_sequence: Option<Sequence>,
        current_step_index: usize,
        pending_actions: Vec<Action>,
    },

    /// popup -> background: open a planner session for an objective.
    InitSession { objective: String },

    /// background -> popup: planner session outcome.
    InitSessionResponse {
        session_id: Option<SessionId>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// popup -> background: ask the planner for the next actions and run them.
    StartAutomation { objective: String },

    /// background -> popup: start outcome.
    StartAutomationResponse {
        session_id: Option<SessionId>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Message {
    /// Parse a raw channel payload.
    ///
    /// Returns `Ok(None)` when the envelope is valid JSON with a string
    /// `type` tag this build does not recognize; the caller logs and drops
    /// it. Malformed payloads (bad JSON, missing tag, wrong field shapes for
    /// a known tag) are errors.
    pub fn parse(raw: &str) -> Result<Option<Message>, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))?;
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingType)?;
        if !KNOWN_TYPES.contains(&tag) {
            warn!(message_type = tag, "ignoring unknown message type");
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| ProtocolError::Malformed(err.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Serialization of these enums cannot fail: no non-string map keys,
        // no non-serializable payloads.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ExecuteSequence { .. } => "EXECUTE_SEQUENCE",
            Message::ExecuteStep { .. } => "EXECUTE_STEP",
            Message::StopAutomation => "STOP_AUTOMATION",
            Message::ContentScriptReady { .. } => "CONTENT_SCRIPT_READY",
            Message::NavigationDetected { .. } => "NAVIGATION_DETECTED",
            Message::StepProgressUpdate { .. } => "STEP_PROGRESS_UPDATE",
            Message::SequenceComplete { .. } => "SEQUENCE_COMPLETE",
            Message::SequenceError { .. } => "SEQUENCE_ERROR",
            Message::AutomationStateRequest => "AUTOMATION_STATE_REQUEST",
            Message::AutomationStateResponse { .. } => "AUTOMATION_STATE_RESPONSE",
            Message::InitSession { .. } => "INIT_SESSION",
            Message::InitSessionResponse { .. } => "INIT_SESSION_RESPONSE",
            Message::StartAutomation { .. } => "START_AUTOMATION",
            Message::StartAutomationResponse { .. } => "START_AUTOMATION_RESPONSE",
        }
    }
}

const KNOWN_TYPES: &[&str] = &[
    "EXECUTE_SEQUENCE",
    "EXECUTE_STEP",
    "STOP_AUTOMATION",
    "CONTENT_SCRIPT_READY",
    "NAVIGATION_DETECTED",
    "STEP_PROGRESS_UPDATE",
    "SEQUENCE_COMPLETE",
    "SEQUENCE_ERROR",
    "AUTOMATION_STATE_REQUEST",
    "AUTOMATION_STATE_RESPONSE",
    "INIT_SESSION",
    "INIT_SESSION_RESPONSE",
    "START_AUTOMATION",
    "START_AUTOMATION_RESPONSE",
];

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core_types::Action;

    #[test]
    fn tagged_wire_shape() {
        let msg = Message::ContentScriptReady {
            tab_id: TabId(42),
            url: "https://example.com/forms".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(json["type"], "CONTENT_SCRIPT_READY");
        assert_eq!(json["tab_id"], 42);
    }

    #[test]
    fn round_trip_execute_step() {
        let msg = Message::ExecuteStep {
            sequence_id: SequenceId::new("form-creation-v1"),
            step_index: 2,
            action: Action::Click {
                selector: "#submit".into(),
                description: None,
                delay_ms: Some(500),
            },
        };
        let parsed = Message::parse(&msg.to_json()).unwrap().unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn unknown_type_is_ignored_not_fatal() {
        let raw = r#"{"type": "FUTURE_FEATURE", "payload": {"x": 1}}"#;
        assert!(Message::parse(raw).unwrap().is_none());
    }

    #[test]
    fn missing_type_is_malformed() {
        assert!(matches!(
            Message::parse(r#"{"tab_id": 1}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Message::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn known_type_with_bad_payload_is_malformed() {
        let raw = r#"{"type": "CONTENT_SCRIPT_READY", "tab_id": "not-a-number", "url": ""}"#;
        assert!(matches!(
            Message::parse(raw),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
