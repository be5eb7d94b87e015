use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InitSessionResponse {
    pub session_id: String,
}

/// One action from the planner's `next-action` response. The planner speaks
/// in element indexes into the `visible_elements_html` list we sent it,
/// never in selectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerAction {
    #[serde(rename = "type")]
    pub action_type: PlannerActionType,
    #[serde(default)]
    pub element_index: Option<usize>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlannerActionType {
    Click,
    Type,
    AskUser,
    Finish,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerTurn {
    pub actions: Vec<PlannerAction>,
    #[serde(default)]
    pub overall_explanation: String,
}

/// Result of one previously executed action, reported back to the planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub action_index: usize,
    pub success: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl TurnOutcome {
    pub fn success(action_index: usize, detail: impl Into<String>) -> Self {
        Self {
            action_index,
            success: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(action_index: usize, detail: impl Into<String>) -> Self {
        Self {
            action_index,
            success: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NextActionRequest {
    pub session_id: String,
    pub visible_elements_html: Vec<String>,
    pub last_turn_outcome: Vec<TurnOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_response: Option<String>,
}
