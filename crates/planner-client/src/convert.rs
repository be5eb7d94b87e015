//! Mapping from planner turns to executable actions.
//!
//! The planner addresses elements by index into the visible-elements list it
//! was shown; the extension owns the index-to-selector mapping and resolves
//! it here before anything reaches the dispatcher.

use formpilot_core_types::Action;

use crate::types::{PlannerAction, PlannerActionType, PlannerTurn};
use crate::ApiError;

/// One entry of the visible-elements list sent to the planner, paired with
/// the selector that resolves it in the live page.
#[derive(Clone, Debug)]
pub struct VisibleElement {
    pub selector: String,
    pub html: String,
}

/// What the coordinator should do with one planner action.
#[derive(Clone, Debug, PartialEq)]
pub enum PlannerDirective {
    Execute(Action),
    AskUser(String),
    Finish,
    Fail(String),
}

/// Resolve a full planner turn against the element list it was computed for.
pub fn planner_turn_to_directives(
    turn: &PlannerTurn,
    elements: &[VisibleElement],
) -> Result<Vec<PlannerDirective>, ApiError> {
    turn.actions
        .iter()
        .map(|action| resolve_action(action, elements))
        .collect()
}

fn resolve_action(
    action: &PlannerAction,
    elements: &[VisibleElement],
) -> Result<PlannerDirective, ApiError> {
    match action.action_type {
        PlannerActionType::Click => {
            let element = target_of(action, elements)?;
            Ok(PlannerDirective::Execute(Action::Click {
                selector: element.selector.clone(),
                description: action.explanation.clone(),
                delay_ms: None,
            }))
        }
        PlannerActionType::Type => {
            let element = target_of(action, elements)?;
            let text = action.value.clone().ok_or_else(|| {
                ApiError::Validation("TYPE action carries no value".into())
            })?;
            Ok(PlannerDirective::Execute(Action::Type {
                selector: element.selector.clone(),
                text,
                description: action.explanation.clone(),
                delay_ms: None,
            }))
        }
        PlannerActionType::AskUser => {
            let question = action
                .question
                .clone()
                .unwrap_or_else(|| "The planner needs more information.".into());
            Ok(PlannerDirective::AskUser(question))
        }
        PlannerActionType::Finish => Ok(PlannerDirective::Finish),
        PlannerActionType::Fail => Ok(PlannerDirective::Fail(
            action
                .explanation
                .clone()
                .unwrap_or_else(|| "planner gave up".into()),
        )),
    }
}

fn target_of<'a>(
    action: &PlannerAction,
    elements: &'a [VisibleElement],
) -> Result<&'a VisibleElement, ApiError> {
    let index = action.element_index.ok_or_else(|| {
        ApiError::Validation(format!(
            "{:?} action carries no element index",
            action.action_type
        ))
    })?;
    elements.get(index).ok_or_else(|| {
        ApiError::Validation(format!(
            "element index {index} out of range ({} visible)",
            elements.len()
        ))
    })
}
