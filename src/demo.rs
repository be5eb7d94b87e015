//! Canned demo sequences.
//!
//! These mirror the sequences the planner backend serves for its two stock
//! flows: creating a form from the workspace and building out its fields.
//! They double as realistic fixtures for the dry-run harness, selectors and
//! all.

use formpilot_core_types::{Action, Sequence};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoKind {
    FormCreation,
    FormBuilding,
}

pub fn sequence_for(kind: DemoKind) -> Sequence {
    match kind {
        DemoKind::FormCreation => form_creation(),
        DemoKind::FormBuilding => form_building(),
    }
}

fn form_creation() -> Sequence {
    Sequence::new(
        "form-creation-v1",
        "Create New Form",
        vec![
            Action::Navigate {
                url: "https://www.jotform.com/myforms".into(),
                description: Some("Navigate to Jotform workspace".into()),
                delay_ms: Some(2000),
            },
            Action::Click {
                selector: "#root > div.lsApp > div.lsApp-body.newWorkspaceUI.newTeamCoversActive > div.lsApp-sidebar.relative > div.lsApp-sidebar-content.lsApp-sidebar-ls > div.lsApp-sidebar-button > button".into(),
                description: Some("Click Create button".into()),
                delay_ms: Some(1000),
            },
            Action::Click {
                selector: "#create-asset-modal-container > div > div.sc-khQegj.fNgvag.forSideBySideCreation.jfWizard-item.jfWizard-gutter.withMaxWidth > div > div > div.jfWizard-body.sc-hUpaCq.gxAShf > div > ul > li:nth-child(1) > button".into(),
                description: Some("Click Form button".into()),
                delay_ms: Some(1000),
            },
            Action::Click {
                selector: "#modal-container > div > div.isMain.largeWizardItem.moreThanFourItem.jfWizard-item > div.jfWizard-gutter.withMaxWidth > div > ul > li.jfWizard-list-item-wrapper.forStartFromScratch > button".into(),
                description: Some("Click Start from scratch".into()),
                delay_ms: Some(1000),
            },
            Action::Click {
                selector: "#modal-container > div > div.largeWizardItem.isStartFromScratch.forNewOptions.jfWizard-item > div.jfWizard-gutter.withMaxWidth > div > ul > li.jfWizard-list-item-wrapper.forClassicForm > button".into(),
                description: Some("Click Classic form".into()),
                delay_ms: Some(500),
            },
            Action::Click {
                selector: "#portal-root > div > div > div > div > div > div.jfModal-header > div.jfModal-title > div.jfModal-close".into(),
                description: Some("Close modal dialog".into()),
                delay_ms: Some(1000),
            },
        ],
    )
}

fn form_building() -> Sequence {
    Sequence::new(
        "form-building-v1",
        "Build Form Elements",
        vec![
            Action::Wait {
                description: Some("Wait for page to initialize".into()),
                delay_ms: Some(1000),
            },
            Action::Click {
                selector: "#id_1 > div.question-wrapper.questionWrapper > div > div".into(),
                description: Some("Click on heading form element".into()),
                delay_ms: Some(1000),
            },
            Action::Click {
                selector: "#app_wizards > div > button.btn.sc-Properties.radius-full.magnet-button".into(),
                description: Some("Click settings button".into()),
                delay_ms: Some(1000),
            },
            Action::Type {
                selector: "#text".into(),
                text: "Course Registration".into(),
                description: Some("Enter form title text".into()),
                delay_ms: Some(500),
            },
            Action::Click {
                selector: "#question-settings-close-btn".into(),
                description: Some("Close settings menu".into()),
                delay_ms: Some(500),
            },
        ],
    )
}
