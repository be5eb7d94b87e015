//! Smoke: both canned demo sequences complete under the dry-run harness.

use formpilot_cli::{run_sequence, sequence_for, DemoKind, HarnessOptions};

async fn smoke(kind: DemoKind) {
    let opts = HarnessOptions {
        fast: true,
        seed: Some(42),
        speed: 25.0,
        ..Default::default()
    };
    let report = run_sequence(sequence_for(kind), &opts).await.unwrap();
    assert!(report.succeeded(), "{kind:?} failed: {:?}", report.outcome);
}

#[tokio::test]
async fn form_creation_demo_completes() {
    smoke(DemoKind::FormCreation).await;
}

#[tokio::test]
async fn form_building_demo_completes() {
    smoke(DemoKind::FormBuilding).await;
}
