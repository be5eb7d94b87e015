//! FormPilot library
//!
//! Exposes the CLI-side modules for integration testing.

pub mod demo;
pub mod harness;

pub use demo::{sequence_for, DemoKind};
pub use harness::{run_sequence, HarnessOptions, RunOutcome, RunReport};
