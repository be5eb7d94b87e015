//! Action execution engine for FormPilot.
//!
//! Turns one abstract [`formpilot_core_types::Action`] into a reliable,
//! human-like DOM interaction against a [`ports::PagePort`], with readiness
//! waits before and stabilization waits after. The content-script run loop
//! ([`script::ContentScript`]) drives the executors from pushed protocol
//! messages and reports progress back to the background coordinator.

pub mod dispatch;
pub mod model;
pub mod ports;
pub mod script;
pub mod tempo;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

mod click;
mod navigate;
mod type_text;
mod wait_step;

pub use dispatch::{action_from_raw, execute_action};
pub use model::{ExecConfig, ExecCtx, TypingConfig};
pub use ports::{CursorPort, ElementHandle, ElementKind, NullCursor, PagePort, ReadyState};
pub use script::ContentScript;
pub use wait::{
    wait_for_element, wait_for_navigation_complete, wait_for_page_stabilization, WaitConfig,
};
