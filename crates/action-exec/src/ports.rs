use async_trait::async_trait;

use formpilot_core_types::AutomationError;

/// Opaque handle to a resolved DOM element. Handles are generation-scoped:
/// once the page navigates, old handles go stale and port calls against them
/// fail with a transient page error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ElementHandle(pub u64);

/// Coarse element classification, enough to validate typing targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementKind {
    TextInput,
    TextArea,
    Button,
    Link,
    Other,
}

impl ElementKind {
    /// Whether simulated typing may target this element.
    pub fn is_text_capable(self) -> bool {
        matches!(self, ElementKind::TextInput | ElementKind::TextArea)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// DOM surface the executors depend on. Implemented by the in-page binding
/// in a packaged build and by the scripted page simulator in tests.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Resolve a CSS selector to the first matching element, or `None`.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AutomationError>;

    async fn element_kind(&self, element: &ElementHandle)
        -> Result<ElementKind, AutomationError>;

    /// Dispatch a genuine bubbling, cancelable click event on the element.
    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    async fn focus(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Current value of a text-capable element.
    async fn value(&self, element: &ElementHandle) -> Result<String, AutomationError>;

    /// Remove the last character of the element's value, firing the same
    /// input-changed notification a real backspace would.
    async fn delete_backward(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Append one character to the element's value, firing an input-changed
    /// notification so page-side reactive frameworks observe the keystroke.
    async fn insert_char(
        &self,
        element: &ElementHandle,
        ch: char,
    ) -> Result<(), AutomationError>;

    async fn ready_state(&self) -> Result<ReadyState, AutomationError>;

    /// Monotonically increasing count of DOM mutations observed since the
    /// current document loaded. Stability is inferred from this standing
    /// still.
    async fn mutation_count(&self) -> Result<u64, AutomationError>;

    /// Change the page location. Does not wait for the load to finish.
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;
}

/// Visual cursor feedback shown while an action runs. Cosmetic only; the
/// executors never fail because of it.
#[async_trait]
pub trait CursorPort: Send + Sync {
    async fn move_to(&self, element: &ElementHandle);
    async fn click_pulse(&self, element: &ElementHandle);
}

/// No-op cursor when feedback rendering is absent (headless runs, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCursor;

#[async_trait]
impl CursorPort for NullCursor {
    async fn move_to(&self, _element: &ElementHandle) {}
    async fn click_pulse(&self, _element: &ElementHandle) {}
}
