//! Scripted in-memory page for tests and dry runs.
//!
//! A [`SimPage`] holds a set of documents keyed by URL. Navigation (explicit
//! or caused by clicking a navigating element) swaps the current document and
//! bumps the page generation; element handles created against the old
//! generation go stale, the same way real DOM references die with their
//! document. Mutation counters and ready-state ramps are scripted per
//! document so stabilization behavior can be exercised deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use action_exec::{CursorPort, ElementHandle, ElementKind, PagePort, ReadyState};
use formpilot_core_types::AutomationError;

/// One element inside a scripted document.
#[derive(Clone, Debug)]
pub struct ElementSpec {
    pub selector: String,
    pub kind: ElementKind,
    pub value: String,
    /// Element only resolves after this much time has passed since the
    /// document loaded (simulates async rendering).
    pub appears_after: Option<Duration>,
    /// Clicking this element navigates to the given document URL.
    pub navigates_to: Option<String>,
}

impl ElementSpec {
    pub fn new(selector: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            selector: selector.into(),
            kind,
            value: String::new(),
            appears_after: None,
            navigates_to: None,
        }
    }

    pub fn button(selector: impl Into<String>) -> Self {
        Self::new(selector, ElementKind::Button)
    }

    pub fn text_input(selector: impl Into<String>) -> Self {
        Self::new(selector, ElementKind::TextInput)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    pub fn navigating_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }
}

/// One scripted document.
#[derive(Clone, Debug, Default)]
pub struct DocumentSpec {
    pub elements: Vec<ElementSpec>,
    /// Number of mutation-count reads after load during which the document
    /// keeps mutating (busy SPA settling down).
    pub busy_reads: u32,
    /// Number of ready-state reads after load before `Complete`.
    pub loading_reads: u32,
}

impl DocumentSpec {
    pub fn new(elements: Vec<ElementSpec>) -> Self {
        Self {
            elements,
            busy_reads: 0,
            loading_reads: 0,
        }
    }

    pub fn busy_for(mut self, reads: u32) -> Self {
        self.busy_reads = reads;
        self
    }

    pub fn loading_for(mut self, reads: u32) -> Self {
        self.loading_reads = reads;
        self
    }
}

#[derive(Clone, Debug)]
struct LiveElement {
    spec: ElementSpec,
    value: String,
}

struct LiveDocument {
    url: String,
    elements: Vec<LiveElement>,
    loaded_at: Instant,
    mutations: u64,
    busy_reads: u32,
    loading_reads: u32,
}

struct SimState {
    documents: HashMap<String, DocumentSpec>,
    current: LiveDocument,
    generation: u64,
    clicks: HashMap<String, u32>,
    input_log: Vec<String>,
    fail_clicks: u32,
}

/// Scripted page. Cheap to clone via `Arc`; all state behind one mutex.
pub struct SimPage {
    state: Mutex<SimState>,
}

/// Builder for a [`SimPage`] with its document set.
pub struct SimPageBuilder {
    documents: HashMap<String, DocumentSpec>,
    initial_url: String,
}

impl SimPageBuilder {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            documents: HashMap::new(),
            initial_url: initial_url.into(),
        }
    }

    pub fn document(mut self, url: impl Into<String>, spec: DocumentSpec) -> Self {
        self.documents.insert(url.into(), spec);
        self
    }

    pub fn build(self) -> Arc<SimPage> {
        let spec = self
            .documents
            .get(&self.initial_url)
            .cloned()
            .unwrap_or_default();
        let current = SimPage::load_document(&self.initial_url, &spec);
        Arc::new(SimPage {
            state: Mutex::new(SimState {
                documents: self.documents,
                current,
                generation: 0,
                clicks: HashMap::new(),
                input_log: Vec::new(),
                fail_clicks: 0,
            }),
        })
    }
}

impl SimPage {
    fn load_document(url: &str, spec: &DocumentSpec) -> LiveDocument {
        LiveDocument {
            url: url.to_string(),
            elements: spec
                .elements
                .iter()
                .map(|e| LiveElement {
                    value: e.value.clone(),
                    spec: e.clone(),
                })
                .collect(),
            loaded_at: Instant::now(),
            mutations: 0,
            busy_reads: spec.busy_reads,
            loading_reads: spec.loading_reads,
        }
    }

    fn commit_navigation(state: &mut SimState, url: &str) {
        let spec = state.documents.get(url).cloned().unwrap_or_default();
        debug!(url, "sim page navigating");
        state.current = Self::load_document(url, &spec);
        state.generation += 1;
    }

    /// Encode generation + element index into an opaque handle.
    fn handle(generation: u64, index: usize) -> ElementHandle {
        ElementHandle((generation << 24) | (index as u64 & 0xff_ffff))
    }

    fn resolve(state: &SimState, handle: &ElementHandle) -> Result<usize, AutomationError> {
        let generation = handle.0 >> 24;
        let index = (handle.0 & 0xff_ffff) as usize;
        if generation != state.generation || index >= state.current.elements.len() {
            return Err(AutomationError::page("stale element handle"));
        }
        Ok(index)
    }

    /// Clicks observed on a selector, across all generations.
    pub fn clicks(&self, selector: &str) -> u32 {
        *self.state.lock().clicks.get(selector).unwrap_or(&0)
    }

    /// Element values observed after every input-changed notification.
    pub fn input_log(&self) -> Vec<String> {
        self.state.lock().input_log.clone()
    }

    /// Value of an element in the current document.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .current
            .elements
            .iter()
            .find(|e| e.spec.selector == selector)
            .map(|e| e.value.clone())
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Make the next `count` click dispatches fail with a transient error.
    pub fn fail_clicks(&self, count: u32) {
        self.state.lock().fail_clicks = count;
    }
}

#[async_trait]
impl PagePort for SimPage {
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AutomationError> {
        let state = self.state.lock();
        let found = state.current.elements.iter().position(|e| {
            e.spec.selector == selector
                && e.spec
                    .appears_after
                    .map(|delay| state.current.loaded_at.elapsed() >= delay)
                    .unwrap_or(true)
        });
        Ok(found.map(|idx| Self::handle(state.generation, idx)))
    }

    async fn element_kind(
        &self,
        element: &ElementHandle,
    ) -> Result<ElementKind, AutomationError> {
        let state = self.state.lock();
        let idx = Self::resolve(&state, element)?;
        Ok(state.current.elements[idx].spec.kind)
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        let idx = Self::resolve(&state, element)?;
        if state.fail_clicks > 0 {
            state.fail_clicks -= 1;
            return Err(AutomationError::page("synthetic click dispatch failure"));
        }
        let clicked = state.current.elements[idx].spec.clone();
        *state.clicks.entry(clicked.selector.clone()).or_insert(0) += 1;
        state.current.mutations += 1;
        if let Some(url) = clicked.navigates_to.as_deref() {
            let url = url.to_string();
            Self::commit_navigation(&mut state, &url);
        }
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let state = self.state.lock();
        Self::resolve(&state, element).map(|_| ())
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let state = self.state.lock();
        let idx = Self::resolve(&state, element)?;
        Ok(state.current.elements[idx].value.clone())
    }

    async fn delete_backward(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        let idx = Self::resolve(&state, element)?;
        state.current.elements[idx].value.pop();
        let value = state.current.elements[idx].value.clone();
        state.input_log.push(value);
        state.current.mutations += 1;
        Ok(())
    }

    async fn insert_char(
        &self,
        element: &ElementHandle,
        ch: char,
    ) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        let idx = Self::resolve(&state, element)?;
        state.current.elements[idx].value.push(ch);
        let value = state.current.elements[idx].value.clone();
        state.input_log.push(value);
        state.current.mutations += 1;
        Ok(())
    }

    async fn ready_state(&self) -> Result<ReadyState, AutomationError> {
        let mut state = self.state.lock();
        if state.current.loading_reads > 0 {
            state.current.loading_reads -= 1;
            return Ok(ReadyState::Loading);
        }
        Ok(ReadyState::Complete)
    }

    async fn mutation_count(&self) -> Result<u64, AutomationError> {
        let mut state = self.state.lock();
        if state.current.busy_reads > 0 {
            state.current.busy_reads -= 1;
            state.current.mutations += 1;
        }
        Ok(state.current.mutations)
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        Self::commit_navigation(&mut state, url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.state.lock().current.url.clone())
    }
}

/// Cursor that records every move for assertions; feedback itself is
/// cosmetic and out of scope.
#[derive(Default)]
pub struct RecordingCursor {
    moves: Mutex<Vec<ElementHandle>>,
    pulses: Mutex<Vec<ElementHandle>>,
}

impl RecordingCursor {
    pub fn move_count(&self) -> usize {
        self.moves.lock().len()
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.lock().len()
    }
}

#[async_trait]
impl CursorPort for RecordingCursor {
    async fn move_to(&self, element: &ElementHandle) {
        self.moves.lock().push(*element);
    }

    async fn click_pulse(&self, element: &ElementHandle) {
        self.pulses.lock().push(*element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_site() -> Arc<SimPage> {
        SimPageBuilder::new("https://example.com/start")
            .document(
                "https://example.com/start",
                DocumentSpec::new(vec![
                    ElementSpec::button("#submit").navigating_to("https://example.com/done")
                ]),
            )
            .document(
                "https://example.com/done",
                DocumentSpec::new(vec![ElementSpec::text_input("#result")]),
            )
            .build()
    }

    #[tokio::test]
    async fn click_on_navigating_element_swaps_document_and_generation() {
        let page = two_page_site();
        let handle = page.query("#submit").await.unwrap().unwrap();
        assert_eq!(page.generation(), 0);

        page.dispatch_click(&handle).await.unwrap();
        assert_eq!(page.generation(), 1);
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://example.com/done"
        );

        // The old handle died with its document.
        assert!(page.dispatch_click(&handle).await.is_err());
        // The new document's elements resolve.
        assert!(page.query("#result").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delayed_elements_do_not_resolve_immediately() {
        let page = SimPageBuilder::new("https://example.com")
            .document(
                "https://example.com",
                DocumentSpec::new(vec![ElementSpec::button("#late")
                    .appearing_after(Duration::from_millis(30))]),
            )
            .build();
        assert!(page.query("#late").await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(page.query("#late").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn busy_document_mutates_for_scripted_reads_then_settles() {
        let page = SimPageBuilder::new("https://example.com")
            .document("https://example.com", DocumentSpec::new(vec![]).busy_for(2))
            .build();
        let first = page.mutation_count().await.unwrap();
        let second = page.mutation_count().await.unwrap();
        assert!(second > first);
        let third = page.mutation_count().await.unwrap();
        let fourth = page.mutation_count().await.unwrap();
        assert_eq!(third, fourth);
    }

    #[tokio::test]
    async fn unscripted_url_loads_an_empty_document() {
        let page = two_page_site();
        page.navigate("https://example.com/elsewhere").await.unwrap();
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://example.com/elsewhere"
        );
        assert!(page.query("#submit").await.unwrap().is_none());
    }
}
