//! Minimal single-document fake page for unit tests in this crate. The full
//! multi-document simulator lives in the `page-sim` crate.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use formpilot_core_types::AutomationError;

use crate::ports::{ElementHandle, ElementKind, PagePort, ReadyState};

#[derive(Clone, Debug)]
struct FakeElement {
    selector: String,
    kind: ElementKind,
    value: String,
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    elements: Vec<FakeElement>,
    mutations: u64,
    clicks: HashMap<String, u32>,
    fail_next_click: bool,
    /// Values observed after each input-changed notification.
    input_log: Vec<String>,
    ready_reads_until_complete: u32,
    /// While positive, every mutation_count() read also bumps the counter,
    /// simulating a page that keeps mutating.
    busy_reads: u32,
}

pub struct SinglePage {
    state: Mutex<FakeState>,
}

impl SinglePage {
    pub fn empty(url: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                url: url.to_string(),
                ..FakeState::default()
            }),
        }
    }

    pub fn with_button(url: &str, selector: &str) -> Self {
        let page = Self::empty(url);
        page.add(selector, ElementKind::Button, "");
        page
    }

    pub fn with_input(url: &str, selector: &str, value: &str) -> Self {
        let page = Self::empty(url);
        page.add(selector, ElementKind::TextInput, value);
        page
    }

    pub fn add(&self, selector: &str, kind: ElementKind, value: &str) {
        self.state.lock().elements.push(FakeElement {
            selector: selector.to_string(),
            kind,
            value: value.to_string(),
        });
    }

    pub fn clicks(&self, selector: &str) -> u32 {
        *self.state.lock().clicks.get(selector).unwrap_or(&0)
    }

    pub fn fail_next_click(&self) {
        self.state.lock().fail_next_click = true;
    }

    pub fn set_busy_reads(&self, reads: u32) {
        self.state.lock().busy_reads = reads;
    }

    pub fn set_ready_after_reads(&self, reads: u32) {
        self.state.lock().ready_reads_until_complete = reads;
    }

    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .elements
            .iter()
            .find(|e| e.selector == selector)
            .map(|e| e.value.clone())
    }

    pub fn input_log(&self) -> Vec<String> {
        self.state.lock().input_log.clone()
    }

    fn index_of(&self, handle: &ElementHandle) -> Result<usize, AutomationError> {
        let idx = handle.0 as usize;
        if idx < self.state.lock().elements.len() {
            Ok(idx)
        } else {
            Err(AutomationError::page("stale element handle"))
        }
    }
}

#[async_trait]
impl PagePort for SinglePage {
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AutomationError> {
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .position(|e| e.selector == selector)
            .map(|idx| ElementHandle(idx as u64)))
    }

    async fn element_kind(
        &self,
        element: &ElementHandle,
    ) -> Result<ElementKind, AutomationError> {
        let idx = self.index_of(element)?;
        Ok(self.state.lock().elements[idx].kind)
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let idx = self.index_of(element)?;
        let mut state = self.state.lock();
        if state.fail_next_click {
            state.fail_next_click = false;
            return Err(AutomationError::page("synthetic dispatch failure"));
        }
        let selector = state.elements[idx].selector.clone();
        *state.clicks.entry(selector).or_insert(0) += 1;
        state.mutations += 1;
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.index_of(element).map(|_| ())
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let idx = self.index_of(element)?;
        Ok(self.state.lock().elements[idx].value.clone())
    }

    async fn delete_backward(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let idx = self.index_of(element)?;
        let mut state = self.state.lock();
        state.elements[idx].value.pop();
        let value = state.elements[idx].value.clone();
        state.input_log.push(value);
        state.mutations += 1;
        Ok(())
    }

    async fn insert_char(
        &self,
        element: &ElementHandle,
        ch: char,
    ) -> Result<(), AutomationError> {
        let idx = self.index_of(element)?;
        let mut state = self.state.lock();
        state.elements[idx].value.push(ch);
        let value = state.elements[idx].value.clone();
        state.input_log.push(value);
        state.mutations += 1;
        Ok(())
    }

    async fn ready_state(&self) -> Result<ReadyState, AutomationError> {
        let mut state = self.state.lock();
        if state.ready_reads_until_complete > 0 {
            state.ready_reads_until_complete -= 1;
            return Ok(ReadyState::Loading);
        }
        Ok(ReadyState::Complete)
    }

    async fn mutation_count(&self) -> Result<u64, AutomationError> {
        let mut state = self.state.lock();
        if state.busy_reads > 0 {
            state.busy_reads -= 1;
            state.mutations += 1;
        }
        Ok(state.mutations)
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.elements.clear();
        state.mutations += 1;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.state.lock().url.clone())
    }
}
