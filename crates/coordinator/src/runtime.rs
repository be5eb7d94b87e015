//! Wiring between the three contexts.
//!
//! The background task owns the [`Coordinator`] and a single inbound channel
//! that both the popup and the content scripts write into, so message order
//! is whatever order the contexts actually produced. Content scripts are
//! spawned per page generation: a navigation destroys the running instance
//! and a fresh one is spawned against the new document, which announces
//! itself with `CONTENT_SCRIPT_READY` like the real thing would.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use action_exec::{ContentScript, CursorPort, ExecConfig, PagePort};
use formpilot_core_types::TabId;
use formpilot_protocol::Message;

use crate::coordinator::{Coordinator, Outbound};

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub exec: ExecConfig,
    pub channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            exec: ExecConfig::default(),
            channel_capacity: 64,
        }
    }
}

/// Handle held by the popup side: send requests in, read responses out.
pub struct RuntimeHandle {
    inbox_tx: mpsc::Sender<Message>,
    popup_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    pub async fn send(&self, message: Message) {
        if self.inbox_tx.send(message).await.is_err() {
            warn!("background task is gone, dropping message");
        }
    }

    pub async fn recv_popup(&mut self) -> Option<Message> {
        self.popup_rx.recv().await
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the background task and the first content script for `tab_id`.
pub fn spawn(
    coordinator: Coordinator,
    page: Arc<dyn PagePort>,
    cursor: Arc<dyn CursorPort>,
    tab_id: TabId,
    config: RuntimeConfig,
) -> RuntimeHandle {
    let cancel = CancellationToken::new();
    let (inbox_tx, inbox_rx) = mpsc::channel(config.channel_capacity);
    let (popup_tx, popup_rx) = mpsc::channel(config.channel_capacity);

    let background = Background {
        coordinator,
        page,
        cursor,
        tab_id,
        config,
        inbox_tx: inbox_tx.clone(),
        inbox_rx,
        popup_tx,
        content: None,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(background.run());

    RuntimeHandle {
        inbox_tx,
        popup_rx,
        cancel,
        task,
    }
}

struct ContentHandle {
    tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Background {
    coordinator: Coordinator,
    page: Arc<dyn PagePort>,
    cursor: Arc<dyn CursorPort>,
    tab_id: TabId,
    config: RuntimeConfig,
    /// Cloned into every content script as its outbox.
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: mpsc::Receiver<Message>,
    popup_tx: mpsc::Sender<Message>,
    content: Option<ContentHandle>,
    cancel: CancellationToken,
}

impl Background {
    async fn run(mut self) {
        self.respawn_content();

        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.inbox_rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            // A stop must reach a content script that is mid-step, which a
            // queued message cannot do; the cancel token does.
            if matches!(message, Message::StopAutomation) {
                self.teardown_content().await;
            }

            let navigated = matches!(
                &message,
                Message::NavigationDetected { tab_id, .. } if *tab_id == self.tab_id
            );

            let outbounds = self.coordinator.handle(message).await;
            for outbound in outbounds {
                self.deliver(outbound).await;
            }

            // The old document is gone, and the instance bound to it with
            // it. Teardown drains the old task first so its final reports
            // are already queued before the replacement announces itself.
            if navigated {
                self.teardown_content().await;
            }
            if self.content.is_none() {
                self.respawn_content();
            }
        }

        self.teardown_content().await;
    }

    async fn deliver(&mut self, outbound: Outbound) {
        match outbound {
            Outbound::ToTab(tab_id, message) => {
                if tab_id != self.tab_id {
                    warn!(tab = tab_id.0, "no channel for tab, dropping message");
                    return;
                }
                let Some(content) = &self.content else {
                    debug!("no content script to deliver to, dropping message");
                    return;
                };
                if content.tx.send(message).await.is_err() {
                    debug!("content script is gone, dropping message");
                }
            }
            Outbound::ToPopup(message) => {
                // The popup side may have hung up; that is not our problem.
                let _ = self.popup_tx.send(message).await;
            }
        }
    }

    fn respawn_content(&mut self) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = self.cancel.child_token();
        let script = ContentScript::new(
            self.tab_id,
            Arc::clone(&self.page),
            Arc::clone(&self.cursor),
            self.config.exec.clone(),
            rx,
            self.inbox_tx.clone(),
            cancel.clone(),
        );
        let task = tokio::spawn(script.run());
        debug!(tab = self.tab_id.0, "spawned content script");
        self.content = Some(ContentHandle { tx, cancel, task });
    }

    async fn teardown_content(&mut self) {
        if let Some(content) = self.content.take() {
            content.cancel.cancel();
            let _ = content.task.await;
        }
    }
}
