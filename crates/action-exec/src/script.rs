//! Content-script run loop.
//!
//! One instance lives for exactly one page generation. It announces itself
//! on startup, executes steps pushed by the background coordinator strictly
//! sequentially, and reports progress, navigation, and failures back over
//! the channel. The enclosing runtime destroys the instance (cancels its
//! token) whenever the page navigates, exactly as a real page teardown
//! would.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use formpilot_core_types::{AutomationError, TabId};
use formpilot_protocol::Message;

use crate::dispatch::execute_action;
use crate::model::ExecConfig;
use crate::ports::{CursorPort, PagePort};

pub struct ContentScript {
    tab_id: TabId,
    page: Arc<dyn PagePort>,
    cursor: Arc<dyn CursorPort>,
    config: ExecConfig,
    inbox: mpsc::Receiver<Message>,
    outbox: mpsc::Sender<Message>,
    cancel: CancellationToken,
}

impl ContentScript {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tab_id: TabId,
        page: Arc<dyn PagePort>,
        cursor: Arc<dyn CursorPort>,
        config: ExecConfig,
        inbox: mpsc::Receiver<Message>,
        outbox: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tab_id,
            page,
            cursor,
            config,
            inbox,
            outbox,
            cancel,
        }
    }

    /// Run until the page context is destroyed (token cancelled) or the
    /// channel closes.
    pub async fn run(mut self) {
        let url = self.page.current_url().await.unwrap_or_default();
        info!(tab = %self.tab_id, url, "content script announcing readiness");
        self.send(Message::ContentScriptReady {
            tab_id: self.tab_id,
            url,
        })
        .await;

        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(tab = %self.tab_id, "content script context destroyed");
                    return;
                }
                msg = self.inbox.recv() => match msg {
                    Some(msg) => msg,
                    None => return,
                },
            };

            match message {
                Message::ExecuteStep {
                    sequence_id,
                    step_index,
                    action,
                } => {
                    let url_before = self.page.current_url().await.unwrap_or_default();
                    let outcome = execute_action(
                        &action,
                        step_index,
                        self.page.as_ref(),
                        self.cursor.as_ref(),
                        &self.config,
                        &self.cancel,
                    )
                    .await;

                    match outcome {
                        Ok(()) => {
                            // Report any navigation first so the coordinator
                            // stops pushing before it learns of completion.
                            let url_after =
                                self.page.current_url().await.unwrap_or_default();
                            if url_after != url_before {
                                self.send(Message::NavigationDetected {
                                    tab_id: self.tab_id,
                                    to_url: url_after,
                                })
                                .await;
                            }
                            self.send(Message::StepProgressUpdate {
                                sequence_id,
                                completed_step_index: step_index,
                            })
                            .await;
                        }
                        Err(AutomationError::Cancelled) => {
                            debug!(step_index, "step cancelled with context teardown");
                            return;
                        }
                        Err(error) => {
                            warn!(step_index, %error, "step failed");
                            self.send(Message::SequenceError {
                                sequence_id,
                                error,
                                step_index,
                            })
                            .await;
                        }
                    }
                }
                Message::StopAutomation => {
                    debug!(tab = %self.tab_id, "content script stopping on request");
                    return;
                }
                other => {
                    debug!(message_type = other.kind(), "content script ignoring message");
                }
            }
        }
    }

    async fn send(&self, message: Message) {
        if self.outbox.send(message).await.is_err() {
            debug!("background channel closed; dropping report");
        }
    }
}
