//! Client for the external planning backend.
//!
//! The planner is a black box: given a session id, the page's visible
//! elements, and the last turn's outcome, it returns the next action(s).
//! This crate only speaks its HTTP contract; it never decides what to do.
//!
//! Transport policy: 5xx, network, and timeout failures retry up to a
//! configured attempt count with a fixed inter-attempt delay; 4xx failures
//! surface immediately.

mod convert;
mod types;

pub use convert::{planner_turn_to_directives, PlannerDirective, VisibleElement};
pub use types::{
    InitSessionResponse, NextActionRequest, PlannerAction, PlannerActionType, PlannerTurn,
    TurnOutcome,
};

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use formpilot_core_types::SessionId;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("planner request timed out")]
    Timeout,

    #[error("planner unavailable after {attempts} attempts: {last}")]
    Retry { attempts: u32, last: String },

    #[error("planner rejected the request: {0}")]
    Validation(String),

    #[error("planner session problem: {0}")]
    Session(String),

    #[error("planner returned {status}: {body}")]
    Http { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl PlannerConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct PlannerClient {
    http: reqwest::Client,
    config: PlannerConfig,
}

impl PlannerClient {
    pub fn new(config: PlannerConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// Open a planner conversation for an objective.
    pub async fn init_session(&self, objective: &str) -> Result<SessionId, ApiError> {
        let objective = objective.trim();
        if objective.is_empty() {
            return Err(ApiError::Validation("objective is empty".into()));
        }
        let response: InitSessionResponse = self
            .post_with_retry(
                "init-session",
                &serde_json::json!({ "objective": objective }),
            )
            .await?;
        if response.session_id.trim().is_empty() {
            return Err(ApiError::Session("planner returned an empty session id".into()));
        }
        Ok(SessionId(response.session_id))
    }

    /// Ask for the next action(s) in a session.
    pub async fn next_action(&self, request: &NextActionRequest) -> Result<PlannerTurn, ApiError> {
        if request.session_id.trim().is_empty() {
            return Err(ApiError::Session("missing session id".into()));
        }
        self.post_with_retry("next-action", request).await
    }

    async fn post_with_retry<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self
            .config
            .base_url
            .join(path)
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        let attempts = self.config.retry_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            match self.http.post(url.clone()).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|err| ApiError::Validation(err.to_string()));
                    }
                    let text = response.text().await.unwrap_or_default();
                    if status.is_client_error() {
                        // 4xx means the request itself is wrong; retrying
                        // the same payload cannot help.
                        return Err(classify_client_error(status, text));
                    }
                    warn!(%status, attempt, "planner returned server error");
                    last_failure = format!("{status}: {text}");
                }
                Err(err) if err.is_timeout() => {
                    warn!(attempt, "planner request timed out");
                    if attempt == attempts {
                        return Err(ApiError::Timeout);
                    }
                    last_failure = "timeout".into();
                }
                Err(err) => {
                    warn!(attempt, error = %err, "planner request failed");
                    last_failure = err.to_string();
                }
            }

            if attempt < attempts {
                debug!(attempt, "retrying planner request after fixed delay");
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(ApiError::Retry {
            attempts,
            last: last_failure,
        })
    }
}

fn classify_client_error(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            ApiError::Session(format!("{status}: {body}"))
        }
        _ => ApiError::Http {
            status: status.as_u16(),
            body,
        },
    }
}
