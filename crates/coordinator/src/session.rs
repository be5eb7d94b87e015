//! Planner session lifecycle.
//!
//! A session ties a run objective to the external planner backend. The
//! manager creates sessions through the planner, persists the record so a
//! restarted background context can keep talking to the same session, and
//! clears it when the user stops or changes objective.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use formpilot_core_types::{SessionId, SessionRecord};
use planner_client::{ApiError, PlannerClient};

use crate::storage::{KvStore, StorageError};

const SESSION_KEY: &str = "formpilot.session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The slice of the planner API the session manager needs. Kept as a trait
/// so coordinator tests run without a live backend.
#[async_trait]
pub trait SessionPlanner: Send + Sync {
    async fn init_session(&self, objective: &str) -> Result<SessionId, ApiError>;
}

#[async_trait]
impl SessionPlanner for PlannerClient {
    async fn init_session(&self, objective: &str) -> Result<SessionId, ApiError> {
        PlannerClient::init_session(self, objective).await
    }
}

pub struct SessionManager {
    store: Arc<dyn KvStore>,
    planner: Arc<dyn SessionPlanner>,
    cached: Option<SessionRecord>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KvStore>, planner: Arc<dyn SessionPlanner>) -> Self {
        Self {
            store,
            planner,
            cached: None,
        }
    }

    /// Open a fresh planner session for `objective`, replacing whatever
    /// session was active before.
    pub async fn initialize(&mut self, objective: &str) -> Result<SessionId, SessionError> {
        let session_id = self.planner.init_session(objective).await?;
        let record = SessionRecord::new(session_id.clone(), objective);
        self.persist(&record).await?;
        info!(session_id = %session_id, "planner session initialized");
        self.cached = Some(record);
        Ok(session_id)
    }

    /// The active session id, falling back to the persisted record when the
    /// in-memory cache was lost to a background restart.
    pub async fn current_session_id(&mut self) -> Option<SessionId> {
        if let Some(record) = &self.cached {
            return Some(record.session_id.clone());
        }
        let value = match self.store.get(SESSION_KEY).await {
            Ok(value) => value?,
            Err(err) => {
                warn!(error = %err, "failed to read persisted session");
                return None;
            }
        };
        match serde_json::from_value::<SessionRecord>(value) {
            Ok(record) => {
                debug!(session_id = %record.session_id, "restored session from storage");
                let id = record.session_id.clone();
                self.cached = Some(record);
                Some(id)
            }
            Err(err) => {
                warn!(error = %err, "persisted session record is unreadable, dropping it");
                None
            }
        }
    }

    /// Refresh the activity timestamp on the persisted record.
    pub async fn touch(&mut self) -> Result<(), SessionError> {
        if let Some(record) = &mut self.cached {
            record.touch();
            let record = record.clone();
            self.persist(&record).await?;
        }
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.cached = None;
        self.store.remove(SESSION_KEY).await?;
        Ok(())
    }

    async fn persist(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let value = serde_json::to_value(record)
            .map_err(|err| StorageError::Operation(err.to_string()))?;
        self.store.set(SESSION_KEY, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;

    struct FakePlanner {
        next_id: Mutex<Vec<SessionId>>,
    }

    impl FakePlanner {
        fn with_ids(ids: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                next_id: Mutex::new(ids.into_iter().rev().map(SessionId::new).collect()),
            })
        }
    }

    #[async_trait]
    impl SessionPlanner for FakePlanner {
        async fn init_session(&self, _objective: &str) -> Result<SessionId, ApiError> {
            self.next_id
                .lock()
                .pop()
                .ok_or_else(|| ApiError::Session("no more sessions".into()))
        }
    }

    #[tokio::test]
    async fn initialize_persists_and_caches() {
        let store = Arc::new(MemoryStore::new());
        let planner = FakePlanner::with_ids(vec!["sess-1"]);
        let mut manager = SessionManager::new(store.clone(), planner);

        let id = manager.initialize("create a contact form").await.unwrap();
        assert_eq!(id, SessionId::new("sess-1"));
        assert_eq!(manager.current_session_id().await, Some(id));
        assert!(store.get(SESSION_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn session_survives_cache_loss() {
        let store = Arc::new(MemoryStore::new());
        let planner = FakePlanner::with_ids(vec!["sess-1"]);
        let mut manager = SessionManager::new(store.clone(), planner.clone());
        manager.initialize("create a contact form").await.unwrap();

        // A new manager over the same store stands in for a restarted
        // background context.
        let mut revived = SessionManager::new(store, planner);
        assert_eq!(
            revived.current_session_id().await,
            Some(SessionId::new("sess-1"))
        );
    }

    #[tokio::test]
    async fn touch_refreshes_the_persisted_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let planner = FakePlanner::with_ids(vec!["sess-1"]);
        let mut manager = SessionManager::new(store.clone(), planner);
        manager.initialize("obj").await.unwrap();

        let before: SessionRecord =
            serde_json::from_value(store.get(SESSION_KEY).await.unwrap().unwrap()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        manager.touch().await.unwrap();
        let after: SessionRecord =
            serde_json::from_value(store.get(SESSION_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(after.session_id, before.session_id);
        assert!(after.last_action_at > before.last_action_at);
    }

    #[tokio::test]
    async fn clear_removes_cache_and_storage() {
        let store = Arc::new(MemoryStore::new());
        let planner = FakePlanner::with_ids(vec!["sess-1"]);
        let mut manager = SessionManager::new(store.clone(), planner);
        manager.initialize("obj").await.unwrap();

        manager.clear().await.unwrap();
        assert_eq!(manager.current_session_id().await, None);
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
    }
}
