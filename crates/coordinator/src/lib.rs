//! Background coordinator: the stateful hub of a run.
//!
//! Everything the popup or a content script does flows through here as
//! protocol messages. The [`coordinator`] module holds the state machine,
//! [`session`] the planner session lifecycle, [`storage`] the persistence
//! layer, and [`runtime`] wires the contexts together over channels.

pub mod coordinator;
pub mod runtime;
pub mod session;
pub mod storage;

pub use coordinator::{Coordinator, Outbound, RunPhase};
pub use runtime::{spawn, RuntimeConfig, RuntimeHandle};
pub use session::{SessionError, SessionManager, SessionPlanner};
pub use storage::{FileStore, KvStore, MemoryStore, StorageError};
