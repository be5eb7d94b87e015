//! Key/value persistence for coordinator state.
//!
//! The background context keeps everything that must survive a restart in a
//! small JSON key/value store. [`FileStore`] writes one file per key under a
//! directory; [`MemoryStore`] backs tests.

use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation failed: {0}")]
    Operation(String),

    #[error("storage quota exceeded: {size} > {limit} bytes")]
    QuotaExceeded { size: usize, limit: usize },
}

/// Async key/value store over JSON values.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

const DEFAULT_QUOTA_BYTES: usize = 1024 * 1024;

/// One JSON file per key under a base directory.
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(op_err)?;
        Ok(Self {
            dir,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        })
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are dotted identifiers; anything else is flattened so a key
        // can never escape the base directory.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

fn op_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Operation(err.to_string())
}

fn read_if_exists(path: &Path) -> Result<Option<serde_json::Value>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(op_err),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(op_err(err)),
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        read_if_exists(&self.path_for(key))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec(&value).map_err(op_err)?;
        if encoded.len() > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                size: encoded.len(),
                limit: self.quota_bytes,
            });
        }
        let path = self.path_for(key);
        let file = fs::File::create(&path).map_err(op_err)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &value).map_err(op_err)?;
        debug!(key, path = %path.display(), "persisted storage entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(op_err(err)),
        }
    }
}
