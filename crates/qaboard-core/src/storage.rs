//! Durable key/value records
//!
//! Whole JSON records addressed by name. A write either lands completely or
//! leaves the previous record in place.

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Persisted administrator session
pub const SESSION_RECORD: &str = "qa_admin_session";
/// Ids of questions this client has rated
pub const RATED_RECORD: &str = "qa_rated_questions";
/// Visitor preferences
pub const PREFERENCES_RECORD: &str = "qa_user_preferences";

/// Durable record store
#[async_trait]
pub trait DurableStore: Send + Sync + Debug {
    /// Load a record
    async fn get(&self, record: &str) -> Result<Option<Value>, StorageError>;

    /// Replace a record
    async fn put(&self, record: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a record; deleting an absent record succeeds
    async fn remove(&self, record: &str) -> Result<(), StorageError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Value>,
}

impl MemoryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, record: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.records.get(record).map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: &str, value: Value) -> Result<(), StorageError> {
        self.records.insert(record.to_string(), value);
        Ok(())
    }

    async fn remove(&self, record: &str) -> Result<(), StorageError> {
        self.records.remove(record);
        Ok(())
    }
}

/// Single JSON document on disk holding every record
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StorageError::io_error(&self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Document to rewrite; a corrupt file is replaced rather than blocking writes
    async fn writable_document(&self) -> Result<Map<String, Value>, StorageError> {
        match self.read_document().await {
            Err(StorageError::Corrupt { path, reason }) => {
                warn!(path = %path.display(), %reason, "discarding corrupt store");
                Ok(Map::new())
            }
            other => other,
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| StorageError::Encode {
            record: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error(parent, e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| StorageError::io_error(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StorageError::io_error(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store written");
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, record: &str) -> Result<Option<Value>, StorageError> {
        let mut document = self.read_document().await?;
        Ok(document.remove(record))
    }

    async fn put(&self, record: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.writable_document().await?;
        document.insert(record.to_string(), value);
        self.write_document(&document).await
    }

    async fn remove(&self, record: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.writable_document().await?;
        if document.remove(record).is_none() {
            return Ok(());
        }
        self.write_document(&document).await
    }
}
