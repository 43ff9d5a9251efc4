//! Durable snapshot storage
//!
//! The whole conversation log is written as one JSON document under a fixed
//! key after every mutation, read once when the store opens, and erased when
//! the session ends.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{Result, StorageError};
use crate::log::ConversationLog;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Key-value storage abstraction for log snapshots
pub trait SnapshotStorage: Send {
    /// Store data under a key, replacing any previous value
    fn store(&mut self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Retrieve data by key
    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete data by key; deleting a missing key succeeds
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Check if storage is available and accessible
    fn is_available(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Memory Storage Implementation
// ----------------------------------------------------------------------------

/// In-memory storage implementation for testing and ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: BTreeMap<String, Vec<u8>>,
    unavailable: bool,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unavailable backend
    pub fn set_available(&mut self, available: bool) {
        self.unavailable = !available;
    }

    /// Raw bytes stored under `key`
    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(StorageError::Unavailable {
                reason: "memory storage disabled".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl SnapshotStorage for MemoryStorage {
    fn store(&mut self, key: &str, data: Vec<u8>) -> Result<()> {
        self.check()?;
        self.data.insert(key.to_string(), data);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.check()?;
        self.data.remove(key);
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

// ----------------------------------------------------------------------------
// Persistence Gateway
// ----------------------------------------------------------------------------

/// Loads, saves and erases the log snapshot under one key
#[derive(Debug)]
pub struct PersistenceGateway<S: SnapshotStorage> {
    storage: S,
    key: String,
}

impl<S: SnapshotStorage> PersistenceGateway<S> {
    pub fn new<K: Into<String>>(storage: S, key: K) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decode the stored snapshot, or an empty log when none exists
    ///
    /// A snapshot that exists but cannot be decoded is reported as
    /// `StorageError::Corrupt` rather than replaced with an empty log.
    pub fn load(&self) -> Result<ConversationLog> {
        let Some(bytes) = self.storage.retrieve(&self.key)? else {
            debug!(key = %self.key, "No stored snapshot, starting empty");
            return Ok(ConversationLog::new());
        };

        let log: ConversationLog =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                key: self.key.clone(),
                source,
            })?;
        debug!(key = %self.key, messages = log.len(), "Loaded stored snapshot");
        Ok(log)
    }

    /// Encode and store the entire log
    pub fn save(&mut self, log: &ConversationLog) -> Result<()> {
        let bytes = serde_json::to_vec(log).map_err(StorageError::Encode)?;
        self.storage.store(&self.key, bytes)
    }

    /// Remove the stored snapshot
    pub fn erase(&mut self) -> Result<()> {
        self.storage.delete(&self.key)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
