//! Store Configuration
//!
//! Settings for the conversation store: where the snapshot lives and which
//! protocol follow-ups are answered automatically.

use serde::{Deserialize, Serialize};

use crate::errors::{ParleyError, Result};

/// Default key the log snapshot is stored under
pub const DEFAULT_STORAGE_KEY: &str = "ConversationsStore";

// ----------------------------------------------------------------------------
// Store Configuration
// ----------------------------------------------------------------------------

/// Configuration for the conversation store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key of the persisted snapshot
    pub storage_key: String,
    /// Answer markable messages with a `received` chat marker
    pub auto_markers: bool,
    /// Answer receipt requests with a delivery receipt
    pub auto_receipts: bool,
    /// Upper bound on follow-up actions drained after one dispatch
    pub max_follow_ups_per_dispatch: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            auto_markers: true,
            auto_receipts: true,
            max_follow_ups_per_dispatch: 64,
        }
    }
}

impl StoreConfig {
    /// Never confirm reception automatically (privacy mode)
    pub fn quiet() -> Self {
        Self {
            auto_markers: false,
            auto_receipts: false,
            ..Self::default()
        }
    }

    /// Configuration for tests, with a dedicated storage key
    pub fn testing() -> Self {
        Self {
            storage_key: "ConversationsStore.test".to_string(),
            max_follow_ups_per_dispatch: 16,
            ..Self::default()
        }
    }

    pub fn with_storage_key<K: Into<String>>(mut self, key: K) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Check the configuration for values the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(ParleyError::config_error("storage_key must not be empty"));
        }
        if self.max_follow_ups_per_dispatch == 0 {
            return Err(ParleyError::config_error(
                "max_follow_ups_per_dispatch must be at least 1",
            ));
        }
        Ok(())
    }
}
