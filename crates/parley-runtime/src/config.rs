//! Runtime Configuration
//!
//! Channel sizing and storage location for a hosted conversation store.

use std::path::PathBuf;

use parley_core::{ParleyError, ParleyResult, StoreConfig};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes of the channels around the store task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Actions waiting for the store task
    pub action_buffer_size: usize,
    /// Notifications retained for slow subscribers
    pub notification_buffer_size: usize,
    /// Outbound stanzas waiting for the transport
    pub outbound_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            action_buffer_size: 256,
            notification_buffer_size: 128,
            outbound_buffer_size: 512,
        }
    }
}

impl ChannelConfig {
    /// Smaller buffers for constrained devices
    pub fn low_memory() -> Self {
        Self {
            action_buffer_size: 32,
            notification_buffer_size: 16,
            outbound_buffer_size: 64,
        }
    }

    pub fn testing() -> Self {
        Self {
            action_buffer_size: 16,
            notification_buffer_size: 64,
            outbound_buffer_size: 64,
        }
    }

    pub fn validate(&self) -> ParleyResult<()> {
        let sizes = [
            ("action_buffer_size", self.action_buffer_size),
            ("notification_buffer_size", self.notification_buffer_size),
            ("outbound_buffer_size", self.outbound_buffer_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(ParleyError::config_error(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Runtime Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of a hosted store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub channels: ChannelConfig,
    pub store: StoreConfig,
    /// Directory for snapshot files; in-memory storage when unset
    pub storage_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn low_memory() -> Self {
        Self {
            channels: ChannelConfig::low_memory(),
            ..Self::default()
        }
    }

    /// In-memory storage, small buffers and a dedicated storage key
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            store: StoreConfig::testing(),
            storage_dir: None,
        }
    }

    pub fn with_storage_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> ParleyResult<()> {
        self.channels.validate()?;
        self.store.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
        assert!(RuntimeConfig::low_memory().validate().is_ok());
        assert!(RuntimeConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = RuntimeConfig::default();
        config.channels.outbound_buffer_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outbound_buffer_size"));
    }

    #[test]
    fn test_empty_storage_key_rejected() {
        let mut config = RuntimeConfig::testing();
        config.store.storage_key = String::new();
        assert!(config.validate().is_err());
    }
}
