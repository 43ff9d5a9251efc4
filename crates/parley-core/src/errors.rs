//! Error types for the Parley conversation core
//!
//! This module contains the storage and stanza error types along with the
//! ParleyError type that unifies them for the whole crate.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Specific snapshot storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot under key {key} could not be decoded: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Snapshot could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },
}

/// Specific stanza construction and inspection error types
#[derive(Debug, thiserror::Error)]
pub enum StanzaError {
    #[error("Unknown chat state: {0}")]
    UnknownChatState(String),
    #[error("Unknown chat marker: {0}")]
    UnknownMarker(String),
    #[error("Malformed sticker reference: {0}")]
    MalformedSticker(String),
    #[error("Malformed address: {0}")]
    MalformedJid(String),
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the conversation store
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Stanza error: {0}")]
    Stanza(#[from] StanzaError),

    /// The action needs a transport but no connection has been reported yet
    #[error("No connection available for action {action}")]
    NotConnected { action: &'static str },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Channel communication error (runtime hosting)
    #[error("Channel error: {message}")]
    Channel { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ParleyError {
    /// Create a not-connected error for the named action
    pub fn not_connected(action: &'static str) -> Self {
        ParleyError::NotConnected { action }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        ParleyError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        ParleyError::Channel {
            message: message.into(),
        }
    }

    /// Create a storage-unavailable error with a reason
    pub fn storage_unavailable<T: Into<String>>(reason: T) -> Self {
        ParleyError::Persistence(StorageError::Unavailable {
            reason: reason.into(),
        })
    }

    /// True when the error came from decoding a stored snapshot
    pub fn is_corrupt_snapshot(&self) -> bool {
        matches!(self, ParleyError::Persistence(StorageError::Corrupt { .. }))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ParleyError>;
pub type ParleyResult<T> = Result<T>;
