//! Conversation messages
//!
//! One entry of a peer's conversation, in the shape it is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::MessageStatus;
use crate::types::{BareJid, MessageId, StickerRef};

// ----------------------------------------------------------------------------
// Message Types
// ----------------------------------------------------------------------------

/// Kind of payload a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Sticker,
}

/// Outgoing payload as handed to the composer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingContent {
    Text(String),
    Sticker(StickerRef),
}

impl OutgoingContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutgoingContent::Text(_) => MessageKind::Text,
            OutgoingContent::Sticker(_) => MessageKind::Sticker,
        }
    }

    /// Body as stored in the log
    pub fn body(&self) -> String {
        match self {
            OutgoingContent::Text(text) => text.clone(),
            OutgoingContent::Sticker(sticker) => sticker.uid(),
        }
    }
}

/// One entry in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier within the peer's conversation
    pub id: MessageId,
    /// Bare address of the author
    pub from: BareJid,
    /// Text, or the sticker uid for sticker messages
    pub body: String,
    /// Delayed-delivery stamp when present, capture time otherwise
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub status: MessageStatus,
}

impl Message {
    /// True when `author` wrote this message
    pub fn is_from(&self, author: &BareJid) -> bool {
        &self.from == author
    }

    /// Copy of this message with a different status
    pub fn with_status(&self, status: MessageStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}
