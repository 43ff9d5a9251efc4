//! Delivery status ranking
//!
//! Statuses form a total order. Reports from the remote peer (chat markers
//! and receipts) may only move our own messages forward and apply
//! cumulatively; local confirmations overwrite the status of exactly one
//! inbound message.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::StanzaError;
use crate::message::Message;
use crate::types::{BareJid, MessageId};

// ----------------------------------------------------------------------------
// Status and Marker Types
// ----------------------------------------------------------------------------

/// Delivery status of a message, declared in rank order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Received,
    Displayed,
    Acknowledged,
}

impl MessageStatus {
    /// Integer position in the status order
    pub fn rank(self) -> u8 {
        match self {
            MessageStatus::Sending => 0,
            MessageStatus::Received => 1,
            MessageStatus::Displayed => 2,
            MessageStatus::Acknowledged => 3,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageStatus::Sending => "sending",
            MessageStatus::Received => "received",
            MessageStatus::Displayed => "displayed",
            MessageStatus::Acknowledged => "acknowledged",
        };
        f.write_str(name)
    }
}

/// Chat marker (or delivery receipt) reported for a referenced message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMarker {
    Received,
    Displayed,
    Acknowledged,
}

impl ChatMarker {
    pub const ELEMENT_NAMES: [&'static str; 3] = ["received", "displayed", "acknowledged"];

    pub fn as_str(self) -> &'static str {
        match self {
            ChatMarker::Received => "received",
            ChatMarker::Displayed => "displayed",
            ChatMarker::Acknowledged => "acknowledged",
        }
    }

    /// Status a message reaches once this marker applies
    pub fn status(self) -> MessageStatus {
        match self {
            ChatMarker::Received => MessageStatus::Received,
            ChatMarker::Displayed => MessageStatus::Displayed,
            ChatMarker::Acknowledged => MessageStatus::Acknowledged,
        }
    }

    pub fn rank(self) -> u8 {
        self.status().rank()
    }
}

impl fmt::Display for ChatMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMarker {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(ChatMarker::Received),
            "displayed" => Ok(ChatMarker::Displayed),
            "acknowledged" => Ok(ChatMarker::Acknowledged),
            other => Err(StanzaError::UnknownMarker(other.to_string())),
        }
    }
}

/// Transient chat state notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Active,
    Composing,
    Inactive,
    Paused,
    Gone,
}

impl ChatState {
    pub const ELEMENT_NAMES: [&'static str; 5] =
        ["active", "composing", "inactive", "paused", "gone"];

    pub fn as_str(self) -> &'static str {
        match self {
            ChatState::Active => "active",
            ChatState::Composing => "composing",
            ChatState::Inactive => "inactive",
            ChatState::Paused => "paused",
            ChatState::Gone => "gone",
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatState {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChatState::Active),
            "composing" => Ok(ChatState::Composing),
            "inactive" => Ok(ChatState::Inactive),
            "paused" => Ok(ChatState::Paused),
            "gone" => Ok(ChatState::Gone),
            other => Err(StanzaError::UnknownChatState(other.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Update Rules
// ----------------------------------------------------------------------------

/// Cumulative, rank-guarded rule for markers reported by the peer
///
/// Matches every message not authored by `partner` whose numeric id is at
/// most `reference` and whose status ranks below `marker`.
#[derive(Debug, Clone)]
pub struct PeerMarkerRule {
    partner: BareJid,
    reference: Option<u64>,
    marker: ChatMarker,
}

impl PeerMarkerRule {
    /// `reference` is the raw id attribute; a non-numeric value matches nothing
    pub fn new(partner: BareJid, reference: &str, marker: ChatMarker) -> Self {
        Self {
            partner,
            reference: MessageId::parse(reference).as_sequence(),
            marker,
        }
    }

    /// False when the reference could not be read as a number
    pub fn is_applicable(&self) -> bool {
        self.reference.is_some()
    }

    pub fn matches(&self, message: &Message) -> bool {
        let Some(reference) = self.reference else {
            return false;
        };
        let within_range = message
            .id
            .as_sequence()
            .map(|id| id <= reference)
            .unwrap_or(false);

        !message.is_from(&self.partner)
            && within_range
            && message.status.rank() < self.marker.rank()
    }

    pub fn apply(&self, message: &Message) -> Message {
        message.with_status(self.marker.status())
    }
}

/// Exact-id, unguarded rule for markers and receipts we confirmed locally
#[derive(Debug, Clone)]
pub struct LocalMarkerRule {
    partner: BareJid,
    id: MessageId,
    status: MessageStatus,
}

impl LocalMarkerRule {
    pub fn new(partner: BareJid, id: MessageId, marker: ChatMarker) -> Self {
        Self {
            partner,
            id,
            status: marker.status(),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        message.is_from(&self.partner) && message.id == self.id
    }

    pub fn apply(&self, message: &Message) -> Message {
        message.with_status(self.status)
    }
}
