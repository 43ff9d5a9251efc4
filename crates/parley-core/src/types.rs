//! Core types for the conversation store
//!
//! This module defines the addressing, identifier and time types used
//! throughout the crate, using newtype patterns for semantic validation.

use chrono::{DateTime, Utc};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::StanzaError;

// ----------------------------------------------------------------------------
// Addresses
// ----------------------------------------------------------------------------

/// Account address without its resource suffix (`user@host`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BareJid(String);

impl BareJid {
    /// Reduce any address to its bare form by dropping the `/resource` part
    pub fn from_address(address: &str) -> Self {
        let bare = address.split('/').next().unwrap_or_default();
        Self(bare.to_string())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty address produced by a missing attribute
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BareJid {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = Self::from_address(s.trim());
        if bare.is_empty() {
            return Err(StanzaError::MalformedJid(s.to_string()));
        }
        Ok(bare)
    }
}

impl From<&str> for BareJid {
    fn from(address: &str) -> Self {
        Self::from_address(address)
    }
}

/// Full address of the local connection, resource included
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullJid(String);

impl FullJid {
    /// Create a full address, rejecting empty input
    pub fn new<T: Into<String>>(address: T) -> Result<Self, StanzaError> {
        let address = address.into();
        if BareJid::from_address(&address).is_empty() {
            return Err(StanzaError::MalformedJid(address));
        }
        Ok(Self(address))
    }

    /// The bare form of this address
    pub fn bare(&self) -> BareJid {
        BareJid::from_address(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FullJid {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Identifier of a message within one peer's conversation
///
/// Locally sent messages are numbered by the length of the log at send time.
/// Identifiers chosen by remote clients are kept as numbers when they are the
/// canonical decimal form of one, otherwise verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Seq(u64),
    Opaque(String),
}

impl MessageId {
    /// Normalize an identifier read from a stanza attribute
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) if n.to_string() == raw => MessageId::Seq(n),
            _ => MessageId::Opaque(raw.to_string()),
        }
    }

    /// Numeric view used by cumulative marker comparisons
    pub fn as_sequence(&self) -> Option<u64> {
        match self {
            MessageId::Seq(n) => Some(*n),
            MessageId::Opaque(raw) => raw.parse().ok(),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Seq(n) => write!(f, "{}", n),
            MessageId::Opaque(raw) => f.write_str(raw),
        }
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        MessageId::Seq(n)
    }
}

// ----------------------------------------------------------------------------
// Sticker Reference
// ----------------------------------------------------------------------------

/// Sticker reference composed of origin, pack and sticker identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StickerRef {
    pub origin: String,
    pub pack: String,
    pub id: String,
}

impl StickerRef {
    pub fn new<O, P, I>(origin: O, pack: P, id: I) -> Self
    where
        O: Into<String>,
        P: Into<String>,
        I: Into<String>,
    {
        Self {
            origin: origin.into(),
            pack: pack.into(),
            id: id.into(),
        }
    }

    /// The `uid` carried on the wire and stored as the message body
    pub fn uid(&self) -> String {
        format!("{}.{}.{}", self.origin, self.pack, self.id)
    }
}

impl fmt::Display for StickerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uid())
    }
}

impl FromStr for StickerRef {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(origin), Some(pack), Some(id))
                if !origin.is_empty() && !pack.is_empty() && !id.is_empty() =>
            {
                Ok(Self::new(origin, pack, id))
            }
            _ => Err(StanzaError::MalformedSticker(s.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing capture timestamps
///
/// Injected into the store so that message times are deterministic under
/// test.
pub trait TimeSource: Send {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_jid_strips_resource() {
        let bare = BareJid::from_address("juliet@capulet.lit/balcony");
        assert_eq!(bare.as_str(), "juliet@capulet.lit");

        let already_bare = BareJid::from_address("romeo@montague.lit");
        assert_eq!(already_bare.as_str(), "romeo@montague.lit");
    }

    #[test]
    fn test_bare_jid_rejects_empty() {
        assert!("".parse::<BareJid>().is_err());
        assert!("/resource".parse::<BareJid>().is_err());
        assert!(FullJid::new("").is_err());
    }

    #[test]
    fn test_full_jid_bare() {
        let jid: FullJid = "romeo@montague.lit/orchard".parse().unwrap();
        assert_eq!(jid.bare(), BareJid::from("romeo@montague.lit"));
        assert_eq!(jid.as_str(), "romeo@montague.lit/orchard");
    }

    #[test]
    fn test_message_id_parse() {
        assert_eq!(MessageId::parse("7"), MessageId::Seq(7));
        assert_eq!(MessageId::parse("07"), MessageId::Opaque("07".to_string()));
        assert_eq!(
            MessageId::parse("a1b2"),
            MessageId::Opaque("a1b2".to_string())
        );
        assert_eq!(MessageId::parse(""), MessageId::Opaque(String::new()));
    }

    #[test]
    fn test_message_id_sequence_view() {
        assert_eq!(MessageId::Seq(3).as_sequence(), Some(3));
        assert_eq!(MessageId::Opaque("07".to_string()).as_sequence(), Some(7));
        assert_eq!(MessageId::Opaque("abc".to_string()).as_sequence(), None);
    }

    #[test]
    fn test_message_id_json_shape() {
        assert_eq!(serde_json::to_string(&MessageId::Seq(2)).unwrap(), "2");
        assert_eq!(
            serde_json::to_string(&MessageId::Opaque("x9".to_string())).unwrap(),
            "\"x9\""
        );
        let back: MessageId = serde_json::from_str("\"x9\"").unwrap();
        assert_eq!(back, MessageId::Opaque("x9".to_string()));
    }

    #[test]
    fn test_sticker_uid() {
        let sticker = StickerRef::new("stickers.example", "cats", "grumpy");
        assert_eq!(sticker.uid(), "stickers.example.cats.grumpy");

        let parsed: StickerRef = "org.pack.id".parse().unwrap();
        assert_eq!(parsed, StickerRef::new("org", "pack", "id"));
        assert!("org.pack".parse::<StickerRef>().is_err());
    }
}
