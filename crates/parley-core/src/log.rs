//! Conversation log snapshots
//!
//! The log maps each peer to its ordered message sequence. Snapshots are
//! immutable once published: every operation returns a new log that shares
//! the untouched per-peer sequences with its predecessor.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::message::Message;
use crate::types::BareJid;

// ----------------------------------------------------------------------------
// Conversation Log
// ----------------------------------------------------------------------------

/// Immutable snapshot of every conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    conversations: BTreeMap<BareJid, Arc<Vec<Message>>>,
    version: u64,
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages exchanged with `peer`, empty for an unknown peer
    pub fn get(&self, peer: &BareJid) -> &[Message] {
        self.conversations
            .get(peer)
            .map(|messages| messages.as_slice())
            .unwrap_or(&[])
    }

    /// Number of messages with `peer`
    pub fn conversation_len(&self, peer: &BareJid) -> usize {
        self.get(peer).len()
    }

    /// True when `peer` has a key in the log, even with no messages
    pub fn contains_peer(&self, peer: &BareJid) -> bool {
        self.conversations.contains_key(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &BareJid> {
        self.conversations.keys()
    }

    /// Total message count across all peers
    pub fn len(&self) -> usize {
        self.conversations.values().map(|messages| messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutations that produced this snapshot
    pub fn version(&self) -> u64 {
        self.version
    }

    /// New log with `message` appended to the tail of `peer`'s sequence
    pub fn append(&self, peer: &BareJid, message: Message) -> Self {
        let mut messages = self.get(peer).to_vec();
        messages.push(message);
        self.replace(peer, messages)
    }

    /// New log where every message of `peer` matching `predicate` is replaced
    /// by `transform(message)`, with the number of replaced messages
    ///
    /// An unknown peer or a predicate matching nothing yields an unchanged
    /// clone and a count of zero.
    pub fn update_where<P, T>(&self, peer: &BareJid, predicate: P, transform: T) -> (Self, usize)
    where
        P: Fn(&Message) -> bool,
        T: Fn(&Message) -> Message,
    {
        let current = self.get(peer);
        if !current.iter().any(|message| predicate(message)) {
            return (self.clone(), 0);
        }

        let mut changed = 0;
        let messages = current
            .iter()
            .map(|message| {
                if predicate(message) {
                    changed += 1;
                    transform(message)
                } else {
                    message.clone()
                }
            })
            .collect();

        (self.replace(peer, messages), changed)
    }

    /// New log with `peer`'s sequence emptied; the key is kept
    pub fn clear(&self, peer: &BareJid) -> Self {
        self.replace(peer, Vec::new())
    }

    fn replace(&self, peer: &BareJid, messages: Vec<Message>) -> Self {
        let mut conversations = self.conversations.clone();
        conversations.insert(peer.clone(), Arc::new(messages));
        Self {
            conversations,
            version: self.version + 1,
        }
    }

    /// True when both snapshots point at the same sequence for `peer`
    pub fn shares_conversation_with(&self, other: &ConversationLog, peer: &BareJid) -> bool {
        match (self.conversations.get(peer), other.conversations.get(peer)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Two logs are equal when they hold the same conversations
impl PartialEq for ConversationLog {
    fn eq(&self, other: &Self) -> bool {
        self.conversations == other.conversations
    }
}

impl Eq for ConversationLog {}

// The persisted document is the bare peer -> messages mapping; the version
// counter is runtime-only.
impl Serialize for ConversationLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.conversations
                .iter()
                .map(|(peer, messages)| (peer, messages.as_slice())),
        )
    }
}

impl<'de> Deserialize<'de> for ConversationLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let conversations = BTreeMap::<BareJid, Vec<Message>>::deserialize(deserializer)?;
        Ok(Self {
            conversations: conversations
                .into_iter()
                .map(|(peer, messages)| (peer, Arc::new(messages)))
                .collect(),
            version: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::status::MessageStatus;
    use crate::types::MessageId;
    use chrono::{TimeZone, Utc};

    fn message(id: u64, from: &str) -> Message {
        Message {
            id: MessageId::Seq(id),
            from: BareJid::from(from),
            body: format!("message {}", id),
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            kind: MessageKind::Text,
            status: MessageStatus::Sending,
        }
    }

    #[test]
    fn test_unknown_peer_is_empty() {
        let log = ConversationLog::new();
        assert!(log.get(&BareJid::from("nobody@x")).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_append_keeps_previous_snapshot() {
        let peer = BareJid::from("peer@x");
        let first = ConversationLog::new().append(&peer, message(0, "me@x"));
        let second = first.append(&peer, message(1, "me@x"));

        assert_eq!(first.get(&peer).len(), 1);
        assert_eq!(second.get(&peer).len(), 2);
        assert_eq!(second.get(&peer)[1].id, MessageId::Seq(1));
        assert_eq!(second.version(), first.version() + 1);
    }

    #[test]
    fn test_untouched_peers_are_shared() {
        let alice = BareJid::from("alice@x");
        let bob = BareJid::from("bob@x");
        let log = ConversationLog::new()
            .append(&alice, message(0, "me@x"))
            .append(&bob, message(0, "me@x"));
        let next = log.append(&alice, message(1, "me@x"));

        assert!(next.shares_conversation_with(&log, &bob));
        assert!(!next.shares_conversation_with(&log, &alice));
    }

    #[test]
    fn test_update_where_counts_changes() {
        let peer = BareJid::from("peer@x");
        let log = ConversationLog::new()
            .append(&peer, message(0, "me@x"))
            .append(&peer, message(1, "peer@x"));

        let (updated, changed) = log.update_where(
            &peer,
            |m| m.from.as_str() == "me@x",
            |m| m.with_status(MessageStatus::Received),
        );
        assert_eq!(changed, 1);
        assert_eq!(updated.get(&peer)[0].status, MessageStatus::Received);
        assert_eq!(updated.get(&peer)[1].status, MessageStatus::Sending);
        assert_eq!(log.get(&peer)[0].status, MessageStatus::Sending);
    }

    #[test]
    fn test_update_where_unknown_peer_creates_no_key() {
        let peer = BareJid::from("ghost@x");
        let (updated, changed) =
            ConversationLog::new().update_where(&peer, |_| true, |m| m.clone());
        assert_eq!(changed, 0);
        assert!(!updated.contains_peer(&peer));
    }

    #[test]
    fn test_clear_preserves_key() {
        let peer = BareJid::from("peer@x");
        let log = ConversationLog::new().append(&peer, message(0, "me@x")).clear(&peer);
        assert!(log.contains_peer(&peer));
        assert!(log.get(&peer).is_empty());
    }

    #[test]
    fn test_json_document_shape() {
        let peer = BareJid::from("peer@x");
        let log = ConversationLog::new().append(&peer, message(0, "me@x"));
        let value = serde_json::to_value(&log).unwrap();
        assert!(value["peer@x"].is_array());
        assert_eq!(value["peer@x"][0]["status"], "sending");

        let decoded: ConversationLog = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, log);
    }
}
