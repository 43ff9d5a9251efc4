//! Action and Notification Types
//!
//! Everything the surrounding application asks of the store arrives as an
//! `Action`; everything observers learn leaves as a `Notification`.

use core::fmt;
use std::sync::Arc;

use crate::composer::StanzaSink;
use crate::log::ConversationLog;
use crate::message::OutgoingContent;
use crate::stanza::Element;
use crate::status::{ChatMarker, ChatState};
use crate::types::{BareJid, FullJid, MessageId};

// ----------------------------------------------------------------------------
// Action: Application → Store
// ----------------------------------------------------------------------------

/// Inbound action surface of the conversation store
#[derive(Debug, Clone)]
pub enum Action {
    /// The session is up; `transport` carries outbound stanzas
    ConnectionReady {
        jid: FullJid,
        transport: Arc<dyn StanzaSink>,
    },
    /// A stanza arrived from the server
    StanzaReceived(Element),
    /// Send a text or sticker message
    SendMessage {
        peer: BareJid,
        content: OutgoingContent,
    },
    /// Notify the peer of our chat state
    SendStateChange { peer: BareJid, state: ChatState },
    /// The peer reported `marker` for messages up to `reference`
    ApplyMarker {
        peer: BareJid,
        reference: String,
        marker: ChatMarker,
    },
    /// Send a chat marker for one of the peer's messages and record it
    SetLocalMarker {
        peer: BareJid,
        id: MessageId,
        marker: ChatMarker,
    },
    /// Confirm delivery of one of the peer's messages and record it
    ConfirmReceipt { peer: BareJid, id: MessageId },
    /// Empty the conversation with `peer`
    ClearConversation { peer: BareJid },
    /// Log out: drop the connection and erase all stored conversations
    EndSession,
}

impl Action {
    /// Short action name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Action::ConnectionReady { .. } => "connection_ready",
            Action::StanzaReceived(_) => "stanza_received",
            Action::SendMessage { .. } => "send_message",
            Action::SendStateChange { .. } => "send_state_change",
            Action::ApplyMarker { .. } => "apply_marker",
            Action::SetLocalMarker { .. } => "set_local_marker",
            Action::ConfirmReceipt { .. } => "confirm_receipt",
            Action::ClearConversation { .. } => "clear_conversation",
            Action::EndSession => "end_session",
        }
    }

    pub fn send_text<T: Into<String>>(peer: BareJid, text: T) -> Self {
        Action::SendMessage {
            peer,
            content: OutgoingContent::Text(text.into()),
        }
    }

    pub fn apply_marker<R: Into<String>>(peer: BareJid, reference: R, marker: ChatMarker) -> Self {
        Action::ApplyMarker {
            peer,
            reference: reference.into(),
            marker,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Notification: Store → Observers
// ----------------------------------------------------------------------------

/// Outbound notification surface of the conversation store
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A new snapshot of the whole log was published
    LogChanged(Arc<ConversationLog>),
    /// A peer's chat state changed
    PeerStateChanged { peer: BareJid, state: ChatState },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::LogChanged(_) => "log_changed",
            Notification::PeerStateChanged { .. } => "peer_state_changed",
        }
    }
}
