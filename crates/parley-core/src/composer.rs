//! Outbound stanza composition
//!
//! Builds the stanzas for message sends, chat markers, delivery receipts and
//! chat state notifications, and hands them to the transport. Dispatch is
//! fire-and-forget: the composer never learns whether a stanza arrived.

use core::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::message::OutgoingContent;
use crate::stanza::{ns, Element};
use crate::status::{ChatMarker, ChatState};
use crate::types::{BareJid, FullJid, MessageId};

// ----------------------------------------------------------------------------
// Transport Capability
// ----------------------------------------------------------------------------

/// Outbound half of the transport, supplied when the connection is ready
pub trait StanzaSink: Send + Sync + fmt::Debug {
    /// Queue a stanza for delivery; failures are not reported back
    fn send(&self, stanza: Element);
}

// ----------------------------------------------------------------------------
// Outbound Composer
// ----------------------------------------------------------------------------

/// Composes and dispatches stanzas on behalf of the connected account
#[derive(Debug, Clone)]
pub struct OutboundComposer {
    jid: FullJid,
    sink: Arc<dyn StanzaSink>,
}

impl OutboundComposer {
    pub fn new(jid: FullJid, sink: Arc<dyn StanzaSink>) -> Self {
        Self { jid, sink }
    }

    /// Full address of the connected account
    pub fn jid(&self) -> &FullJid {
        &self.jid
    }

    /// Chat message requesting both chat markers and a delivery receipt
    pub fn message_stanza(
        &self,
        peer: &BareJid,
        id: &MessageId,
        content: &OutgoingContent,
    ) -> Element {
        let mut stanza = self
            .addressed(peer)
            .attr_set("type", "chat")
            .attr_set("id", id.to_string());

        match content {
            OutgoingContent::Text(text) => {
                stanza.push_child(Element::new("body").text_set(text.as_str()));
                stanza.push_child(Element::with_ns(ChatState::Active.as_str(), ns::CHAT_STATES));
            }
            OutgoingContent::Sticker(sticker) => {
                stanza.push_child(
                    Element::with_ns("sticker", ns::STICKERS).attr_set("uid", sticker.uid()),
                );
            }
        }

        stanza
            .child(Element::with_ns("markable", ns::CHAT_MARKERS))
            .child(Element::with_ns("request", ns::RECEIPTS))
    }

    /// Bare chat marker referencing one message
    pub fn marker_stanza(&self, peer: &BareJid, id: &MessageId, marker: ChatMarker) -> Element {
        self.addressed(peer).child(
            Element::with_ns(marker.as_str(), ns::CHAT_MARKERS).attr_set("id", id.to_string()),
        )
    }

    /// Delivery receipt confirming one message
    pub fn receipt_stanza(&self, peer: &BareJid, id: &MessageId) -> Element {
        self.addressed(peer)
            .child(Element::with_ns("received", ns::RECEIPTS).attr_set("id", id.to_string()))
    }

    /// Standalone chat state notification
    pub fn state_stanza(&self, peer: &BareJid, state: ChatState) -> Element {
        self.addressed(peer)
            .attr_set("type", "chat")
            .child(Element::with_ns(state.as_str(), ns::CHAT_STATES))
    }

    pub fn send_message(&self, peer: &BareJid, id: &MessageId, content: &OutgoingContent) {
        self.dispatch(self.message_stanza(peer, id, content));
    }

    pub fn send_marker(&self, peer: &BareJid, id: &MessageId, marker: ChatMarker) {
        self.dispatch(self.marker_stanza(peer, id, marker));
    }

    pub fn send_receipt(&self, peer: &BareJid, id: &MessageId) {
        self.dispatch(self.receipt_stanza(peer, id));
    }

    pub fn send_state(&self, peer: &BareJid, state: ChatState) {
        self.dispatch(self.state_stanza(peer, state));
    }

    fn addressed(&self, peer: &BareJid) -> Element {
        Element::with_ns("message", ns::CLIENT)
            .attr_set("from", self.jid.as_str())
            .attr_set("to", peer.as_str())
    }

    fn dispatch(&self, stanza: Element) {
        trace!(to = stanza.attr("to").unwrap_or_default(), "Dispatching stanza");
        self.sink.send(stanza);
    }
}
