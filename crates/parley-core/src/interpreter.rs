//! Inbound stanza interpretation
//!
//! Classifies one inbound stanza into a closed set of events before any log
//! logic runs. The interpreter never touches the log itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::{Message, MessageKind};
use crate::stanza::Element;
use crate::status::{ChatMarker, ChatState, MessageStatus};
use crate::types::{BareJid, MessageId};

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Protocol follow-ups requested by an inbound message
///
/// Always empty for echoes of our own messages (carbons of what another of
/// our devices sent): we never mark or confirm our own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FollowUps {
    /// The message is markable; answer with a `received` chat marker
    pub marker: bool,
    /// The message requested a delivery receipt
    pub receipt: bool,
}

impl FollowUps {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.marker && !self.receipt
    }
}

/// Why a stanza produced no event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    /// The stanza has no `from` address
    MissingSender,
    /// No chat state, marker, body or sticker was found
    NoPayload,
    /// An echo of our own message without a `to` address
    MissingRecipient,
}

/// Internal event produced from an inbound stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StanzaEvent {
    /// The sender's chat state changed; never persisted
    StateChange { peer: BareJid, state: ChatState },
    /// The peer reported a marker or receipt for one of our messages
    Acknowledgment {
        peer: BareJid,
        reference: String,
        marker: ChatMarker,
    },
    /// A message with a body or sticker to append to `peer`'s conversation
    Content {
        peer: BareJid,
        message: Message,
        follow_ups: FollowUps,
    },
    Ignored { reason: IgnoreReason },
}

// ----------------------------------------------------------------------------
// Stanza Interpreter
// ----------------------------------------------------------------------------

/// Classifies inbound stanzas on behalf of the local account
#[derive(Debug, Clone)]
pub struct StanzaInterpreter {
    own: BareJid,
}

impl StanzaInterpreter {
    /// Create an interpreter for the account with bare address `own`
    pub fn new(own: BareJid) -> Self {
        Self { own }
    }

    pub fn own(&self) -> &BareJid {
        &self.own
    }

    /// Classify `stanza`; `now` is the capture time for undelayed messages
    pub fn interpret(&self, stanza: &Element, now: DateTime<Utc>) -> Vec<StanzaEvent> {
        let stanza = unwrap_carbon(stanza);

        let Some(from) = stanza.attr("from") else {
            return vec![StanzaEvent::Ignored {
                reason: IgnoreReason::MissingSender,
            }];
        };
        let sender = BareJid::from_address(from);
        let recipient = BareJid::from_address(stanza.attr("to").unwrap_or_default());

        // Our own message echoed back by another device belongs to the recipient
        let partner = if sender == self.own {
            if recipient.is_empty() {
                return vec![StanzaEvent::Ignored {
                    reason: IgnoreReason::MissingRecipient,
                }];
            }
            recipient
        } else {
            sender.clone()
        };

        let mut events = Vec::new();

        if let Some(state) = stanza
            .find_any(&ChatState::ELEMENT_NAMES)
            .and_then(|el| el.name().parse::<ChatState>().ok())
        {
            events.push(StanzaEvent::StateChange {
                peer: sender.clone(),
                state,
            });
        }

        if let Some(element) = stanza.find_any(&ChatMarker::ELEMENT_NAMES) {
            if let Ok(marker) = element.name().parse::<ChatMarker>() {
                events.push(StanzaEvent::Acknowledgment {
                    peer: partner.clone(),
                    reference: element.attr("id").unwrap_or_default().to_string(),
                    marker,
                });
            }
        }

        if let Some((body, kind)) = payload(stanza) {
            let id = MessageId::parse(stanza.attr("id").unwrap_or_default());
            let time = delayed_stamp(stanza).unwrap_or(now);

            let follow_ups = if sender == self.own {
                FollowUps::none()
            } else {
                FollowUps {
                    marker: stanza.has("markable"),
                    receipt: stanza.has("request"),
                }
            };

            events.push(StanzaEvent::Content {
                peer: partner,
                message: Message {
                    id,
                    from: sender,
                    body,
                    time,
                    kind,
                    status: MessageStatus::Received,
                },
                follow_ups,
            });
        }

        if events.is_empty() {
            events.push(StanzaEvent::Ignored {
                reason: IgnoreReason::NoPayload,
            });
        }

        events
    }
}

/// Replace a carbon copy by the message it forwards
fn unwrap_carbon(stanza: &Element) -> &Element {
    stanza
        .find("forwarded")
        .and_then(|forwarded| forwarded.find("message"))
        .unwrap_or(stanza)
}

/// Body text or sticker uid; sticker wins when both are present
fn payload(stanza: &Element) -> Option<(String, MessageKind)> {
    if let Some(sticker) = stanza.find("sticker") {
        let uid = sticker.attr("uid").unwrap_or_default();
        return Some((uid.to_string(), MessageKind::Sticker));
    }
    stanza
        .find("body")
        .map(|body| (body.text().to_string(), MessageKind::Text))
}

fn delayed_stamp(stanza: &Element) -> Option<DateTime<Utc>> {
    let stamp = stanza.find("delay")?.attr("stamp")?;
    match DateTime::parse_from_rfc3339(stamp) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(e) => {
            debug!(stamp, error = %e, "Unreadable delay stamp, using capture time");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::ns;
    use chrono::TimeZone;

    const ME: &str = "romeo@montague.lit";
    const PEER: &str = "juliet@capulet.lit";

    fn interpreter() -> StanzaInterpreter {
        StanzaInterpreter::new(BareJid::from(ME))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn chat_from_peer() -> Element {
        Element::message()
            .attr_set("from", format!("{}/balcony", PEER))
            .attr_set("to", format!("{}/orchard", ME))
            .attr_set("id", "3")
            .attr_set("type", "chat")
    }

    #[test]
    fn test_text_message_with_follow_ups() {
        let stanza = chat_from_peer()
            .child(Element::new("body").text_set("wherefore art thou"))
            .child(Element::with_ns("markable", ns::CHAT_MARKERS))
            .child(Element::with_ns("request", ns::RECEIPTS));

        let events = interpreter().interpret(&stanza, now());
        assert_eq!(events.len(), 1);
        match &events[0] {
            StanzaEvent::Content {
                peer,
                message,
                follow_ups,
            } => {
                assert_eq!(peer.as_str(), PEER);
                assert_eq!(message.from.as_str(), PEER);
                assert_eq!(message.id, MessageId::Seq(3));
                assert_eq!(message.body, "wherefore art thou");
                assert_eq!(message.kind, MessageKind::Text);
                assert_eq!(message.status, MessageStatus::Received);
                assert_eq!(message.time, now());
                assert!(follow_ups.marker);
                assert!(follow_ups.receipt);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_chat_state_and_body_both_reported() {
        let stanza = chat_from_peer()
            .child(Element::new("body").text_set("hi"))
            .child(Element::with_ns("active", ns::CHAT_STATES));

        let events = interpreter().interpret(&stanza, now());
        assert!(matches!(
            events[0],
            StanzaEvent::StateChange {
                state: ChatState::Active,
                ..
            }
        ));
        assert!(matches!(events[1], StanzaEvent::Content { .. }));
    }

    #[test]
    fn test_marker_reference_is_kept_raw() {
        let stanza = chat_from_peer()
            .child(Element::with_ns("displayed", ns::CHAT_MARKERS).attr_set("id", "12"));

        let events = interpreter().interpret(&stanza, now());
        assert_eq!(
            events,
            vec![StanzaEvent::Acknowledgment {
                peer: BareJid::from(PEER),
                reference: "12".to_string(),
                marker: ChatMarker::Displayed,
            }]
        );
    }

    #[test]
    fn test_sent_carbon_routes_to_recipient() {
        let stanza = Element::message()
            .attr_set("from", ME)
            .attr_set("to", format!("{}/orchard", ME))
            .child(
                Element::with_ns("sent", ns::CARBONS).child(
                    Element::with_ns("forwarded", ns::FORWARD).child(
                        Element::message()
                            .attr_set("from", format!("{}/phone", ME))
                            .attr_set("to", PEER)
                            .attr_set("id", "9")
                            .child(Element::new("body").text_set("from my phone"))
                            .child(Element::with_ns("markable", ns::CHAT_MARKERS))
                            .child(Element::with_ns("request", ns::RECEIPTS)),
                    ),
                ),
            );

        let events = interpreter().interpret(&stanza, now());
        match &events[0] {
            StanzaEvent::Content {
                peer,
                message,
                follow_ups,
            } => {
                assert_eq!(peer.as_str(), PEER);
                assert_eq!(message.from.as_str(), ME);
                assert!(follow_ups.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_own_echo_without_recipient_is_ignored() {
        let stanza = Element::message()
            .attr_set("from", format!("{}/phone", ME))
            .attr_set("id", "2")
            .child(Element::new("body").text_set("to nobody"));

        let events = interpreter().interpret(&stanza, now());
        assert_eq!(
            events,
            vec![StanzaEvent::Ignored {
                reason: IgnoreReason::MissingRecipient,
            }]
        );
    }

    #[test]
    fn test_received_carbon_routes_to_sender() {
        let stanza = Element::message()
            .attr_set("from", ME)
            .child(
                Element::with_ns("received", ns::CARBONS).child(
                    Element::with_ns("forwarded", ns::FORWARD).child(
                        chat_from_peer().child(Element::new("body").text_set("copy")),
                    ),
                ),
            );

        let events = interpreter().interpret(&stanza, now());
        assert_eq!(events.len(), 1);
        match &events[0] {
            StanzaEvent::Content { peer, .. } => assert_eq!(peer.as_str(), PEER),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_sticker_wins_over_body() {
        let stanza = chat_from_peer()
            .child(Element::new("body").text_set("fallback text"))
            .child(Element::with_ns("sticker", ns::STICKERS).attr_set("uid", "org.pack.heart"));

        let events = interpreter().interpret(&stanza, now());
        match &events[0] {
            StanzaEvent::Content { message, .. } => {
                assert_eq!(message.kind, MessageKind::Sticker);
                assert_eq!(message.body, "org.pack.heart");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_delay_stamp_used_as_time() {
        let stanza = chat_from_peer()
            .child(Element::new("body").text_set("late"))
            .child(Element::with_ns("delay", ns::DELAY).attr_set("stamp", "2002-09-10T23:08:25Z"));

        let events = interpreter().interpret(&stanza, now());
        match &events[0] {
            StanzaEvent::Content { message, .. } => {
                assert_eq!(message.time, Utc.with_ymd_and_hms(2002, 9, 10, 23, 8, 25).unwrap());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_bad_delay_stamp_falls_back_to_now() {
        let stanza = chat_from_peer()
            .child(Element::new("body").text_set("late"))
            .child(Element::with_ns("delay", ns::DELAY).attr_set("stamp", "yesterday"));

        match &interpreter().interpret(&stanza, now())[0] {
            StanzaEvent::Content { message, .. } => assert_eq!(message.time, now()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_empty_stanza_is_ignored() {
        let events = interpreter().interpret(&chat_from_peer(), now());
        assert_eq!(
            events,
            vec![StanzaEvent::Ignored {
                reason: IgnoreReason::NoPayload
            }]
        );

        let anonymous = Element::message().child(Element::new("body").text_set("?"));
        assert_eq!(
            interpreter().interpret(&anonymous, now()),
            vec![StanzaEvent::Ignored {
                reason: IgnoreReason::MissingSender
            }]
        );
    }
}
