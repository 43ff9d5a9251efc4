//! Conversation Store
//!
//! The single owner of the conversation log. Actions are processed one at a
//! time: classification, log mutation, persistence write and notification all
//! finish before the next action is looked at. Protocol follow-ups (automatic
//! markers and receipts) are queued and run as separate actions once the
//! triggering action has completed.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{Action, Notification};
use crate::composer::{OutboundComposer, StanzaSink};
use crate::config::StoreConfig;
use crate::errors::{ParleyError, Result};
use crate::interpreter::{FollowUps, StanzaEvent, StanzaInterpreter};
use crate::log::ConversationLog;
use crate::message::{Message, OutgoingContent};
use crate::persistence::{PersistenceGateway, SnapshotStorage};
use crate::stanza::Element;
use crate::status::{ChatMarker, ChatState, LocalMarkerRule, MessageStatus, PeerMarkerRule};
use crate::types::{BareJid, FullJid, MessageId, SystemTimeSource, TimeSource};

// ----------------------------------------------------------------------------
// Connection
// ----------------------------------------------------------------------------

/// Everything that exists only while a session is up
#[derive(Debug, Clone)]
struct Connection {
    own: BareJid,
    composer: OutboundComposer,
    interpreter: StanzaInterpreter,
}

impl Connection {
    fn new(jid: FullJid, transport: Arc<dyn StanzaSink>) -> Self {
        let own = jid.bare();
        Self {
            interpreter: StanzaInterpreter::new(own.clone()),
            composer: OutboundComposer::new(jid, transport),
            own,
        }
    }
}

// ----------------------------------------------------------------------------
// Store Statistics
// ----------------------------------------------------------------------------

/// Counters describing store activity since it was opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub actions_processed: u64,
    pub follow_ups_processed: u64,
    pub follow_ups_dropped: u64,
    pub stanzas_ignored: u64,
    pub snapshots_published: u64,
}

// ----------------------------------------------------------------------------
// Conversation Store
// ----------------------------------------------------------------------------

/// Coordinator owning the log, the connection and the persistence gateway
pub struct ConversationStore<S: SnapshotStorage, T: TimeSource = SystemTimeSource> {
    config: StoreConfig,
    log: Arc<ConversationLog>,
    persistence: PersistenceGateway<S>,
    time_source: T,
    connection: Option<Connection>,
    follow_ups: VecDeque<Action>,
    outbox: Vec<Notification>,
    stats: StoreStats,
}

impl<S: SnapshotStorage> ConversationStore<S, SystemTimeSource> {
    /// Open the store on `storage`, stamping messages with wall-clock time
    pub fn open(config: StoreConfig, storage: S) -> Result<Self> {
        Self::open_with_time_source(config, storage, SystemTimeSource)
    }
}

impl<S: SnapshotStorage, T: TimeSource> ConversationStore<S, T> {
    /// Open the store, loading any stored snapshot
    ///
    /// Fails with `StorageError::Corrupt` when a stored snapshot cannot be
    /// decoded.
    pub fn open_with_time_source(config: StoreConfig, storage: S, time_source: T) -> Result<Self> {
        config.validate()?;
        if !storage.is_available() {
            return Err(ParleyError::storage_unavailable(format!(
                "cannot open snapshot {}",
                config.storage_key
            )));
        }
        let persistence = PersistenceGateway::new(storage, config.storage_key.clone());
        let log = persistence.load()?;
        info!(
            key = persistence.key(),
            peers = log.peers().count(),
            messages = log.len(),
            "Conversation store opened"
        );

        Ok(Self {
            config,
            log: Arc::new(log),
            persistence,
            time_source,
            connection: None,
            follow_ups: VecDeque::new(),
            outbox: Vec::new(),
            stats: StoreStats::default(),
        })
    }

    /// Current snapshot of the whole log
    pub fn log(&self) -> Arc<ConversationLog> {
        Arc::clone(&self.log)
    }

    /// Messages exchanged with `peer`
    pub fn conversation(&self, peer: &BareJid) -> &[Message] {
        self.log.get(peer)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    pub fn storage(&self) -> &S {
        self.persistence.storage()
    }

    /// Close the store and hand back its storage backend
    pub fn into_storage(self) -> S {
        self.persistence.into_storage()
    }

    /// Notifications produced but not yet handed out
    ///
    /// Only non-empty after `dispatch` returned an error part way through an
    /// action.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Process one action, then every follow-up it scheduled
    ///
    /// Returns the notifications produced, in order. If the action itself
    /// fails, its queued follow-ups are discarded and any notifications it
    /// already produced stay available through `take_notifications`.
    /// Follow-up failures are logged and do not fail the dispatch.
    pub fn dispatch(&mut self, action: Action) -> Result<Vec<Notification>> {
        self.stats.actions_processed += 1;
        if let Err(e) = self.handle(action) {
            self.follow_ups.clear();
            return Err(e);
        }

        let mut drained = 0;
        while let Some(follow_up) = self.follow_ups.pop_front() {
            if drained == self.config.max_follow_ups_per_dispatch {
                let dropped = self.follow_ups.len() as u64 + 1;
                warn!(dropped, "Follow-up limit reached, dropping remaining follow-ups");
                self.stats.follow_ups_dropped += dropped;
                self.follow_ups.clear();
                break;
            }
            drained += 1;
            self.stats.follow_ups_processed += 1;

            let name = follow_up.name();
            if let Err(e) = self.handle(follow_up) {
                warn!(action = name, error = %e, "Follow-up action failed");
            }
        }

        Ok(self.take_notifications())
    }

    fn handle(&mut self, action: Action) -> Result<()> {
        debug!(action = action.name(), "Handling action");
        match action {
            Action::ConnectionReady { jid, transport } => {
                info!(jid = %jid, "Connection ready");
                self.connection = Some(Connection::new(jid, transport));
                Ok(())
            }
            Action::StanzaReceived(stanza) => self.handle_stanza(&stanza),
            Action::SendMessage { peer, content } => self.handle_send_message(peer, content),
            Action::SendStateChange { peer, state } => self.handle_send_state(&peer, state),
            Action::ApplyMarker {
                peer,
                reference,
                marker,
            } => self.apply_peer_marker(&peer, &reference, marker),
            Action::SetLocalMarker { peer, id, marker } => {
                self.connected("set_local_marker")?.composer.send_marker(&peer, &id, marker);
                self.force_status(&peer, id, marker)
            }
            Action::ConfirmReceipt { peer, id } => {
                self.connected("confirm_receipt")?.composer.send_receipt(&peer, &id);
                self.force_status(&peer, id, ChatMarker::Received)
            }
            Action::ClearConversation { peer } => {
                debug!(peer = %peer, "Clearing conversation");
                let next = self.log.clear(&peer);
                self.publish(next)
            }
            Action::EndSession => self.end_session(),
        }
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    fn handle_stanza(&mut self, stanza: &Element) -> Result<()> {
        let now = self.time_source.now();
        let events = self.connected("stanza_received")?.interpreter.interpret(stanza, now);

        for event in events {
            match event {
                StanzaEvent::StateChange { peer, state } => {
                    debug!(peer = %peer, state = %state, "Peer chat state changed");
                    self.outbox.push(Notification::PeerStateChanged { peer, state });
                }
                StanzaEvent::Acknowledgment {
                    peer,
                    reference,
                    marker,
                } => self.apply_peer_marker(&peer, &reference, marker)?,
                StanzaEvent::Content {
                    peer,
                    message,
                    follow_ups,
                } => self.receive_message(peer, message, follow_ups)?,
                StanzaEvent::Ignored { reason } => {
                    debug!(?reason, "Ignoring stanza");
                    self.stats.stanzas_ignored += 1;
                }
            }
        }
        Ok(())
    }

    fn receive_message(
        &mut self,
        peer: BareJid,
        message: Message,
        follow_ups: FollowUps,
    ) -> Result<()> {
        debug!(peer = %peer, id = %message.id, from = %message.from, "Message received");
        let author = message.from.clone();
        let id = message.id.clone();

        let next = self.log.append(&peer, message);
        self.publish(next)?;

        if follow_ups.marker && self.config.auto_markers {
            self.follow_ups.push_back(Action::SetLocalMarker {
                peer: author.clone(),
                id: id.clone(),
                marker: ChatMarker::Received,
            });
        }
        if follow_ups.receipt && self.config.auto_receipts {
            self.follow_ups.push_back(Action::ConfirmReceipt { peer: author, id });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    fn handle_send_message(&mut self, peer: BareJid, content: OutgoingContent) -> Result<()> {
        let connection = self.connected("send_message")?;
        let id = MessageId::Seq(self.log.conversation_len(&peer) as u64);
        connection.composer.send_message(&peer, &id, &content);

        let message = Message {
            id,
            from: connection.own.clone(),
            body: content.body(),
            time: self.time_source.now(),
            kind: content.kind(),
            status: MessageStatus::Sending,
        };
        debug!(peer = %peer, id = %message.id, "Message sent");

        let next = self.log.append(&peer, message);
        self.publish(next)
    }

    fn handle_send_state(&mut self, peer: &BareJid, state: ChatState) -> Result<()> {
        self.connected("send_state_change")?.composer.send_state(peer, state);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Status Updates
    // ------------------------------------------------------------------------

    /// Cumulative, rank-guarded update for a marker reported by `partner`
    fn apply_peer_marker(
        &mut self,
        partner: &BareJid,
        reference: &str,
        marker: ChatMarker,
    ) -> Result<()> {
        let rule = PeerMarkerRule::new(partner.clone(), reference, marker);
        if !rule.is_applicable() {
            debug!(peer = %partner, reference, "Marker reference is not numeric, ignoring");
            return Ok(());
        }

        let (next, changed) = self
            .log
            .update_where(partner, |m| rule.matches(m), |m| rule.apply(m));
        debug!(peer = %partner, reference, marker = %marker, changed, "Peer marker applied");
        if changed == 0 {
            return Ok(());
        }
        self.publish(next)
    }

    /// Unconditional update of one message authored by `partner`
    fn force_status(&mut self, partner: &BareJid, id: MessageId, marker: ChatMarker) -> Result<()> {
        let rule = LocalMarkerRule::new(partner.clone(), id, marker);
        let (next, changed) = self
            .log
            .update_where(partner, |m| rule.matches(m), |m| rule.apply(m));
        debug!(peer = %partner, marker = %marker, changed, "Local marker recorded");
        if changed == 0 {
            return Ok(());
        }
        self.publish(next)
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    fn end_session(&mut self) -> Result<()> {
        info!("Ending session, erasing stored conversations");
        self.connection = None;
        self.follow_ups.clear();
        self.persistence.erase()?;
        self.install(ConversationLog::new());
        Ok(())
    }

    fn connected(&self, action: &'static str) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| ParleyError::not_connected(action))
    }

    /// Install a new snapshot and notify observers, without persisting
    fn install(&mut self, log: ConversationLog) {
        self.log = Arc::new(log);
        self.stats.snapshots_published += 1;
        self.outbox.push(Notification::LogChanged(Arc::clone(&self.log)));
    }

    /// Install a new snapshot, notify observers and persist the whole log
    fn publish(&mut self, log: ConversationLog) -> Result<()> {
        self.install(log);
        self.persistence.save(&self.log)
    }
}

impl<S, T> core::fmt::Debug for ConversationStore<S, T>
where
    S: SnapshotStorage + core::fmt::Debug,
    T: TimeSource,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("config", &self.config)
            .field("messages", &self.log.len())
            .field("connected", &self.connection.is_some())
            .field("pending_follow_ups", &self.follow_ups.len())
            .field("stats", &self.stats)
            .finish()
    }
}
