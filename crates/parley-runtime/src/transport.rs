//! Channel transport sink
//!
//! Hands outbound stanzas to an external transport over a bounded tokio
//! channel. Sending never blocks the store task: a full or closed channel
//! drops the stanza with a warning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parley_core::{Element, StanzaSink};
use tokio::sync::mpsc;
use tracing::warn;

/// Receiving end the transport drains
pub type OutboundReceiver = mpsc::Receiver<Element>;

/// `StanzaSink` backed by a tokio mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Element>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Create a sink and the receiver for the transport side
    pub fn channel(buffer_size: usize) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let sink = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, receiver)
    }

    /// Stanzas dropped because the transport was full or gone
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl StanzaSink for ChannelSink {
    fn send(&self, stanza: Element) {
        if let Err(e) = self.sender.try_send(stanza) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(stanza) => {
                    warn!(
                        to = stanza.attr("to").unwrap_or_default(),
                        "Outbound queue full, dropping stanza"
                    );
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("Transport closed, dropping stanza");
                }
            }
        }
    }
}
