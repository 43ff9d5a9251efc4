//! Parley Conversation Core
//!
//! Delivery-status tracking for one-to-one XMPP chat. Incoming stanzas are
//! classified into chat states, acknowledgments and content; message status
//! moves through `sending < received < displayed < acknowledged`; the whole
//! conversation log is published as immutable snapshots and persisted as one
//! JSON document after every change.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod composer;
pub mod config;
pub mod errors;
pub mod interpreter;
pub mod log;
pub mod message;
pub mod persistence;
pub mod stanza;
pub mod status;
pub mod store;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{Action, Notification};
pub use composer::{OutboundComposer, StanzaSink};
pub use config::{StoreConfig, DEFAULT_STORAGE_KEY};
pub use interpreter::{FollowUps, IgnoreReason, StanzaEvent, StanzaInterpreter};
pub use log::ConversationLog;
pub use message::{Message, MessageKind, OutgoingContent};
pub use persistence::{MemoryStorage, PersistenceGateway, SnapshotStorage};
pub use stanza::{ns, Element};
pub use status::{ChatMarker, ChatState, LocalMarkerRule, MessageStatus, PeerMarkerRule};
pub use store::{ConversationStore, StoreStats};
pub use types::{BareJid, FullJid, MessageId, StickerRef, SystemTimeSource, TimeSource};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

pub use errors::{ParleyError, ParleyResult, Result, StanzaError, StorageError};
