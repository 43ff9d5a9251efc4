//! Parley Runtime
//!
//! Hosts a `parley_core::ConversationStore` inside a tokio task: actions in
//! over an mpsc channel, notifications out over a broadcast channel, and
//! outbound stanzas handed to the transport through a bounded queue.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod builder;
pub mod config;
pub mod file_storage;
pub mod logging;
pub mod task;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use builder::{create_test_runtime, RuntimeBuilder, RuntimeHandle};
pub use config::{ChannelConfig, RuntimeConfig};
pub use file_storage::{FileStorage, StorageBackend};
pub use task::{Command, CommandSender, NotificationReceiver, StoreTask};
pub use transport::{ChannelSink, OutboundReceiver};
