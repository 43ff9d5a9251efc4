//! Runtime Builder API
//!
//! Opens the conversation store, spawns the task that owns it and returns a
//! handle for dispatching actions, subscribing to notifications and wiring a
//! transport.

use std::sync::Arc;

use parley_core::{
    Action, BareJid, ConversationStore, Element, FullJid, OutgoingContent, ParleyError,
    ParleyResult,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::file_storage::StorageBackend;
use crate::task::{Command, CommandSender, NotificationReceiver, NotificationSender, StoreTask};
use crate::transport::{ChannelSink, OutboundReceiver};

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a hosted conversation store
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    storage: Option<StorageBackend>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an explicit storage backend instead of the configured one
    pub fn with_storage<B: Into<StorageBackend>>(mut self, storage: B) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Open the store and start its task
    ///
    /// Fails on invalid configuration or when the stored snapshot cannot be
    /// decoded.
    pub async fn build_and_start(self) -> ParleyResult<RuntimeHandle> {
        self.config.validate()?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => StorageBackend::from_dir(self.config.storage_dir.as_deref())?,
        };
        let store = ConversationStore::open(self.config.store.clone(), storage)?;

        let channels = &self.config.channels;
        let (command_sender, command_receiver) = mpsc::channel(channels.action_buffer_size);
        let (notification_sender, _) = broadcast::channel(channels.notification_buffer_size);

        let task = StoreTask::new(store, command_receiver, notification_sender.clone());
        let task_handle = tokio::spawn(task.run());

        info!("Parley runtime started");

        Ok(RuntimeHandle {
            command_sender,
            notification_sender,
            task_handle: Some(task_handle),
            outbound_buffer_size: channels.outbound_buffer_size,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running store task
pub struct RuntimeHandle {
    command_sender: CommandSender,
    notification_sender: NotificationSender,
    task_handle: Option<JoinHandle<ParleyResult<StorageBackend>>>,
    outbound_buffer_size: usize,
}

impl RuntimeHandle {
    /// Sender for feeding commands from other tasks
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Receive every notification published from now on
    pub fn subscribe(&self) -> NotificationReceiver {
        self.notification_sender.subscribe()
    }

    /// Queue an action for the store
    pub async fn dispatch(&self, action: Action) -> ParleyResult<()> {
        self.command_sender
            .send(Command::Dispatch(action))
            .await
            .map_err(|_| ParleyError::channel_error("Failed to send action to store task"))
    }

    /// Report a ready connection as `jid`
    ///
    /// Returns the receiver the transport drains for outbound stanzas.
    pub async fn connect(&self, jid: FullJid) -> ParleyResult<OutboundReceiver> {
        let (sink, receiver) = ChannelSink::channel(self.outbound_buffer_size);
        self.dispatch(Action::ConnectionReady {
            jid,
            transport: Arc::new(sink),
        })
        .await?;
        Ok(receiver)
    }

    pub async fn stanza_received(&self, stanza: Element) -> ParleyResult<()> {
        self.dispatch(Action::StanzaReceived(stanza)).await
    }

    pub async fn send_message(&self, peer: BareJid, content: OutgoingContent) -> ParleyResult<()> {
        self.dispatch(Action::SendMessage { peer, content }).await
    }

    pub async fn end_session(&self) -> ParleyResult<()> {
        self.dispatch(Action::EndSession).await
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the store task after queued actions and return its storage
    pub async fn shutdown(&mut self) -> ParleyResult<StorageBackend> {
        let handle = self
            .task_handle
            .take()
            .ok_or_else(|| ParleyError::channel_error("Runtime already shut down"))?;

        info!("Shutting down Parley runtime");
        // A closed channel means the task already ended; its result is below
        let _ = self.command_sender.send(Command::Shutdown).await;

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ParleyError::channel_error(format!("Store task panicked: {}", e))),
        }
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Create a runtime with in-memory storage and test buffer sizes
pub async fn create_test_runtime() -> ParleyResult<RuntimeHandle> {
    RuntimeBuilder::new()
        .with_config(RuntimeConfig::testing())
        .build_and_start()
        .await
}
