//! Store task
//!
//! A single tokio task owns the conversation store. Actions arrive over an
//! mpsc channel and are dispatched one at a time; notifications fan out to
//! subscribers over a broadcast channel.

use parley_core::{
    Action, ConversationStore, Notification, ParleyResult, SnapshotStorage, TimeSource,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

/// Commands accepted by the store task
#[derive(Debug, Clone)]
pub enum Command {
    /// Dispatch an action to the store
    Dispatch(Action),
    /// Stop after the commands already queued
    Shutdown,
}

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type NotificationSender = broadcast::Sender<Notification>;
pub type NotificationReceiver = broadcast::Receiver<Notification>;

/// Task owning the store for the lifetime of the runtime
pub struct StoreTask<S: SnapshotStorage, T: TimeSource> {
    store: ConversationStore<S, T>,
    command_receiver: CommandReceiver,
    notification_sender: NotificationSender,
    actions_failed: u64,
}

impl<S: SnapshotStorage, T: TimeSource> StoreTask<S, T> {
    pub fn new(
        store: ConversationStore<S, T>,
        command_receiver: CommandReceiver,
        notification_sender: NotificationSender,
    ) -> Self {
        Self {
            store,
            command_receiver,
            notification_sender,
            actions_failed: 0,
        }
    }

    /// Process commands until shutdown or until every sender is gone
    ///
    /// Returns the storage backend so a caller can reopen the same data.
    pub async fn run(mut self) -> ParleyResult<S> {
        info!("Store task starting");

        while let Some(command) = self.command_receiver.recv().await {
            match command {
                Command::Dispatch(action) => self.handle_action(action),
                Command::Shutdown => {
                    info!("Shutdown command received");
                    break;
                }
            }
        }

        info!(
            actions = self.store.stats().actions_processed,
            failed = self.actions_failed,
            "Store task stopped"
        );
        Ok(self.store.into_storage())
    }

    fn handle_action(&mut self, action: Action) {
        let name = action.name();
        let notifications = match self.store.dispatch(action) {
            Ok(notifications) => notifications,
            Err(e) => {
                error!(action = name, error = %e, "Action failed");
                self.actions_failed += 1;
                self.store.take_notifications()
            }
        };

        for notification in notifications {
            // No subscribers is not an error
            if self.notification_sender.send(notification).is_err() {
                debug!(action = name, "No notification subscribers");
            }
        }
    }
}
