//! Integration tests for the hosted conversation store
//!
//! Drive a running store task through its handle, playing the part of the
//! transport on the outbound queue and of the UI on the notification stream.

use parley_core::{
    ns, Action, BareJid, ChatMarker, ChatState, ConversationLog, Element, FullJid, MessageId,
    MessageStatus, Notification, OutgoingContent, ParleyResult, StoreConfig,
};
use parley_runtime::{
    NotificationReceiver, OutboundReceiver, RuntimeBuilder, RuntimeConfig, RuntimeHandle,
    StorageBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const OWN_FULL: &str = "romeo@montague.lit/orchard";
const PEER: &str = "juliet@capulet.lit";

fn peer() -> BareJid {
    BareJid::from(PEER)
}

fn temp_storage_dir() -> PathBuf {
    std::env::temp_dir().join(format!("parley-runtime-{}", Uuid::new_v4()))
}

async fn start(config: RuntimeConfig) -> (RuntimeHandle, NotificationReceiver, OutboundReceiver) {
    let runtime = RuntimeBuilder::new()
        .with_config(config)
        .build_and_start()
        .await
        .expect("Failed to build runtime");
    let notifications = runtime.subscribe();
    let outbound = runtime
        .connect(FullJid::new(OWN_FULL).unwrap())
        .await
        .expect("Failed to connect");
    (runtime, notifications, outbound)
}

async fn next_log(notifications: &mut NotificationReceiver) -> Arc<ConversationLog> {
    loop {
        let notification = timeout(Duration::from_secs(1), notifications.recv())
            .await
            .expect("Notification should arrive within timeout")
            .expect("Notification channel closed");
        if let Notification::LogChanged(log) = notification {
            return log;
        }
    }
}

async fn next_stanza(outbound: &mut OutboundReceiver) -> Element {
    timeout(Duration::from_secs(1), outbound.recv())
        .await
        .expect("Stanza should arrive within timeout")
        .expect("Outbound channel closed")
}

fn markable_peer_message(id: &str, body: &str) -> Element {
    Element::message()
        .attr_set("from", format!("{}/balcony", PEER))
        .attr_set("to", OWN_FULL)
        .attr_set("id", id)
        .child(Element::new("body").text_set(body))
        .child(Element::with_ns("markable", ns::CHAT_MARKERS))
        .child(Element::with_ns("request", ns::RECEIPTS))
}

// ----------------------------------------------------------------------------
// Message Flow
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_send_and_peer_marker() -> ParleyResult<()> {
    let (mut runtime, mut notifications, mut outbound) = start(RuntimeConfig::testing()).await;

    runtime
        .send_message(peer(), OutgoingContent::Text("hi".into()))
        .await?;
    let stanza = next_stanza(&mut outbound).await;
    assert_eq!(stanza.attr("id"), Some("0"));
    let log = next_log(&mut notifications).await;
    assert_eq!(log.get(&peer())[0].status, MessageStatus::Sending);

    let marker = Element::message()
        .attr_set("from", format!("{}/balcony", PEER))
        .child(Element::with_ns("displayed", ns::CHAT_MARKERS).attr_set("id", "0"));
    runtime.stanza_received(marker).await?;

    let log = next_log(&mut notifications).await;
    assert_eq!(log.get(&peer())[0].status, MessageStatus::Displayed);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_inbound_message_answers_on_transport() -> ParleyResult<()> {
    let (mut runtime, mut notifications, mut outbound) = start(RuntimeConfig::testing()).await;

    runtime
        .stanza_received(markable_peer_message("m1", "hello"))
        .await?;

    let appended = next_log(&mut notifications).await;
    assert_eq!(appended.get(&peer())[0].id, MessageId::parse("m1"));

    let marker = next_stanza(&mut outbound).await;
    assert!(marker.get_child("received", ns::CHAT_MARKERS).is_some());
    let receipt = next_stanza(&mut outbound).await;
    assert!(receipt.get_child("received", ns::RECEIPTS).is_some());

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_quiet_runtime_sends_nothing_back() -> ParleyResult<()> {
    let config = RuntimeConfig {
        store: StoreConfig::quiet().with_storage_key("ConversationsStore.quiet"),
        ..RuntimeConfig::testing()
    };
    let (mut runtime, mut notifications, mut outbound) = start(config).await;

    runtime
        .stanza_received(markable_peer_message("1", "hello"))
        .await?;
    next_log(&mut notifications).await;

    runtime.shutdown().await?;
    assert!(outbound.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_peer_state_is_broadcast() -> ParleyResult<()> {
    let (mut runtime, mut notifications, _outbound) = start(RuntimeConfig::testing()).await;

    let stanza = Element::message()
        .attr_set("from", format!("{}/balcony", PEER))
        .child(Element::with_ns("composing", ns::CHAT_STATES));
    runtime.stanza_received(stanza).await?;

    let notification = timeout(Duration::from_secs(1), notifications.recv())
        .await
        .expect("Notification should arrive within timeout")
        .expect("Notification channel closed");
    assert_eq!(
        notification,
        Notification::PeerStateChanged {
            peer: peer(),
            state: ChatState::Composing,
        }
    );

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_failed_action_keeps_task_alive() -> ParleyResult<()> {
    let mut runtime = RuntimeBuilder::new()
        .with_config(RuntimeConfig::testing())
        .build_and_start()
        .await?;
    let mut notifications = runtime.subscribe();

    // Not connected yet, so this fails inside the task
    runtime
        .send_message(peer(), OutgoingContent::Text("too early".into()))
        .await?;
    runtime
        .dispatch(Action::apply_marker(peer(), "0", ChatMarker::Displayed))
        .await?;
    runtime
        .dispatch(Action::ClearConversation { peer: peer() })
        .await?;

    let log = next_log(&mut notifications).await;
    assert!(log.get(&peer()).is_empty());
    assert!(runtime.is_running());

    runtime.shutdown().await?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Persistence
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_file_storage_survives_restart() -> ParleyResult<()> {
    let dir = temp_storage_dir();
    let config = RuntimeConfig::testing().with_storage_dir(&dir);

    let (mut runtime, mut notifications, _outbound) = start(config.clone()).await;
    runtime
        .send_message(peer(), OutgoingContent::Text("remember me".into()))
        .await?;
    let written = next_log(&mut notifications).await;
    let storage = runtime.shutdown().await?;
    assert!(matches!(storage, StorageBackend::File(_)));
    assert!(dir.join("ConversationsStore.test.json").is_file());

    let (mut restarted, mut notifications, _outbound) = start(config).await;
    restarted
        .send_message(peer(), OutgoingContent::Text("again".into()))
        .await?;
    let log = next_log(&mut notifications).await;
    assert_eq!(log.get(&peer())[0], written.get(&peer())[0]);
    assert_eq!(log.get(&peer())[1].id, MessageId::Seq(1));

    restarted.end_session().await?;
    let erased = next_log(&mut notifications).await;
    assert!(erased.is_empty());
    restarted.shutdown().await?;
    assert!(!dir.join("ConversationsStore.test.json").exists());

    std::fs::remove_dir_all(dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_corrupt_file_fails_build() {
    let dir = temp_storage_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("ConversationsStore.test.json"), b"not json").unwrap();

    let result = RuntimeBuilder::new()
        .with_config(RuntimeConfig::testing().with_storage_dir(&dir))
        .build_and_start()
        .await;
    assert!(matches!(result, Err(ref e) if e.is_corrupt_snapshot()));

    std::fs::remove_dir_all(dir).ok();
}
