//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! to multiple subscribers via bounded MPSC queues.

pub mod transcript;
pub mod transcript_handle;

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use chrono::{DateTime, Utc};
use autogram_common::models::Platform;

/// Events the bridge publishes for anything that wants to observe traffic.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A message relayed from one side of the bridge.
    ChatMessage {
        platform: Platform,
        channel: String,
        user: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Periodic heartbeat.
    Tick,

    /// Operational notices (startup, subscriber changes, ...).
    SystemMessage(String),
}

/// Each subscriber gets its own `mpsc::Sender<BridgeEvent>` for guaranteed delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, sending fails and the
///   subscriber is skipped.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BridgeEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

const DEFAULT_BUFFER_SIZE: usize = 10000;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<BridgeEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all live subscribers; closed ones are pruned.
    pub async fn publish(&self, event: BridgeEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    pub async fn publish_chat(
        &self,
        platform: Platform,
        channel: &str,
        user: &str,
        text: &str,
    ) {
        let event = BridgeEvent::ChatMessage {
            platform,
            channel: channel.to_string(),
            user: user.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.publish(event).await;
    }
}
