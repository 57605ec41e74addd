// File: autogram-core/src/platforms/telegram/runtime.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::platforms::{ConnectionStatus, MessageSink, PlatformIntegration, TelegramOutbound};

use super::client::TelegramClient;
use super::models::Update;

/// Seconds each getUpdates call waits server-side.
pub const LONG_POLL_SECS: u64 = 60;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Runs the getUpdates long-poll loop and exposes the bot as a message sink.
pub struct TelegramPlatform {
    client: Arc<TelegramClient>,
    status: Arc<RwLock<ConnectionStatus>>,
    poller: Option<JoinHandle<()>>,
    tx: mpsc::Sender<Update>,
    rx: Option<mpsc::Receiver<Update>>,
}

impl TelegramPlatform {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        let (tx, rx) = mpsc::channel(1000);
        Self {
            client,
            status: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
            poller: None,
            tx,
            rx: Some(rx),
        }
    }

    /// Hands out the update stream. Only the first call gets it.
    pub fn take_updates(&mut self) -> Option<mpsc::Receiver<Update>> {
        self.rx.take()
    }

    async fn poll_loop(
        client: Arc<TelegramClient>,
        status: Arc<RwLock<ConnectionStatus>>,
        tx: mpsc::Sender<Update>,
    ) {
        let mut offset = 0i64;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match client.get_updates(offset, LONG_POLL_SECS).await {
                Ok(updates) => {
                    if backoff != INITIAL_BACKOFF {
                        info!("(TelegramPlatform) polling recovered");
                        *status.write() = ConnectionStatus::Connected;
                        backoff = INITIAL_BACKOFF;
                    }
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if tx.send(update).await.is_err() {
                            debug!("(TelegramPlatform) update receiver dropped => stopping poller");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("(TelegramPlatform) getUpdates failed => {}, retrying in {:?}", e, backoff);
                    *status.write() = ConnectionStatus::Reconnecting;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

/// Parses the chat id a Telegram "channel" string stands for.
pub fn parse_chat_id(channel: &str) -> Result<i64, Error> {
    channel
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Platform(format!("'{}' is not a Telegram chat id", channel)))
}

#[async_trait]
impl MessageSink for TelegramPlatform {
    async fn send_message(&self, channel: &str, message: &str) -> Result<(), Error> {
        let chat_id = parse_chat_id(channel)?;
        self.client.send_text(chat_id, message).await
    }
}

#[async_trait]
impl PlatformIntegration for TelegramPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.poller.is_some() {
            info!("(TelegramPlatform) connect => already polling");
            return Ok(());
        }

        let me = match self.client.get_me().await {
            Ok(me) => me,
            Err(e) => {
                error!("Telegram getMe failed => {}", e);
                *self.status.write() = ConnectionStatus::Error(e.to_string());
                return Err(e);
            }
        };
        info!(
            "Authorized on Telegram as {} (id={})",
            me.username.as_deref().unwrap_or(&me.first_name),
            me.id
        );
        *self.status.write() = ConnectionStatus::Connected;

        self.poller = Some(tokio::spawn(Self::poll_loop(
            self.client.clone(),
            self.status.clone(),
            self.tx.clone(),
        )));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        if let Some(h) = self.poller.take() {
            h.abort();
        }
        *self.status.write() = ConnectionStatus::Disconnected;
        Ok(())
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        Ok(self.status.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("12345").unwrap(), 12345);
        assert_eq!(parse_chat_id(" -100987 ").unwrap(), -100987);
        assert!(matches!(parse_chat_id("#autogram"), Err(Error::Platform(_))));
    }

    #[tokio::test]
    async fn test_updates_taken_once() {
        let client = Arc::new(TelegramClient::new("1:token").unwrap());
        let mut platform = TelegramPlatform::new(client);
        assert!(platform.take_updates().is_some());
        assert!(platform.take_updates().is_none());
        assert_eq!(
            platform.get_connection_status().await.unwrap(),
            ConnectionStatus::Disconnected
        );
    }
}
