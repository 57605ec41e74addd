// File: src/platforms/mod.rs

use async_trait::async_trait;
use crate::Error;

pub mod irc;
pub mod telegram;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
    Error(String),
}

/// Anything that can post a text line into a named channel or chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(&self, channel: &str, message: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait PlatformIntegration: MessageSink {
    async fn connect(&mut self) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error>;
}

/// Telegram calls the relay needs beyond plain text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelegramOutbound: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), Error>;
    async fn forward(&self, chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<(), Error>;
}
