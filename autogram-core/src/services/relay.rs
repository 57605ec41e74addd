// File: autogram-core/src/services/relay.rs

use std::sync::Arc;

use autogram_common::models::{MediaFile, Platform};
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::cache::Cache;
use crate::eventbus::{BridgeEvent, EventBus};
use crate::platforms::irc::IrcIncomingEvent;
use crate::platforms::telegram::models::{Message, Update};
use crate::platforms::{MessageSink, TelegramOutbound};
use crate::services::settings_store::SettingsStore;

const EDIT_TAG: &str = "(*edit*) ";

/// Moves traffic between the Telegram subscribers and the IRC channel.
pub struct RelayService {
    irc: Arc<dyn MessageSink>,
    telegram: Arc<dyn TelegramOutbound>,
    settings: Arc<SettingsStore>,
    cache: Cache<MediaFile>,
    event_bus: Arc<EventBus>,
    irc_channel: String,
    media_url_prefix: String,
}

impl RelayService {
    pub fn new(
        irc: Arc<dyn MessageSink>,
        telegram: Arc<dyn TelegramOutbound>,
        settings: Arc<SettingsStore>,
        cache: Cache<MediaFile>,
        event_bus: Arc<EventBus>,
        irc_channel: &str,
        media_url_prefix: &str,
    ) -> Self {
        debug!("RelayService::new() called for {}", irc_channel);
        Self {
            irc,
            telegram,
            settings,
            cache,
            event_bus,
            irc_channel: irc_channel.to_string(),
            media_url_prefix: media_url_prefix.to_string(),
        }
    }

    /// Handles one Telegram update:
    ///  1. `/start` and `/stop` change the subscription of the chat and stop there.
    ///  2. Media is warmed in the cache and posted to IRC as a link; text is posted as is.
    ///  3. The original message is forwarded to every other subscriber.
    ///  4. A chat event is published.
    pub async fn handle_telegram_update(&self, update: &Update) -> Result<(), Error> {
        let Some((msg, edited)) = update.message() else {
            debug!("(RelayService) update {} carries no message", update.update_id);
            return Ok(());
        };

        if !edited {
            match msg.text.as_deref().map(str::trim) {
                Some("/start") => return self.subscribe(msg.chat.id).await,
                Some("/stop") => return self.unsubscribe(msg.chat.id).await,
                _ => {}
            }
        }

        let label = msg.sender_label();
        let edit = if edited { EDIT_TAG } else { "" };

        let relayed = match msg.media_file_id() {
            Some(file_id) => {
                if let Err(e) = self.cache.get(file_id).await {
                    warn!("Prefetch of {} failed => {}", file_id, e);
                }
                Some(format!("{}{}", self.media_url_prefix, file_id))
            }
            None => msg.body().map(str::to_string),
        };

        if let Some(body) = &relayed {
            let lines: Vec<String> = body
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("{}: {}{}", label, edit, l))
                .collect();
            if !lines.is_empty() {
                if let Err(e) = self.irc.send_message(&self.irc_channel, &lines.join("\n")).await {
                    error!("Relaying Telegram message {} to IRC failed => {}", msg.message_id, e);
                }
            }
        } else {
            debug!("(RelayService) message {} has nothing to post on IRC", msg.message_id);
        }

        self.forward_to_subscribers(msg).await;

        self.event_bus
            .publish_chat(
                Platform::Telegram,
                &msg.chat.id.to_string(),
                label,
                &format!("{}{}", edit, relayed.as_deref().unwrap_or("")),
            )
            .await;
        Ok(())
    }

    /// Sends a PRIVMSG from the bridged channel to every subscriber.
    /// Other channels, private queries and notices are ignored.
    pub async fn handle_irc_event(&self, evt: &IrcIncomingEvent) -> Result<(), Error> {
        if evt.command != "PRIVMSG" {
            return Ok(());
        }
        let Some(channel) = evt.channel.as_deref() else {
            return Ok(());
        };
        if !channel.eq_ignore_ascii_case(&self.irc_channel) {
            debug!("(RelayService) ignoring PRIVMSG to {}", channel);
            return Ok(());
        }

        let nick = evt.nick.as_deref().unwrap_or("unknown");
        let text = evt.text.as_deref().unwrap_or("");
        let line = format!("{}: {}", nick, text);

        for chat_id in self.settings.subscribers().await {
            if let Err(e) = self.telegram.send_text(chat_id, &line).await {
                warn!("Sending IRC line to chat {} failed => {}", chat_id, e);
                if let Err(e2) = self
                    .irc
                    .send_message(&self.irc_channel, &format!("Error: {}", e))
                    .await
                {
                    error!("Could not report error in {} => {}", self.irc_channel, e2);
                }
            }
        }

        self.event_bus.publish_chat(Platform::Irc, channel, nick, text).await;
        Ok(())
    }

    /// Sends `text` to every subscriber; failures are logged only.
    pub async fn announce(&self, text: &str) {
        for chat_id in self.settings.subscribers().await {
            if let Err(e) = self.telegram.send_text(chat_id, text).await {
                warn!("Announcement to chat {} failed => {}", chat_id, e);
            }
        }
        self.event_bus.publish(BridgeEvent::SystemMessage(text.to_string())).await;
    }

    async fn subscribe(&self, chat_id: i64) -> Result<(), Error> {
        if self.settings.add_subscriber(chat_id).await? {
            info!("Chat {} subscribed", chat_id);
            self.event_bus
                .publish(BridgeEvent::SystemMessage(format!("chat {} subscribed", chat_id)))
                .await;
        }
        Ok(())
    }

    async fn unsubscribe(&self, chat_id: i64) -> Result<(), Error> {
        if self.settings.remove_subscriber(chat_id).await? {
            info!("Chat {} unsubscribed", chat_id);
            self.event_bus
                .publish(BridgeEvent::SystemMessage(format!("chat {} unsubscribed", chat_id)))
                .await;
        }
        Ok(())
    }

    async fn forward_to_subscribers(&self, msg: &Message) {
        let sender = msg.sender_id().unwrap_or(msg.chat.id);
        for chat_id in self.settings.subscribers().await {
            if chat_id == sender {
                continue;
            }
            if let Err(e) = self.telegram.forward(chat_id, msg.chat.id, msg.message_id).await {
                warn!("Forward of {} to chat {} failed => {}", msg.message_id, chat_id, e);
                if let Err(e2) = self.telegram.send_text(msg.chat.id, &format!("Error: {}", e)).await {
                    error!("Could not report forward error to chat {} => {}", msg.chat.id, e2);
                }
            }
        }
    }
}
