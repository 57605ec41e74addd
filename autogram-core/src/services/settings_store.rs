// File: autogram-core/src/services/settings_store.rs

use std::path::PathBuf;

use autogram_common::models::Settings;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Error;

/// Owns the live settings and writes them back to disk whenever the
/// subscriber list changes.
pub struct SettingsStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings, path: impl Into<PathBuf>) -> Self {
        let mut settings = settings;
        // Older files may list a chat twice.
        let mut seen = Vec::with_capacity(settings.subscribers.len());
        settings.subscribers.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });
        Self {
            path: path.into(),
            settings: Mutex::new(settings),
        }
    }

    pub async fn subscribers(&self) -> Vec<i64> {
        self.settings.lock().await.subscribers.clone()
    }

    /// Returns `true` when the chat was not subscribed before.
    pub async fn add_subscriber(&self, chat_id: i64) -> Result<bool, Error> {
        let mut guard = self.settings.lock().await;
        if guard.subscribers.contains(&chat_id) {
            debug!("(SettingsStore) {} already subscribed", chat_id);
            return Ok(false);
        }
        guard.subscribers.push(chat_id);
        guard.save(&self.path).await?;
        info!("Subscribed chat {} ({} total)", chat_id, guard.subscribers.len());
        Ok(true)
    }

    /// Returns `true` when the chat was subscribed before.
    pub async fn remove_subscriber(&self, chat_id: i64) -> Result<bool, Error> {
        let mut guard = self.settings.lock().await;
        let before = guard.subscribers.len();
        guard.subscribers.retain(|id| *id != chat_id);
        if guard.subscribers.len() == before {
            return Ok(false);
        }
        guard.save(&self.path).await?;
        info!("Unsubscribed chat {} ({} total)", chat_id, guard.subscribers.len());
        Ok(true)
    }
}
