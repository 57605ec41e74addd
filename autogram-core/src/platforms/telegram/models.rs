// File: autogram-core/src/platforms/telegram/models.rs

use serde::{Deserialize, Serialize};

use crate::Error;

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self, method: &str) -> Result<T, Error> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(Error::Telegram(format!("{method}: ok response without result"))),
            (false, _) => Err(Error::Telegram(format!(
                "{method} failed ({}): {}",
                self.error_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
                self.description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

impl Update {
    /// The message carried by this update and whether it is an edit.
    pub fn message(&self) -> Option<(&Message, bool)> {
        match (&self.message, &self.edited_message) {
            (Some(m), _) => Some((m, false)),
            (None, Some(m)) => Some((m, true)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Video, sticker, animation and document attachments; only the id matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<FileRef>,
    pub sticker: Option<FileRef>,
    pub animation: Option<FileRef>,
    pub document: Option<FileRef>,
}

impl Message {
    /// File id of the attachment, if any. For photos the largest rendition wins.
    pub fn media_file_id(&self) -> Option<&str> {
        if let Some(photos) = self.photo.as_ref().filter(|p| !p.is_empty()) {
            let mut best = &photos[0];
            for photo in photos {
                if photo.file_size.unwrap_or(0) > best.file_size.unwrap_or(0) {
                    best = photo;
                }
            }
            return Some(&best.file_id);
        }
        self.video
            .as_ref()
            .or(self.sticker.as_ref())
            .or(self.animation.as_ref())
            .or(self.document.as_ref())
            .map(|f| f.file_id.as_str())
    }

    /// Text body, falling back to a media caption.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Name shown on the IRC side.
    pub fn sender_label(&self) -> &str {
        match &self.from {
            Some(User { username: Some(name), .. }) if !name.is_empty() => name,
            Some(user) if !user.first_name.is_empty() => &user.first_name,
            _ => "unknown",
        }
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|u| u.id)
    }
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesParams<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub struct SendMessageParams<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ForwardMessageParams {
    pub chat_id: i64,
    pub from_chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GetFileParams<'a> {
    pub file_id: &'a str,
}
