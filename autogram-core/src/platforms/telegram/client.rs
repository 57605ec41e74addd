// File: autogram-core/src/platforms/telegram/client.rs

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::Error;
use crate::platforms::TelegramOutbound;

use super::models::{
    ApiResponse, ForwardMessageParams, GetFileParams, GetUpdatesParams, Message,
    SendMessageParams, TgFile, Update, User,
};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Long polls hold the request open for this many seconds on top of their own timeout.
const HTTP_SLACK_SECS: u64 = 15;

const ALLOWED_UPDATES: &[&str] = &["message", "edited_message"];

/// A thin wrapper around the Telegram Bot HTTP API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, Error> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Points the client at a different Bot API server (self-hosted, or a local fake).
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, Error> {
        if token.trim().is_empty() {
            return Err(Error::Config("Telegram API key is empty".into()));
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    /// Calls a Bot API method and unwraps its `{ok, result}` envelope.
    /// Transport errors are stripped of their URL so the token never reaches the logs.
    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        trace!("(TelegramClient) => {}", method);
        let resp = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| Error::Telegram(format!("{} request failed: {}", method, e.without_url())))?;

        let status = resp.status();
        let envelope: ApiResponse<T> = resp.json().await.map_err(|e| {
            Error::Telegram(format!(
                "Error parsing {} response (HTTP {}): {}",
                method,
                status,
                e.without_url()
            ))
        })?;
        envelope.into_result(method)
    }

    pub async fn get_me(&self) -> Result<User, Error> {
        self.call("getMe", &serde_json::json!({}), Duration::from_secs(30)).await
    }

    /// Long-polls for updates after `offset`, waiting up to `timeout_secs` server-side.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, Error> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call(
            "getUpdates",
            &params,
            Duration::from_secs(timeout_secs + HTTP_SLACK_SECS),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, Error> {
        let params = SendMessageParams { chat_id, text };
        self.call("sendMessage", &params, Duration::from_secs(30)).await
    }

    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<Message, Error> {
        let params = ForwardMessageParams { chat_id, from_chat_id, message_id };
        self.call("forwardMessage", &params, Duration::from_secs(30)).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<TgFile, Error> {
        self.call("getFile", &GetFileParams { file_id }, Duration::from_secs(30)).await
    }

    /// Resolves `file_id` via `getFile` and downloads the content.
    pub async fn download_file(&self, file_id: &str) -> Result<Bytes, Error> {
        let file = self.get_file(file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::Telegram(format!("getFile returned no path for {}", file_id)))?;

        debug!("(TelegramClient) downloading {} => {}", file_id, file_path);
        let resp = self
            .http
            .get(self.file_url(&file_path))
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| Error::Telegram(format!("file download failed: {}", e.without_url())))?;

        if !resp.status().is_success() {
            return Err(Error::Telegram(format!(
                "file download for {} returned HTTP {}",
                file_id,
                resp.status()
            )));
        }
        resp.bytes()
            .await
            .map_err(|e| Error::Telegram(format!("file download interrupted: {}", e.without_url())))
    }
}

#[async_trait]
impl TelegramOutbound for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), Error> {
        self.send_message(chat_id, text).await.map(|_| ())
    }

    async fn forward(&self, chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<(), Error> {
        self.forward_message(chat_id, from_chat_id, message_id).await.map(|_| ())
    }
}
