// File: autogram-common/src/models/settings.rs

use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::Error;

pub const DEFAULT_CACHE_LIMIT: u64 = 100 * 1024 * 1024;
pub const DEFAULT_FALLBACK_IMAGE: &str = "giphy.gif";

/// Bridge configuration, persisted as JSON.
///
/// Keys are PascalCase so files written by older deployments keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub api_key: String,
    pub irc_server: String,
    #[serde(rename = "IrcTLS")]
    pub irc_tls: bool,
    pub irc_channel: String,
    pub irc_nickname: String,
    pub irc_realname: String,
    /// Public URL prefix; a file id appended to it resolves to the media endpoint.
    pub http_server_string: String,
    pub http_listen: String,
    #[serde(default)]
    pub subscribers: Vec<i64>,

    #[serde(default = "default_cache_limit")]
    pub cache_limit: u64,
    #[serde(default = "default_fallback_image")]
    pub fallback_image: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(rename = "IrcTLSInsecure", default = "default_true")]
    pub irc_tls_insecure: bool,
}

fn default_cache_limit() -> u64 {
    DEFAULT_CACHE_LIMIT
}

fn default_fallback_image() -> String {
    DEFAULT_FALLBACK_IMAGE.to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Parses settings from JSON bytes, reporting the offending key path on failure.
    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let de = &mut serde_json::Deserializer::from_slice(bytes);
        let settings: Settings = serde_path_to_error::deserialize(de)?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&bytes)
    }

    /// Writes the settings as pretty JSON. On unix the file is created owner-only (0600).
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let body = serde_json::to_vec_pretty(self)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path.as_ref()).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.cache_limit == 0 {
            return Err(Error::Config("CacheLimit must be greater than zero".into()));
        }
        if self.irc_channel.is_empty() {
            return Err(Error::Config("IrcChannel must not be empty".into()));
        }
        Ok(())
    }
}
