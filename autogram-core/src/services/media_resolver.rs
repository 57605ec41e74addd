// File: autogram-core/src/services/media_resolver.rs

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autogram_common::models::MediaFile;
use bytes::Bytes;
use tracing::{info, warn};

use crate::Error;
use crate::cache::{Resolution, Resolver};
use crate::platforms::telegram::TelegramClient;

/// Where attachment bytes come from on a cache miss.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, file_id: &str) -> Result<Bytes, Error>;
}

#[async_trait]
impl MediaSource for TelegramClient {
    async fn fetch(&self, file_id: &str) -> Result<Bytes, Error> {
        self.download_file(file_id).await
    }
}

/// Cache resolver that downloads attachments and answers failed downloads
/// with a placeholder image that is never cached.
pub struct MediaResolver {
    source: Arc<dyn MediaSource>,
    fallback: Bytes,
}

impl MediaResolver {
    pub fn new(source: Arc<dyn MediaSource>, fallback: Bytes) -> Self {
        Self { source, fallback }
    }

    /// Reads the placeholder image; an unreadable file yields an empty payload.
    pub async fn load_fallback(path: impl AsRef<Path>) -> Bytes {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                warn!("Fallback image {} unreadable => {}; serving empty bodies on failure", path.display(), e);
                Bytes::new()
            }
        }
    }
}

#[async_trait]
impl Resolver<MediaFile> for MediaResolver {
    async fn resolve(&self, id: &str) -> Resolution<MediaFile> {
        info!("Cache miss: item id {}", id);
        match self.source.fetch(id).await {
            // Zero-weight entries never make room for themselves, so keep them out.
            Ok(data) if data.is_empty() => {
                warn!("Cache miss: item id {} backend returned an empty file", id);
                Resolution::transient(MediaFile::new(id, self.fallback.clone()))
            }
            Ok(data) => {
                info!("Cache miss: item id {} backend retrieval successful ({} bytes)", id, data.len());
                Resolution::cached(MediaFile::new(id, data))
            }
            Err(e) => {
                warn!("Cache miss: item id {} backend retrieval unsuccessful => {}", id, e);
                Resolution::transient(MediaFile::new(id, self.fallback.clone()))
            }
        }
    }
}
