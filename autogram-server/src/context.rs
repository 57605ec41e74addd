//! autogram-server/src/context.rs
//!
//! Builds everything the bridge needs from the settings file.

use std::net::SocketAddr;
use std::sync::Arc;

use autogram_common::models::{MediaFile, Settings};
use autogram_core::Error;
use autogram_core::cache::Cache;
use autogram_core::eventbus::EventBus;
use autogram_core::eventbus::transcript::{TranscriptConfig, spawn_transcript_task};
use autogram_core::eventbus::transcript_handle::TranscriptControl;
use autogram_core::media_server::{MediaServer, start_media_server};
use autogram_core::platforms::irc::{IrcConnectConfig, IrcPlatform};
use autogram_core::platforms::telegram::{TelegramClient, TelegramPlatform};
use autogram_core::services::{MediaResolver, MediaSource, RelayService, SettingsStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::Args;

pub struct ServerContext {
    pub settings: Arc<SettingsStore>,
    pub event_bus: Arc<EventBus>,
    pub cache: Cache<MediaFile>,
    pub telegram: TelegramPlatform,
    pub irc: IrcPlatform,
    pub relay: Arc<RelayService>,
    pub media_server: MediaServer,
    pub transcript: Option<(JoinHandle<()>, TranscriptControl)>,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        // 1) Settings
        let settings = Settings::load(&args.config).await?;
        info!(
            "Loaded settings: irc={} channel={} subscribers={} cache_limit={}",
            settings.irc_server,
            settings.irc_channel,
            settings.subscribers.len(),
            settings.cache_limit
        );
        let store = Arc::new(SettingsStore::new(settings.clone(), args.config.clone()));

        // 2) Event bus and optional transcript
        let event_bus = Arc::new(EventBus::new());
        let transcript = match settings.transcript_path.as_deref() {
            Some(path) => {
                info!("Writing transcript to {}", path);
                Some(spawn_transcript_task(&event_bus, path, TranscriptConfig::default()).await?)
            }
            None => None,
        };

        // 3) Telegram client, media cache and HTTP endpoint
        let client = Arc::new(TelegramClient::new(&settings.api_key)?);
        let fallback = MediaResolver::load_fallback(&settings.fallback_image).await;
        let source: Arc<dyn MediaSource> = client.clone();
        let cache = Cache::new(settings.cache_limit, MediaResolver::new(source, fallback))?;

        let listen: SocketAddr = settings.http_listen.parse()?;
        let media_server = start_media_server(listen, cache.clone()).await?;

        // 4) Platforms
        let irc = IrcPlatform::new(
            IrcConnectConfig {
                server: settings.irc_server.clone(),
                use_tls: settings.irc_tls,
                accept_invalid_certs: settings.irc_tls_insecure,
                nickname: settings.irc_nickname.clone(),
                realname: settings.irc_realname.clone(),
            },
            &settings.irc_channel,
        );
        let telegram = TelegramPlatform::new(client.clone());

        // 5) Relay
        let relay = Arc::new(RelayService::new(
            Arc::new(irc.sender()),
            client,
            store.clone(),
            cache.clone(),
            event_bus.clone(),
            &settings.irc_channel,
            &settings.http_server_string,
        ));

        Ok(Self {
            settings: store,
            event_bus,
            cache,
            telegram,
            irc,
            relay,
            media_server,
            transcript,
        })
    }
}
