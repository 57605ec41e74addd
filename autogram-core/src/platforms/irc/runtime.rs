//! src/platforms/irc/runtime.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::platforms::{ConnectionStatus, MessageSink, PlatformIntegration};

use super::client::{IrcClient, IrcConnectConfig, IrcIncomingEvent};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// State shared between the platform handle and its supervisor task.
struct Shared {
    status: RwLock<ConnectionStatus>,
    outgoing: RwLock<Option<mpsc::UnboundedSender<String>>>,
}

/// Keeps one IRC connection alive, joins the bridged channel after
/// registration and hands channel traffic to whoever took the event receiver.
pub struct IrcPlatform {
    config: IrcConnectConfig,
    channel: String,
    shared: Arc<Shared>,
    supervisor: Option<JoinHandle<()>>,
    tx: mpsc::Sender<IrcIncomingEvent>,
    rx: Option<mpsc::Receiver<IrcIncomingEvent>>,
}

impl IrcPlatform {
    pub fn new(config: IrcConnectConfig, channel: &str) -> Self {
        let (tx, rx) = mpsc::channel(1000);
        Self {
            config,
            channel: channel.to_string(),
            shared: Arc::new(Shared {
                status: RwLock::new(ConnectionStatus::Disconnected),
                outgoing: RwLock::new(None),
            }),
            supervisor: None,
            tx,
            rx: Some(rx),
        }
    }

    pub fn sender(&self) -> IrcSender {
        IrcSender { shared: self.shared.clone() }
    }

    /// Hands out the PRIVMSG/NOTICE stream. Only the first call gets it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<IrcIncomingEvent>> {
        self.rx.take()
    }

    async fn supervise(
        first: IrcClient,
        config: IrcConnectConfig,
        channel: String,
        shared: Arc<Shared>,
        tx: mpsc::Sender<IrcIncomingEvent>,
    ) {
        let mut client = Some(first);
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let mut current = match client.take() {
                Some(c) => c,
                None => match IrcClient::connect(&config).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!("IRC reconnect to {} failed => {}", config.server, e);
                        *shared.status.write() = ConnectionStatus::Error(e.to_string());
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                },
            };

            *shared.outgoing.write() = Some(current.outgoing());
            *shared.status.write() = ConnectionStatus::Connected;

            if let Some(mut incoming) = current.incoming.take() {
                while let Some(evt) = incoming.recv().await {
                    match evt.command.as_str() {
                        "001" => {
                            info!("Joining {} on {}", channel, config.server);
                            current.join_channel(&channel);
                            backoff = INITIAL_BACKOFF;
                        }
                        "PRIVMSG" | "NOTICE" => {
                            if tx.send(evt).await.is_err() {
                                debug!("(IrcPlatform) event receiver dropped");
                            }
                        }
                        "ERROR" => {
                            warn!("IRC server error => {}", evt.raw_line);
                        }
                        other => debug!("(IrcPlatform) ignoring {}", other),
                    }
                }
            }

            *shared.outgoing.write() = None;
            *shared.status.write() = ConnectionStatus::Reconnecting;
            current.shutdown();
            warn!("IRC reconnect triggered, retrying in {:?}", backoff);
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

/// Cloneable posting handle that follows the platform across reconnects.
#[derive(Clone)]
pub struct IrcSender {
    shared: Arc<Shared>,
}

#[async_trait]
impl MessageSink for IrcSender {
    /// IRC lines cannot carry newlines, so each text line becomes its own PRIVMSG.
    async fn send_message(&self, channel: &str, message: &str) -> Result<(), Error> {
        let guard = self.shared.outgoing.read();
        let outgoing = guard
            .as_ref()
            .ok_or_else(|| Error::Platform("No active IRC connection".into()))?;
        for line in message.lines().filter(|l| !l.trim().is_empty()) {
            outgoing
                .send(format!("PRIVMSG {} :{}", channel, line))
                .map_err(|_| Error::Platform("IRC writer has stopped".into()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSink for IrcPlatform {
    async fn send_message(&self, channel: &str, message: &str) -> Result<(), Error> {
        self.sender().send_message(channel, message).await
    }
}

#[async_trait]
impl PlatformIntegration for IrcPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.supervisor.is_some() {
            info!("(IrcPlatform) connect => already connected");
            return Ok(());
        }
        if self.config.nickname.is_empty() {
            return Err(Error::Platform("IRC nickname must not be empty".into()));
        }

        let client = match IrcClient::connect(&self.config).await {
            Ok(c) => c,
            Err(e) => {
                let msg = format!("Error connecting to IRC {} => {}", self.config.server, e);
                error!("{}", msg);
                *self.shared.status.write() = ConnectionStatus::Error(msg);
                return Err(Error::Platform("IRC connect failed".into()));
            }
        };
        info!("Connected to IRC server {}", self.config.server);

        self.supervisor = Some(tokio::spawn(Self::supervise(
            client,
            self.config.clone(),
            self.channel.clone(),
            self.shared.clone(),
            self.tx.clone(),
        )));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        let outgoing = self.shared.outgoing.write().take();
        if let Some(outgoing) = outgoing {
            let _ = outgoing.send("QUIT :bridge shutting down".into());
        }
        if let Some(h) = self.supervisor.take() {
            // Give the writer a moment to push QUIT out.
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.abort();
        }
        *self.shared.status.write() = ConnectionStatus::Disconnected;
        Ok(())
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        Ok(self.shared.status.read().clone())
    }
}
