//! src/eventbus/transcript.rs
//!
//! Spawns a task that subscribes to the EventBus and appends every relayed
//! message to a plain-text transcript file. Lines are buffered and written in
//! batches, on a timer, or on request; the queue is drained and flushed one
//! last time on shutdown.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, info};

use crate::Error;
use crate::eventbus::{BridgeEvent, EventBus};
use super::transcript_handle::{TranscriptCommand, TranscriptControl};

#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Buffered lines that trigger an immediate write.
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            flush_interval: Duration::from_secs(300),
        }
    }
}

/// Opens `path` for appending (0600 on unix), subscribes to the bus and spawns
/// the writer. The `JoinHandle` resolves after the final flush.
pub async fn spawn_transcript_task(
    event_bus: &EventBus,
    path: impl AsRef<Path>,
    config: TranscriptConfig,
) -> Result<(JoinHandle<()>, TranscriptControl), Error> {
    let path = path.as_ref();
    let mut options = tokio::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);
    let file = options.open(path).await.map_err(|e| {
        Error::Config(format!("cannot open transcript {}: {}", path.display(), e))
    })?;

    let mut rx = event_bus.subscribe(Some(config.batch_size.max(1) * 4)).await;
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<TranscriptCommand>(8);

    let handle = tokio::spawn(async move {
        let mut writer = BufWriter::new(file);
        let mut buffer: Vec<String> = Vec::with_capacity(config.batch_size);
        let mut last_flush = Instant::now();

        info!(
            "Transcript task started with batch_size={} flush_interval={}s",
            config.batch_size,
            config.flush_interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Some(line) = format_line(&event) {
                                buffer.push(line);
                            }
                            if buffer.len() >= config.batch_size {
                                if let Err(e) = write_batch(&mut writer, &mut buffer).await {
                                    error!("Error writing transcript batch: {:?}", e);
                                }
                                last_flush = Instant::now();
                            }
                        }
                        None => {
                            info!("Transcript channel closed => break from loop.");
                            break;
                        }
                    }
                },
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        TranscriptCommand::FlushNow(reply) => {
                            while let Ok(event) = rx.try_recv() {
                                if let Some(line) = format_line(&event) {
                                    buffer.push(line);
                                }
                            }
                            let res = write_batch(&mut writer, &mut buffer).await;
                            last_flush = Instant::now();
                            let _ = reply.send(res);
                        }
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Transcript shutting down => break from loop.");
                        break;
                    }
                },
                _ = sleep(config.flush_interval) => {
                    if !buffer.is_empty() && last_flush.elapsed() >= config.flush_interval {
                        if let Err(e) = write_batch(&mut writer, &mut buffer).await {
                            error!("Periodic transcript flush error: {:?}", e);
                        }
                        last_flush = Instant::now();
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let Some(line) = format_line(&event) {
                buffer.push(line);
            }
        }
        if !buffer.is_empty() {
            info!("Transcript final flush: {} line(s) remain.", buffer.len());
        }
        if let Err(e) = write_batch(&mut writer, &mut buffer).await {
            error!("Final transcript flush error: {:?}", e);
        }

        info!("Transcript task exited completely.");
    });

    Ok((handle, TranscriptControl::new(cmd_tx)))
}

/// Renders one transcript line, newline-terminated. Ticks are not recorded.
pub fn format_line(event: &BridgeEvent) -> Option<String> {
    let (at, text) = match event {
        BridgeEvent::ChatMessage { platform, channel, user, text, timestamp } => {
            (*timestamp, format!("[{}] {} <{}> {}", platform, channel, user, text))
        }
        BridgeEvent::SystemMessage(text) => (Utc::now(), text.clone()),
        BridgeEvent::Tick => return None,
    };
    Some(stamp_line(at, &text))
}

fn stamp_line(at: DateTime<Utc>, text: &str) -> String {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if text.ends_with('\n') {
        format!("{} {}", stamp, text)
    } else {
        format!("{} {}\n", stamp, text)
    }
}

async fn write_batch(writer: &mut BufWriter<File>, buffer: &mut Vec<String>) -> Result<(), Error> {
    for line in buffer.iter() {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    buffer.clear();
    Ok(())
}
