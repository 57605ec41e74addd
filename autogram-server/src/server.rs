//! autogram-server/src/server.rs
//!
//! Connects both platforms and pumps traffic through the relay until Ctrl-C.

use std::time::Duration;

use autogram_core::Error;
use autogram_core::eventbus::BridgeEvent;
use autogram_core::platforms::PlatformIntegration;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::Args;
use crate::context::ServerContext;

const TICK_INTERVAL: Duration = Duration::from_secs(60);
const HTTP_GRACE: Duration = Duration::from_secs(5);

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ServerContext {
        settings,
        event_bus,
        cache,
        mut telegram,
        mut irc,
        relay,
        media_server,
        transcript,
    } = ServerContext::new(&args).await?;

    let mut updates = telegram
        .take_updates()
        .ok_or_else(|| Error::Platform("Telegram update stream already taken".into()))?;
    let mut irc_events = irc
        .take_events()
        .ok_or_else(|| Error::Platform("IRC event stream already taken".into()))?;

    // 1) Platforms
    telegram.connect().await?;
    irc.connect().await?;

    // 2) Tell subscribers we are back
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z");
    relay.announce(&format!("PSA: {}", now)).await;
    relay.announce("PSA: Autogram aktiv!").await;
    info!("Autogram running with {} subscriber(s).", settings.subscribers().await.len());

    // 3) Ctrl-C flips the shutdown flag
    let eb_clone = event_bus.clone();
    let _ctrlc_handle = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
        }
        info!("Ctrl-C detected; shutting down event bus...");
        eb_clone.shutdown();
    });

    // 4) Main loop
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    let mut tick = time::interval(TICK_INTERVAL);
    tick.tick().await;
    loop {
        tokio::select! {
            Some(update) = updates.recv() => {
                if let Err(e) = relay.handle_telegram_update(&update).await {
                    error!("Telegram update {} failed => {}", update.update_id, e);
                }
            }
            Some(evt) = irc_events.recv() => {
                if let Err(e) = relay.handle_irc_event(&evt).await {
                    error!("IRC event failed => {}", e);
                }
            }
            _ = tick.tick() => {
                match cache.stats().await {
                    Ok(stats) => debug!(
                        "Cache {}/{} bytes in {} item(s)",
                        stats.weight, stats.limit, stats.count
                    ),
                    Err(e) => warn!("Cache stats unavailable => {}", e),
                }
                event_bus.publish(BridgeEvent::Tick).await;
            }
            Ok(_) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signaled; exiting main loop.");
                    break;
                }
            }
        }
    }

    // 5) Wind down
    if let Some((handle, control)) = transcript {
        if let Err(e) = control.flush_now().await {
            warn!("Transcript flush before shutdown failed => {}", e);
        }
        event_bus.shutdown();
        if let Err(e) = handle.await {
            warn!("Transcript task ended abnormally => {}", e);
        }
    }

    if let Err(e) = irc.disconnect().await {
        warn!("IRC disconnect failed => {}", e);
    }
    if let Err(e) = telegram.disconnect().await {
        warn!("Telegram disconnect failed => {}", e);
    }

    info!("Stopping media server...");
    media_server.shutdown(HTTP_GRACE).await;
    Ok(())
}
