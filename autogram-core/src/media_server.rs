// File: autogram-core/src/media_server.rs
//
// HTTP endpoint that serves cached attachments to IRC users following the
// links the relay posts.

use std::net::SocketAddr;
use std::time::Duration;

use autogram_common::models::{CacheStats, MediaFile};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_server::{Handle, Server};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::Error;
use crate::cache::Cache;

#[derive(Clone)]
pub struct MediaServerState {
    cache: Cache<MediaFile>,
}

pub fn router(cache: Cache<MediaFile>) -> Router {
    Router::new()
        .route("/autogramimg/{id}", get(serve_media))
        .route("/stats", get(serve_stats))
        .with_state(MediaServerState { cache })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn serve_media(State(state): State<MediaServerState>, Path(id): Path<String>) -> Response {
    if id == "favicon.ico" {
        return StatusCode::NOT_FOUND.into_response();
    }
    info!("Cache request: item id {}", id);
    match state.cache.get(&id).await {
        Ok(file) => (
            [(header::CONTENT_TYPE, sniff_content_type(&file.data))],
            file.data,
        )
            .into_response(),
        Err(e) => {
            error!("Cache unavailable for {} => {}", id, e);
            (StatusCode::SERVICE_UNAVAILABLE, "cache unavailable").into_response()
        }
    }
}

async fn serve_stats(State(state): State<MediaServerState>) -> Result<Json<CacheStats>, StatusCode> {
    state.cache.stats().await.map(Json).map_err(|e| {
        error!("Cache stats unavailable => {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })
}

/// Guesses a MIME type from magic bytes; Telegram media is mostly JPEG, MP4 and WebP.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "video/mp4",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "video/webm",
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A running media server.
pub struct MediaServer {
    pub local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<()>,
}

impl MediaServer {
    /// Stops accepting connections and lets in-flight requests finish within `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.handle.graceful_shutdown(Some(grace));
        if let Err(e) = self.task.await {
            warn!("Media server task ended abnormally => {}", e);
        }
    }
}

/// Binds `addr` and serves the router in the background. Resolves once the
/// listener is up, so port conflicts surface here.
pub async fn start_media_server(addr: SocketAddr, cache: Cache<MediaFile>) -> Result<MediaServer, Error> {
    let app = router(cache);
    let handle = Handle::new();

    let server = Server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());

    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Media server error: {}", e);
        }
        info!("Media server shut down.");
    });

    match handle.listening().await {
        Some(local_addr) => {
            info!("Media server listening on http://{}", local_addr);
            Ok(MediaServer { local_addr, handle, task })
        }
        None => {
            let _ = task.await;
            Err(Error::Config(format!("could not bind media server to {}", addr)))
        }
    }
}
