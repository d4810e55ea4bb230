// src/reload/server.rs

//! In-process HTTP endpoint serving the live-reload channel.
//!
//! - `GET /livereload` is a Server-Sent-Events stream; each `reload` event
//!   tells the page to refresh.
//! - `GET /livereload.js` is the client script pages include.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::reload::channel::ReloadChannel;

const CLIENT_SCRIPT: &str = include_str!("../../assets/livereload.js");

pub fn router(channel: Arc<ReloadChannel>) -> Router {
    Router::new()
        .route("/livereload", get(handle_sse))
        .route("/livereload.js", get(handle_client_script))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(channel)
}

/// Bind `host:port` and serve the live-reload endpoint in the background.
pub async fn spawn_reload_server(
    host: &str,
    port: u16,
    channel: Arc<ReloadChannel>,
) -> Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding live-reload endpoint on {host}:{port}"))?;
    let addr = listener.local_addr()?;
    info!(%addr, "live-reload endpoint listening");

    let app = router(channel);
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "live-reload endpoint stopped");
        }
    }))
}

async fn handle_sse(
    State(channel): State<Arc<ReloadChannel>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = channel.subscribe();
    debug!(client = id, "live-reload stream opened");

    let stream = ReceiverStream::new(rx).map(|()| Ok(Event::default().event("reload").data("reload")));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_client_script() -> impl IntoResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/javascript")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(CLIENT_SCRIPT))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
