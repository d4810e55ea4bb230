// src/reload/mod.rs

//! Live-reload notification.
//!
//! - [`channel`] holds the set of connected clients.
//! - [`server`] exposes the channel over HTTP (SSE) with a client script.
//!
//! [`Notifier`] is what the engine calls after a browser-visible build.

pub mod channel;
pub mod server;

use std::sync::Arc;

use tracing::debug;

use crate::server::ServerStatus;

pub use channel::ReloadChannel;
pub use server::spawn_reload_server;

/// Pushes reloads to connected clients, but only while the dev server is
/// running; a page without a server has nothing to reload into.
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<ReloadChannel>,
    server: Arc<dyn ServerStatus>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("clients", &self.channel.client_count())
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(channel: Arc<ReloadChannel>, server: Arc<dyn ServerStatus>) -> Self {
        Self { channel, server }
    }

    /// Fire-and-forget. Returns how many clients were reached.
    pub fn notify_all(&self) -> usize {
        if !self.server.is_running() {
            debug!("dev server not running; reload notification skipped");
            return 0;
        }
        self.channel.notify_all()
    }
}
