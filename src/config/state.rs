// Application state module
// Shared by every connection task

use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::sync::watch;

use super::types::Config;
use super::ImageSource;

/// Application state
pub struct AppState {
    pub config: Config,
    pub image: ImageSource,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,

    /// Connections currently being served
    pub active_connections: AtomicUsize,

    /// Flips to `true` once; the accept loop and every connection watch it
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: Config, image: ImageSource) -> Self {
        let cached_access_log = AtomicBool::new(config.logging.access_log);

        Self {
            config,
            image,
            cached_access_log,
            active_connections: AtomicUsize::new(0),
            shutdown: watch::Sender::new(false),
        }
    }

    /// Stop accepting connections and close idle ones
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested, including before this call
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}
