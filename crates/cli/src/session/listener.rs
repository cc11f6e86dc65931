//! Listener registered for every configured app during a session

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{AppId, Dictionary, Responder, WatchId, WatchListener};
use tracing::{info, warn};

/// Acks every message and logs lifecycle events.
pub struct LoggingListener {
    app_name: String,
    received: AtomicU64,
}

impl LoggingListener {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            received: AtomicU64::new(0),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl WatchListener for LoggingListener {
    fn on_message_received(&self, app: AppId, data: Dictionary, watch: WatchId, responder: Responder) {
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(
            app = %self.app_name,
            uuid = %app,
            watch = %watch,
            keys = data.len(),
            bytes = data.size_in_bytes(),
            "Message from watch"
        );
        if let Err(e) = responder.ack() {
            warn!(watch = %watch, error = %e, "Ack arrived too late");
        }
    }

    fn on_app_opened(&self, _app: AppId, watch: WatchId) {
        info!(app = %self.app_name, watch = %watch, "App opened");
    }

    fn on_app_closed(&self, _app: AppId, watch: WatchId) {
        info!(app = %self.app_name, watch = %watch, "App closed");
    }
}
