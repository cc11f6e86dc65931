//! LifecycleNotifier - forward app opened/closed events to listeners

use std::sync::Arc;

use contracts::{AppId, WatchId};
use registry::DeviceRegistry;
use tracing::{debug, instrument};

use crate::listeners::ListenerRegistry;

/// Forwards lifecycle events at most once each. Events for apps with no
/// listener are discarded, not buffered.
pub struct LifecycleNotifier {
    listeners: Arc<ListenerRegistry>,
    registry: Arc<DeviceRegistry>,
}

impl LifecycleNotifier {
    pub fn new(listeners: Arc<ListenerRegistry>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            listeners,
            registry,
        }
    }

    /// Returns true if a listener was notified.
    #[instrument(name = "lifecycle_app_opened", skip(self), fields(app = %app, watch = %watch))]
    pub fn app_opened(&self, app: AppId, watch: WatchId) -> bool {
        self.registry.set_active_app(&watch, app);

        let delivered = match self.listeners.get(&app) {
            Some(listener) => {
                listener.on_app_opened(app, watch);
                true
            }
            None => {
                debug!("No listener, app_opened discarded");
                false
            }
        };
        observability::record_lifecycle_event("app_opened", delivered);
        delivered
    }

    /// Returns true if a listener was notified.
    #[instrument(name = "lifecycle_app_closed", skip(self), fields(app = %app, watch = %watch))]
    pub fn app_closed(&self, app: AppId, watch: WatchId) -> bool {
        self.registry.clear_active_app(&watch, app);

        let delivered = match self.listeners.get(&app) {
            Some(listener) => {
                listener.on_app_closed(app, watch);
                true
            }
            None => {
                debug!("No listener, app_closed discarded");
                false
            }
        };
        observability::record_lifecycle_event("app_closed", delivered);
        delivered
    }
}
