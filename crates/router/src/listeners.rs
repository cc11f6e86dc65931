//! ListenerRegistry - one listener per app, last registration wins

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{AppId, WatchListener};
use tracing::info;

/// App -> listener table
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<AppId, Arc<dyn WatchListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `app`. Returns true if it replaced one.
    pub fn register(&self, app: AppId, listener: Arc<dyn WatchListener>) -> bool {
        let replaced = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(app, listener)
            .is_some();
        info!(app = %app, replaced, "Listener registered");
        replaced
    }

    /// Remove the listener for `app`. Returns true if one was registered.
    pub fn unregister(&self, app: &AppId) -> bool {
        let removed = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(app)
            .is_some();
        if removed {
            info!(app = %app, "Listener unregistered");
        }
        removed
    }

    pub fn get(&self, app: &AppId) -> Option<Arc<dyn WatchListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(app)
            .cloned()
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(app)
    }

    /// Apps with a registered listener
    pub fn apps(&self) -> Vec<AppId> {
        let mut apps: Vec<AppId> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        apps.sort();
        apps
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("apps", &self.apps())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Dictionary, Responder, WatchId};

    struct Noop;

    impl WatchListener for Noop {
        fn on_message_received(&self, _: AppId, _: Dictionary, _: WatchId, _: Responder) {}
    }

    #[test]
    fn test_register_replaces() {
        let registry = ListenerRegistry::new();
        let app = AppId::random();

        assert!(!registry.register(app, Arc::new(Noop)));
        assert!(registry.register(app, Arc::new(Noop)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ListenerRegistry::new();
        let app = AppId::random();
        registry.register(app, Arc::new(Noop));

        assert!(registry.unregister(&app));
        assert!(!registry.unregister(&app));
        assert!(registry.get(&app).is_none());
        assert!(registry.is_empty());
    }
}
