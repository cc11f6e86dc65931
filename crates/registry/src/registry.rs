//! DeviceRegistry - set of currently connected watches

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use contracts::{AppId, ConnectedWatch, WatchId};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::error::RegistryError;

/// A resolved, connected watch.
///
/// `session_id` changes on every reconnect, so a delivery issued against an
/// older session can be told apart from one issued after the watch came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSession {
    pub watch: WatchId,
    pub session_id: u64,
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    info: ConnectedWatch,
    session_id: u64,
    active_app: Option<AppId>,
}

/// Registry of connected watches.
///
/// Reads take a shared lock; only transport connect/disconnect (and
/// app lifecycle) events mutate it.
pub struct DeviceRegistry {
    devices: RwLock<HashMap<WatchId, DeviceEntry>>,
    next_session: AtomicU64,
    connected_tx: watch::Sender<BTreeSet<WatchId>>,
    active_apps_tx: watch::Sender<BTreeMap<WatchId, AppId>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (connected_tx, _) = watch::channel(BTreeSet::new());
        let (active_apps_tx, _) = watch::channel(BTreeMap::new());
        Self {
            devices: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            connected_tx,
            active_apps_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<WatchId, DeviceEntry>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<WatchId, DeviceEntry>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a watch to its current session. Never waits for a connection.
    pub fn resolve(&self, watch: &WatchId) -> Result<TransportSession, RegistryError> {
        self.read()
            .get(watch)
            .map(|entry| TransportSession {
                watch: entry.info.id.clone(),
                session_id: entry.session_id,
            })
            .ok_or_else(|| RegistryError::NotConnected(watch.clone()))
    }

    pub fn is_connected(&self, watch: &WatchId) -> bool {
        self.read().contains_key(watch)
    }

    /// Ids of all connected watches.
    pub fn active_devices(&self) -> BTreeSet<WatchId> {
        self.read().keys().cloned().collect()
    }

    /// Metadata of all connected watches, ordered by id.
    pub fn connected_watches(&self) -> Vec<ConnectedWatch> {
        let mut watches: Vec<ConnectedWatch> =
            self.read().values().map(|entry| entry.info.clone()).collect();
        watches.sort_by(|a, b| a.id.cmp(&b.id));
        watches
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Receiver that observes the connected set on every change.
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<WatchId>> {
        self.connected_tx.subscribe()
    }

    /// Receiver that observes the foreground app of every connected watch.
    ///
    /// Re-emits whenever an app opens or closes, or a watch with a
    /// foreground app connects or goes away.
    pub fn subscribe_active_apps(&self) -> watch::Receiver<BTreeMap<WatchId, AppId>> {
        self.active_apps_tx.subscribe()
    }

    /// Record a connection. A reconnect replaces the previous session.
    #[instrument(name = "registry_connect", skip(self, info), fields(watch = %info.id))]
    pub fn connect(&self, info: ConnectedWatch) -> TransportSession {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let watch = info.id.clone();

        let previous = {
            let mut devices = self.write();
            let previous = devices.insert(
                watch.clone(),
                DeviceEntry {
                    info,
                    session_id,
                    active_app: None,
                },
            );
            self.publish(&devices);
            previous
        };

        match previous {
            Some(old) => info!(
                old_session = old.session_id,
                session_id, "Watch reconnected"
            ),
            None => info!(session_id, "Watch connected"),
        }

        TransportSession { watch, session_id }
    }

    /// Record a disconnection. Returns the session that ended, if any.
    #[instrument(name = "registry_disconnect", skip(self), fields(watch = %watch))]
    pub fn disconnect(&self, watch: &WatchId) -> Option<TransportSession> {
        let removed = {
            let mut devices = self.write();
            let removed = devices.remove(watch);
            if removed.is_some() {
                self.publish(&devices);
            }
            removed
        };

        match removed {
            Some(entry) => {
                info!(session_id = entry.session_id, "Watch disconnected");
                Some(TransportSession {
                    watch: entry.info.id,
                    session_id: entry.session_id,
                })
            }
            None => {
                debug!("Disconnect for unknown watch ignored");
                None
            }
        }
    }

    /// Mark `app` as the foreground app on `watch`. Ignored if not connected.
    pub fn set_active_app(&self, watch: &WatchId, app: AppId) -> bool {
        let mut devices = self.write();
        match devices.get_mut(watch) {
            Some(entry) => {
                entry.active_app = Some(app);
                self.publish_active_apps(&devices);
                true
            }
            None => false,
        }
    }

    /// Clear the foreground app if it is still `app`.
    pub fn clear_active_app(&self, watch: &WatchId, app: AppId) -> bool {
        let mut devices = self.write();
        match devices.get_mut(watch) {
            Some(entry) if entry.active_app == Some(app) => {
                entry.active_app = None;
                self.publish_active_apps(&devices);
                true
            }
            _ => false,
        }
    }

    pub fn active_app(&self, watch: &WatchId) -> Option<AppId> {
        self.read().get(watch).and_then(|entry| entry.active_app)
    }

    // Called with the write lock held so subscribers see changes in order.
    fn publish(&self, devices: &HashMap<WatchId, DeviceEntry>) {
        let connected: BTreeSet<WatchId> = devices.keys().cloned().collect();
        observability::record_connected_watches(connected.len());
        self.connected_tx.send_replace(connected);
        self.publish_active_apps(devices);
    }

    fn publish_active_apps(&self, devices: &HashMap<WatchId, DeviceEntry>) {
        let active: BTreeMap<WatchId, AppId> = devices
            .iter()
            .filter_map(|(id, entry)| entry.active_app.map(|app| (id.clone(), app)))
            .collect();
        self.active_apps_tx.send_if_modified(|current| {
            if *current == active {
                return false;
            }
            *current = active;
            true
        });
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("connected", &self.active_devices())
            .finish()
    }
}
