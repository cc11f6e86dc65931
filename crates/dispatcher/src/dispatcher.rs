//! Dispatcher - outbound sends, pending-delivery table and timeouts

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use contracts::{
    AppControl, AppId, DeliveryToken, Dictionary, NackReason, ProtocolConfig, ReceiveResult,
    Transport, TransportError, WatchId,
};
use registry::DeviceRegistry;

use crate::error::SendError;
use crate::handle::{CompletionHandle, TargetResult};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Identifier of one accepted send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SendId(pub u64);

impl fmt::Display for SendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on how long a send waits for transport outcomes
    pub delivery_timeout: Duration,
    /// Largest accepted `Dictionary::size_in_bytes`
    pub max_dictionary_bytes: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&ProtocolConfig::default())
    }
}

impl From<&ProtocolConfig> for DispatcherConfig {
    fn from(protocol: &ProtocolConfig) -> Self {
        Self {
            delivery_timeout: protocol.delivery_timeout(),
            max_dictionary_bytes: protocol.max_dictionary_bytes,
        }
    }
}

/// What a pending delivery carries, for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryKind {
    Message,
    Control,
}

impl DeliveryKind {
    fn label(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Control => "control",
        }
    }
}

/// Outcomes are matched on the session a delivery was issued on, so an
/// outcome from before a reconnect never completes a newer delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PendingKey {
    watch: WatchId,
    session_id: u64,
    token: DeliveryToken,
}

/// One (send, target) awaiting a transport outcome
struct PendingDelivery {
    send_id: SendId,
    kind: DeliveryKind,
    started: Instant,
    results: mpsc::UnboundedSender<TargetResult>,
}

struct Shared {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<PendingKey, PendingDelivery>>,
    config: DispatcherConfig,
    metrics: DispatchMetrics,
    next_send: AtomicU64,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    pub fn new(registry: Arc<DeviceRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            config: DispatcherConfig::default(),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(Shared {
                registry: self.registry,
                transport: self.transport,
                pending: Mutex::new(HashMap::new()),
                config: self.config,
                metrics: DispatchMetrics::new(),
                next_send: AtomicU64::new(1),
            }),
        }
    }
}

/// Per-target results of one send, gathered by [`Dispatcher::send_collect`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub send_id: SendId,
    pub results: BTreeMap<WatchId, ReceiveResult>,
}

impl DeliveryReport {
    pub fn get(&self, watch: &str) -> Option<&ReceiveResult> {
        self.results.get(watch)
    }

    pub fn all_acked(&self) -> bool {
        self.results.values().all(ReceiveResult::is_ack)
    }
}

/// Outbound message dispatcher
///
/// Cheap to clone; clones share the pending table. Sends must be issued
/// from within a tokio runtime.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Shared>,
}

impl Dispatcher {
    pub fn builder(registry: Arc<DeviceRegistry>, transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry, transport)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Deliveries still awaiting a transport outcome
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<PendingKey, PendingDelivery>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `dict` to `app` on every watch in `targets`.
    ///
    /// Returns as soon as the frame is queued. `on_result` is then called
    /// once per distinct target from a separate task, never from inside
    /// this call.
    #[instrument(
        name = "dispatcher_send",
        skip(self, dict, targets, on_result),
        fields(app = %app, keys = dict.len())
    )]
    pub fn send<I, F>(
        &self,
        app: AppId,
        dict: &Dictionary,
        targets: I,
        on_result: F,
    ) -> Result<SendId, SendError>
    where
        I: IntoIterator<Item = WatchId>,
        F: FnMut(WatchId, ReceiveResult) + Send + 'static,
    {
        let targets: BTreeSet<WatchId> = targets.into_iter().collect();
        if targets.is_empty() {
            return Err(self.reject(SendError::EmptyTargets));
        }

        let size = dict.size_in_bytes();
        let max = self.inner.config.max_dictionary_bytes;
        if size > max {
            return Err(self.reject(SendError::PayloadTooLarge { size, max }));
        }

        // Encoded once; every target shares the same buffer.
        let frame = codec::encode_frame(app, dict);
        let frame_len = frame.len();
        let transport = Arc::clone(&self.inner.transport);
        Ok(self.submit(targets, DeliveryKind::Message, frame_len, on_result, |watch| {
            transport.send_frame(watch, frame.clone())
        }))
    }

    /// Send to every currently connected watch
    pub fn broadcast<F>(&self, app: AppId, dict: &Dictionary, on_result: F) -> Result<SendId, SendError>
    where
        F: FnMut(WatchId, ReceiveResult) + Send + 'static,
    {
        let targets = self.connected_targets()?;
        self.send(app, dict, targets, on_result)
    }

    /// Send and wait until every target has a result.
    ///
    /// Collects only; deciding what a mixed outcome means is up to the caller.
    pub async fn send_collect<I>(
        &self,
        app: AppId,
        dict: &Dictionary,
        targets: I,
    ) -> Result<DeliveryReport, SendError>
    where
        I: IntoIterator<Item = WatchId>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let send_id = self.send(app, dict, targets, move |watch, result| {
            let _ = tx.send((watch, result));
        })?;
        Ok(collect_report(send_id, rx).await)
    }

    /// Ask every watch in `targets` to launch `app`
    pub async fn start_app<I>(&self, app: AppId, targets: I) -> Result<DeliveryReport, SendError>
    where
        I: IntoIterator<Item = WatchId>,
    {
        self.control(AppControl::Start(app), targets.into_iter().collect())
            .await
    }

    /// Ask every watch in `targets` to close `app`
    pub async fn stop_app<I>(&self, app: AppId, targets: I) -> Result<DeliveryReport, SendError>
    where
        I: IntoIterator<Item = WatchId>,
    {
        self.control(AppControl::Stop(app), targets.into_iter().collect())
            .await
    }

    /// Launch `app` on every connected watch
    pub async fn start_app_on_all(&self, app: AppId) -> Result<DeliveryReport, SendError> {
        let targets = self.connected_targets()?;
        self.control(AppControl::Start(app), targets).await
    }

    /// Close `app` on every connected watch
    pub async fn stop_app_on_all(&self, app: AppId) -> Result<DeliveryReport, SendError> {
        let targets = self.connected_targets()?;
        self.control(AppControl::Stop(app), targets).await
    }

    fn connected_targets(&self) -> Result<BTreeSet<WatchId>, SendError> {
        let targets = self.inner.registry.active_devices();
        if targets.is_empty() {
            return Err(self.reject(SendError::NoConnectedWatches));
        }
        Ok(targets)
    }

    #[instrument(name = "dispatcher_control", skip(self, targets), fields(targets = targets.len()))]
    async fn control(
        &self,
        control: AppControl,
        targets: BTreeSet<WatchId>,
    ) -> Result<DeliveryReport, SendError> {
        if targets.is_empty() {
            return Err(self.reject(SendError::EmptyTargets));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.inner.transport);
        let send_id = self.submit(
            targets,
            DeliveryKind::Control,
            0,
            move |watch, result| {
                let _ = tx.send((watch, result));
            },
            |target| transport.send_control(target, control),
        );

        Ok(collect_report(send_id, rx).await)
    }

    /// Register pending deliveries for `targets` and arm the timeout.
    fn submit<F, S>(
        &self,
        targets: BTreeSet<WatchId>,
        kind: DeliveryKind,
        frame_len: usize,
        on_result: F,
        mut transmit: S,
    ) -> SendId
    where
        F: FnMut(WatchId, ReceiveResult) + Send + 'static,
        S: FnMut(&WatchId) -> Result<DeliveryToken, TransportError>,
    {
        let send_id = SendId(self.inner.next_send.fetch_add(1, Ordering::Relaxed));
        let completion = CompletionHandle::spawn(send_id, targets.len(), on_result);
        let results = completion.sender();
        let mut tracked: Vec<PendingKey> = Vec::with_capacity(targets.len());
        let mut immediate: Vec<TargetResult> = Vec::new();

        self.inner.metrics.inc_sends();

        for watch in targets {
            let session = match self.inner.registry.resolve(&watch) {
                Ok(session) => session,
                Err(e) => {
                    debug!(watch = %watch, error = %e, "Target not connected");
                    immediate.push((watch, ReceiveResult::Nack(NackReason::NotConnected)));
                    continue;
                }
            };

            // Locked per target across transmit so an outcome event cannot
            // overtake the insert; other sends interleave between targets.
            let mut pending = self.pending();
            match transmit(&watch) {
                Ok(token) => {
                    self.inner.metrics.inc_frames_sent();
                    observability::record_frame_sent(kind.label(), frame_len);
                    let key = PendingKey {
                        watch,
                        session_id: session.session_id,
                        token,
                    };
                    tracked.push(key.clone());
                    pending.insert(
                        key,
                        PendingDelivery {
                            send_id,
                            kind,
                            started: Instant::now(),
                            results: results.clone(),
                        },
                    );
                    self.inner.metrics.set_in_flight(pending.len());
                    observability::record_pending_deliveries(pending.len());
                }
                Err(e) => {
                    warn!(watch = %watch, error = %e, "Transport refused delivery");
                    immediate.push((watch, ReceiveResult::Nack(e.to_nack_reason())));
                }
            }
        }

        for (watch, result) in immediate {
            self.record(&result, None);
            let _ = results.send((watch, result));
        }

        if !tracked.is_empty() {
            self.arm_timeout(send_id, tracked, results);
        }
        // Worker keeps running on the senders held by pending entries.
        drop(completion.detach());

        debug!(send_id = %send_id, kind = kind.label(), "Send accepted");
        send_id
    }

    fn arm_timeout(
        &self,
        send_id: SendId,
        keys: Vec<PendingKey>,
        results: mpsc::UnboundedSender<TargetResult>,
    ) {
        let dispatcher = self.clone();
        let timeout = self.inner.config.delivery_timeout;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {}
                // Every target finished and the worker is gone.
                _ = results.closed() => return,
            }
            drop(results);

            let expired: Vec<(WatchId, PendingDelivery)> = {
                let mut pending = dispatcher.pending();
                let expired = keys
                    .into_iter()
                    .filter_map(|key| pending.remove(&key).map(|entry| (key.watch, entry)))
                    .collect();
                dispatcher.inner.metrics.set_in_flight(pending.len());
                observability::record_pending_deliveries(pending.len());
                expired
            };

            if !expired.is_empty() {
                info!(
                    send_id = %send_id,
                    count = expired.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Deliveries timed out"
                );
            }
            for (watch, entry) in expired {
                dispatcher.finalize(watch, entry, ReceiveResult::Timeout);
            }
        });
    }

    /// Apply a transport outcome to the watch's current session. Unknown,
    /// already-finalized or previous-session tokens are ignored.
    #[instrument(name = "dispatcher_complete", skip(self, result), fields(watch = %watch, token = %token))]
    pub fn complete(&self, watch: &WatchId, token: DeliveryToken, result: ReceiveResult) -> bool {
        let Ok(session) = self.inner.registry.resolve(watch) else {
            debug!("Outcome for disconnected watch ignored");
            return false;
        };
        let key = PendingKey {
            watch: watch.clone(),
            session_id: session.session_id,
            token,
        };

        let entry = {
            let mut pending = self.pending();
            let entry = pending.remove(&key);
            self.inner.metrics.set_in_flight(pending.len());
            entry
        };

        match entry {
            Some(entry) => {
                self.finalize(watch.clone(), entry, result);
                true
            }
            None => {
                debug!("Outcome for unknown or finalized delivery ignored");
                false
            }
        }
    }

    /// Finalize every pending delivery to `watch` as `Nack(Disconnected)`
    #[instrument(name = "dispatcher_fail_watch", skip(self), fields(watch = %watch))]
    pub fn fail_watch(&self, watch: &WatchId) -> usize {
        let failed: Vec<PendingDelivery> = {
            let mut pending = self.pending();
            let keys: Vec<PendingKey> = pending
                .keys()
                .filter(|key| &key.watch == watch)
                .cloned()
                .collect();
            let failed = keys
                .iter()
                .filter_map(|key| pending.remove(key))
                .collect();
            self.inner.metrics.set_in_flight(pending.len());
            observability::record_pending_deliveries(pending.len());
            failed
        };

        let count = failed.len();
        if count > 0 {
            info!(count, "Pending deliveries failed on disconnect");
        }
        for entry in failed {
            self.finalize(
                watch.clone(),
                entry,
                ReceiveResult::Nack(NackReason::Disconnected),
            );
        }
        count
    }

    fn finalize(&self, watch: WatchId, entry: PendingDelivery, result: ReceiveResult) {
        let latency = entry.started.elapsed();
        debug!(
            send_id = %entry.send_id,
            kind = entry.kind.label(),
            watch = %watch,
            result = %result,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "Delivery finalized"
        );
        self.record(&result, Some(latency));
        // Receiver gone means the caller's worker already exited.
        let _ = entry.results.send((watch, result));
    }

    fn record(&self, result: &ReceiveResult, latency: Option<Duration>) {
        self.inner.metrics.record_result(result);
        observability::record_delivery_result(result);
        if let (Some(latency), ReceiveResult::Ack) = (latency, result) {
            observability::record_delivery_latency_ms(latency.as_secs_f64() * 1000.0);
        }
    }

    fn reject(&self, error: SendError) -> SendError {
        warn!(error = %error, "Send rejected");
        observability::record_send_rejected(error.label());
        error
    }
}

async fn collect_report(
    send_id: SendId,
    mut rx: mpsc::UnboundedReceiver<(WatchId, ReceiveResult)>,
) -> DeliveryReport {
    let mut results = BTreeMap::new();
    // Ends once the completion worker drops the callback.
    while let Some((watch, result)) = rx.recv().await {
        results.insert(watch, result);
    }
    DeliveryReport { send_id, results }
}
