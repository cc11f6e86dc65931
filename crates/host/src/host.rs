//! WatchHost - wires the protocol components to a transport

use std::sync::Arc;

use contracts::{AppId, ProtocolConfig, ReceiveResult, Transport, TransportEvent, WatchListener};
use dispatcher::{Dispatcher, DispatcherConfig};
use registry::DeviceRegistry;
use router::{InboundRouter, LifecycleNotifier, ListenerRegistry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::error::HostError;

/// Builder for [`WatchHost`]
pub struct WatchHostBuilder {
    transport: Arc<dyn Transport>,
    registry: Option<Arc<DeviceRegistry>>,
    protocol: ProtocolConfig,
}

impl WatchHostBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            registry: None,
            protocol: ProtocolConfig::default(),
        }
    }

    /// Share an existing registry instead of creating one
    pub fn registry(mut self, registry: Arc<DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn build(self) -> Result<WatchHost, HostError> {
        self.protocol
            .validate()
            .map_err(|e| HostError::invalid_protocol(e.to_string()))?;

        let registry = self.registry.unwrap_or_default();
        let listeners = Arc::new(ListenerRegistry::new());

        let dispatcher = Dispatcher::builder(Arc::clone(&registry), Arc::clone(&self.transport))
            .config(DispatcherConfig::from(&self.protocol))
            .build();
        let router = InboundRouter::new(
            Arc::clone(&listeners),
            self.transport,
            self.protocol.listener_timeout(),
        );
        let notifier = LifecycleNotifier::new(Arc::clone(&listeners), Arc::clone(&registry));

        Ok(WatchHost {
            protocol: self.protocol,
            registry,
            dispatcher,
            listeners,
            router,
            notifier,
        })
    }
}

/// Counters for one event loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoopStats {
    pub events: u64,
    pub connections: u64,
    pub disconnections: u64,
    pub frames: u64,
    pub outcomes: u64,
    /// Outcomes whose delivery had already finished (timed out or failed)
    pub stale_outcomes: u64,
    pub lifecycle: u64,
}

/// Owns every protocol component for one transport.
///
/// All transport callbacks enter through [`WatchHost::handle_event`], so
/// registry updates and outcome matching happen in event order.
pub struct WatchHost {
    protocol: ProtocolConfig,
    registry: Arc<DeviceRegistry>,
    dispatcher: Dispatcher,
    listeners: Arc<ListenerRegistry>,
    router: InboundRouter,
    notifier: LifecycleNotifier,
}

impl WatchHost {
    pub fn builder(transport: Arc<dyn Transport>) -> WatchHostBuilder {
        WatchHostBuilder::new(transport)
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// 注册监听器，返回是否替换了旧的监听器
    pub fn register_listener(&self, app: AppId, listener: Arc<dyn WatchListener>) -> bool {
        self.listeners.register(app, listener)
    }

    pub fn unregister_listener(&self, app: &AppId) -> bool {
        self.listeners.unregister(app)
    }

    /// Apply one transport event. Returns false for an outcome that
    /// matched no pending delivery.
    #[instrument(
        name = "host_handle_event",
        skip(self, event),
        fields(kind = event.kind(), watch = %event.watch())
    )]
    pub fn handle_event(&self, event: TransportEvent) -> bool {
        observability::record_transport_event(event.kind());

        match event {
            TransportEvent::Connected(info) => {
                // a second Connected without a Disconnected means the old link is gone
                if self.registry.is_connected(&info.id) {
                    let failed = self.dispatcher.fail_watch(&info.id);
                    debug!(failed, "Failed deliveries from previous session");
                }
                self.registry.connect(info);
                true
            }
            TransportEvent::Disconnected(watch) => {
                self.registry.disconnect(&watch);
                let failed = self.dispatcher.fail_watch(&watch);
                if failed > 0 {
                    info!(failed, "In-flight deliveries failed by disconnect");
                }
                true
            }
            TransportEvent::FrameReceived {
                watch,
                token,
                frame,
            } => {
                self.router.on_frame(watch, token, &frame);
                true
            }
            TransportEvent::DeliveryAcked { watch, token } => {
                self.dispatcher.complete(&watch, token, ReceiveResult::Ack)
            }
            TransportEvent::DeliveryNacked {
                watch,
                token,
                reason,
            } => self
                .dispatcher
                .complete(&watch, token, ReceiveResult::Nack(reason)),
            TransportEvent::AppOpened { app, watch } => {
                self.notifier.app_opened(app, watch);
                true
            }
            TransportEvent::AppClosed { app, watch } => {
                self.notifier.app_closed(app, watch);
                true
            }
        }
    }

    /// Consume events until the transport closes the channel
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) -> EventLoopStats {
        info!("Host event loop started");
        let mut stats = EventLoopStats::default();

        while let Some(event) = events.recv().await {
            stats.events += 1;
            match &event {
                TransportEvent::Connected(_) => stats.connections += 1,
                TransportEvent::Disconnected(_) => stats.disconnections += 1,
                TransportEvent::FrameReceived { .. } => stats.frames += 1,
                TransportEvent::DeliveryAcked { .. } | TransportEvent::DeliveryNacked { .. } => {
                    stats.outcomes += 1
                }
                TransportEvent::AppOpened { .. } | TransportEvent::AppClosed { .. } => {
                    stats.lifecycle += 1
                }
            }
            if !self.handle_event(event) {
                stats.stale_outcomes += 1;
            }
        }

        info!(events = stats.events, "Host event loop stopped");
        stats
    }

    pub fn spawn(self: &Arc<Self>, events: mpsc::Receiver<TransportEvent>) -> JoinHandle<EventLoopStats> {
        tokio::spawn(Arc::clone(self).run(events))
    }
}
