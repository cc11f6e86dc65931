//! Session runner - builds a host on simulated watches and drives traffic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AppConfig, Dictionary, HostBlueprint, ReceiveResult, Reply, WatchId};
use host::WatchHost;
use tokio::sync::mpsc;
use tracing::{info, warn};
use transport::MockTransport;

use super::listener::LoggingListener;
use super::SessionStats;
use crate::error::CliError;

/// How long simulated watches get to show up in the registry
const CONNECT_WAIT: Duration = Duration::from_secs(5);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub blueprint: HostBlueprint,

    /// App name to target (None = first configured app)
    pub app: Option<String>,

    /// Dictionaries to broadcast
    pub messages: u64,

    pub interval: Duration,

    /// Session timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Have each watch send one message to the app
    pub inbound: bool,
}

/// One messaging session against the configured simulated watches
pub struct Session {
    config: SessionConfig,
}

type Outcome = (WatchId, ReceiveResult, f64);

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<SessionStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let app = select_app(blueprint, self.config.app.as_deref())?.clone();

        // Host
        let protocol = blueprint.protocol.clone();
        let (transport, events) = MockTransport::new(protocol.event_queue_capacity);
        let host = Arc::new(
            WatchHost::builder(transport.clone())
                .protocol(protocol.clone())
                .build()
                .context("Failed to build watch host")?,
        );
        let event_loop = host.spawn(events);

        let mut listeners = Vec::with_capacity(blueprint.apps.len());
        for configured in &blueprint.apps {
            let listener = Arc::new(LoggingListener::new(configured.name.clone()));
            host.register_listener(configured.uuid, listener.clone());
            listeners.push(listener);
        }
        info!(apps = listeners.len(), target = %app.name, "Listeners registered");

        // Simulated watches
        for watch in &blueprint.watches {
            transport.connect_simulated(watch).await;
        }
        wait_for_watches(&host, blueprint.watches.len()).await?;
        info!(watches = blueprint.watches.len(), "Simulated watches connected");

        let mut stats = SessionStats {
            watches: blueprint.watches.len(),
            ..Default::default()
        };

        if self.config.inbound {
            for watch in blueprint.watch_ids() {
                transport.open_app(app.uuid, &watch).await;
                transport
                    .inject_message(&watch, app.uuid, &inbound_dictionary(&watch))
                    .await;
                stats.inbound_sent += 1;
            }
        }

        let traffic = self.broadcast_loop(&host, &app, &mut stats);
        match self.config.timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, traffic).await.is_err() {
                    warn!(timeout_secs = timeout.as_secs(), "Session timed out");
                }
            }
            None => traffic.await,
        }

        if self.config.inbound {
            let wait = protocol.listener_timeout() + Duration::from_secs(1);
            let replies = transport
                .wait_for_replies(stats.inbound_sent as usize, wait)
                .await
                .unwrap_or_else(|| transport.replies());
            stats.inbound_acked = replies.iter().filter(|r| r.reply == Reply::Ack).count() as u64;

            for watch in blueprint.watch_ids() {
                transport.close_app(app.uuid, &watch).await;
            }
        }

        info!("Shutting down session...");
        for watch in blueprint.watch_ids() {
            transport.disconnect_watch(&watch).await;
        }
        let received: u64 = listeners.iter().map(|l| l.received()).sum();
        event_loop.abort();

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            results = stats.deliveries.total_results,
            inbound_received = received,
            "Session complete"
        );

        Ok(stats)
    }

    /// Broadcast `messages` dictionaries and fold every target result into `stats`.
    async fn broadcast_loop(&self, host: &WatchHost, app: &AppConfig, stats: &mut SessionStats) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();

        for seq in 0..self.config.messages {
            let dict = outbound_dictionary(seq);
            let started = Instant::now();
            let tx = tx.clone();

            let sent = host.dispatcher().broadcast(app.uuid, &dict, move |watch, result| {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let _ = tx.send((watch, result, latency_ms));
            });

            match sent {
                Ok(send_id) => {
                    stats.deliveries.record_send();
                    info!(send_id = %send_id, seq, keys = dict.len(), "Dictionary sent");
                }
                Err(e) => {
                    stats.rejected_sends += 1;
                    warn!(seq, error = %e, "Send rejected");
                }
            }

            // drain whatever has already completed
            while let Ok((watch, result, latency_ms)) = rx.try_recv() {
                record_outcome(stats, &watch, &result, latency_ms);
            }

            if !self.config.interval.is_zero() {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        // every completion task drops its sender once all its targets resolve
        drop(tx);
        while let Some((watch, result, latency_ms)) = rx.recv().await {
            record_outcome(stats, &watch, &result, latency_ms);
        }
    }
}

fn record_outcome(stats: &mut SessionStats, watch: &WatchId, result: &ReceiveResult, latency_ms: f64) {
    info!(
        watch = %watch,
        result = %result,
        latency_ms = format!("{:.2}", latency_ms),
        "Delivery result"
    );
    stats.deliveries.update(watch, result, latency_ms);
}

fn select_app<'a>(blueprint: &'a HostBlueprint, name: Option<&str>) -> Result<&'a AppConfig, CliError> {
    match name {
        Some(name) => blueprint.app_by_name(name).ok_or_else(|| CliError::UnknownApp {
            name: name.to_string(),
            known: blueprint
                .apps
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
        None => blueprint.apps.first().ok_or(CliError::NoApps),
    }
}

async fn wait_for_watches(host: &WatchHost, count: usize) -> Result<(), CliError> {
    let mut connected = host.registry().subscribe();
    tokio::time::timeout(CONNECT_WAIT, connected.wait_for(|set| set.len() >= count))
        .await
        .ok()
        .and_then(|r| r.ok())
        .map(|_| ())
        .ok_or(CliError::ConnectTimeout {
            secs: CONNECT_WAIT.as_secs(),
        })
}

fn outbound_dictionary(seq: u64) -> Dictionary {
    Dictionary::new()
        .with(1, format!("message #{seq}"))
        .with(2, seq as u32)
        .with(3, (seq % 256) as u8)
}

fn inbound_dictionary(watch: &WatchId) -> Dictionary {
    Dictionary::new()
        .with(1, format!("hello from {watch}"))
        .with(2, -1i8)
}
