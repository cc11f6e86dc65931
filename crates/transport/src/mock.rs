//! Mock 传输层
//!
//! 内存中的模拟手表，用于测试和演示，支持注入失败场景。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    AppControl, AppId, ConnectedWatch, DeliveryToken, Dictionary, InboundToken, NackReason, Reply,
    SimulatedWatchConfig, Transport, TransportError, TransportEvent, WatchBehavior, WatchId,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument, warn};

/// Mock 传输配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 发送时应被传输层拒绝的手表 IDs
    pub fail_watches: Vec<String>,
    /// `AutoNack` 行为使用的拒绝原因
    pub nack_reason: NackReason,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_watches: Vec::new(),
            nack_reason: NackReason::Rejected,
        }
    }
}

/// 已发送的消息帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub watch: WatchId,
    pub token: DeliveryToken,
    pub frame: Bytes,
}

/// 已发送的应用控制命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentControl {
    pub watch: WatchId,
    pub token: DeliveryToken,
    pub control: AppControl,
}

/// 对入站消息的回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReply {
    pub watch: WatchId,
    pub token: InboundToken,
    pub reply: Reply,
}

#[derive(Debug, Clone, Copy)]
struct SimulatedWatch {
    behavior: WatchBehavior,
    delay: Duration,
}

/// Mock 传输层
///
/// Outbound calls are answered according to each watch's
/// [`WatchBehavior`]; every callback is emitted as a [`TransportEvent`].
pub struct MockTransport {
    config: MockConfig,
    events: mpsc::Sender<TransportEvent>,
    next_delivery: AtomicU64,
    next_inbound: AtomicU64,
    /// 已连接的模拟手表
    watches: Mutex<HashMap<WatchId, SimulatedWatch>>,
    frames: Mutex<Vec<SentFrame>>,
    controls: Mutex<Vec<SentControl>>,
    replies: Mutex<Vec<RecordedReply>>,
    reply_count: watch::Sender<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// 创建 mock 传输层和事件接收端
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<TransportEvent>) {
        Self::with_config(MockConfig::default(), capacity)
    }

    /// 使用配置创建
    pub fn with_config(
        config: MockConfig,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<TransportEvent>) {
        let (events, rx) = mpsc::channel(capacity);
        let (reply_count, _) = watch::channel(0);
        let transport = Arc::new(Self {
            config,
            events,
            next_delivery: AtomicU64::new(0),
            next_inbound: AtomicU64::new(0),
            watches: Mutex::new(HashMap::new()),
            frames: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            reply_count,
        });
        (transport, rx)
    }

    // ===== Simulated watch side =====

    /// 连接一块模拟手表
    #[instrument(name = "mock_connect_watch", skip_all, fields(watch = %info.id, ?behavior))]
    pub async fn connect_watch(&self, info: ConnectedWatch, behavior: WatchBehavior, delay: Duration) {
        lock(&self.watches).insert(info.id.clone(), SimulatedWatch { behavior, delay });
        self.emit(TransportEvent::Connected(info)).await;
    }

    /// 按配置连接模拟手表
    pub async fn connect_simulated(&self, config: &SimulatedWatchConfig) {
        self.connect_watch(
            config.to_connected_watch(),
            config.behavior,
            Duration::from_millis(config.delay_ms),
        )
        .await;
    }

    /// 断开模拟手表
    pub async fn disconnect_watch(&self, watch: &WatchId) -> bool {
        let removed = lock(&self.watches).remove(watch).is_some();
        if removed {
            self.emit(TransportEvent::Disconnected(watch.clone())).await;
        }
        removed
    }

    /// 修改手表的投递行为
    pub fn set_behavior(&self, watch: &WatchId, behavior: WatchBehavior) -> bool {
        match lock(&self.watches).get_mut(watch) {
            Some(sim) => {
                sim.behavior = behavior;
                true
            }
            None => false,
        }
    }

    /// 模拟手表发来一条消息
    pub async fn inject_message(&self, watch: &WatchId, app: AppId, dict: &Dictionary) -> InboundToken {
        self.inject_raw(watch, codec::encode_frame(app, dict)).await
    }

    /// 模拟手表发来原始字节 (可为损坏数据)
    pub async fn inject_raw(&self, watch: &WatchId, frame: Bytes) -> InboundToken {
        let token = InboundToken(self.next_inbound.fetch_add(1, Ordering::Relaxed));
        self.emit(TransportEvent::FrameReceived {
            watch: watch.clone(),
            token,
            frame,
        })
        .await;
        token
    }

    /// 模拟应用在手表上打开
    pub async fn open_app(&self, app: AppId, watch: &WatchId) {
        self.emit(TransportEvent::AppOpened {
            app,
            watch: watch.clone(),
        })
        .await;
    }

    /// 模拟应用在手表上关闭
    pub async fn close_app(&self, app: AppId, watch: &WatchId) {
        self.emit(TransportEvent::AppClosed {
            app,
            watch: watch.clone(),
        })
        .await;
    }

    // ===== Inspection =====

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        lock(&self.frames).clone()
    }

    pub fn sent_controls(&self) -> Vec<SentControl> {
        lock(&self.controls).clone()
    }

    pub fn replies(&self) -> Vec<RecordedReply> {
        lock(&self.replies).clone()
    }

    /// 等待至少 `count` 条回复，超时返回 None
    pub async fn wait_for_replies(&self, count: usize, timeout: Duration) -> Option<Vec<RecordedReply>> {
        let mut rx = self.reply_count.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|n| *n >= count))
            .await
            .ok()?
            .ok()?;
        Some(self.replies())
    }

    pub fn connected_count(&self) -> usize {
        lock(&self.watches).len()
    }

    // ===== Internals =====

    async fn emit(&self, event: TransportEvent) {
        let kind = event.kind();
        if self.events.send(event).await.is_err() {
            warn!(kind, "Event receiver dropped");
        }
    }

    fn allocate_delivery(&self) -> DeliveryToken {
        DeliveryToken(self.next_delivery.fetch_add(1, Ordering::Relaxed))
    }

    fn check_sendable(&self, watch: &WatchId) -> Result<SimulatedWatch, TransportError> {
        if self.config.fail_watches.iter().any(|id| watch == id.as_str()) {
            return Err(TransportError::rejected("mock failure"));
        }
        lock(&self.watches)
            .get(watch)
            .copied()
            .ok_or_else(|| TransportError::Unreachable(watch.clone()))
    }

    /// Schedule the outcome event for a delivery according to the watch's behavior.
    fn settle(&self, watch: &WatchId, token: DeliveryToken, sim: SimulatedWatch) {
        let event = match sim.behavior {
            WatchBehavior::Silent => {
                debug!(watch = %watch, token = %token, "Silent watch, no outcome");
                return;
            }
            WatchBehavior::AutoNack => TransportEvent::DeliveryNacked {
                watch: watch.clone(),
                token,
                reason: self.config.nack_reason.clone(),
            },
            WatchBehavior::AutoAck | WatchBehavior::Delayed => TransportEvent::DeliveryAcked {
                watch: watch.clone(),
                token,
            },
        };

        // A full event queue applies backpressure instead of losing the outcome.
        let events = self.events.clone();
        let delay = match sim.behavior {
            WatchBehavior::Delayed => sim.delay,
            _ => Duration::ZERO,
        };
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if events.send(event).await.is_err() {
                debug!("Event channel closed, outcome dropped");
            }
        });
    }
}

impl Transport for MockTransport {
    fn send_frame(&self, watch: &WatchId, frame: Bytes) -> Result<DeliveryToken, TransportError> {
        let sim = self.check_sendable(watch)?;
        let token = self.allocate_delivery();
        lock(&self.frames).push(SentFrame {
            watch: watch.clone(),
            token,
            frame,
        });
        self.settle(watch, token, sim);
        Ok(token)
    }

    fn send_control(&self, watch: &WatchId, control: AppControl) -> Result<DeliveryToken, TransportError> {
        let sim = self.check_sendable(watch)?;
        let token = self.allocate_delivery();
        lock(&self.controls).push(SentControl {
            watch: watch.clone(),
            token,
            control,
        });
        self.settle(watch, token, sim);
        Ok(token)
    }

    fn reply(&self, watch: &WatchId, token: InboundToken, reply: Reply) -> Result<(), TransportError> {
        let count = {
            let mut replies = lock(&self.replies);
            replies.push(RecordedReply {
                watch: watch.clone(),
                token,
                reply,
            });
            replies.len()
        };
        self.reply_count.send_replace(count);
        Ok(())
    }
}
