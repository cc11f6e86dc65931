//! 协议指标收集模块
//!
//! 记录投递结果、入站消息和连接状态，并在内存中聚合投递统计。

use std::collections::{BTreeMap, HashMap};

use contracts::{NackReason, ReceiveResult, WatchId};
use metrics::{counter, gauge, histogram};

/// 记录一次出站帧发送
pub fn record_frame_sent(kind: &'static str, bytes: usize) {
    counter!("watchlink_frames_sent_total", "kind" => kind).increment(1);
    histogram!("watchlink_frame_bytes").record(bytes as f64);
}

/// 记录发送在调用时被拒绝 (空目标、负载过大)
pub fn record_send_rejected(reason: &'static str) {
    counter!("watchlink_sends_rejected_total", "reason" => reason).increment(1);
}

/// 记录单个目标的最终投递结果
pub fn record_delivery_result(result: &ReceiveResult) {
    match result {
        ReceiveResult::Nack(reason) => {
            counter!(
                "watchlink_delivery_results_total",
                "outcome" => "nack",
                "reason" => nack_label(reason)
            )
            .increment(1);
        }
        other => {
            counter!("watchlink_delivery_results_total", "outcome" => other.outcome())
                .increment(1);
        }
    }
}

/// 记录投递延迟 (发送到最终结果)
pub fn record_delivery_latency_ms(latency_ms: f64) {
    histogram!("watchlink_delivery_latency_ms").record(latency_ms);
}

/// 记录当前未完成的投递数
pub fn record_pending_deliveries(pending: usize) {
    gauge!("watchlink_pending_deliveries").set(pending as f64);
}

/// 记录入站消息处理结果
pub fn record_inbound(outcome: &'static str) {
    counter!("watchlink_inbound_messages_total", "outcome" => outcome).increment(1);
}

/// 记录入站帧解码失败
pub fn record_decode_failure() {
    counter!("watchlink_decode_failures_total").increment(1);
}

/// 记录应用生命周期事件
pub fn record_lifecycle_event(kind: &'static str, delivered: bool) {
    let status = if delivered { "delivered" } else { "discarded" };
    counter!(
        "watchlink_lifecycle_events_total",
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

/// 记录已连接手表数
pub fn record_connected_watches(count: usize) {
    gauge!("watchlink_connected_watches").set(count as f64);
}

/// 记录传输事件
pub fn record_transport_event(kind: &'static str) {
    counter!("watchlink_transport_events_total", "kind" => kind).increment(1);
}

/// Stable label for a nack reason.
pub fn nack_label(reason: &NackReason) -> &'static str {
    match reason {
        NackReason::NotConnected => "not_connected",
        NackReason::Disconnected => "disconnected",
        NackReason::NoListener => "no_listener",
        NackReason::ListenerTimeout => "listener_timeout",
        NackReason::DecodeError => "decode_error",
        NackReason::Rejected => "rejected",
        NackReason::DifferentAppOpen => "different_app_open",
        NackReason::NoPermissions => "no_permissions",
        NackReason::ResponderDropped => "responder_dropped",
        NackReason::TransportFailed(_) => "transport_failed",
    }
}

/// 投递统计聚合器
///
/// 在内存中聚合每个目标的投递结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 发送次数 (一次发送可有多个目标)
    pub total_sends: u64,

    /// 最终结果总数
    pub total_results: u64,

    pub acked: u64,
    pub nacked: u64,
    pub timed_out: u64,

    /// 各拒绝原因计数
    pub nack_reasons: HashMap<&'static str, u64>,

    /// 各手表的结果计数
    pub per_watch: BTreeMap<WatchId, WatchTally>,

    /// 延迟统计 (毫秒)
    pub latency_stats: RunningStats,
}

/// 单块手表的结果计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchTally {
    pub acked: u64,
    pub nacked: u64,
    pub timed_out: u64,
}

impl DeliveryStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次发送
    pub fn record_send(&mut self) {
        self.total_sends += 1;
    }

    /// 记录一个目标的最终结果
    pub fn update(&mut self, watch: &WatchId, result: &ReceiveResult, latency_ms: f64) {
        self.total_results += 1;
        let tally = self.per_watch.entry(watch.clone()).or_default();

        match result {
            ReceiveResult::Ack => {
                self.acked += 1;
                tally.acked += 1;
                self.latency_stats.push(latency_ms);
            }
            ReceiveResult::Nack(reason) => {
                self.nacked += 1;
                tally.nacked += 1;
                *self.nack_reasons.entry(nack_label(reason)).or_insert(0) += 1;
            }
            ReceiveResult::Timeout => {
                self.timed_out += 1;
                tally.timed_out += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        let rate = |n: u64| {
            if self.total_results > 0 {
                n as f64 / self.total_results as f64 * 100.0
            } else {
                0.0
            }
        };

        let mut nack_reasons: Vec<(&'static str, u64)> =
            self.nack_reasons.iter().map(|(k, v)| (*k, *v)).collect();
        nack_reasons.sort();

        DeliverySummary {
            total_sends: self.total_sends,
            total_results: self.total_results,
            acked: self.acked,
            nacked: self.nacked,
            timed_out: self.timed_out,
            ack_rate: rate(self.acked),
            timeout_rate: rate(self.timed_out),
            latency_ms: StatsSummary::from(&self.latency_stats),
            nack_reasons,
            per_watch: self
                .per_watch
                .iter()
                .map(|(id, tally)| (id.to_string(), *tally))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_sends: u64,
    pub total_results: u64,
    pub acked: u64,
    pub nacked: u64,
    pub timed_out: u64,
    pub ack_rate: f64,
    pub timeout_rate: f64,
    pub latency_ms: StatsSummary,
    pub nack_reasons: Vec<(&'static str, u64)>,
    pub per_watch: Vec<(String, WatchTally)>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Sends: {}", self.total_sends)?;
        writeln!(f, "Results: {}", self.total_results)?;
        writeln!(f, "Acked: {} ({:.2}%)", self.acked, self.ack_rate)?;
        writeln!(f, "Nacked: {}", self.nacked)?;
        writeln!(f, "Timed out: {} ({:.2}%)", self.timed_out, self.timeout_rate)?;
        writeln!(f, "Ack latency (ms): {}", self.latency_ms)?;

        if !self.nack_reasons.is_empty() {
            writeln!(f, "Nack reasons:")?;
            for (reason, count) in &self.nack_reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        if !self.per_watch.is_empty() {
            writeln!(f, "Per watch:")?;
            for (watch, tally) in &self.per_watch {
                writeln!(
                    f,
                    "  {}: ack={} nack={} timeout={}",
                    watch, tally.acked, tally.nacked, tally.timed_out
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.2}, max={:.2}, mean={:.2}, std={:.2} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-10);
        assert!((stats.min() - 2.0).abs() < 1e-10);
        assert!((stats.max() - 9.0).abs() < 1e-10);
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = DeliveryStatsAggregator::new();
        let w1 = WatchId::new("w1");
        let w2 = WatchId::new("w2");

        aggregator.record_send();
        aggregator.update(&w1, &ReceiveResult::Ack, 12.0);
        aggregator.update(&w2, &ReceiveResult::Nack(NackReason::NotConnected), 0.0);
        aggregator.record_send();
        aggregator.update(&w1, &ReceiveResult::Timeout, 5000.0);

        assert_eq!(aggregator.total_sends, 2);
        assert_eq!(aggregator.total_results, 3);
        assert_eq!(aggregator.acked, 1);
        assert_eq!(aggregator.nacked, 1);
        assert_eq!(aggregator.timed_out, 1);
        assert_eq!(aggregator.nack_reasons.get("not_connected"), Some(&1));
        assert_eq!(
            aggregator.per_watch.get("w1"),
            Some(&WatchTally {
                acked: 1,
                nacked: 0,
                timed_out: 1
            })
        );
        // only acks feed latency
        assert_eq!(aggregator.latency_stats.count(), 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DeliveryStatsAggregator::new();
        let w1 = WatchId::new("w1");
        aggregator.record_send();
        aggregator.update(&w1, &ReceiveResult::Ack, 10.0);
        aggregator.update(&w1, &ReceiveResult::Nack(NackReason::Rejected), 0.0);

        let output = aggregator.summary().to_string();
        assert!(output.contains("Acked: 1 (50.00%)"));
        assert!(output.contains("rejected: 1"));
        assert!(output.contains("w1: ack=1 nack=1 timeout=0"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DeliveryStatsAggregator::new().summary();
        assert_eq!(summary.ack_rate, 0.0);
        assert_eq!(summary.latency_ms.to_string(), "N/A");
    }
}
