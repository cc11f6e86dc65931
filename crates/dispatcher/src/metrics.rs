//! Dispatch metrics for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::ReceiveResult;

/// Counters shared by every send of one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Accepted sends
    sends: AtomicU64,
    /// Frames handed to the transport
    frames_sent: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    timed_out: AtomicU64,
    /// Deliveries waiting for a transport outcome
    in_flight: AtomicUsize,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_sends(&self) {
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frames_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_in_flight(&self, n: usize) {
        self.in_flight.store(n, Ordering::Relaxed);
    }

    /// Count a terminal result
    pub fn record_result(&self, result: &ReceiveResult) {
        let counter = match result {
            ReceiveResult::Ack => &self.acked,
            ReceiveResult::Nack(_) => &self.nacked,
            ReceiveResult::Timeout => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sends: self.sends.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sends: u64,
    pub frames_sent: u64,
    pub acked: u64,
    pub nacked: u64,
    pub timed_out: u64,
    pub in_flight: usize,
}

impl MetricsSnapshot {
    /// Results delivered so far
    pub fn completed(&self) -> u64 {
        self.acked + self.nacked + self.timed_out
    }
}
