//! Dispatcher error types

use thiserror::Error;

/// Send rejected before any transport call.
///
/// These are caller mistakes; delivery failures are reported per target
/// through `ReceiveResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Target set was empty
    #[error("send has no targets")]
    EmptyTargets,

    /// Dictionary exceeds the configured payload limit
    #[error("dictionary is {size} bytes, limit is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Broadcast with nobody connected
    #[error("no watches connected")]
    NoConnectedWatches,
}

impl SendError {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyTargets => "empty_targets",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NoConnectedWatches => "no_connected_watches",
        }
    }
}
