//! Transport - link-layer interface consumed by the protocol
//!
//! The transport owns framing, connection establishment and link retries.
//! Outbound calls are fire-and-report: outcomes come back later as
//! [`TransportEvent`]s on the host's event channel.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{AppId, ConnectedWatch, NackReason, Reply, WatchId};

/// Transport-assigned id of an outbound delivery, echoed in its outcome event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryToken(pub u64);

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Transport-assigned id of an inbound frame, used to address the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InboundToken(pub u64);

impl fmt::Display for InboundToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// App lifecycle command sent to a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command", content = "app")]
pub enum AppControl {
    Start(AppId),
    Stop(AppId),
}

impl AppControl {
    pub fn app(&self) -> AppId {
        match self {
            Self::Start(app) | Self::Stop(app) => *app,
        }
    }
}

/// Errors raised synchronously by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The link to the watch is gone
    #[error("watch '{0}' is not reachable")]
    Unreachable(WatchId),

    /// The transport refused the request
    #[error("transport rejected request: {0}")]
    Rejected(String),

    /// The transport has shut down
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Map a synchronous failure onto the per-target outcome taxonomy.
    pub fn to_nack_reason(&self) -> NackReason {
        match self {
            Self::Unreachable(_) => NackReason::NotConnected,
            other => NackReason::TransportFailed(other.to_string()),
        }
    }
}

/// Link-layer collaborator.
///
/// Implementations must be cheap to call from async code: each method only
/// enqueues work and returns. `send_frame` and `send_control` run while the
/// dispatcher holds its pending-table lock for that target, so they must not
/// call back into the dispatcher on the same thread; outcomes go out as
/// [`TransportEvent`]s.
pub trait Transport: Send + Sync {
    /// Queue an encoded frame for `watch`.
    fn send_frame(&self, watch: &WatchId, frame: Bytes) -> Result<DeliveryToken, TransportError>;

    /// Queue an app start/stop command for `watch`.
    fn send_control(
        &self,
        watch: &WatchId,
        control: AppControl,
    ) -> Result<DeliveryToken, TransportError>;

    /// Answer an inbound frame.
    fn reply(&self, watch: &WatchId, token: InboundToken, reply: Reply)
        -> Result<(), TransportError>;
}

/// Callbacks from the transport, delivered as values on an mpsc channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected(ConnectedWatch),
    Disconnected(WatchId),
    FrameReceived {
        watch: WatchId,
        token: InboundToken,
        frame: Bytes,
    },
    DeliveryAcked {
        watch: WatchId,
        token: DeliveryToken,
    },
    DeliveryNacked {
        watch: WatchId,
        token: DeliveryToken,
        reason: NackReason,
    },
    AppOpened {
        app: AppId,
        watch: WatchId,
    },
    AppClosed {
        app: AppId,
        watch: WatchId,
    },
}

impl TransportEvent {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Disconnected(_) => "disconnected",
            Self::FrameReceived { .. } => "frame_received",
            Self::DeliveryAcked { .. } => "delivery_acked",
            Self::DeliveryNacked { .. } => "delivery_nacked",
            Self::AppOpened { .. } => "app_opened",
            Self::AppClosed { .. } => "app_closed",
        }
    }

    /// Watch the event concerns.
    pub fn watch(&self) -> &WatchId {
        match self {
            Self::Connected(info) => &info.id,
            Self::Disconnected(watch)
            | Self::FrameReceived { watch, .. }
            | Self::DeliveryAcked { watch, .. }
            | Self::DeliveryNacked { watch, .. }
            | Self::AppOpened { watch, .. }
            | Self::AppClosed { watch, .. } => watch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_nack_reason() {
        let unreachable = TransportError::Unreachable("w1".into());
        assert_eq!(unreachable.to_nack_reason(), NackReason::NotConnected);

        let closed = TransportError::Closed;
        assert_eq!(
            closed.to_nack_reason(),
            NackReason::TransportFailed("transport closed".into())
        );
    }

    #[test]
    fn test_event_watch() {
        let event = TransportEvent::DeliveryAcked {
            watch: "w1".into(),
            token: DeliveryToken(3),
        };
        assert_eq!(event.watch(), "w1");
        assert_eq!(event.kind(), "delivery_acked");
    }
}
