//! Delivery outcomes
//!
//! `ReceiveResult` is the terminal outcome of one (send, target) pair.
//! `Reply` is what a listener answers to an inbound message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a message was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum NackReason {
    /// Target was not in the connected set when the send was issued
    #[error("watch not connected")]
    NotConnected,

    /// Target disconnected while the delivery was pending
    #[error("watch disconnected before delivery completed")]
    Disconnected,

    /// No listener registered for the app
    #[error("no listener registered for app")]
    NoListener,

    /// Listener did not answer in time
    #[error("listener did not respond in time")]
    ListenerTimeout,

    /// Frame could not be decoded
    #[error("message could not be decoded")]
    DecodeError,

    /// Peer explicitly nacked
    #[error("rejected by peer")]
    Rejected,

    /// A different app is in the foreground on the watch
    #[error("a different app is open on the watch")]
    DifferentAppOpen,

    /// Host is not allowed to talk to this app
    #[error("no permission to message this app")]
    NoPermissions,

    /// Listener dropped its responder without answering
    #[error("listener dropped responder without answering")]
    ResponderDropped,

    /// Transport refused the frame
    #[error("transport failed: {0}")]
    TransportFailed(String),
}

/// Terminal outcome for one target of one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "reason")]
pub enum ReceiveResult {
    Ack,
    Nack(NackReason),
    Timeout,
}

impl ReceiveResult {
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    /// Metric/log label for the outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nack(_) => "nack",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ReceiveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ack"),
            Self::Nack(reason) => write!(f, "nack ({reason})"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<Reply> for ReceiveResult {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ack => Self::Ack,
            Reply::Nack(reason) => Self::Nack(reason),
        }
    }
}

/// Answer sent back to the device for an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reply", content = "reason")]
pub enum Reply {
    Ack,
    Nack(NackReason),
}

impl Reply {
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ack"),
            Self::Nack(reason) => write!(f, "nack ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_into_result() {
        assert_eq!(ReceiveResult::from(Reply::Ack), ReceiveResult::Ack);
        assert_eq!(
            ReceiveResult::from(Reply::Nack(NackReason::Rejected)),
            ReceiveResult::Nack(NackReason::Rejected)
        );
    }

    #[test]
    fn test_display() {
        let result = ReceiveResult::Nack(NackReason::NotConnected);
        assert_eq!(result.to_string(), "nack (watch not connected)");
        assert_eq!(ReceiveResult::Timeout.outcome(), "timeout");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ReceiveResult::Nack(NackReason::TransportFailed(
            "link down".into(),
        )))
        .unwrap();
        assert_eq!(
            json,
            r#"{"result":"nack","reason":{"reason":"transport_failed","detail":"link down"}}"#
        );

        let ack = serde_json::to_string(&ReceiveResult::Ack).unwrap();
        assert_eq!(ack, r#"{"result":"ack"}"#);
    }
}
