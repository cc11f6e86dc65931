//! Responder - one-shot reply handle for an inbound message
//!
//! Consuming `respond(self, ..)` makes a second answer a compile error.
//! Dropping the handle unanswered is observed by the router as
//! `NackReason::ResponderDropped`.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::{AppId, NackReason, Reply, WatchId};

/// Error returned when answering an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RespondError {
    /// The inbound timeout already fired and the device got a nack
    #[error("response window expired")]
    Expired,
}

/// Handle passed to a listener together with an inbound message.
#[derive(Debug)]
pub struct Responder {
    app: AppId,
    watch: WatchId,
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    /// Create a responder and the receiving half the router waits on.
    pub fn channel(app: AppId, watch: WatchId) -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { app, watch, tx }, rx)
    }

    pub fn app(&self) -> AppId {
        self.app
    }

    pub fn watch(&self) -> &WatchId {
        &self.watch
    }

    /// Whether the reply would still reach the device.
    pub fn is_expired(&self) -> bool {
        self.tx.is_closed()
    }

    /// Answer the message. Consumes the responder.
    pub fn respond(self, reply: Reply) -> Result<(), RespondError> {
        self.tx.send(reply).map_err(|_| RespondError::Expired)
    }

    pub fn ack(self) -> Result<(), RespondError> {
        self.respond(Reply::Ack)
    }

    pub fn nack(self, reason: NackReason) -> Result<(), RespondError> {
        self.respond(Reply::Nack(reason))
    }
}
