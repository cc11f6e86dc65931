//! WatchListener - application callback interface
//!
//! One listener per app. The router calls it from a tokio task, so
//! implementations must not block; hand slow work to another task and keep
//! the [`Responder`] with it.

use crate::{AppId, Dictionary, Responder, WatchId};

/// Receives messages and lifecycle events for one app.
pub trait WatchListener: Send + Sync {
    /// A watch sent a dictionary to the app.
    ///
    /// Answer through `responder` within the listener timeout, otherwise the
    /// device gets `Nack(ListenerTimeout)`.
    fn on_message_received(
        &self,
        app: AppId,
        data: Dictionary,
        watch: WatchId,
        responder: Responder,
    );

    /// The app was brought to the foreground on `watch`.
    fn on_app_opened(&self, _app: AppId, _watch: WatchId) {}

    /// The app left the foreground on `watch`.
    fn on_app_closed(&self, _app: AppId, _watch: WatchId) {}
}
