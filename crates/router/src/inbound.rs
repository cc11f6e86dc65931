//! InboundRouter - decode inbound frames and hand them to listeners

use std::sync::Arc;
use std::time::Duration;

use contracts::{AppId, InboundToken, NackReason, Reply, Responder, Transport, WatchId};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::listeners::ListenerRegistry;

/// What the router did with a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundDisposition {
    /// Handed to a listener; the reply task owns the answer
    Dispatched,
    /// Answered immediately with a nack
    Rejected(NackReason),
}

/// Routes inbound frames by app id
pub struct InboundRouter {
    listeners: Arc<ListenerRegistry>,
    transport: Arc<dyn Transport>,
    listener_timeout: Duration,
}

impl InboundRouter {
    pub fn new(
        listeners: Arc<ListenerRegistry>,
        transport: Arc<dyn Transport>,
        listener_timeout: Duration,
    ) -> Self {
        Self {
            listeners,
            transport,
            listener_timeout,
        }
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Handle one inbound frame.
    ///
    /// Undecodable frames and frames for apps with no listener are nacked
    /// right away. Otherwise the listener runs on a blocking task while a
    /// reply task waits for the responder until the deadline set here.
    #[instrument(
        name = "router_on_frame",
        skip(self, frame),
        fields(watch = %watch, token = %token, len = frame.len())
    )]
    pub fn on_frame(&self, watch: WatchId, token: InboundToken, frame: &[u8]) -> InboundDisposition {
        let decoded = match codec::decode_frame(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame");
                observability::record_decode_failure();
                return self.reject(&watch, token, NackReason::DecodeError);
            }
        };

        let Some(listener) = self.listeners.get(&decoded.app) else {
            debug!(app = %decoded.app, "No listener registered");
            return self.reject(&watch, token, NackReason::NoListener);
        };

        let (responder, rx) = Responder::channel(decoded.app, watch.clone());
        let transport = Arc::clone(&self.transport);
        let deadline = Instant::now() + self.listener_timeout;
        let app = decoded.app;

        // listeners are synchronous; a blocking or panicking one must not hold the reply
        let call = {
            let watch = watch.clone();
            tokio::task::spawn_blocking(move || {
                listener.on_message_received(app, decoded.dictionary, watch, responder)
            })
        };
        tokio::spawn(watch_listener_call(call, watch.clone(), app));

        tokio::spawn(async move {
            let reply = match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(_)) => Reply::Nack(NackReason::ResponderDropped),
                Err(_) => {
                    warn!(watch = %watch, app = %app, "Listener did not respond in time");
                    Reply::Nack(NackReason::ListenerTimeout)
                }
            };

            observability::record_inbound(outcome_label(&reply));
            debug!(watch = %watch, reply = %reply, "Replying to inbound message");
            if let Err(e) = transport.reply(&watch, token, reply) {
                warn!(watch = %watch, error = %e, "Failed to send reply");
            }
        });

        InboundDisposition::Dispatched
    }

    fn reject(&self, watch: &WatchId, token: InboundToken, reason: NackReason) -> InboundDisposition {
        observability::record_inbound(observability::nack_label(&reason));
        if let Err(e) = self
            .transport
            .reply(watch, token, Reply::Nack(reason.clone()))
        {
            warn!(watch = %watch, error = %e, "Failed to send nack");
        }
        InboundDisposition::Rejected(reason)
    }
}

async fn watch_listener_call(call: JoinHandle<()>, watch: WatchId, app: AppId) {
    if let Err(e) = call.await {
        if e.is_panic() {
            warn!(watch = %watch, app = %app, "Listener panicked while handling a message");
        }
    }
}

fn outcome_label(reply: &Reply) -> &'static str {
    match reply {
        Reply::Ack => "ack",
        Reply::Nack(reason) => observability::nack_label(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{AppControl, DeliveryToken, Dictionary, TransportError, WatchListener};
    use std::sync::Mutex;
    use tokio::sync::{mpsc, oneshot};

    /// Transport that forwards replies to a channel
    struct ReplySink(mpsc::UnboundedSender<(WatchId, InboundToken, Reply)>);

    impl Transport for ReplySink {
        fn send_frame(&self, _: &WatchId, _: Bytes) -> Result<DeliveryToken, TransportError> {
            Err(TransportError::Closed)
        }

        fn send_control(&self, _: &WatchId, _: AppControl) -> Result<DeliveryToken, TransportError> {
            Err(TransportError::Closed)
        }

        fn reply(&self, watch: &WatchId, token: InboundToken, reply: Reply) -> Result<(), TransportError> {
            self.0
                .send((watch.clone(), token, reply))
                .map_err(|_| TransportError::Closed)
        }
    }

    /// Listener whose behaviour is chosen per test
    enum Mode {
        Ack,
        Panic,
        /// Block the listener thread without answering
        Stall(Duration),
        Drop,
        Ignore,
        /// Hand the responder out so the test answers late
        Park(Mutex<Option<oneshot::Sender<Responder>>>),
    }

    struct TestListener {
        mode: Mode,
        received: Mutex<Vec<Dictionary>>,
        parked: Mutex<Vec<Responder>>,
    }

    impl TestListener {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                received: Mutex::new(Vec::new()),
                parked: Mutex::new(Vec::new()),
            })
        }
    }

    impl WatchListener for TestListener {
        fn on_message_received(&self, _: AppId, data: Dictionary, _: WatchId, responder: Responder) {
            self.received.lock().unwrap().push(data);
            match &self.mode {
                Mode::Ack => responder.ack().unwrap(),
                Mode::Drop => drop(responder),
                Mode::Panic => panic!("listener bug"),
                Mode::Stall(d) => {
                    std::thread::sleep(*d);
                    drop(responder);
                }
                Mode::Ignore => self.parked.lock().unwrap().push(responder),
                Mode::Park(slot) => {
                    if let Some(tx) = slot.lock().unwrap().take() {
                        let _ = tx.send(responder);
                    }
                }
            }
        }
    }

    fn setup(timeout_ms: u64) -> (InboundRouter, mpsc::UnboundedReceiver<(WatchId, InboundToken, Reply)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let router = InboundRouter::new(
            Arc::new(ListenerRegistry::new()),
            Arc::new(ReplySink(tx)),
            Duration::from_millis(timeout_ms),
        );
        (router, rx)
    }

    fn frame(app: AppId) -> Bytes {
        codec::encode_frame(app, &Dictionary::new().with(1, 2u8))
    }

    #[tokio::test]
    async fn test_decode_error_nacked() {
        let (router, mut replies) = setup(100);

        let disposition = router.on_frame("w1".into(), InboundToken(1), &[0x01, 0x02]);
        assert_eq!(disposition, InboundDisposition::Rejected(NackReason::DecodeError));

        let (_, token, reply) = replies.recv().await.unwrap();
        assert_eq!(token, InboundToken(1));
        assert_eq!(reply, Reply::Nack(NackReason::DecodeError));
    }

    #[tokio::test]
    async fn test_no_listener_nacked_without_handler_call() {
        let (router, mut replies) = setup(100);
        let registered = AppId::random();
        let listener = TestListener::new(Mode::Ack);
        router.listeners().register(registered, listener.clone());

        let disposition = router.on_frame("w1".into(), InboundToken(2), &frame(AppId::random()));
        assert_eq!(disposition, InboundDisposition::Rejected(NackReason::NoListener));

        let (_, _, reply) = replies.recv().await.unwrap();
        assert_eq!(reply, Reply::Nack(NackReason::NoListener));
        assert!(listener.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listener_ack_is_forwarded() {
        let (router, mut replies) = setup(1_000);
        let app = AppId::random();
        let listener = TestListener::new(Mode::Ack);
        router.listeners().register(app, listener.clone());

        assert_eq!(
            router.on_frame("w1".into(), InboundToken(3), &frame(app)),
            InboundDisposition::Dispatched
        );

        let (watch, token, reply) = replies.recv().await.unwrap();
        assert_eq!(watch, "w1");
        assert_eq!(token, InboundToken(3));
        assert_eq!(reply, Reply::Ack);
        assert_eq!(listener.received.lock().unwrap()[0].get(1), Some(&2u8.into()));
    }

    #[tokio::test]
    async fn test_dropped_responder_nacked() {
        let (router, mut replies) = setup(5_000);
        let app = AppId::random();
        router.listeners().register(app, TestListener::new(Mode::Drop));

        router.on_frame("w1".into(), InboundToken(4), &frame(app));
        let (_, _, reply) = replies.recv().await.unwrap();
        assert_eq!(reply, Reply::Nack(NackReason::ResponderDropped));
    }

    #[tokio::test]
    async fn test_silent_listener_times_out() {
        let (router, mut replies) = setup(30);
        let app = AppId::random();
        let listener = TestListener::new(Mode::Ignore);
        router.listeners().register(app, listener.clone());

        router.on_frame("w1".into(), InboundToken(5), &frame(app));
        let (_, _, reply) = replies.recv().await.unwrap();
        assert_eq!(reply, Reply::Nack(NackReason::ListenerTimeout));

        // answering after the timeout is reported, not silently dropped
        let late = listener.parked.lock().unwrap().pop().unwrap();
        assert_eq!(late.ack(), Err(contracts::RespondError::Expired));
    }

    #[tokio::test]
    async fn test_deferred_answer_within_timeout() {
        let (router, mut replies) = setup(1_000);
        let app = AppId::random();
        let (tx, rx) = oneshot::channel();
        router
            .listeners()
            .register(app, TestListener::new(Mode::Park(Mutex::new(Some(tx)))));

        router.on_frame("w1".into(), InboundToken(6), &frame(app));

        let responder = rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        responder.nack(NackReason::Rejected).unwrap();

        let (_, _, reply) = replies.recv().await.unwrap();
        assert_eq!(reply, Reply::Nack(NackReason::Rejected));
    }

    #[tokio::test]
    async fn test_replaced_listener_receives_messages() {
        let (router, mut replies) = setup(1_000);
        let app = AppId::random();
        let first = TestListener::new(Mode::Ack);
        let second = TestListener::new(Mode::Ack);

        router.listeners().register(app, first.clone());
        assert!(router.listeners().register(app, second.clone()));

        router.on_frame("w1".into(), InboundToken(7), &frame(app));
        replies.recv().await.unwrap();

        assert!(first.received.lock().unwrap().is_empty());
        assert_eq!(second.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_listener_still_answered() {
        let (router, mut replies) = setup(50);
        let app = AppId::random();
        router.listeners().register(app, TestListener::new(Mode::Panic));

        router.on_frame("w1".into(), InboundToken(8), &frame(app));
        let (_, token, reply) = tokio::time::timeout(Duration::from_millis(500), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token, InboundToken(8));
        assert_eq!(reply, Reply::Nack(NackReason::ResponderDropped));
    }

    #[tokio::test]
    async fn test_blocking_listener_times_out_on_schedule() {
        let (router, mut replies) = setup(30);
        let app = AppId::random();
        router
            .listeners()
            .register(app, TestListener::new(Mode::Stall(Duration::from_millis(400))));

        let started = std::time::Instant::now();
        router.on_frame("w1".into(), InboundToken(9), &frame(app));
        let (_, _, reply) = replies.recv().await.unwrap();

        assert_eq!(reply, Reply::Nack(NackReason::ListenerTimeout));
        assert!(started.elapsed() < Duration::from_millis(300));
    }
}
