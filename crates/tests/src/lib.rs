//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 基于模拟手表的 e2e 测试
//! - 配置文件到运行中宿主的完整链路

#[cfg(test)]
mod contract_tests {
    use contracts::{Dictionary, DictionaryItem, NackReason, ReceiveResult};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_receive_result_json_shape() {
        let json = serde_json_snapshot(&ReceiveResult::Nack(NackReason::NotConnected));
        assert_eq!(json, r#"{"result":"nack","reason":{"reason":"not_connected"}}"#);
    }

    #[test]
    fn test_dictionary_size_matches_watch_layout() {
        let dict = Dictionary::new()
            .with(1, DictionaryItem::Text("hi".into()))
            .with(2, DictionaryItem::UInt16(7));
        // 1 + (7 + 2) + (7 + 2)
        assert_eq!(dict.size_in_bytes(), 19);
    }

    fn serde_json_snapshot<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        AppId, ConnectedWatch, Dictionary, DictionaryItem, NackReason, ProtocolConfig,
        ReceiveResult, Reply, Responder, WatchBehavior, WatchId, WatchListener,
    };
    use dispatcher::SendError;
    use host::WatchHost;
    use rand::Rng;
    use tokio::sync::mpsc;
    use transport::MockTransport;

    struct Harness {
        host: Arc<WatchHost>,
        transport: Arc<MockTransport>,
    }

    impl Harness {
        fn new(protocol: ProtocolConfig) -> Self {
            let (transport, events) = MockTransport::new(protocol.event_queue_capacity);
            let host = Arc::new(
                WatchHost::builder(transport.clone())
                    .protocol(protocol)
                    .build()
                    .unwrap(),
            );
            host.spawn(events);
            Self { host, transport }
        }

        async fn connect(&self, id: &str, behavior: WatchBehavior) {
            let before = self.host.registry().len();
            self.transport
                .connect_watch(
                    ConnectedWatch::new(id, format!("Pebble {id}"), "basalt"),
                    behavior,
                    Duration::from_millis(20),
                )
                .await;
            let mut rx = self.host.registry().subscribe();
            tokio::time::timeout(
                Duration::from_secs(1),
                rx.wait_for(|set| set.len() > before || set.contains(id)),
            )
            .await
            .unwrap()
            .unwrap();
        }
    }

    fn fast() -> ProtocolConfig {
        ProtocolConfig {
            delivery_timeout_ms: 150,
            listener_timeout_ms: 150,
            ..Default::default()
        }
    }

    /// Listener that records what it saw and answers with a fixed reply
    struct Recording {
        reply: Option<Reply>,
        seen: Mutex<Vec<(WatchId, Dictionary)>>,
    }

    impl Recording {
        fn answering(reply: Option<Reply>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl WatchListener for Recording {
        fn on_message_received(&self, _: AppId, data: Dictionary, watch: WatchId, responder: Responder) {
            self.seen.lock().unwrap().push((watch, data));
            if let Some(reply) = self.reply.clone() {
                responder.respond(reply).unwrap();
            }
        }
    }

    /// One connected and one unknown watch: one Ack, one Nack(NotConnected),
    /// and neither result is delivered from inside `send`.
    #[tokio::test]
    async fn test_e2e_mixed_targets() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;

        let app = AppId::random();
        let dict = Dictionary::new()
            .with(1, DictionaryItem::Text("hi".into()))
            .with(2, DictionaryItem::UInt16(7));

        let returned = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let flag = returned.clone();
        h.host
            .dispatcher()
            .send(app, &dict, ["w1".into(), "w2".into()], move |watch, result| {
                let _ = tx.send((watch, result, flag.load(Ordering::SeqCst)));
            })
            .unwrap();
        returned.store(true, Ordering::SeqCst);

        let mut results = BTreeMap::new();
        while let Some((watch, result, after_return)) = rx.recv().await {
            assert!(after_return, "callback ran inside send");
            results.insert(watch.to_string(), result);
        }

        assert_eq!(results.len(), 2);
        assert_eq!(results["w1"], ReceiveResult::Ack);
        assert_eq!(results["w2"], ReceiveResult::Nack(NackReason::NotConnected));

        // the wire frame carries exactly what was sent
        let frames = h.transport.sent_frames();
        assert_eq!(frames.len(), 1);
        let decoded = codec::decode_frame(&frames[0].frame).unwrap();
        assert_eq!(decoded.app, app);
        assert_eq!(decoded.dictionary, dict);
    }

    #[tokio::test]
    async fn test_e2e_empty_targets_never_reach_transport() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;

        let err = h
            .host
            .dispatcher()
            .send(AppId::random(), &Dictionary::new().with(1, 1u8), Vec::<WatchId>::new(), |_, _| {
                panic!("no results for a rejected send")
            })
            .unwrap_err();

        assert_eq!(err, SendError::EmptyTargets);
        assert!(h.transport.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn test_e2e_every_behavior() {
        let h = Harness::new(fast());
        h.connect("ack", WatchBehavior::AutoAck).await;
        h.connect("nack", WatchBehavior::AutoNack).await;
        h.connect("silent", WatchBehavior::Silent).await;
        h.connect("slow", WatchBehavior::Delayed).await;

        let report = h
            .host
            .dispatcher()
            .send_collect(
                AppId::random(),
                &Dictionary::new().with(5, "x"),
                h.host.registry().active_devices(),
            )
            .await
            .unwrap();

        assert_eq!(report.get("ack"), Some(&ReceiveResult::Ack));
        assert_eq!(report.get("nack"), Some(&ReceiveResult::Nack(NackReason::Rejected)));
        assert_eq!(report.get("silent"), Some(&ReceiveResult::Timeout));
        assert_eq!(report.get("slow"), Some(&ReceiveResult::Ack));
        assert!(!report.all_acked());
        assert_eq!(h.host.dispatcher().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_e2e_disconnect_mid_delivery() {
        let h = Harness::new(ProtocolConfig::default());
        h.connect("w1", WatchBehavior::Silent).await;

        let dispatcher = h.host.dispatcher().clone();
        let pending = tokio::spawn(async move {
            dispatcher
                .send_collect(AppId::random(), &Dictionary::new().with(1, 1u8), ["w1".into()])
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.transport.disconnect_watch(&"w1".into()).await;

        let report = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.get("w1"), Some(&ReceiveResult::Nack(NackReason::Disconnected)));
    }

    #[tokio::test]
    async fn test_e2e_inbound_routing() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;

        let app = AppId::random();
        let first = Recording::answering(Some(Reply::Ack));
        let second = Recording::answering(Some(Reply::Nack(NackReason::Rejected)));
        h.host.register_listener(app, first.clone());
        assert!(h.host.register_listener(app, second.clone()));

        let w1: WatchId = "w1".into();
        h.transport
            .inject_message(&w1, app, &Dictionary::new().with(1, "ping"))
            .await;
        // nobody listens for this app
        h.transport
            .inject_message(&w1, AppId::random(), &Dictionary::new())
            .await;
        // not a frame at all
        h.transport.inject_raw(&w1, bytes_of(&[0xff; 5])).await;

        let replies = h
            .transport
            .wait_for_replies(3, Duration::from_secs(1))
            .await
            .unwrap();
        let by_token: BTreeMap<_, _> = replies.iter().map(|r| (r.token, r.reply.clone())).collect();
        let answers: Vec<_> = by_token.into_values().collect();

        assert_eq!(
            answers,
            vec![
                Reply::Nack(NackReason::Rejected),
                Reply::Nack(NackReason::NoListener),
                Reply::Nack(NackReason::DecodeError),
            ]
        );
        assert!(first.seen.lock().unwrap().is_empty());
        assert_eq!(second.seen.lock().unwrap()[0].1.get(1), Some(&"ping".into()));
    }

    #[tokio::test]
    async fn test_e2e_unanswered_message_nacked() {
        let h = Harness::new(fast());
        let app = AppId::random();
        h.host.register_listener(app, Recording::answering(None));

        h.transport
            .inject_message(&"w1".into(), app, &Dictionary::new().with(1, 0u8))
            .await;

        let replies = h
            .transport
            .wait_for_replies(1, Duration::from_secs(1))
            .await
            .unwrap();
        // the responder is dropped without answering
        assert_eq!(replies[0].reply, Reply::Nack(NackReason::ResponderDropped));
    }

    #[tokio::test]
    async fn test_e2e_app_control() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;
        h.connect("w2", WatchBehavior::AutoNack).await;
        let app = AppId::random();

        let started = h
            .host
            .dispatcher()
            .start_app(app, ["w1".into(), "w9".into()])
            .await
            .unwrap();
        assert_eq!(started.get("w1"), Some(&ReceiveResult::Ack));
        assert_eq!(
            started.get("w9"),
            Some(&ReceiveResult::Nack(NackReason::NotConnected))
        );

        let stopped = h.host.dispatcher().stop_app_on_all(app).await.unwrap();
        assert_eq!(stopped.results.len(), 2);
        assert_eq!(stopped.get("w1"), Some(&ReceiveResult::Ack));
        assert_eq!(
            stopped.get("w2"),
            Some(&ReceiveResult::Nack(NackReason::Rejected))
        );
        assert_eq!(h.transport.sent_controls().len(), 3);
    }

    #[tokio::test]
    async fn test_e2e_active_app_follows_lifecycle() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;
        let app = AppId::random();
        let mut active = h.host.registry().subscribe_active_apps();

        h.transport.open_app(app, &"w1".into()).await;
        tokio::time::timeout(Duration::from_secs(1), active.wait_for(|m| m.get("w1") == Some(&app)))
            .await
            .unwrap()
            .unwrap();

        h.transport.close_app(app, &"w1".into()).await;
        tokio::time::timeout(Duration::from_secs(1), active.wait_for(|m| m.is_empty()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_e2e_watch_that_goes_quiet_times_out() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;
        let app = AppId::random();
        let dict = Dictionary::new().with(1, "ping");

        let first = h
            .host
            .dispatcher()
            .send_collect(app, &dict, ["w1".into()])
            .await
            .unwrap();
        assert_eq!(first.get("w1"), Some(&ReceiveResult::Ack));

        assert!(h.transport.set_behavior(&"w1".into(), WatchBehavior::Silent));
        let second = h
            .host
            .dispatcher()
            .send_collect(app, &dict, ["w1".into()])
            .await
            .unwrap();
        assert_eq!(second.get("w1"), Some(&ReceiveResult::Timeout));
    }

    #[tokio::test]
    async fn test_e2e_random_dictionaries_survive_the_wire() {
        let h = Harness::new(fast());
        h.connect("w1", WatchBehavior::AutoAck).await;
        let app = AppId::random();
        let mut rng = rand::rng();

        for _ in 0..20 {
            let mut dict = Dictionary::new();
            for _ in 0..rng.random_range(1..8) {
                let key: u32 = rng.random();
                let item = match rng.random_range(0..4) {
                    0 => DictionaryItem::Int32(rng.random()),
                    1 => DictionaryItem::UInt8(rng.random()),
                    2 => DictionaryItem::Text(format!("v{}", rng.random::<u16>())),
                    _ => DictionaryItem::Bytes((0..rng.random_range(0..16)).map(|_| rng.random()).collect()),
                };
                dict.insert(key, item);
            }

            let report = h
                .host
                .dispatcher()
                .send_collect(app, &dict, ["w1".into()])
                .await
                .unwrap();
            assert!(report.all_acked());

            let frame = h.transport.sent_frames().pop().unwrap();
            assert_eq!(codec::decode_frame(&frame.frame).unwrap().dictionary, dict);
        }
    }

    /// Config file on disk -> blueprint -> host with the configured watches
    #[tokio::test]
    async fn test_e2e_from_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[protocol]
delivery_timeout_ms = 200
max_dictionary_bytes = 64

[[apps]]
name = "weather"
uuid = "5f3a7c1e-2b4d-4e6f-8a9b-0c1d2e3f4a5b"

[[watches]]
id = "kitchen"
name = "Pebble Time"

[[watches]]
id = "desk"
name = "Pebble 2"
behavior = "auto_nack"
"#
        )
        .unwrap();

        let blueprint = config_loader::ConfigLoader::load_from_path(file.path()).unwrap();
        let app = blueprint.app_by_name("weather").unwrap().uuid;

        let h = Harness::new(blueprint.protocol.clone());
        for watch in &blueprint.watches {
            h.transport.connect_simulated(watch).await;
        }
        let mut connected = h.host.registry().subscribe();
        tokio::time::timeout(Duration::from_secs(1), connected.wait_for(|s| s.len() == 2))
            .await
            .unwrap()
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.host
            .dispatcher()
            .broadcast(app, &Dictionary::new().with(1, "sunny"), move |w, r| {
                let _ = tx.send((w, r));
            })
            .unwrap();

        let mut stats = observability::DeliveryStatsAggregator::new();
        stats.record_send();
        while let Some((watch, result)) = rx.recv().await {
            stats.update(&watch, &result, 0.0);
        }
        let summary = stats.summary();
        assert_eq!(summary.acked, 1);
        assert_eq!(summary.nacked, 1);

        // 64-byte limit from the file applies
        let big = Dictionary::new().with(1, "x".repeat(100));
        assert!(matches!(
            h.host.dispatcher().broadcast(app, &big, |_, _| {}),
            Err(SendError::PayloadTooLarge { max: 64, .. })
        ));
    }

    fn bytes_of(raw: &[u8]) -> bytes::Bytes {
        bytes::Bytes::copy_from_slice(raw)
    }
}
