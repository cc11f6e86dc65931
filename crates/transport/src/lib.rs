//! # Transport
//!
//! 传输层实现。
//!
//! 真实链路 (蓝牙等) 不在本工作区内；这里提供内存中的 [`MockTransport`]，
//! 用模拟手表驱动 [`contracts::TransportEvent`]，供测试与 CLI 演示使用。
//!
//! ## Mock 测试
//!
//! ```ignore
//! use transport::MockTransport;
//!
//! let (transport, events) = MockTransport::new(256);
//! transport.connect_simulated(&watch_config).await;
//! transport.inject_message(&watch_id, app, &dict).await;
//! ```

mod mock;

pub use mock::{MockConfig, MockTransport, RecordedReply, SentControl, SentFrame};
