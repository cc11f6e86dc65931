//! # Host
//!
//! 手表消息宿主。
//!
//! 把注册表、发送调度、入站路由和生命周期通知组装在一起，
//! 并用单个事件循环消费传输层的 [`contracts::TransportEvent`]。
//!
//! ```ignore
//! let (transport, events) = MockTransport::new(256);
//! let host = Arc::new(WatchHost::builder(transport).build()?);
//! let handle = host.spawn(events);
//! ```

mod error;
mod host;

pub use error::HostError;
pub use host::{EventLoopStats, WatchHost, WatchHostBuilder};
