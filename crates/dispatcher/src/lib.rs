//! # Dispatcher
//!
//! 出站消息分发模块。
//!
//! 负责：
//! - 校验并编码字典 (每次发送只编码一次)
//! - 为每个目标手表登记待确认投递
//! - 超时、断连与传输结果的最终化
//! - 每个目标恰好回调一次结果

pub mod dispatcher;
pub mod error;
mod handle;
pub mod metrics;

pub use dispatcher::{DeliveryReport, Dispatcher, DispatcherBuilder, DispatcherConfig, SendId};
pub use error::SendError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
