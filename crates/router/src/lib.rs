//! # Router
//!
//! 入站消息路由模块。
//!
//! 负责：
//! - 解码入站帧并按 `AppId` 找到监听器
//! - 通过一次性 `Responder` 回复 Ack/Nack
//! - 监听器超时、未应答和无监听器时自动 Nack
//! - 转发应用打开/关闭事件

mod inbound;
mod lifecycle;
mod listeners;

pub use inbound::{InboundDisposition, InboundRouter};
pub use lifecycle::LifecycleNotifier;
pub use listeners::ListenerRegistry;
