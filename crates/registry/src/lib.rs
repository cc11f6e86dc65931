//! # Registry
//!
//! 设备注册表模块。
//!
//! 负责：
//! - 维护当前已连接的手表集合
//! - 同步解析 `WatchId` -> 传输会话
//! - 记录每块手表的前台应用

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{DeviceRegistry, TransportSession};
