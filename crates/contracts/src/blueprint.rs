//! HostBlueprint - Config Loader 输出
//!
//! 描述主机配置：协议参数、已知应用、模拟手表。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{AppId, ConnectedWatch, WatchId};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的主机配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 协议参数
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// 已知应用列表
    #[serde(default)]
    pub apps: Vec<AppConfig>,

    /// 模拟手表列表 (mock transport)
    #[serde(default)]
    pub watches: Vec<SimulatedWatchConfig>,
}

/// 协议参数：超时、负载上限、事件队列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProtocolConfig {
    /// 单次发送的投递超时 (毫秒)
    #[serde(default = "default_delivery_timeout_ms")]
    #[validate(range(min = 1))]
    pub delivery_timeout_ms: u64,

    /// 监听器应答超时 (毫秒)
    #[serde(default = "default_listener_timeout_ms")]
    #[validate(range(min = 1))]
    pub listener_timeout_ms: u64,

    /// 字典最大字节数 (按 `Dictionary::size_in_bytes` 计算)
    #[serde(default = "default_max_dictionary_bytes")]
    #[validate(range(min = 1))]
    pub max_dictionary_bytes: usize,

    /// 传输事件队列容量
    #[serde(default = "default_event_queue_capacity")]
    #[validate(range(min = 1))]
    pub event_queue_capacity: usize,
}

fn default_delivery_timeout_ms() -> u64 {
    5_000
}

fn default_listener_timeout_ms() -> u64 {
    10_000
}

fn default_max_dictionary_bytes() -> usize {
    2048
}

fn default_event_queue_capacity() -> usize {
    256
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
            listener_timeout_ms: default_listener_timeout_ms(),
            max_dictionary_bytes: default_max_dictionary_bytes(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl ProtocolConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 应用名称 (唯一)
    pub name: String,

    /// 应用 UUID，与手表端一致
    pub uuid: AppId,
}

/// 模拟手表的投递行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchBehavior {
    /// 立即确认
    #[default]
    AutoAck,
    /// 立即拒绝
    AutoNack,
    /// 永不应答 (触发超时)
    Silent,
    /// 延迟 `delay_ms` 后确认
    Delayed,
}

/// 模拟手表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedWatchConfig {
    /// 唯一标识符
    pub id: String,

    /// 显示名称
    pub name: String,

    /// 硬件平台
    #[serde(default = "default_platform")]
    pub platform: String,

    /// 投递行为
    #[serde(default)]
    pub behavior: WatchBehavior,

    /// `delayed` 行为的延迟 (毫秒)
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_platform() -> String {
    "basalt".to_string()
}

impl SimulatedWatchConfig {
    pub fn watch_id(&self) -> WatchId {
        WatchId::new(&self.id)
    }

    /// Connect metadata announced by the simulated watch.
    pub fn to_connected_watch(&self) -> ConnectedWatch {
        ConnectedWatch::new(self.id.as_str(), self.name.as_str(), self.platform.as_str())
    }
}

impl HostBlueprint {
    /// Look up an app by configured name.
    pub fn app_by_name(&self, name: &str) -> Option<&AppConfig> {
        self.apps.iter().find(|app| app.name == name)
    }

    pub fn watch_ids(&self) -> Vec<WatchId> {
        self.watches.iter().map(SimulatedWatchConfig::watch_id).collect()
    }
}
