//! 传输层配置

use loomo_protocol::DISCOVERY_PORT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 传输层配置
///
/// # Example
///
/// ```
/// use loomo_transport::TransportConfig;
///
/// let config = TransportConfig {
///     reassembly_workers: 2,
///     ..Default::default()
/// };
/// assert_eq!(config.discovery_port, 1336);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 发现广播端口
    pub discovery_port: u16,
    /// 等待发现广播的超时（毫秒），0 表示一直等待
    pub discovery_timeout_ms: u64,
    /// UDP 读超时（毫秒），接收线程每次超时后检查停止标志
    pub receive_timeout_ms: u64,
    /// 每个流的重组 worker 数量
    pub reassembly_workers: usize,
    /// 接收线程 → worker 的数据报通道容量
    pub packet_channel_capacity: usize,
    /// worker → handler 的帧通道容量
    pub frame_channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            discovery_timeout_ms: 0,
            receive_timeout_ms: 50,
            reassembly_workers: 1,
            packet_channel_capacity: 64,
            frame_channel_capacity: 4,
        }
    }
}

impl TransportConfig {
    pub fn discovery_timeout(&self) -> Option<Duration> {
        (self.discovery_timeout_ms > 0).then(|| Duration::from_millis(self.discovery_timeout_ms))
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms.max(1))
    }
}
