//! CLI 配置
//!
//! 从 `--config` 指定的 TOML 文件读取；未指定时全部使用默认值。
//!
//! ```toml
//! camera_port = 1339
//! camera_stream = "CAM"
//!
//! [transport]
//! discovery_timeout_ms = 5000
//!
//! [ai]
//! max_linear_velocity = 0.3
//! ```

use anyhow::{Context, Result};
use loomo_ai::AiConfig;
use loomo_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub transport: TransportConfig,
    /// 速度上限也用于校验手动命令
    pub ai: AiConfig,
    /// 摄像头流的本地 UDP 端口
    pub camera_port: u16,
    /// 摄像头流标签
    pub camera_stream: String,
    /// 广播器输入和日志订阅者的通道容量
    pub subscriber_capacity: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            ai: AiConfig::default(),
            camera_port: loomo_protocol::DEFAULT_CAMERA_PORT,
            camera_stream: "CAM".to_string(),
            subscriber_capacity: 4,
        }
    }
}

impl CliConfig {
    /// 加载配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
