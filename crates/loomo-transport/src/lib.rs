//! # Loomo Transport Layer
//!
//! 与机器人之间的网络传输：
//!
//! - **发现**：在固定 UDP 端口上等待一次广播，得到控制通道地址
//! - **控制通道**：TCP 连接，逐条写入编码后的命令
//! - **传感器流**：每个流一个 UDP 接收线程 + 若干重组 worker + 一个处理线程
//!
//! 命令的发送端通过 [`CommandSink`] 抽象，便于测试时替换为 Mock。

pub mod config;
pub mod control;
pub mod discovery;
pub mod metrics;
pub mod reassembly;
pub mod stream;

pub use config::TransportConfig;
pub use control::{TcpControlChannel, connect};
pub use discovery::{discover, parse_announcement};
pub use metrics::{StreamMetrics, StreamMetricsSnapshot};
pub use reassembly::{Reassembler, SensorFrame};
pub use stream::{StreamHandler, StreamRegistry};

use loomo_protocol::{Command, ProtocolError};
use thiserror::Error;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    /// 发现或建立连接失败（启动时致命，不重试）
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("No handler registered for stream {0}")]
    UnknownStream(String),

    #[error("A stream is already running on port {0}")]
    StreamAlreadyRunning(u16),

    #[error("No stream running on port {0}")]
    StreamNotRunning(u16),
}

/// 命令发送端
///
/// 每次调用完整写出一条命令；写失败直接返回，不重试。
pub trait CommandSink: Send {
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError>;
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError> {
        (**self).send_command(command)
    }
}
