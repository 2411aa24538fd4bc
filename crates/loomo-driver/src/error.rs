//! 驱动层错误类型定义

use loomo_protocol::ProtocolError;
use loomo_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（写控制通道失败等）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令通道已关闭（调度线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 后台线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}
