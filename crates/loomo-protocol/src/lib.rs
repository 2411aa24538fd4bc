//! Loomo 协议层
//!
//! 负责控制通道命令与传感器数据报的编码/解码，不涉及任何 I/O。
//!
//! - 控制通道（TCP）：`[4 字节 ASCII 标签][4 字节大端长度][负载]`
//! - 传感器数据报（UDP）：24 字节头 + 分片负载，单包最大 8192 字节

pub mod command;
pub mod constants;
pub mod packet;

pub use command::{Command, CommandTag, StreamTag};
pub use constants::*;
pub use packet::{PacketHeader, fragment_datagrams};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Buffer too short: need at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Invalid message length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown command tag: {0:?}")]
    UnknownTag([u8; 4]),

    #[error("Invalid fragment: sequence {sequence} outside [{start}, {end}]")]
    InvalidFragment { sequence: u32, start: u32, end: u32 },

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("Sequence overflow: {fragments} fragments starting at {first}")]
    SequenceOverflow { first: u32, fragments: usize },
}
