//! 控制通道命令
//!
//! 每条命令编码为 `[4 字节 ASCII 标签][4 字节大端长度][负载]`，
//! 长度字段为整条消息的字节数（含 8 字节前缀）。
//!
//! | 标签 | 命令 | 负载 | 总长 |
//! |------|------|------|------|
//! | `CSST` | 开始传感器流 | 端口 u32 + 流标签 3 字节 | 15 |
//! | `CEST` | 结束传感器流 | 端口 u32 + 流标签 3 字节 | 15 |
//! | `CSPS` | 设置位姿 | x f32 + y f32 | 16 |
//! | `CLVL` | 设置线速度 | f32 | 12 |
//! | `CAVL` | 设置角速度 | f32 | 12 |

use crate::{COMMAND_PREFIX_SIZE, ProtocolError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

/// 传感器流标签（3 字节 ASCII，如 `CAM`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTag([u8; 3]);

impl StreamTag {
    pub const CAMERA: StreamTag = StreamTag(*b"CAM");

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// 处理该流的 handler 注册名：`S` + 流标签
    pub fn handler_tag(&self) -> String {
        format!("S{self}")
    }
}

impl FromStr for StreamTag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 3] = s.as_bytes().try_into().map_err(|_| {
            ProtocolError::MalformedCommand(format!("stream tag must be 3 bytes, got {s:?}"))
        })?;
        if !bytes.is_ascii() {
            return Err(ProtocolError::MalformedCommand(format!(
                "stream tag must be ASCII, got {s:?}"
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// 命令标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    StartStream,
    StopStream,
    SetPose,
    SetLinearVelocity,
    SetAngularVelocity,
}

impl CommandTag {
    pub const fn as_bytes(self) -> [u8; 4] {
        match self {
            CommandTag::StartStream => *b"CSST",
            CommandTag::StopStream => *b"CEST",
            CommandTag::SetPose => *b"CSPS",
            CommandTag::SetLinearVelocity => *b"CLVL",
            CommandTag::SetAngularVelocity => *b"CAVL",
        }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        match &bytes {
            b"CSST" => Some(CommandTag::StartStream),
            b"CEST" => Some(CommandTag::StopStream),
            b"CSPS" => Some(CommandTag::SetPose),
            b"CLVL" => Some(CommandTag::SetLinearVelocity),
            b"CAVL" => Some(CommandTag::SetAngularVelocity),
            _ => None,
        }
    }

    /// 整条消息长度（含前缀）
    pub const fn message_len(self) -> usize {
        match self {
            CommandTag::StartStream | CommandTag::StopStream => 15,
            CommandTag::SetPose => 16,
            CommandTag::SetLinearVelocity | CommandTag::SetAngularVelocity => 12,
        }
    }
}

/// 控制命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// 让机器人向 `port` 发送 `stream` 流
    StartStream { port: u16, stream: StreamTag },
    /// 停止 `port` 上的流
    StopStream { port: u16, stream: StreamTag },
    SetPose { x: f32, y: f32 },
    SetLinearVelocity(f32),
    SetAngularVelocity(f32),
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::StartStream { .. } => CommandTag::StartStream,
            Command::StopStream { .. } => CommandTag::StopStream,
            Command::SetPose { .. } => CommandTag::SetPose,
            Command::SetLinearVelocity(_) => CommandTag::SetLinearVelocity,
            Command::SetAngularVelocity(_) => CommandTag::SetAngularVelocity,
        }
    }

    /// 从文本端口（`":1339"` 或 `"1339"`）和流标签构造开始命令
    pub fn start_stream_from_str(port: &str, stream: &str) -> Result<Self, ProtocolError> {
        Ok(Command::StartStream {
            port: parse_port(port)?,
            stream: stream.parse()?,
        })
    }

    /// 从文本端口和流标签构造停止命令
    pub fn stop_stream_from_str(port: &str, stream: &str) -> Result<Self, ProtocolError> {
        Ok(Command::StopStream {
            port: parse_port(port)?,
            stream: stream.parse()?,
        })
    }

    /// 编码为控制通道字节
    pub fn encode(&self) -> Bytes {
        let tag = self.tag();
        let len = tag.message_len();
        let mut buf = BytesMut::with_capacity(len);
        buf.put_slice(&tag.as_bytes());
        buf.put_u32(len as u32);

        match self {
            Command::StartStream { port, stream } | Command::StopStream { port, stream } => {
                buf.put_u32(*port as u32);
                buf.put_slice(stream.as_bytes());
            },
            Command::SetPose { x, y } => {
                buf.put_f32(*x);
                buf.put_f32(*y);
            },
            Command::SetLinearVelocity(v) | Command::SetAngularVelocity(v) => {
                buf.put_f32(*v);
            },
        }

        buf.freeze()
    }

    /// 从 8 字节前缀读取整条消息长度（用于从字节流中切分消息）
    pub fn peek_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        if prefix.len() < COMMAND_PREFIX_SIZE {
            return Err(ProtocolError::TooShort {
                expected: COMMAND_PREFIX_SIZE,
                actual: prefix.len(),
            });
        }
        let mut raw_tag = [0u8; 4];
        raw_tag.copy_from_slice(&prefix[0..4]);
        let tag = CommandTag::from_bytes(raw_tag).ok_or(ProtocolError::UnknownTag(raw_tag))?;

        let declared = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
        if declared != tag.message_len() {
            return Err(ProtocolError::InvalidLength {
                expected: tag.message_len(),
                actual: declared,
            });
        }
        Ok(declared)
    }

    /// 解码一条命令；`buf` 末尾多余的字节被忽略
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let len = Self::peek_len(buf)?;
        if buf.len() < len {
            return Err(ProtocolError::TooShort {
                expected: len,
                actual: buf.len(),
            });
        }

        let mut raw_tag = [0u8; 4];
        raw_tag.copy_from_slice(&buf[0..4]);
        let tag = CommandTag::from_bytes(raw_tag).ok_or(ProtocolError::UnknownTag(raw_tag))?;

        let mut payload = &buf[COMMAND_PREFIX_SIZE..len];
        let command = match tag {
            CommandTag::StartStream | CommandTag::StopStream => {
                let raw_port = payload.get_u32();
                let port = u16::try_from(raw_port).map_err(|_| {
                    ProtocolError::MalformedCommand(format!("port {raw_port} out of range"))
                })?;
                let mut stream = [0u8; 3];
                payload.copy_to_slice(&mut stream);
                let stream = StreamTag::from_bytes(stream);
                if tag == CommandTag::StartStream {
                    Command::StartStream { port, stream }
                } else {
                    Command::StopStream { port, stream }
                }
            },
            CommandTag::SetPose => Command::SetPose {
                x: payload.get_f32(),
                y: payload.get_f32(),
            },
            CommandTag::SetLinearVelocity => Command::SetLinearVelocity(payload.get_f32()),
            CommandTag::SetAngularVelocity => Command::SetAngularVelocity(payload.get_f32()),
        };

        Ok(command)
    }
}

fn parse_port(port: &str) -> Result<u16, ProtocolError> {
    port.trim_start_matches(':')
        .parse()
        .map_err(|e| ProtocolError::MalformedCommand(format!("invalid port {port:?}: {e}")))
}
