//! 传感器数据报头
//!
//! ```text
//! 0        4          8             16       20     24
//! | tag(4) | seq(4)   | timestamp(8) | start  | end  | payload ...
//! ```
//!
//! 所有整数为大端。同一帧的所有分片共享 `timestamp`、`start` 和 `end`，
//! 分片在帧内的位置为 `seq - start`。

use crate::{HEADER_SIZE, MAX_PAYLOAD_SIZE, ProtocolError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 数据报头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub tag: [u8; 4],
    pub sequence: u32,
    pub timestamp: u64,
    pub start: u32,
    pub end: u32,
}

impl PacketHeader {
    /// 编码到缓冲区（追加 24 字节）
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.tag);
        buf.put_u32(self.sequence);
        buf.put_u64(self.timestamp);
        buf.put_u32(self.start);
        buf.put_u32(self.end);
    }

    /// 从数据报开头解码
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        if datagram.len() < HEADER_SIZE {
            return Err(ProtocolError::TooShort {
                expected: HEADER_SIZE,
                actual: datagram.len(),
            });
        }

        let mut buf = &datagram[..HEADER_SIZE];
        let mut tag = [0u8; 4];
        buf.copy_to_slice(&mut tag);
        Ok(Self {
            tag,
            sequence: buf.get_u32(),
            timestamp: buf.get_u64(),
            start: buf.get_u32(),
            end: buf.get_u32(),
        })
    }

    /// 检查 `start <= sequence <= end`
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.start <= self.sequence && self.sequence <= self.end {
            Ok(())
        } else {
            Err(ProtocolError::InvalidFragment {
                sequence: self.sequence,
                start: self.start,
                end: self.end,
            })
        }
    }

    /// 该帧的分片总数 `end - start + 1`
    pub fn fragment_count(&self) -> u64 {
        (self.end as u64).saturating_sub(self.start as u64) + 1
    }

    /// 分片在帧内的位置
    pub fn offset(&self) -> u32 {
        self.sequence.saturating_sub(self.start)
    }
}

/// 把一帧数据切分为数据报（发送端）
///
/// 每个数据报最多 8192 字节。空数据仍产生一个只有头的数据报。
/// 最后一个分片的序号超出 `u32` 时返回 [`ProtocolError::SequenceOverflow`]。
pub fn fragment_datagrams(
    tag: [u8; 4],
    timestamp: u64,
    first_sequence: u32,
    data: &[u8],
) -> Result<Vec<Bytes>, ProtocolError> {
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(MAX_PAYLOAD_SIZE).collect()
    };
    let overflow = || ProtocolError::SequenceOverflow {
        first: first_sequence,
        fragments: chunks.len(),
    };
    let last = u32::try_from(chunks.len() - 1).map_err(|_| overflow())?;
    let end = first_sequence.checked_add(last).ok_or_else(overflow)?;

    let datagrams = chunks
        .iter()
        .zip(first_sequence..=end)
        .map(|(chunk, sequence)| {
            let header = PacketHeader {
                tag,
                sequence,
                timestamp,
                start: first_sequence,
                end,
            };
            let mut buf = BytesMut::with_capacity(HEADER_SIZE + chunk.len());
            header.encode(&mut buf);
            buf.put_slice(chunk);
            buf.freeze()
        })
        .collect();
    Ok(datagrams)
}
