//! 数据报重组
//!
//! 按 `timestamp` 收集分片，分片位置为 `sequence - start`。
//! 当某个 timestamp 已收到的不同分片数等于 `end - start + 1` 时，
//! 按位置拼接成一帧并删除该条目。
//!
//! 重复分片静默覆盖（无校验）。永远收不齐的帧会一直留在表里直到重组器被丢弃，
//! 通过 [`Reassembler::pending_frames`] 可以观察到。

use bytes::{Bytes, BytesMut};
use loomo_protocol::{HEADER_SIZE, PacketHeader, ProtocolError};
use std::collections::{BTreeMap, HashMap};

/// 重组完成的一帧传感器数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame {
    pub tag: [u8; 4],
    pub timestamp: u64,
    pub data: Bytes,
}

#[derive(Debug)]
struct PendingFrame {
    tag: [u8; 4],
    fragments: BTreeMap<u32, Bytes>,
}

/// 单线程重组器（每个 worker 一个）
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: HashMap<u64, PendingFrame>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入一个数据报
    ///
    /// 帧完整时返回 `Some`。头部无法解析或分片越界时返回错误，表不变。
    pub fn push(&mut self, datagram: Bytes) -> Result<Option<SensorFrame>, ProtocolError> {
        let header = PacketHeader::decode(&datagram)?;
        header.validate()?;

        let entry = self
            .pending
            .entry(header.timestamp)
            .or_insert_with(|| PendingFrame {
                tag: header.tag,
                fragments: BTreeMap::new(),
            });
        entry
            .fragments
            .insert(header.offset(), datagram.slice(HEADER_SIZE..));

        if entry.fragments.len() as u64 != header.fragment_count() {
            return Ok(None);
        }

        Ok(self.pending.remove(&header.timestamp).map(|frame| SensorFrame {
            tag: frame.tag,
            timestamp: header.timestamp,
            data: flatten(frame.fragments),
        }))
    }

    /// 尚未收齐的帧数
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }
}

fn flatten(fragments: BTreeMap<u32, Bytes>) -> Bytes {
    if fragments.len() == 1 {
        return fragments.into_values().next().unwrap_or_default();
    }
    let total = fragments.values().map(Bytes::len).sum();
    let mut buf = BytesMut::with_capacity(total);
    for fragment in fragments.into_values() {
        buf.extend_from_slice(&fragment);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomo_protocol::fragment_datagrams;

    #[test]
    fn test_single_fragment_frame() {
        let mut reassembler = Reassembler::new();
        let datagrams = fragment_datagrams(*b"CAM\0", 7, 0, b"hello").unwrap();
        let frame = reassembler.push(datagrams[0].clone()).unwrap().unwrap();
        assert_eq!(frame.timestamp, 7);
        assert_eq!(frame.tag, *b"CAM\0");
        assert_eq!(&frame.data[..], b"hello");
        assert_eq!(reassembler.pending_frames(), 0);
    }

    #[test]
    fn test_out_of_order_fragments() {
        let data: Vec<u8> = (0..30_000u32).map(|i| (i % 251) as u8).collect();
        let mut datagrams = fragment_datagrams(*b"CAM\0", 99, 10, &data).unwrap();
        datagrams.reverse();

        let mut reassembler = Reassembler::new();
        let last = datagrams.pop().unwrap();
        for d in datagrams {
            assert!(reassembler.push(d).unwrap().is_none());
        }
        assert_eq!(reassembler.pending_frames(), 1);

        let frame = reassembler.push(last).unwrap().unwrap();
        assert_eq!(&frame.data[..], &data[..]);
        assert_eq!(reassembler.pending_frames(), 0);
    }

    #[test]
    fn test_duplicates_do_not_complete_early() {
        let data = vec![1u8; 20_000];
        let datagrams = fragment_datagrams(*b"CAM\0", 5, 0, &data).unwrap();
        assert_eq!(datagrams.len(), 3);

        let mut reassembler = Reassembler::new();
        assert!(reassembler.push(datagrams[0].clone()).unwrap().is_none());
        assert!(reassembler.push(datagrams[0].clone()).unwrap().is_none());
        assert!(reassembler.push(datagrams[1].clone()).unwrap().is_none());
        assert!(reassembler.push(datagrams[1].clone()).unwrap().is_none());
        assert!(reassembler.push(datagrams[2].clone()).unwrap().is_some());
    }

    #[test]
    fn test_interleaved_timestamps() {
        let a = fragment_datagrams(*b"CAM\0", 1, 0, &vec![0xAA; 10_000]).unwrap();
        let b = fragment_datagrams(*b"CAM\0", 2, 0, &vec![0xBB; 10_000]).unwrap();

        let mut reassembler = Reassembler::new();
        assert!(reassembler.push(a[0].clone()).unwrap().is_none());
        assert!(reassembler.push(b[1].clone()).unwrap().is_none());
        assert_eq!(reassembler.pending_frames(), 2);

        let frame_b = reassembler.push(b[0].clone()).unwrap().unwrap();
        assert_eq!(frame_b.timestamp, 2);
        assert!(frame_b.data.iter().all(|&x| x == 0xBB));

        let frame_a = reassembler.push(a[1].clone()).unwrap().unwrap();
        assert_eq!(frame_a.timestamp, 1);
        assert_eq!(frame_a.data.len(), 10_000);
    }

    #[test]
    fn test_rejects_bad_datagrams() {
        let mut reassembler = Reassembler::new();
        assert!(matches!(
            reassembler.push(Bytes::from_static(&[0u8; 10])),
            Err(ProtocolError::TooShort { .. })
        ));

        let mut buf = BytesMut::new();
        PacketHeader {
            tag: *b"CAM\0",
            sequence: 9,
            timestamp: 1,
            start: 0,
            end: 1,
        }
        .encode(&mut buf);
        assert!(matches!(
            reassembler.push(buf.freeze()),
            Err(ProtocolError::InvalidFragment { .. })
        ));
        assert_eq!(reassembler.pending_frames(), 0);
    }
}
