//! 传感器帧 → 广播器
//!
//! 作为摄像头流的 handler 运行：每个重组完成的帧包装为 `ManagedFrame`（顺序 id、
//! 机器人时间戳），把一个引用非阻塞地交给广播器的输入通道（满则丢弃），
//! 然后立即放弃所有权。每帧在自己的最后一个引用归还时释放，与其他帧无关。

use crate::{FrameLease, ManagedFrame};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use loomo_transport::{SensorFrame, StreamHandler};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

pub struct FrameForwarder {
    outbound: Sender<FrameLease>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl FrameForwarder {
    pub fn new(outbound: Sender<FrameLease>) -> Self {
        Self {
            outbound,
            next_id: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// 已包装的帧数
    pub fn frames(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// 因广播器未就绪而丢弃的帧数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl StreamHandler for FrameForwarder {
    fn handle_stream(&self, frames: Receiver<SensorFrame>) {
        debug!("Frame forwarder started");

        for sensor in frames.iter() {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let managed = ManagedFrame::new(id, sensor.timestamp, sensor.data);

            match self.outbound.try_send(managed.assign()) {
                Ok(()) => {},
                Err(TrySendError::Full(_lease) | TrySendError::Disconnected(_lease)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!("Broadcaster not ready, dropping frame {}", id);
                },
            }

            managed.release();
        }

        debug!("Frame forwarder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crossbeam_channel::{bounded, unbounded};
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::{Duration, Instant};

    fn sensor(timestamp: u64) -> SensorFrame {
        SensorFrame {
            tag: *b"CAM\0",
            timestamp,
            data: Bytes::from(vec![timestamp as u8; 8]),
        }
    }

    #[test]
    fn test_wraps_frames_with_sequential_ids() {
        let (out_tx, out_rx) = bounded(8);
        let forwarder = FrameForwarder::new(out_tx);
        let (in_tx, in_rx) = unbounded();
        in_tx.send(sensor(100)).unwrap();
        in_tx.send(sensor(200)).unwrap();
        drop(in_tx);

        // 不等待下游取走 lease
        forwarder.handle_stream(in_rx);

        let seen: Vec<_> = out_rx
            .try_iter()
            .map(|lease| (lease.id(), lease.timestamp(), lease.data().to_vec()))
            .collect();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (0, 100, vec![100u8; 8]));
        assert_eq!(seen[1], (1, 200, vec![200u8; 8]));
        assert_eq!(forwarder.frames(), 2);
        assert_eq!(forwarder.dropped(), 0);
    }

    #[test]
    fn test_full_outbound_drops_frames() {
        let (out_tx, out_rx) = bounded(1);
        let forwarder = Arc::new(FrameForwarder::new(out_tx));
        let (in_tx, in_rx) = unbounded();
        for t in 0..3 {
            in_tx.send(sensor(t)).unwrap();
        }
        drop(in_tx);

        let worker = {
            let forwarder = forwarder.clone();
            thread::spawn(move || forwarder.handle_stream(in_rx))
        };

        // 没有人读取时只有第一帧能进入通道
        let deadline = Instant::now() + Duration::from_secs(5);
        while forwarder.dropped() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(forwarder.dropped(), 2);

        let lease = out_rx.recv().unwrap();
        assert_eq!(lease.id(), 0);
        drop(lease);

        worker.join().unwrap();
        assert_eq!(forwarder.frames(), 3);
    }

    #[test]
    fn test_held_frame_does_not_delay_later_frames() {
        let (out_tx, out_rx) = bounded(8);
        let forwarder = FrameForwarder::new(out_tx);
        let (in_tx, in_rx) = unbounded();
        in_tx.send(sensor(1)).unwrap();
        in_tx.send(sensor(2)).unwrap();
        drop(in_tx);
        forwarder.handle_stream(in_rx);

        let held = out_rx.recv().unwrap();
        let second = out_rx.recv().unwrap();
        assert_eq!((held.id(), second.id()), (0, 1));

        let released = Arc::new(AtomicBool::new(false));
        {
            let released = released.clone();
            second.on_finish(move |data| {
                assert_eq!(data, &[2u8; 8]);
                released.store(true, Ordering::SeqCst);
            });
        }
        drop(second);
        assert!(released.load(Ordering::SeqCst));

        assert_eq!(held.data(), &[1u8; 8]);
        held.done();
    }
}
