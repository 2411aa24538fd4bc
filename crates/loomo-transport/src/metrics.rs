//! 传感器流指标
//!
//! 原子计数器，接收线程和 worker 更新，任意线程读取。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// 收到的数据报数
    pub datagrams_received: AtomicU64,

    /// 头部无法解析或分片越界的数据报数
    pub malformed_datagrams: AtomicU64,

    /// 重组完成的帧数
    pub frames_completed: AtomicU64,

    /// UDP 读超时次数（无数据时正常出现）
    pub receive_timeouts: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            malformed_datagrams: self.malformed_datagrams.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            receive_timeouts: self.receive_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamMetricsSnapshot {
    pub datagrams_received: u64,
    pub malformed_datagrams: u64,
    pub frames_completed: u64,
    pub receive_timeouts: u64,
}
