//! 帧广播器
//!
//! 订阅者表（id → 有界通道）由互斥锁保护。每收到一帧，在同一个临界区内
//! 对每个订阅者尝试一次非阻塞发送：
//!
//! - 每次尝试先取得一个引用（clone lease）
//! - 发送成功则引用交给订阅者
//! - 通道已满则立即归还，该订阅者丢掉这一帧
//! - 接收端已丢弃的订阅者被移除
//!
//! 最后归还输入的那个引用。慢订阅者丢帧，不会拖住整条流水线。

use crate::FrameLease;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// 广播统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastStats {
    /// 收到的输入帧数
    pub frames: u64,
    /// 成功交给订阅者的次数
    pub delivered: u64,
    /// 因订阅者通道已满而丢弃的次数
    pub dropped: u64,
}

/// 帧广播器（可 Clone，共享同一张订阅者表）
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<Mutex<HashMap<String, Sender<FrameLease>>>>,
    counters: Arc<Counters>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新建容量为 `capacity` 的订阅通道并加入
    pub fn subscribe(&self, id: impl Into<String>, capacity: usize) -> Receiver<FrameLease> {
        let (tx, rx) = bounded(capacity);
        self.add(id, tx);
        rx
    }

    /// 加入已有通道；同 id 的旧订阅被替换
    pub fn add(&self, id: impl Into<String>, sender: Sender<FrameLease>) {
        let id = id.into();
        debug!("Adding broadcast subscriber {}", id);
        self.subscribers.lock().insert(id, sender);
    }

    pub fn has(&self, id: &str) -> bool {
        self.subscribers.lock().contains_key(id)
    }

    /// 移除订阅者，返回是否存在
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.subscribers.lock().remove(id).is_some();
        if removed {
            debug!("Removed broadcast subscriber {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 丢弃所有订阅通道
    ///
    /// 订阅者的接收端随之断开；之后的帧直接归还。
    pub fn close(&self) {
        let count = {
            let mut subscribers = self.subscribers.lock();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        debug!("Broadcaster closed, dropped {} subscribers", count);
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// 把一帧分发给当前所有订阅者
    pub fn broadcast(&self, lease: FrameLease) {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, sender| match sender.try_send(lease.clone()) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                true
            },
            Err(TrySendError::Full(_skipped)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Subscriber {} not ready, skipping frame {}", id, lease.id());
                true
            },
            Err(TrySendError::Disconnected(_skipped)) => {
                debug!("Subscriber {} disconnected, removing", id);
                false
            },
        });
        drop(subscribers);

        drop(lease);
    }

    /// 广播循环，输入通道关闭时返回
    pub fn run(&self, inbound: Receiver<FrameLease>) {
        debug!("Broadcaster started");
        for lease in inbound.iter() {
            self.broadcast(lease);
        }
        debug!("Broadcaster stopped");
    }

    /// 在后台线程运行广播循环
    pub fn spawn(&self, inbound: Receiver<FrameLease>) -> std::io::Result<JoinHandle<()>> {
        let broadcaster = self.clone();
        thread::Builder::new()
            .name("loomo-broadcaster".into())
            .spawn(move || broadcaster.run(inbound))
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManagedFrame;
    use bytes::Bytes;

    fn frame(id: u64) -> ManagedFrame {
        ManagedFrame::new(id, id * 10, Bytes::from(vec![id as u8; 16]))
    }

    #[test]
    fn test_every_subscriber_gets_the_frame() {
        let broadcaster = Broadcaster::new();
        let a = broadcaster.subscribe("a", 4);
        let b = broadcaster.subscribe("b", 4);

        let frame = frame(1);
        broadcaster.broadcast(frame.assign());
        assert_eq!(frame.pending(), 2);

        let la = a.try_recv().unwrap();
        let lb = b.try_recv().unwrap();
        assert_eq!(la.data(), lb.data());
        drop((la, lb));
        assert_eq!(frame.pending(), 0);

        let stats = broadcaster.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_full_subscriber_drops_frame() {
        let broadcaster = Broadcaster::new();
        let slow = broadcaster.subscribe("slow", 1);

        let first = frame(1);
        let second = frame(2);
        broadcaster.broadcast(first.assign());
        broadcaster.broadcast(second.assign());

        // 第二帧被丢弃，引用已归还
        assert_eq!(first.pending(), 1);
        assert_eq!(second.pending(), 0);
        assert_eq!(slow.try_recv().unwrap().id(), 1);
        assert!(slow.try_recv().is_err());
        assert_eq!(broadcaster.stats().dropped, 1);
    }

    #[test]
    fn test_disconnected_subscriber_is_pruned() {
        let broadcaster = Broadcaster::new();
        let gone = broadcaster.subscribe("gone", 1);
        drop(gone);

        let frame = frame(1);
        broadcaster.broadcast(frame.assign());
        assert!(!broadcaster.has("gone"));
        assert_eq!(frame.pending(), 0);
    }

    #[test]
    fn test_no_subscribers_releases_immediately() {
        let broadcaster = Broadcaster::new();
        let frame = frame(1);
        broadcaster.broadcast(frame.assign());
        assert_eq!(frame.pending(), 0);
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn test_close_disconnects_subscribers() {
        let broadcaster = Broadcaster::new();
        let rx = broadcaster.subscribe("a", 1);
        broadcaster.close();
        assert!(broadcaster.is_empty());
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_remove_and_replace() {
        let broadcaster = Broadcaster::new();
        let _old = broadcaster.subscribe("a", 1);
        let new = broadcaster.subscribe("a", 1);
        assert_eq!(broadcaster.len(), 1);

        let frame = frame(3);
        broadcaster.broadcast(frame.assign());
        assert_eq!(new.try_recv().unwrap().id(), 3);

        assert!(broadcaster.remove("a"));
        assert!(!broadcaster.remove("a"));
    }
}
