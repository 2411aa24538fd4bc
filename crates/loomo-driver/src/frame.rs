//! 带引用计数的帧缓冲
//!
//! `ManagedFrame` 是帧的唯一所有者。每个并发使用者通过 [`ManagedFrame::assign`]
//! 取得一个 [`FrameLease`]，lease 被丢弃即归还引用（RAII 形式的 assign/done 配对）。
//!
//! 所有者调用 [`ManagedFrame::finish`] 时：
//!
//! 1. 等待计数归零（所有 lease 都已归还）
//! 2. 按注册的逆序执行结束回调，回调可以读取缓冲
//! 3. 释放缓冲，整个过程只发生一次
//!
//! 不想阻塞的所有者调用 [`ManagedFrame::release`] 放弃所有权：计数已为零时立即执行
//! 第 2、3 步，否则由最后一个被丢弃的 lease 执行。
//!
//! 没有显式 `finish` 或 `release` 的所有者在 `Drop` 中完成 `finish` 的步骤。

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::trace;

type FinishFn = Box<dyn FnOnce(&[u8]) + Send>;

#[derive(Default)]
struct Count {
    pending: usize,
    /// 所有者已放弃，最后一个 lease 负责收尾
    released: bool,
}

struct Shared {
    id: u64,
    timestamp: u64,
    data: Bytes,
    count: Mutex<Count>,
    idle: Condvar,
    finishers: Mutex<Vec<FinishFn>>,
}

impl Shared {
    fn acquire(&self) {
        self.count.lock().pending += 1;
    }

    fn release(&self) {
        let last = {
            let mut count = self.count.lock();
            count.pending = count.pending.saturating_sub(1);
            if count.pending == 0 {
                self.idle.notify_all();
            }
            count.pending == 0 && count.released
        };
        if last {
            self.run_finishers();
        }
    }

    fn push_finisher(&self, f: FinishFn) {
        self.finishers.lock().push(f);
    }

    fn run_finishers(&self) -> usize {
        let finishers = std::mem::take(&mut *self.finishers.lock());
        let count = finishers.len();
        for f in finishers.into_iter().rev() {
            f(&self.data);
        }
        trace!("Frame {} finished with {} callbacks", self.id, count);
        count
    }
}

/// 帧所有者（不可 Clone）
pub struct ManagedFrame {
    shared: Arc<Shared>,
    finished: bool,
}

impl ManagedFrame {
    pub fn new(id: u64, timestamp: u64, data: Bytes) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                timestamp,
                data,
                count: Mutex::new(Count::default()),
                idle: Condvar::new(),
                finishers: Mutex::new(Vec::new()),
            }),
            finished: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// 机器人端时间戳
    pub fn timestamp(&self) -> u64 {
        self.shared.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.shared.data
    }

    /// 取得一个引用
    pub fn assign(&self) -> FrameLease {
        self.shared.acquire();
        FrameLease {
            shared: self.shared.clone(),
        }
    }

    /// 当前未归还的引用数
    pub fn pending(&self) -> usize {
        self.shared.count.lock().pending
    }

    /// 注册结束回调
    pub fn on_finish(&self, f: impl FnOnce(&[u8]) + Send + 'static) {
        self.shared.push_finisher(Box::new(f));
    }

    /// 等待所有引用归还，执行回调并释放缓冲
    ///
    /// 返回执行的回调数量。
    pub fn finish(mut self) -> usize {
        self.finish_inner()
    }

    /// 放弃所有权，不等待
    ///
    /// 没有未归还的引用时立即执行回调并返回 `true`；否则回调在最后一个
    /// lease 被丢弃时执行。
    pub fn release(mut self) -> bool {
        self.finished = true;
        let idle = {
            let mut count = self.shared.count.lock();
            count.released = count.pending > 0;
            count.pending == 0
        };
        if idle {
            self.shared.run_finishers();
        }
        idle
    }

    fn finish_inner(&mut self) -> usize {
        if self.finished {
            return 0;
        }
        self.finished = true;

        {
            let mut count = self.shared.count.lock();
            while count.pending > 0 {
                self.shared.idle.wait(&mut count);
            }
        }

        self.shared.run_finishers()
    }
}

impl Drop for ManagedFrame {
    fn drop(&mut self) {
        self.finish_inner();
    }
}

impl std::fmt::Debug for ManagedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedFrame")
            .field("id", &self.shared.id)
            .field("timestamp", &self.shared.timestamp)
            .field("len", &self.shared.data.len())
            .field("pending", &self.pending())
            .finish()
    }
}

/// 帧的一个引用
///
/// `Clone` 再取得一个引用，`Drop` 归还。
pub struct FrameLease {
    shared: Arc<Shared>,
}

impl FrameLease {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn timestamp(&self) -> u64 {
        self.shared.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.shared.data
    }

    /// 注册结束回调，在帧被 finish 或最后一个引用归还时执行
    pub fn on_finish(&self, f: impl FnOnce(&[u8]) + Send + 'static) {
        self.shared.push_finisher(Box::new(f));
    }

    /// 显式归还引用
    pub fn done(self) {}
}

impl Clone for FrameLease {
    fn clone(&self) -> Self {
        self.shared.acquire();
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.shared.release();
    }
}

impl std::fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLease")
            .field("id", &self.shared.id)
            .field("timestamp", &self.shared.timestamp)
            .finish()
    }
}
