//! 输入循环
//!
//! 车道标记和交通标志各走一条通道、各有一个线程，共享同一个
//! [`MovementAi`]（互斥锁保护）。没有输入时线程按当前状态的到期时间
//! 醒来，保证 Stop 的冷却转换按时发生。
//!
//! 通道关闭即结束循环：车道标记通道关闭时 Uturn/FollowPostits 回到 Idle，
//! 交通标志通道关闭时 Stop 回到 Idle。

use crate::feature::{FeatureBatch, TrafficSignFeature};
use crate::MovementAi;
use crossbeam_channel::{Receiver, at, never, select};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::debug;

/// 到期时间对应的定时通道；没有到期时间时永不触发
fn timer(ai: &Mutex<MovementAi>) -> Receiver<Instant> {
    match ai.lock().next_deadline() {
        Some(deadline) => at(deadline),
        None => never(),
    }
}

/// 车道标记循环，通道关闭时返回
pub fn run_feature_loop(ai: &Mutex<MovementAi>, features: Receiver<FeatureBatch>) {
    debug!("Feature loop started");
    loop {
        let timeout = timer(ai);
        select! {
            recv(features) -> batch => match batch {
                Ok(batch) => ai.lock().handle_features(&batch, Instant::now()),
                Err(_) => {
                    ai.lock().features_closed(Instant::now());
                    break;
                },
            },
            recv(timeout) -> _ => ai.lock().poll(Instant::now()),
        }
    }
    debug!("Feature loop stopped");
}

/// 交通标志循环，通道关闭时返回
pub fn run_sign_loop(ai: &Mutex<MovementAi>, signs: Receiver<TrafficSignFeature>) {
    debug!("Sign loop started");
    loop {
        let timeout = timer(ai);
        select! {
            recv(signs) -> sign => match sign {
                Ok(sign) => ai.lock().handle_sign(&sign, Instant::now()),
                Err(_) => {
                    ai.lock().signs_closed(Instant::now());
                    break;
                },
            },
            recv(timeout) -> _ => ai.lock().poll(Instant::now()),
        }
    }
    debug!("Sign loop stopped");
}

/// 在后台线程运行车道标记循环
pub fn spawn_feature_loop(
    ai: Arc<Mutex<MovementAi>>,
    features: Receiver<FeatureBatch>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("loomo-ai-features".into())
        .spawn(move || run_feature_loop(&ai, features))
}

/// 在后台线程运行交通标志循环
pub fn spawn_sign_loop(
    ai: Arc<Mutex<MovementAi>>,
    signs: Receiver<TrafficSignFeature>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("loomo-ai-signs".into())
        .spawn(move || run_sign_loop(&ai, signs))
}
