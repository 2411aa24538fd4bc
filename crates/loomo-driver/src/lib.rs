//! # Loomo Driver
//!
//! 传输层之上的后台线程：
//!
//! - [`Dispatcher`]：多生产者命令队列，单线程按 FIFO 写入控制通道，并联动传感器流的启停
//! - [`ManagedFrame`] / [`FrameLease`]：带引用计数和结束回调的帧缓冲
//! - [`Broadcaster`]：把同一帧零拷贝地分发给动态订阅者，背压时丢帧
//! - [`FrameForwarder`]：把重组后的传感器帧包装成 `ManagedFrame` 送入广播器

pub mod broadcaster;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod frame;

pub use broadcaster::{BroadcastStats, Broadcaster};
pub use dispatcher::Dispatcher;
pub use error::DriverError;
pub use forwarder::FrameForwarder;
pub use frame::{FrameLease, ManagedFrame};
