//! 命令调度器
//!
//! 任意多个生产者通过无界队列提交命令，单个调度线程按 FIFO 顺序写入控制通道。
//!
//! - `StartStream`：写入前同步启动本地接收流（端口和标签取自命令本身）
//! - `StopStream`：写入前停止本地接收流，关闭其 socket
//! - 写失败：记录错误，调度线程以 `DriverError::Transport` 结束
//!
//! 所有生产者句柄都被丢弃后队列关闭，调度线程排空队列后退出，
//! [`Dispatcher::close_and_wait`] 返回写出的命令数。

use crate::DriverError;
use crossbeam_channel::{Receiver, Sender, unbounded};
use loomo_protocol::Command;
use loomo_transport::{CommandSink, StreamRegistry};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// 命令调度器句柄
///
/// 丢弃句柄只关闭它自己持有的生产者端，不等待调度线程。
pub struct Dispatcher {
    commands: Sender<Command>,
    handle: JoinHandle<Result<u64, DriverError>>,
}

impl Dispatcher {
    /// 启动调度线程
    pub fn spawn<S>(sink: S, streams: Arc<StreamRegistry>) -> Result<Self, DriverError>
    where
        S: CommandSink + 'static,
    {
        let (commands, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("loomo-dispatcher".into())
            .spawn(move || dispatch_loop(sink, rx, streams))
            .map_err(|e| DriverError::IoThread(format!("spawning dispatcher: {e}")))?;

        Ok(Self { commands, handle })
    }

    /// 提交一条命令
    pub fn execute(&self, command: Command) -> Result<(), DriverError> {
        self.commands
            .send(command)
            .map_err(|_| DriverError::ChannelClosed)
    }

    /// 生产者句柄
    ///
    /// 句柄会让队列保持打开，直到它被丢弃。
    pub fn sender(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// 调度线程是否仍在运行
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// 关闭自身句柄并等待调度线程结束
    ///
    /// 在所有 [`Dispatcher::sender`] 句柄被丢弃、队列排空之后返回写出的命令数。
    pub fn close_and_wait(self) -> Result<u64, DriverError> {
        let Self { commands, handle } = self;
        drop(commands);
        handle
            .join()
            .map_err(|_| DriverError::IoThread("dispatcher thread panicked".into()))?
    }
}

fn dispatch_loop<S: CommandSink>(
    mut sink: S,
    commands: Receiver<Command>,
    streams: Arc<StreamRegistry>,
) -> Result<u64, DriverError> {
    debug!("Dispatcher started");
    let mut written = 0u64;

    for command in commands.iter() {
        match command {
            Command::StartStream { port, stream } => {
                if let Err(e) = streams.start(port, stream) {
                    error!("Starting stream {} on port {} failed: {}", stream, port, e);
                }
            },
            Command::StopStream { port, stream } => {
                if let Err(e) = streams.stop(port) {
                    warn!("Stopping stream {} on port {} failed: {}", stream, port, e);
                }
            },
            _ => {},
        }

        if let Err(e) = sink.send_command(&command) {
            error!("Writing {:?} to Loomo failed: {}", command.tag(), e);
            return Err(e.into());
        }
        written += 1;
    }

    debug!("Dispatcher drained, {} commands written", written);
    Ok(written)
}
