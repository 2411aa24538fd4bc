//! 运行命令
//!
//! 连接机器人，启动摄像头流，把帧通过广播器分发给日志订阅者，
//! 直到 Ctrl-C 或控制通道出错。

use super::connect_dispatcher;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use loomo_driver::{Broadcaster, FrameForwarder, FrameLease};
use loomo_protocol::{Command, StreamTag};
use loomo_transport::StreamRegistry;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 日志订阅者 id
const LOG_SUBSCRIBER: &str = "frame-log";

/// 状态检查间隔
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 摄像头流端口（覆盖配置）
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 流标签（覆盖配置）
    #[arg(short, long)]
    pub stream: Option<String>,
}

impl RunCommand {
    /// 端口和流标签，命令行参数优先
    pub fn target(&self, config: &CliConfig) -> Result<(u16, StreamTag)> {
        let port = self.port.unwrap_or(config.camera_port);
        let stream = self
            .stream
            .as_deref()
            .unwrap_or(&config.camera_stream)
            .parse::<StreamTag>()
            .context("invalid stream tag")?;
        Ok((port, stream))
    }

    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let (port, stream) = self.target(config)?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .context("installing Ctrl-C handler")?;

        // 传感器流 → forwarder → 广播器 → 订阅者
        let streams = Arc::new(StreamRegistry::new(config.transport.clone()));
        let (inbound_tx, inbound_rx) = bounded(config.subscriber_capacity);
        streams.register(
            stream.handler_tag(),
            Arc::new(FrameForwarder::new(inbound_tx)),
        );

        let broadcaster = Broadcaster::new();
        let broadcast_thread = broadcaster
            .spawn(inbound_rx)
            .context("starting broadcaster")?;
        let frames = broadcaster.subscribe(LOG_SUBSCRIBER, config.subscriber_capacity);
        let log_thread = thread::Builder::new()
            .name("loomo-frame-log".into())
            .spawn(move || log_frames(frames))
            .context("starting frame logger")?;

        let dispatcher = connect_dispatcher(config, streams.clone())?;
        dispatcher.execute(Command::StartStream { port, stream })?;
        info!("Streaming {} on port {}, press Ctrl-C to stop", stream, port);

        loop {
            match stop_rx.recv_timeout(STATUS_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Received interrupt signal, shutting down");
                    break;
                },
                Err(RecvTimeoutError::Timeout) => {
                    if !dispatcher.is_running() {
                        warn!("Command dispatcher stopped");
                        break;
                    }
                    if let Some(metrics) = streams.metrics(port) {
                        debug!("Stream metrics: {:?}", metrics);
                    }
                },
            }
        }

        // 调度器已退出时这里会失败，错误由 close_and_wait 返回
        let _ = dispatcher.execute(Command::StopStream { port, stream });
        let written = dispatcher.close_and_wait();

        // 释放 forwarder，广播器输入通道随之关闭
        streams.shutdown();
        drop(streams);
        if broadcast_thread.join().is_err() {
            warn!("Broadcaster thread panicked");
        }
        let stats = broadcaster.stats();
        broadcaster.close();
        if log_thread.join().is_err() {
            warn!("Frame logger thread panicked");
        }

        info!(
            "Broadcast {} frames ({} delivered, {} dropped)",
            stats.frames, stats.delivered, stats.dropped
        );
        let written = written?;
        info!("{} command(s) written", written);
        Ok(())
    }
}

fn log_frames(frames: Receiver<FrameLease>) {
    let mut count = 0u64;
    for lease in frames.iter() {
        count += 1;
        debug!(
            id = lease.id(),
            timestamp = lease.timestamp(),
            bytes = lease.data().len(),
            "Frame received"
        );
    }
    info!("Frame logger saw {} frames", count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults_to_config() {
        let cmd = RunCommand {
            port: None,
            stream: None,
        };
        let (port, stream) = cmd.target(&CliConfig::default()).unwrap();
        assert_eq!(port, 1339);
        assert_eq!(stream, StreamTag::CAMERA);
    }

    #[test]
    fn test_target_overrides() {
        let cmd = RunCommand {
            port: Some(4000),
            stream: Some("DEP".into()),
        };
        let (port, stream) = cmd.target(&CliConfig::default()).unwrap();
        assert_eq!(port, 4000);
        assert_eq!(stream.to_string(), "DEP");

        let bad = RunCommand {
            port: None,
            stream: Some("CAMERA".into()),
        };
        assert!(bad.target(&CliConfig::default()).is_err());
    }
}
