//! 命令定义和实现

pub mod motion;
pub mod run;

pub use motion::{PoseCommand, VelocityCommand};
pub use run::RunCommand;

use anyhow::{Context, Result};
use loomo_driver::Dispatcher;
use loomo_transport::{StreamRegistry, connect};
use std::sync::Arc;
use tracing::info;

/// 发现机器人、建立控制通道并启动调度器
pub fn connect_dispatcher(
    config: &crate::config::CliConfig,
    streams: Arc<StreamRegistry>,
) -> Result<Dispatcher> {
    let channel = connect(&config.transport).context("connecting to Loomo")?;
    info!("Connected to Loomo at {}", channel.peer_addr());
    Dispatcher::spawn(channel, streams).context("starting command dispatcher")
}
