//! 手动运动命令
//!
//! 连接 → 写一条命令 → 等待写完 → 断开。

use super::connect_dispatcher;
use crate::config::CliConfig;
use crate::validation::{VelocityValidator, validate_pose};
use anyhow::Result;
use clap::Args;
use loomo_protocol::Command;
use loomo_transport::StreamRegistry;
use std::sync::Arc;
use tracing::info;

/// 速度命令参数
#[derive(Args, Debug)]
pub struct VelocityCommand {
    /// 线速度（m/s）
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub linear: f32,

    /// 角速度（rad/s）
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub angular: f32,
}

impl VelocityCommand {
    pub fn commands(&self, config: &CliConfig) -> Result<Vec<Command>> {
        VelocityValidator::from_config(&config.ai).validate(self.linear, self.angular)?;
        Ok(vec![
            Command::SetLinearVelocity(self.linear),
            Command::SetAngularVelocity(self.angular),
        ])
    }

    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        send_once(config, self.commands(config)?)
    }
}

/// 位姿命令参数
#[derive(Args, Debug)]
pub struct PoseCommand {
    #[arg(short, long, allow_negative_numbers = true)]
    pub x: f32,

    #[arg(short, long, allow_negative_numbers = true)]
    pub y: f32,
}

impl PoseCommand {
    pub fn commands(&self) -> Result<Vec<Command>> {
        validate_pose(self.x, self.y)?;
        Ok(vec![Command::SetPose {
            x: self.x,
            y: self.y,
        }])
    }

    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        send_once(config, self.commands()?)
    }
}

fn send_once(config: &CliConfig, commands: Vec<Command>) -> Result<()> {
    let streams = Arc::new(StreamRegistry::new(config.transport.clone()));
    let dispatcher = connect_dispatcher(config, streams)?;
    for command in commands {
        dispatcher.execute(command)?;
    }
    let written = dispatcher.close_and_wait()?;
    info!("{} command(s) written", written);
    Ok(())
}
