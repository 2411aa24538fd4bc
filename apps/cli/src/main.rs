//! # Loomo CLI
//!
//! Command-line interface for driving a Loomo robot.
//!
//! ```bash
//! # 启动摄像头流并记录收到的帧，Ctrl-C 停止
//! loomo-cli run
//!
//! # 手动命令
//! loomo-cli velocity --linear 0.2 --angular -0.1
//! loomo-cli pose -x 1.0 -y 0.5
//!
//! # 使用配置文件
//! loomo-cli --config loomo.toml run
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod validation;

use commands::{PoseCommand, RunCommand, VelocityCommand};
use config::CliConfig;

/// Loomo CLI - 机器人命令行工具
#[derive(Parser, Debug)]
#[command(name = "loomo-cli")]
#[command(about = "Command-line interface for driving a Loomo robot", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML 配置文件
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动摄像头流，直到 Ctrl-C
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 设置线速度和角速度
    Velocity {
        #[command(flatten)]
        args: VelocityCommand,
    },

    /// 设置目标位姿
    Pose {
        #[command(flatten)]
        args: PoseCommand,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("loomo=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { args } => args.execute(&config),
        Commands::Velocity { args } => args.execute(&config),
        Commands::Pose { args } => args.execute(&config),
    }
}
