//! # Spot CLI
//!
//! Command-line front end for the Spot driver and nav goal listener.
//!
//! 话题以 JSON lines 在标准输入/输出上传输，日志写到标准错误。
//!
//! ```bash
//! # 配置默认机器人地址
//! spot-cli config set --hostname 192.168.80.3
//!
//! # 模拟机器人：读取 /cmd_vel，10Hz 输出 /tf
//! echo '{"topic":"/cmd_vel","data":{"linear":{"x":0.3,"y":0,"z":0},"angular":{"x":0,"y":0,"z":0.1}}}' \
//!     | spot-cli driver --sim
//!
//! # 导航目标：odom 中的目标变换到 base_link
//! spot-cli nav-goal --tf odom,base_link,1,0,0 < goals.jsonl
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod topics;
mod validation;

use commands::{CliConfig, ConfigCommand, DriverCommand, NavGoalCommand};

/// Spot CLI - 机器人桥接命令行工具
#[derive(Parser, Debug)]
#[command(name = "spot-cli")]
#[command(about = "Command-line front end for the Spot driver and nav goal listener", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/spot/config.toml）
    #[arg(long, global = true, env = "SPOT_CLI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 运行驱动：租约/急停/上电/站立，转发速度指令并发布 odom 变换
    Driver {
        #[command(flatten)]
        args: DriverCommand,
    },

    /// 运行导航目标监听器
    NavGoal {
        #[command(flatten)]
        args: NavGoalCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志（标准错误，标准输出只承载数据）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spot_cli=info".parse()?)
                .add_directive("spot_driver=info".parse()?)
                .add_directive("spot_nav=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = commands::config::resolve_config_file(cli.config.as_deref())?;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),

        Commands::Driver { args } => {
            let config = CliConfig::load(&config_path)?;
            args.execute(&config).await
        },

        Commands::NavGoal { args } => {
            let config = CliConfig::load(&config_path)?;
            tokio::task::spawn_blocking(move || args.execute(&config)).await?
        },
    }
}
