//! 驱动命令
//!
//! 启动序列在阻塞线程池中执行；就绪后事件循环并发处理：
//! - 周期发布 odom → base_link（标准输出 `/tf`）
//! - 标准输入 `/cmd_vel` 速度指令
//! - Ctrl-C / 运行时长上限 → 完整关闭序列

use anyhow::{Context, Result};
use clap::Args;
use spot_driver::{DEFAULT_HOSTNAME, DriverBuilder, PublishOutcome, SpotDriver};
use spot_msgs::Twist;
use spot_sdk::sim::SimRobot;
use spot_sdk::{Credentials, RobotSession, SdkError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::commands::config::CliConfig;
use crate::topics::{self, Envelope, StdoutTfSink};
use crate::validation;

/// 驱动命令参数
#[derive(Args, Debug)]
pub struct DriverCommand {
    /// 机器人地址（覆盖配置，默认 192.168.80.3）
    #[arg(long)]
    pub hostname: Option<String>,

    /// 机器人本体帧名（覆盖配置，默认 base_link）
    #[arg(long)]
    pub robot_frame: Option<String>,

    /// 用户名（也可用 BOSDYN_CLIENT_USERNAME）
    #[arg(long)]
    pub username: Option<String>,

    /// 密码（也可用 BOSDYN_CLIENT_PASSWORD）
    #[arg(long)]
    pub password: Option<String>,

    /// 使用进程内模拟机器人
    #[arg(long)]
    pub sim: bool,

    /// 在指定启动步骤注入失败（仅 --sim）
    #[arg(long, requires = "sim", value_name = "STEP")]
    pub sim_fail_at: Option<String>,

    /// 变换发布频率（Hz）
    #[arg(long, default_value_t = 10.0)]
    pub rate: f64,

    /// 注册急停后、上电前的等待时间（毫秒）
    #[arg(long, default_value_t = 2000)]
    pub settle_delay_ms: u64,

    /// 运行时长上限（毫秒），到时自动关闭
    #[arg(long)]
    pub max_runtime_ms: Option<u64>,
}

impl DriverCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let hostname = self
            .hostname
            .clone()
            .or_else(|| config.hostname.clone())
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
        let robot_frame = self
            .robot_frame
            .clone()
            .or_else(|| config.robot_frame.clone())
            .unwrap_or_else(|| "base_link".to_string());
        let rate = validation::validate_rate(self.rate)?;

        if !self.sim {
            anyhow::bail!(
                "No robot SDK backend is compiled into this build; rerun with --sim to use the simulated robot"
            );
        }

        let robot = SimRobot::new();
        if let Some(step) = &self.sim_fail_at {
            let step = validation::parse_sim_step(step)?;
            robot.fail_at(step, SdkError::Rpc(format!("simulated failure at {:?}", step)));
        }

        let credentials = self.credentials(config);
        let builder = DriverBuilder::new()
            .hostname(hostname.clone())
            .credentials(credentials)
            .robot_frame(robot_frame)
            .publish_rate(rate)
            .settle_delay(Duration::from_millis(self.settle_delay_ms));

        info!("Connecting to robot at {}", hostname);
        let driver = tokio::task::spawn_blocking(move || builder.connect(&robot))
            .await
            .context("startup task panicked")?
            .with_context(|| format!("Robot startup failed ({})", hostname))?;

        let result = run_loop(&driver, self.max_runtime_ms.map(Duration::from_millis)).await;

        let metrics = driver.metrics();
        let report = tokio::task::spawn_blocking(move || {
            let mut driver = driver;
            driver.shutdown()
        })
        .await
        .context("shutdown task panicked")?;

        info!(
            "Shutdown complete: {} release(s), {} failure(s); {} command(s) sent, {} dropped, {} transform(s) published",
            report.attempted,
            report.failed,
            metrics.commands_sent,
            metrics.commands_dropped,
            metrics.transforms_published
        );
        result
    }

    fn credentials(&self, config: &CliConfig) -> Credentials {
        merge_credentials(
            self,
            Credentials::username_from_env(),
            Credentials::password_from_env(),
            config,
        )
    }
}

/// 凭据：每个字段独立取 命令行 > 环境变量 > 配置文件（密码不进配置文件）
fn merge_credentials(
    cmd: &DriverCommand,
    env_username: Option<String>,
    env_password: Option<String>,
    config: &CliConfig,
) -> Credentials {
    let username = cmd
        .username
        .clone()
        .or(env_username)
        .or_else(|| config.username.clone())
        .unwrap_or_default();
    let password = cmd.password.clone().or(env_password).unwrap_or_default();
    Credentials::new(username, password)
}

/// 事件循环：发布、指令输入与退出信号
async fn run_loop<S: RobotSession>(
    driver: &SpotDriver<S>,
    max_runtime: Option<Duration>,
) -> Result<()> {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        let _ = stop_tx.send(true);
    })
    .context("Failed to set signal handler")?;

    let mut publisher = driver.transform_publisher(StdoutTfSink);
    let mut ticker = tokio::time::interval(publisher.config().period());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let deadline = async {
        match max_runtime {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let PublishOutcome::SinkFailed(e) = publisher.tick() {
                    // 标准输出被关闭，继续运行没有意义
                    error!("Transform output failed: {}", e);
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_input(driver, &line),
                Ok(None) => {
                    debug!("stdin closed, no more velocity commands");
                    stdin_open = false;
                },
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                },
            },
            _ = stop_rx.changed() => break,
            _ = &mut deadline => {
                info!("Maximum runtime reached");
                break;
            },
        }
    }
    Ok(())
}

/// 处理一行输入：只接受 `/cmd_vel`，错误只记录日志
fn handle_input<S: RobotSession>(driver: &SpotDriver<S>, line: &str) {
    let envelope = match Envelope::parse_line(line) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => return,
        Err(e) => {
            warn!("{:#}", e);
            return;
        },
    };
    if envelope.topic != topics::CMD_VEL {
        debug!("Ignoring message on topic {}", envelope.topic);
        return;
    }
    match envelope.decode::<Twist>() {
        Ok(twist) => driver.handle_twist(&twist),
        Err(e) => warn!("{:#}", e),
    }
}
