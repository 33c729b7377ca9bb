//! 导航目标命令
//!
//! 从标准输入读取 `/tf`、`/tf_static` 与 `/goal_pose`，把目标变换到机器人本体帧后
//! 以 `move_relative_xy/goal` 写到标准输出。

use anyhow::{Context, Result};
use clap::Args;
use spot_msgs::{MoveRelativeXyGoal, MoveRelativeXyResult, PoseStamped, TransformStamped};
use spot_nav::{
    GoalDispatch, GoalHandle, MoveRelativeClient, NavConfig, NavError, NavGoalListener,
    StaticTransformBuffer,
};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::commands::config::CliConfig;
use crate::topics::{self, Envelope};
use crate::validation;

/// 导航目标命令参数
#[derive(Args, Debug)]
pub struct NavGoalCommand {
    /// 机器人本体帧名（覆盖配置，默认 base_link）
    #[arg(long)]
    pub robot_frame: Option<String>,

    /// 静态变换 parent,child,x,y,yaw（可重复）
    #[arg(long = "tf", value_name = "PARENT,CHILD,X,Y,YAW")]
    pub static_tfs: Vec<String>,

    /// 变换查询超时（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub transform_timeout_ms: u64,
}

/// 把目标写到标准输出的动作客户端
///
/// 写出即视为服务端已接受；执行结果由下游服务端负责。
struct StdoutMoveClient;

impl MoveRelativeClient for StdoutMoveClient {
    fn wait_for_server(&self, _timeout: Duration) -> bool {
        true
    }

    fn send_goal(&self, goal: MoveRelativeXyGoal) -> Result<GoalHandle, NavError> {
        topics::emit(topics::MOVE_RELATIVE_XY_GOAL, &goal)
            .map_err(|e| NavError::Send(format!("{:#}", e)))?;
        Ok(GoalHandle::completed(MoveRelativeXyResult {
            success: true,
            message: "forwarded".to_string(),
        }))
    }
}

impl NavGoalCommand {
    pub fn execute(self, config: &CliConfig) -> Result<()> {
        let robot_frame = self
            .robot_frame
            .clone()
            .or_else(|| config.robot_frame.clone())
            .unwrap_or_else(|| "base_link".to_string());

        let buffer = Arc::new(StaticTransformBuffer::new());
        for value in &self.static_tfs {
            buffer.set_transform(validation::parse_static_tf(value)?);
        }

        let listener = NavGoalListener::new(
            buffer.clone(),
            Arc::new(StdoutMoveClient),
            NavConfig {
                robot_frame: robot_frame.clone(),
                transform_timeout: Duration::from_millis(self.transform_timeout_ms),
                ..Default::default()
            },
        );
        info!("Listening for goals (robot frame '{}')", robot_frame);

        let mut pending: Vec<JoinHandle<Option<MoveRelativeXyResult>>> = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            let envelope = match Envelope::parse_line(&line) {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{:#}", e);
                    continue;
                },
            };

            match envelope.topic.as_str() {
                topics::TF | topics::TF_STATIC => match envelope.decode::<TransformStamped>() {
                    Ok(tf) => buffer.set_transform(tf),
                    Err(e) => warn!("{:#}", e),
                },
                topics::GOAL_POSE => match envelope.decode::<PoseStamped>() {
                    Ok(goal) => match listener.on_goal(&goal) {
                        Ok(GoalDispatch::Accepted { result, .. }) => pending.push(result),
                        Ok(GoalDispatch::Rejected(_)) => {},
                        Err(e) => {
                            warn!("Goal dropped: {}", e);
                            if matches!(e, NavError::TransformUnavailable { .. }) {
                                debug!("Known frames: [{}]", buffer.frames().join(", "));
                            }
                        },
                    },
                    Err(e) => warn!("{:#}", e),
                },
                other => debug!("Ignoring message on topic {}", other),
            }
        }

        // 输入结束：等待已接受目标的结果
        for handle in pending {
            let _ = handle.join();
        }
        Ok(())
    }
}
