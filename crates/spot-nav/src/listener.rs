//! 导航目标监听
//!
//! 收到任意参考系下的 `PoseStamped` 后：
//!
//! ```text
//! lookup(robot_frame ← msg.frame_id, 1s) ─▶ wait_for_server(2s) ─▶ do_transform_pose
//!     ─▶ MoveRelativeXY { x, y, yaw } ─▶ accepted? ─▶ 后台线程等待结果
//! ```
//!
//! 任何失败只记录日志并丢弃该目标，不影响后续目标。

use crate::action::MoveRelativeClient;
use crate::buffer::TransformLookup;
use crate::error::NavError;
use spot_msgs::{
    MoveRelativeXyGoal, MoveRelativeXyResult, PoseStamped, do_transform_pose, yaw_from_quaternion,
};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// 监听器配置
#[derive(Debug, Clone)]
pub struct NavConfig {
    /// 目标被变换到的机器人本体帧
    pub robot_frame: String,
    pub transform_timeout: Duration,
    pub server_timeout: Duration,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            robot_frame: "base_link".to_string(),
            transform_timeout: Duration::from_secs(1),
            server_timeout: Duration::from_secs(2),
        }
    }
}

/// 单个目标的处理结果
#[derive(Debug)]
pub enum GoalDispatch {
    /// 已被接受；句柄在结果到达（或服务端放弃）后结束
    Accepted {
        goal: MoveRelativeXyGoal,
        result: JoinHandle<Option<MoveRelativeXyResult>>,
    },
    Rejected(MoveRelativeXyGoal),
}

/// 导航目标监听器
pub struct NavGoalListener<L, C> {
    lookup: Arc<L>,
    client: Arc<C>,
    config: NavConfig,
}

impl<L, C> NavGoalListener<L, C>
where
    L: TransformLookup,
    C: MoveRelativeClient + 'static,
{
    pub fn new(lookup: Arc<L>, client: Arc<C>, config: NavConfig) -> Self {
        Self {
            lookup,
            client,
            config,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// 把目标位姿变换到机器人本体帧
    pub fn transform_goal(&self, msg: &PoseStamped) -> Result<MoveRelativeXyGoal, NavError> {
        let transform = self.lookup.lookup_transform(
            &self.config.robot_frame,
            &msg.header.frame_id,
            self.config.transform_timeout,
        )?;
        let pose = do_transform_pose(&msg.pose, &transform.transform);

        Ok(MoveRelativeXyGoal {
            x: pose.position.x,
            y: pose.position.y,
            yaw: yaw_from_quaternion(&pose.orientation),
        })
    }

    /// 处理一个导航目标
    ///
    /// # 错误
    ///
    /// - [`NavError::TransformUnavailable`]：超时内没有 `robot_frame ← frame_id` 变换
    /// - [`NavError::ServerUnavailable`]：动作服务端未上线
    /// - [`NavError::Send`]：目标未能送达
    pub fn on_goal(&self, msg: &PoseStamped) -> Result<GoalDispatch, NavError> {
        info!("Received goal in frame '{}'", msg.header.frame_id);

        let goal = self.transform_goal(msg)?;

        if !self.client.wait_for_server(self.config.server_timeout) {
            return Err(NavError::ServerUnavailable(self.config.server_timeout));
        }

        info!(
            "Transformed goal: x={:.2}, y={:.2}, yaw={:.2}",
            goal.x, goal.y, goal.yaw
        );

        let handle = self.client.send_goal(goal)?;
        if !handle.is_accepted() {
            info!("MoveRelativeXY goal rejected");
            return Ok(GoalDispatch::Rejected(goal));
        }
        info!("MoveRelativeXY goal accepted");

        let result = std::thread::Builder::new()
            .name("nav-goal-result".into())
            .spawn(move || {
                let result = handle.wait_result(None);
                match &result {
                    Some(r) => info!("MoveRelativeXY result: success={} {}", r.success, r.message),
                    None => warn!("MoveRelativeXY goal finished without a result"),
                }
                result
            })
            .map_err(|e| NavError::Send(format!("failed to spawn result waiter: {}", e)))?;

        Ok(GoalDispatch::Accepted { goal, result })
    }

    /// 订阅回调：错误只记录日志
    pub fn handle_goal(&self, msg: &PoseStamped) {
        match self.on_goal(msg) {
            Ok(_) => {},
            Err(e @ NavError::TransformUnavailable { .. }) => warn!("Transform error: {}", e),
            Err(e @ NavError::ServerUnavailable(_)) => warn!("{}", e),
            Err(e) => error!("{}", e),
        }
    }
}
