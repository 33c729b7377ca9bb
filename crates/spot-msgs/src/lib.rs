//! # Spot Msgs
//!
//! 两个节点共用的消息模型（无中间件、无 SDK 依赖）
//!
//! ## 模块
//!
//! - `geometry`: 向量、四元数、位姿与刚体变换，以及 `do_transform_pose` / `yaw_from_quaternion`
//! - `messages`: 带时间戳的话题消息（`PoseStamped`、`Twist`、`TransformStamped`）与动作目标
//! - `robot_state`: 机器人遥测快照与帧树查询（`get_a_tform_b`）
//!
//! ## 坐标约定
//!
//! 所有变换均写作 `a_tform_b`：把 `b` 帧中的点变换到 `a` 帧。

pub mod geometry;
pub mod messages;
pub mod robot_state;

pub use geometry::*;
pub use messages::*;
pub use robot_state::*;

use thiserror::Error;

/// 帧树查询错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// 快照中不存在该帧
    #[error("Frame '{0}' not found in snapshot")]
    UnknownFrame(String),

    /// 父链中出现环（快照损坏）
    #[error("Cycle detected while walking parents of '{0}'")]
    Cycle(String),

    /// 两个帧不在同一棵树上
    #[error("Frames '{a}' and '{b}' do not share a root")]
    Disconnected { a: String, b: String },
}
