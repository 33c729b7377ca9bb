//! 话题与动作消息
//!
//! 对应 ROS 2 中的 `std_msgs/Header`、`geometry_msgs/{PoseStamped, Twist, TransformStamped}`
//! 以及 `spot_action/MoveRelativeXY`。

use crate::geometry::{Pose, Transform, Vector3};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// ROS 时间戳（秒 + 纳秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    /// 当前墙钟时间
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// 早于 UNIX_EPOCH 的时间截断为 0
    pub fn from_system_time(t: SystemTime) -> Self {
        let d = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self {
            sec: d.as_secs() as i32,
            nanosec: d.subsec_nanos(),
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// 消息头
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: impl Into<String>, stamp: Time) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// 带参考系的位姿（导航目标）
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// 速度指令（线速度 + 角速度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// 带父/子帧名的变换（TF 广播单元）
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

/// 平面速度意图
///
/// 机器人只使用 `Twist` 中的三个分量：前进、横移、偏航角速度。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelocityIntent {
    /// 前进速度（m/s）
    pub v_x: f64,
    /// 横移速度（m/s）
    pub v_y: f64,
    /// 偏航角速度（rad/s）
    pub v_rot: f64,
}

impl VelocityIntent {
    pub const fn new(v_x: f64, v_y: f64, v_rot: f64) -> Self {
        Self { v_x, v_y, v_rot }
    }

    /// 任一分量为 NaN/Inf 时返回 false
    pub fn is_finite(&self) -> bool {
        self.v_x.is_finite() && self.v_y.is_finite() && self.v_rot.is_finite()
    }
}

impl From<&Twist> for VelocityIntent {
    fn from(msg: &Twist) -> Self {
        Self::new(msg.linear.x, msg.linear.y, msg.angular.z)
    }
}

/// `MoveRelativeXY` 动作目标：机器人本体坐标系下的相对位移
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveRelativeXyGoal {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

/// `MoveRelativeXY` 动作结果
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveRelativeXyResult {
    pub success: bool,
    pub message: String,
}
