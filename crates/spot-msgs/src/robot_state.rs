//! 机器人遥测快照与帧树
//!
//! 帧树以「子帧 → 父帧边」的形式存储（与机器人 SDK 的 `FrameTreeSnapshot` 一致），
//! 根帧的父帧名为空字符串。

use crate::FrameError;
use crate::geometry::SE3Pose;
use crate::messages::Time;
use std::collections::HashMap;

/// 里程计帧
pub const ODOM_FRAME_NAME: &str = "odom";
/// 视觉里程计帧
pub const VISION_FRAME_NAME: &str = "vision";
/// 机体帧
pub const BODY_FRAME_NAME: &str = "body";
/// 重力对齐的机体帧（去除了 roll/pitch）
pub const GRAV_ALIGNED_BODY_FRAME_NAME: &str = "flat_body";

/// 帧树中的一条边
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParentEdge {
    /// 父帧名（根帧为空）
    pub parent_frame_name: String,
    pub parent_tform_child: SE3Pose,
}

/// 某一时刻的完整帧树
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameTreeSnapshot {
    pub child_to_parent_edge_map: HashMap<String, ParentEdge>,
}

impl FrameTreeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加根帧
    pub fn with_root(mut self, name: impl Into<String>) -> Self {
        self.child_to_parent_edge_map.insert(
            name.into(),
            ParentEdge {
                parent_frame_name: String::new(),
                parent_tform_child: SE3Pose::IDENTITY,
            },
        );
        self
    }

    /// 添加一条 `parent_tform_child` 边
    pub fn with_edge(
        mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        parent_tform_child: SE3Pose,
    ) -> Self {
        self.child_to_parent_edge_map.insert(
            child.into(),
            ParentEdge {
                parent_frame_name: parent.into(),
                parent_tform_child,
            },
        );
        self
    }

    /// 沿父链累积，返回 `(根帧名, root_tform_frame)`
    fn root_tform(&self, frame: &str) -> Result<(String, SE3Pose), FrameError> {
        let mut current = frame.to_string();
        let mut acc = SE3Pose::IDENTITY;
        // 最多走 N 步；超出即说明有环
        for _ in 0..=self.child_to_parent_edge_map.len() {
            let edge = self
                .child_to_parent_edge_map
                .get(&current)
                .ok_or_else(|| FrameError::UnknownFrame(current.clone()))?;
            if edge.parent_frame_name.is_empty() {
                return Ok((current, acc));
            }
            acc = edge.parent_tform_child.mult(&acc);
            current = edge.parent_frame_name.clone();
        }
        Err(FrameError::Cycle(frame.to_string()))
    }
}

/// 计算 `a_tform_b`
pub fn get_a_tform_b(
    snapshot: &FrameTreeSnapshot,
    frame_a: &str,
    frame_b: &str,
) -> Result<SE3Pose, FrameError> {
    let (root_a, root_tform_a) = snapshot.root_tform(frame_a)?;
    let (root_b, root_tform_b) = snapshot.root_tform(frame_b)?;
    if root_a != root_b {
        return Err(FrameError::Disconnected {
            a: frame_a.to_string(),
            b: frame_b.to_string(),
        });
    }
    Ok(root_tform_a.inverse().mult(&root_tform_b))
}

/// 运动学状态
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KinematicState {
    pub acquisition_timestamp: Time,
    pub transforms_snapshot: FrameTreeSnapshot,
}

/// 一条完整的机器人遥测记录
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotState {
    /// 流内递增序号
    pub sequence: u64,
    pub kinematic_state: KinematicState,
}

impl RobotState {
    /// `odom_tform_flat_body` 的便捷查询
    pub fn odom_tform_body(&self) -> Result<SE3Pose, FrameError> {
        get_a_tform_b(
            &self.kinematic_state.transforms_snapshot,
            ODOM_FRAME_NAME,
            GRAV_ALIGNED_BODY_FRAME_NAME,
        )
    }
}
