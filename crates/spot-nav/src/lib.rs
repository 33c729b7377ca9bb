//! # Spot Nav
//!
//! 导航目标监听：把任意参考系下的目标位姿变换到机器人本体帧，
//! 作为 `MoveRelativeXY` 动作目标转发。
//!
//! 中间件的 TF 缓冲区与动作客户端以 trait 表达（[`TransformLookup`]、
//! [`MoveRelativeClient`]），本 crate 不依赖任何中间件实现。

pub mod action;
pub mod buffer;
mod error;
pub mod listener;

pub use action::{GoalHandle, MoveRelativeClient, result_channel};
pub use buffer::{StaticTransformBuffer, TransformLookup};
pub use error::NavError;
pub use listener::{GoalDispatch, NavConfig, NavGoalListener};
