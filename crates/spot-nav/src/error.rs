//! 导航层错误类型

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// 超时内无法得到 `target ← source` 变换
    #[error("Transform from '{source_frame}' to '{target_frame}' unavailable: {reason}")]
    TransformUnavailable {
        target_frame: String,
        source_frame: String,
        reason: String,
    },

    #[error("MoveRelativeXY action server not available after {0:?}")]
    ServerUnavailable(Duration),

    /// 目标未能送达动作服务端
    #[error("Failed to send goal: {0}")]
    Send(String),
}

impl NavError {
    pub(crate) fn transform_unavailable(
        target: &str,
        source: &str,
        reason: impl ToString,
    ) -> Self {
        NavError::TransformUnavailable {
            target_frame: target.to_string(),
            source_frame: source.to_string(),
            reason: reason.to_string(),
        }
    }
}
