//! `MoveRelativeXY` 动作客户端抽象

use crate::error::NavError;
use crossbeam_channel::{Receiver, Sender};
use spot_msgs::{MoveRelativeXyGoal, MoveRelativeXyResult};
use std::time::Duration;

/// 动作客户端
pub trait MoveRelativeClient: Send + Sync {
    /// 等待动作服务端上线，超时返回 false
    fn wait_for_server(&self, timeout: Duration) -> bool;

    /// 发送目标；服务端的接受/拒绝结果通过 [`GoalHandle`] 返回
    fn send_goal(&self, goal: MoveRelativeXyGoal) -> Result<GoalHandle, NavError>;
}

/// 目标句柄
#[derive(Debug)]
pub struct GoalHandle {
    accepted: bool,
    result: Option<Receiver<MoveRelativeXyResult>>,
}

impl GoalHandle {
    /// 已接受，执行结果稍后经 `result` 送达
    pub fn accepted(result: Receiver<MoveRelativeXyResult>) -> Self {
        Self {
            accepted: true,
            result: Some(result),
        }
    }

    pub fn rejected() -> Self {
        Self {
            accepted: false,
            result: None,
        }
    }

    /// 已接受且结果立即可用
    pub fn completed(result: MoveRelativeXyResult) -> Self {
        let (tx, rx) = result_channel();
        let _ = tx.send(result);
        Self::accepted(rx)
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// 阻塞等待执行结果
    ///
    /// 被拒绝的目标、服务端放弃（发送端被 drop）或超时均返回 `None`。
    pub fn wait_result(self, timeout: Option<Duration>) -> Option<MoveRelativeXyResult> {
        let rx = self.result?;
        match timeout {
            Some(t) => rx.recv_timeout(t).ok(),
            None => rx.recv().ok(),
        }
    }
}

/// 创建结果通道（服务端实现使用）
pub fn result_channel() -> (Sender<MoveRelativeXyResult>, Receiver<MoveRelativeXyResult>) {
    crossbeam_channel::bounded(1)
}
