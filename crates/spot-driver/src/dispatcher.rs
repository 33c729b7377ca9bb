//! 速度指令分发
//!
//! 把速度意图转换为带截止时间的运动指令。前置条件（租约持有、电源 On）
//! 不满足时丢弃并计数，不排队、不重试。

use crate::error::{CommandError, CommandPrecondition};
use crate::lifecycle::ReadyHandle;
use crate::metrics::DriverMetrics;
use spot_msgs::{Twist, VelocityIntent};
use spot_sdk::{MobilityCommand, RobotSession};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

/// 分发器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 指令有效期：机器人在 `issue_time + command_validity` 之后停止执行
    pub command_validity: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            command_validity: Duration::from_millis(500),
        }
    }
}

/// 速度指令分发器
///
/// 持有 [`ReadyHandle`]（非拥有引用）；生命周期关闭后电源状态为 Off，
/// 所有指令以 [`CommandPrecondition::NotPowered`] 被丢弃。并发调用由会话的指令通道串行化。
pub struct CommandDispatcher<S: RobotSession> {
    handle: ReadyHandle<S>,
    config: DispatcherConfig,
    metrics: Arc<DriverMetrics>,
}

impl<S: RobotSession> CommandDispatcher<S> {
    pub fn new(
        handle: ReadyHandle<S>,
        config: DispatcherConfig,
        metrics: Arc<DriverMetrics>,
    ) -> Self {
        Self {
            handle,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 下发一条速度指令
    ///
    /// 成功时返回指令截止时间。
    ///
    /// # 错误
    ///
    /// - [`CommandError::Precondition`]：电源非 On、租约未持有或会话已关闭（已计入 `commands_dropped`）
    /// - [`CommandError::InvalidIntent`]：分量含 NaN/Inf
    /// - [`CommandError::Sdk`]：机器人拒绝或传输失败（已计入 `command_failures`）
    pub fn dispatch(&self, intent: VelocityIntent) -> Result<SystemTime, CommandError> {
        if !intent.is_finite() {
            DriverMetrics::incr(&self.metrics.commands_dropped);
            warn!("Dropping non-finite velocity intent {:?}", intent);
            return Err(CommandError::InvalidIntent(format!("{:?}", intent)));
        }

        let session = self.check_preconditions().inspect_err(|reason| {
            DriverMetrics::incr(&self.metrics.commands_dropped);
            warn!("Cannot command robot velocity, {}", reason);
        });
        let session = session.map_err(CommandError::Precondition)?;

        let end_time = SystemTime::now() + self.config.command_validity;
        let command = MobilityCommand::synchro_velocity(intent);
        match session.robot_command(&command, end_time) {
            Ok(()) => {
                DriverMetrics::incr(&self.metrics.commands_sent);
                debug!(
                    "Velocity command sent: v_x={:.3} v_y={:.3} v_rot={:.3}",
                    intent.v_x, intent.v_y, intent.v_rot
                );
                Ok(end_time)
            },
            Err(e) => {
                DriverMetrics::incr(&self.metrics.command_failures);
                error!("Velocity command failed: {}", e);
                Err(CommandError::Sdk(e))
            },
        }
    }

    /// Twist 回调入口：错误只记录日志，不向上传播
    pub fn handle_twist(&self, twist: &Twist) {
        let _ = self.dispatch(VelocityIntent::from(twist));
    }

    fn check_preconditions(&self) -> Result<Arc<S>, CommandPrecondition> {
        let power = self.handle.power_state();
        if !power.accepts_commands() {
            return Err(CommandPrecondition::NotPowered(power));
        }
        if !self.handle.lease_held() {
            return Err(CommandPrecondition::LeaseNotHeld);
        }
        self.handle
            .session()
            .ok_or(CommandPrecondition::SessionClosed)
    }
}
