//! 驱动层错误类型定义

use crate::power::PowerState;
use spot_sdk::SdkError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 启动序列中的步骤（按执行顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StartupStep {
    Connect,
    TimeSync,
    EstopCheck,
    Lease,
    Estop,
    PowerOn,
    Stand,
}

impl fmt::Display for StartupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupStep::Connect => "connect",
            StartupStep::TimeSync => "time sync",
            StartupStep::EstopCheck => "E-Stop check",
            StartupStep::Lease => "lease",
            StartupStep::Estop => "E-Stop",
            StartupStep::PowerOn => "power on",
            StartupStep::Stand => "stand",
        };
        f.write_str(name)
    }
}

/// 启动序列错误（全部为致命错误，返回前已回滚）
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// 不可达或认证被拒
    #[error("Failed to connect to robot at {hostname}: {source}")]
    Connection {
        hostname: String,
        #[source]
        source: SdkError,
    },

    #[error("Time sync not established within {timeout:?}: {source}")]
    TimeSync {
        timeout: Duration,
        #[source]
        source: SdkError,
    },

    /// 机器人已被外部急停；拒绝覆盖其他操作员的急停
    #[error("Safety precondition failed: {0}")]
    SafetyPrecondition(String),

    #[error("Failed to acquire lease: {0}")]
    Lease(#[source] SdkError),

    #[error("Failed to register E-Stop endpoint: {0}")]
    Estop(#[source] SdkError),

    #[error("Robot power on failed: {0}")]
    PowerOn(#[source] SdkError),

    #[error("Robot failed to stand: {0}")]
    Stand(#[source] SdkError),

    /// 重复调用 `start()`
    #[error("Lifecycle already started")]
    AlreadyStarted,
}

impl LifecycleError {
    /// 失败所在步骤（`AlreadyStarted` 无对应步骤）
    pub fn step(&self) -> Option<StartupStep> {
        match self {
            LifecycleError::Connection { .. } => Some(StartupStep::Connect),
            LifecycleError::TimeSync { .. } => Some(StartupStep::TimeSync),
            LifecycleError::SafetyPrecondition(_) => Some(StartupStep::EstopCheck),
            LifecycleError::Lease(_) => Some(StartupStep::Lease),
            LifecycleError::Estop(_) => Some(StartupStep::Estop),
            LifecycleError::PowerOn(_) => Some(StartupStep::PowerOn),
            LifecycleError::Stand(_) => Some(StartupStep::Stand),
            LifecycleError::AlreadyStarted => None,
        }
    }
}

/// 状态流错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// 瞬时读取失败，读取线程继续
    #[error("State stream read failed: {0}")]
    Read(#[source] SdkError),

    /// 不可恢复，读取线程退出
    #[error("State stream terminated: {0}")]
    Terminated(#[source] SdkError),
}

/// 运动指令被拒绝的前置条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPrecondition {
    /// 电源状态不是 On
    NotPowered(PowerState),
    /// 租约未持有或已被撤销
    LeaseNotHeld,
    /// 会话已关闭
    SessionClosed,
}

impl fmt::Display for CommandPrecondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandPrecondition::NotPowered(state) => write!(f, "power state is {:?}", state),
            CommandPrecondition::LeaseNotHeld => f.write_str("lease is not held"),
            CommandPrecondition::SessionClosed => f.write_str("session is closed"),
        }
    }
}

/// 指令分发错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// 前置条件不满足，指令被丢弃（不排队、不重试）
    #[error("Command dropped: {0}")]
    Precondition(CommandPrecondition),

    /// 速度分量含 NaN/Inf
    #[error("Invalid velocity intent: {0}")]
    InvalidIntent(String),

    #[error("Robot rejected command: {0}")]
    Sdk(#[source] SdkError),
}

/// 驱动门面错误
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to open state stream: {0}")]
    StreamOpen(#[source] SdkError),

    #[error("Failed to spawn state reader thread: {0}")]
    ReaderSpawn(#[source] std::io::Error),
}
