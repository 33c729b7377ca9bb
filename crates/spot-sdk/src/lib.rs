//! # Spot SDK Adapter Layer
//!
//! 机器人 SDK 抽象层：把厂商 SDK 的会话、租约、急停、电源、运动指令与状态流
//! 统一为一组 trait，上层驱动只依赖这些 trait。
//!
//! ```text
//! Driver Layer (spot-driver)
//!     ↓ Connector / RobotSession / KeepAlive / StateStream
//! SDK Adapter Layer (此 crate)
//!     ↓ 厂商 SDK 或 sim::SimRobot
//! Robot
//! ```

use spot_msgs::{RobotState, VelocityIntent};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[cfg(feature = "sim")]
pub mod sim;

/// SDK 适配层统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    /// 传输层错误（不可达、连接被重置）
    #[error("RPC error: {0}")]
    Rpc(String),
    /// 机器人拒绝了请求
    #[error("Response error: {0}")]
    Response(String),
    #[error("Authentication rejected: {0}")]
    Authentication(String),
    /// 租约被占用或被撤销
    #[error("Lease error: {0}")]
    Lease(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// 状态流已结束（对端关闭或传输层放弃重连）
    #[error("State stream closed")]
    StreamClosed,
    #[error("Session closed")]
    SessionClosed,
}

impl SdkError {
    /// 致命错误：继续读取/发送已无意义
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SdkError::StreamClosed | SdkError::SessionClosed | SdkError::Authentication(_)
        )
    }
}

/// 登录凭据
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// 用户名环境变量（与官方 SDK 工具一致）
    pub const USERNAME_ENV: &'static str = "BOSDYN_CLIENT_USERNAME";
    /// 密码环境变量
    pub const PASSWORD_ENV: &'static str = "BOSDYN_CLIENT_PASSWORD";

    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 环境变量中的用户名（未设置时为 `None`）
    pub fn username_from_env() -> Option<String> {
        std::env::var(Self::USERNAME_ENV).ok()
    }

    /// 环境变量中的密码；与用户名相互独立
    pub fn password_from_env() -> Option<String> {
        std::env::var(Self::PASSWORD_ENV).ok()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 急停端点注册参数
#[derive(Debug, Clone, PartialEq)]
pub struct EstopConfig {
    /// 端点名称（在机器人侧可见）
    pub name: String,
    /// 超过该时长未刷新，机器人触发安全停止
    pub timeout: Duration,
}

impl Default for EstopConfig {
    fn default() -> Self {
        Self {
            name: "SpotROS2DriverEStop".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// 运动指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MobilityCommand {
    /// 同步速度指令（机体坐标系）
    SynchroVelocity { v_x: f64, v_y: f64, v_rot: f64 },
}

impl MobilityCommand {
    pub fn synchro_velocity(intent: VelocityIntent) -> Self {
        MobilityCommand::SynchroVelocity {
            v_x: intent.v_x,
            v_y: intent.v_y,
            v_rot: intent.v_rot,
        }
    }
}

/// 后台保活句柄（租约或急停端点）
///
/// 保活由 SDK 在自己的节奏上执行，这里只暴露健康状态与释放操作。
pub trait KeepAlive: Send + Sync {
    fn name(&self) -> &str;
    /// 授权仍然有效（未被撤销、未过期、未释放）
    fn is_alive(&self) -> bool;
    /// 停止保活并归还授权
    fn shutdown(&self) -> Result<(), SdkError>;
}

/// 遥测流（阻塞拉取）
///
/// `next_state()` 必须在有限时间内返回：无新数据时返回 `SdkError::Timeout`，
/// 以便读取线程检查运行标志。
pub trait StateStream: Send {
    fn next_state(&mut self) -> Result<RobotState, SdkError>;
}

/// 已认证的机器人会话
///
/// 所有方法取 `&self`：会话内部负责串行化单一指令通道。
pub trait RobotSession: Send + Sync + 'static {
    fn hostname(&self) -> &str;

    /// 等待时钟同步完成
    fn wait_for_time_sync(&self, timeout: Duration) -> Result<(), SdkError>;

    /// 机器人当前是否被（任意）急停端点停止
    fn is_estopped(&self) -> Result<bool, SdkError>;

    /// 获取租约并启动保活；`must_acquire = true` 时被占用即失败
    fn acquire_lease(&self, must_acquire: bool) -> Result<Arc<dyn KeepAlive>, SdkError>;

    /// 注册急停端点并启动保活
    fn register_estop(&self, config: &EstopConfig) -> Result<Arc<dyn KeepAlive>, SdkError>;

    fn power_on(&self, timeout: Duration) -> Result<(), SdkError>;

    fn is_powered_on(&self) -> Result<bool, SdkError>;

    /// `cut_immediately = false` 为安全断电（先坐下再断电）
    fn power_off(&self, cut_immediately: bool, timeout: Duration) -> Result<(), SdkError>;

    /// 阻塞直到站立完成或超时
    fn blocking_stand(&self, timeout: Duration) -> Result<(), SdkError>;

    /// 发送运动指令，`end_time` 之后指令失效
    fn robot_command(&self, command: &MobilityCommand, end_time: SystemTime)
    -> Result<(), SdkError>;

    fn open_state_stream(&self) -> Result<Box<dyn StateStream>, SdkError>;

    /// 关闭会话；之后所有调用返回 `SessionClosed`
    fn disconnect(&self) -> Result<(), SdkError>;
}

/// 会话工厂：建立连接并完成认证
pub trait Connector {
    type Session: RobotSession;

    fn connect(&self, hostname: &str, credentials: &Credentials)
    -> Result<Self::Session, SdkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SdkError::StreamClosed.is_fatal());
        assert!(SdkError::SessionClosed.is_fatal());
        assert!(SdkError::Authentication("bad".into()).is_fatal());
        assert!(!SdkError::Timeout(Duration::from_millis(5)).is_fatal());
        assert!(!SdkError::Rpc("reset".into()).is_fatal());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("user", "hunter2");
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("user"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn test_synchro_velocity_from_intent() {
        let cmd = MobilityCommand::synchro_velocity(VelocityIntent::new(0.3, 0.0, 0.1));
        assert_eq!(
            cmd,
            MobilityCommand::SynchroVelocity {
                v_x: 0.3,
                v_y: 0.0,
                v_rot: 0.1
            }
        );
    }

    #[test]
    fn test_estop_config_default() {
        let config = EstopConfig::default();
        assert_eq!(config.name, "SpotROS2DriverEStop");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
