//! Builder 模式实现
//!
//! 提供链式构造 `SpotDriver` 实例的便捷方式。

use crate::dispatcher::DispatcherConfig;
use crate::driver::SpotDriver;
use crate::error::DriverError;
use crate::lifecycle::LifecycleConfig;
use crate::publisher::PublisherConfig;
use spot_sdk::{Connector, Credentials, EstopConfig};
use std::time::Duration;

/// 默认机器人地址（Spot 出厂 WiFi 热点）
pub const DEFAULT_HOSTNAME: &str = "192.168.80.3";

/// SpotDriver Builder（链式构造）
///
/// # Example
///
/// ```
/// use spot_driver::DriverBuilder;
/// use spot_sdk::sim::SimRobot;
/// use std::time::Duration;
///
/// let robot = SimRobot::new();
/// let mut driver = DriverBuilder::new()
///     .hostname("10.0.0.3")
///     .robot_frame("body_link")
///     .settle_delay(Duration::ZERO)
///     .connect(&robot)
///     .unwrap();
/// assert!(driver.shutdown().is_clean());
/// ```
#[derive(Debug, Clone)]
pub struct DriverBuilder {
    hostname: String,
    credentials: Credentials,
    lifecycle: LifecycleConfig,
    dispatcher: DispatcherConfig,
    publisher: PublisherConfig,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            credentials: Credentials::default(),
            lifecycle: LifecycleConfig::default(),
            dispatcher: DispatcherConfig::default(),
            publisher: PublisherConfig::default(),
        }
    }

    /// 机器人地址（默认 `192.168.80.3`）
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// 发布变换时使用的机器人本体帧名（默认 `base_link`）
    pub fn robot_frame(mut self, frame: impl Into<String>) -> Self {
        self.publisher.child_frame = frame.into();
        self
    }

    /// 注册急停后、上电前的等待时间
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.lifecycle.settle_delay = delay;
        self
    }

    pub fn estop(mut self, estop: EstopConfig) -> Self {
        self.lifecycle.estop = estop;
        self
    }

    pub fn lifecycle_config(mut self, config: LifecycleConfig) -> Self {
        self.lifecycle = config;
        self
    }

    /// 运动指令有效期（默认 0.5s）
    pub fn command_validity(mut self, validity: Duration) -> Self {
        self.dispatcher.command_validity = validity;
        self
    }

    /// 发布频率（默认 10Hz）
    pub fn publish_rate(mut self, rate_hz: f64) -> Self {
        self.publisher.rate_hz = rate_hz;
        self
    }

    /// 状态过期阈值（默认 1s）
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.publisher.stale_threshold = threshold;
        self
    }

    pub fn publisher_config(mut self, config: PublisherConfig) -> Self {
        self.publisher = config;
        self
    }

    /// 连接机器人并完成启动序列（阻塞）
    pub fn connect<C: Connector>(self, connector: &C) -> Result<SpotDriver<C::Session>, DriverError> {
        SpotDriver::connect(
            connector,
            &self.hostname,
            &self.credentials,
            self.lifecycle,
            self.dispatcher,
            self.publisher,
        )
    }
}
