//! 驱动层模块
//!
//! 本模块把机器人 SDK 桥接到中间件话题，包括：
//! - 会话生命周期（连接 → 时钟同步 → 租约 → 急停 → 上电 → 站立，失败逆序回滚）
//! - 状态读取线程（ArcSwap 单槽缓存，新鲜度可观测）
//! - 速度指令分发（0.5s 有效期，前置条件不满足时丢弃并计数）
//! - odom → base_link 周期变换发布
//!
//! # 使用场景
//!
//! 通常通过 [`DriverBuilder`] 构造 [`SpotDriver`]；需要单独控制各阶段时
//! 可直接使用 [`RobotLifecycle`]、[`StateReader`] 与 [`CommandDispatcher`]。

mod builder;
mod cleanup;
pub mod dispatcher;
mod driver;
mod error;
pub mod lifecycle;
pub mod metrics;
pub mod power;
pub mod publisher;
pub mod reader;
pub mod state;

pub use builder::{DEFAULT_HOSTNAME, DriverBuilder};
pub use cleanup::ShutdownReport;
pub use dispatcher::{CommandDispatcher, DispatcherConfig};
pub use driver::SpotDriver;
pub use error::{
    CommandError, CommandPrecondition, DriverError, LifecycleError, StartupStep, StreamError,
};
pub use lifecycle::{LifecycleConfig, ReadyHandle, RobotLifecycle};
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use power::{AtomicPowerState, PowerState};
pub use publisher::{OdomTransformPublisher, PublishOutcome, PublisherConfig, TransformSink};
pub use reader::{StateReader, state_stream_loop};
pub use state::*;
