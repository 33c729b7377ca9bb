//! 驱动门面
//!
//! 把生命周期、读取线程、指令分发与变换发布组装为一个对象。
//! 调用方只需持有 [`SpotDriver`]；drop 时自动执行完整的关闭序列。

use crate::cleanup::ShutdownReport;
use crate::dispatcher::{CommandDispatcher, DispatcherConfig};
use crate::error::{CommandError, DriverError};
use crate::lifecycle::{LifecycleConfig, ReadyHandle, RobotLifecycle};
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::power::PowerState;
use crate::publisher::{OdomTransformPublisher, PublisherConfig, TransformSink};
use crate::state::{LatestStateSlot, StampedState, StateFreshness};
use spot_msgs::{Twist, VelocityIntent};
use spot_sdk::{Connector, Credentials, RobotSession};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

/// Spot 驱动
///
/// 启动完成后：读取线程在后台填充最新状态缓存，
/// `send_velocity()` 下发运动指令，`transform_publisher()` 生成周期发布器。
pub struct SpotDriver<S: RobotSession> {
    // 字段顺序即 drop 顺序：先 dispatcher（只持有弱引用），最后 lifecycle
    dispatcher: CommandDispatcher<S>,
    slot: Arc<LatestStateSlot>,
    metrics: Arc<DriverMetrics>,
    publisher_config: PublisherConfig,
    lifecycle: RobotLifecycle<S>,
}

impl<S: RobotSession> SpotDriver<S> {
    /// 连接机器人并完成启动序列
    ///
    /// 失败时所有已获取的资源都已释放。
    pub fn connect<C>(
        connector: &C,
        hostname: &str,
        credentials: &Credentials,
        lifecycle_config: LifecycleConfig,
        dispatcher_config: DispatcherConfig,
        publisher_config: PublisherConfig,
    ) -> Result<Self, DriverError>
    where
        C: Connector<Session = S>,
    {
        let mut lifecycle = RobotLifecycle::new(lifecycle_config);
        let handle = lifecycle.start(connector, hostname, credentials)?;

        let slot = Arc::new(LatestStateSlot::new());
        let metrics = Arc::new(DriverMetrics::new());
        // 失败时 lifecycle 在 drop 中回滚
        lifecycle.attach_state_reader(slot.clone(), metrics.clone())?;

        let dispatcher = CommandDispatcher::new(handle, dispatcher_config, metrics.clone());
        info!("Spot driver ready ({})", hostname);

        Ok(Self {
            dispatcher,
            slot,
            metrics,
            publisher_config,
            lifecycle,
        })
    }

    /// 下发速度指令
    pub fn send_velocity(&self, intent: VelocityIntent) -> Result<SystemTime, CommandError> {
        self.dispatcher.dispatch(intent)
    }

    /// Twist 回调：错误只记录日志
    pub fn handle_twist(&self, twist: &Twist) {
        self.dispatcher.handle_twist(twist);
    }

    /// 创建绑定到本驱动状态缓存的变换发布器
    pub fn transform_publisher<T: TransformSink>(&self, sink: T) -> OdomTransformPublisher<T> {
        OdomTransformPublisher::new(
            self.slot.clone(),
            sink,
            self.publisher_config.clone(),
            self.metrics.clone(),
        )
    }

    pub fn state_freshness(&self) -> StateFreshness {
        self.slot.freshness(self.publisher_config.stale_threshold)
    }

    pub fn latest_state(&self) -> Option<Arc<StampedState>> {
        self.slot.latest()
    }

    pub fn state_slot(&self) -> &Arc<LatestStateSlot> {
        &self.slot
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn power_state(&self) -> PowerState {
        self.lifecycle.power_state()
    }

    pub fn ready_handle(&self) -> Option<ReadyHandle<S>> {
        self.lifecycle.ready_handle()
    }

    pub fn publisher_config(&self) -> &PublisherConfig {
        &self.publisher_config
    }

    /// 停止读取线程、断电并释放急停与租约（幂等）
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.lifecycle.shutdown()
    }
}
