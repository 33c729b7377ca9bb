//! odom → base_link 周期变换发布
//!
//! 每个周期读取最新状态缓存，只发布新鲜记录；缓存为空、过期或读取线程
//! 已退出时跳过本周期；告警只在不新鲜状态发生切换时输出（例如 过期 → 读取线程退出）。
//! 发布器从不阻塞在网络 I/O 上。

use crate::metrics::DriverMetrics;
use crate::state::{LatestStateSlot, StateFreshness};
use spot_msgs::{
    FrameError, GRAV_ALIGNED_BODY_FRAME_NAME, Header, ODOM_FRAME_NAME, Time, TransformStamped,
    get_a_tform_b,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

/// 变换输出端（中间件的 TF 广播器）
pub trait TransformSink {
    type Error: fmt::Display;

    fn send_transform(&mut self, transform: TransformStamped) -> Result<(), Self::Error>;
}

/// 收集到内存（测试与演示）
impl TransformSink for Vec<TransformStamped> {
    type Error = std::convert::Infallible;

    fn send_transform(&mut self, transform: TransformStamped) -> Result<(), Self::Error> {
        self.push(transform);
        Ok(())
    }
}

/// 发布器配置
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// 发布频率（Hz）
    pub rate_hz: f64,
    pub parent_frame: String,
    /// 机器人本体帧名（中间件侧）
    pub child_frame: String,
    /// 超过该时长的记录视为过期
    pub stale_threshold: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            parent_frame: ODOM_FRAME_NAME.to_string(),
            child_frame: "base_link".to_string(),
            stale_threshold: Duration::from_secs(1),
        }
    }
}

impl PublisherConfig {
    /// 发布周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(f64::EPSILON))
    }
}

/// 单次发布结果
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(TransformStamped),
    /// 缓存不新鲜，本周期未发布
    Skipped(StateFreshness),
    /// 快照中缺少所需帧
    MissingFrame(FrameError),
    /// 输出端拒绝
    SinkFailed(String),
}

/// 不发布的原因（只区分种类，忽略时长）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degraded {
    Empty,
    Stale,
    ReaderStopped,
    MissingFrame,
}

/// 周期变换发布器
pub struct OdomTransformPublisher<T: TransformSink> {
    slot: Arc<LatestStateSlot>,
    sink: T,
    config: PublisherConfig,
    metrics: Arc<DriverMetrics>,
    /// 上一周期的不发布原因；`None` 表示正常发布
    degraded: Option<Degraded>,
    /// 进入或切换不发布原因的次数（每次对应一条告警）
    degraded_transitions: u64,
}

impl<T: TransformSink> OdomTransformPublisher<T> {
    pub fn new(
        slot: Arc<LatestStateSlot>,
        sink: T,
        config: PublisherConfig,
        metrics: Arc<DriverMetrics>,
    ) -> Self {
        Self {
            slot,
            sink,
            config,
            metrics,
            degraded: None,
            degraded_transitions: 0,
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    /// 进入或切换不发布状态的次数
    pub fn degraded_transitions(&self) -> u64 {
        self.degraded_transitions
    }

    /// 执行一个发布周期
    pub fn tick(&mut self) -> PublishOutcome {
        let view = self.slot.read(self.config.stale_threshold);
        let latest = match (&view.freshness, view.latest) {
            (StateFreshness::Fresh { .. }, Some(latest)) => latest,
            (freshness, _) => {
                DriverMetrics::incr(&self.metrics.stale_ticks);
                self.enter_degraded(freshness);
                return PublishOutcome::Skipped(*freshness);
            },
        };

        let snapshot = &latest.state.kinematic_state.transforms_snapshot;
        let odom_tform_body =
            match get_a_tform_b(snapshot, ODOM_FRAME_NAME, GRAV_ALIGNED_BODY_FRAME_NAME) {
                Ok(pose) => pose,
                Err(e) => {
                    DriverMetrics::incr(&self.metrics.missing_frame_ticks);
                    if self.set_degraded(Degraded::MissingFrame) {
                        warn!("Skipping transform publish: {}", e);
                    }
                    return PublishOutcome::MissingFrame(e);
                },
            };

        if self.degraded.take().is_some() {
            info!("Robot state is fresh again, resuming transform publishing");
        }

        let transform = TransformStamped {
            header: Header::new(self.config.parent_frame.clone(), Time::now()),
            child_frame_id: self.config.child_frame.clone(),
            transform: odom_tform_body.into(),
        };

        match self.sink.send_transform(transform.clone()) {
            Ok(()) => {
                DriverMetrics::incr(&self.metrics.transforms_published);
                trace!(
                    "Published {} -> {} (seq {})",
                    self.config.parent_frame, self.config.child_frame, latest.state.sequence
                );
                PublishOutcome::Published(transform)
            },
            Err(e) => {
                warn!("Transform sink rejected publish: {}", e);
                PublishOutcome::SinkFailed(e.to_string())
            },
        }
    }

    /// 记录不发布原因；原因发生变化时返回 true
    fn set_degraded(&mut self, reason: Degraded) -> bool {
        if self.degraded == Some(reason) {
            return false;
        }
        self.degraded = Some(reason);
        self.degraded_transitions += 1;
        true
    }

    fn enter_degraded(&mut self, freshness: &StateFreshness) {
        let reason = match freshness {
            StateFreshness::Empty => Degraded::Empty,
            StateFreshness::Stale { .. } => Degraded::Stale,
            StateFreshness::ReaderStopped { .. } => Degraded::ReaderStopped,
            StateFreshness::Fresh { .. } => return,
        };
        if !self.set_degraded(reason) {
            return;
        }
        match freshness {
            StateFreshness::Empty => warn!("No robot state received yet, not publishing transforms"),
            StateFreshness::Stale { age } => {
                warn!("Robot state is stale ({:?} old), not publishing transforms", age)
            },
            StateFreshness::ReaderStopped { .. } => {
                warn!("State reader has stopped, robot state will not be updated")
            },
            StateFreshness::Fresh { .. } => {},
        }
    }
}
