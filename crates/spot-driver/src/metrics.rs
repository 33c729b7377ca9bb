//! 驱动运行指标
//!
//! 原子计数器，任何线程均可无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 读取线程写入缓存的记录数
    pub states_received: AtomicU64,
    /// 瞬时读取错误次数
    pub stream_read_errors: AtomicU64,
    /// 成功下发的运动指令数
    pub commands_sent: AtomicU64,
    /// 因前置条件不满足而丢弃的指令数
    pub commands_dropped: AtomicU64,
    /// 机器人拒绝或传输失败的指令数
    pub command_failures: AtomicU64,
    /// 发布的 odom 变换数
    pub transforms_published: AtomicU64,
    /// 因缓存为空/过期而跳过的发布周期数
    pub stale_ticks: AtomicU64,
    /// 因快照缺少 odom/flat_body 帧而跳过的发布周期数
    pub missing_frame_ticks: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            states_received: self.states_received.load(Ordering::Relaxed),
            stream_read_errors: self.stream_read_errors.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            transforms_published: self.transforms_published.load(Ordering::Relaxed),
            stale_ticks: self.stale_ticks.load(Ordering::Relaxed),
            missing_frame_ticks: self.missing_frame_ticks.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub states_received: u64,
    pub stream_read_errors: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub command_failures: u64,
    pub transforms_published: u64,
    pub stale_ticks: u64,
    pub missing_frame_ticks: u64,
}
