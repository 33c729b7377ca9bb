//! 最新状态单槽缓存
//!
//! 单生产者（读取线程）/ 单消费者（周期发布器）的「最新值」通道：
//! - 写入：构造不可变快照后整体原子替换（ArcSwap），不保留历史
//! - 读取：一次 load 得到完整快照，永远不会看到两条记录拼接的结果
//! - 新鲜度：记录接收时间与读取线程存活标志，过期状态可被观察到

use arc_swap::ArcSwapOption;
use spot_msgs::RobotState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 带接收时间的遥测记录
#[derive(Debug, Clone)]
pub struct StampedState {
    pub state: RobotState,
    /// 读取线程收到该记录的单调时间
    pub received_at: Instant,
}

impl StampedState {
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

/// 缓存新鲜度
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateFreshness {
    /// 尚未收到任何记录
    Empty,
    Fresh { age: Duration },
    /// 读取线程仍在运行，但最后一条记录超过阈值
    Stale { age: Duration },
    /// 读取线程已退出，缓存不会再更新
    ReaderStopped { age: Option<Duration> },
}

impl StateFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, StateFreshness::Fresh { .. })
    }
}

/// 一次读取的结果：新鲜度与快照来自同一次 load
#[derive(Debug, Clone)]
pub struct StateView {
    pub freshness: StateFreshness,
    pub latest: Option<Arc<StampedState>>,
}

/// 最新状态单槽
#[derive(Debug, Default)]
pub struct LatestStateSlot {
    latest: ArcSwapOption<StampedState>,
    reader_alive: AtomicBool,
}

impl LatestStateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖写入（last-write-wins）
    pub fn publish(&self, state: RobotState) {
        self.latest.store(Some(Arc::new(StampedState {
            state,
            received_at: Instant::now(),
        })));
    }

    /// 读取最新快照（无锁）
    pub fn latest(&self) -> Option<Arc<StampedState>> {
        self.latest.load_full()
    }

    pub fn set_reader_alive(&self, alive: bool) {
        self.reader_alive.store(alive, Ordering::Release);
    }

    pub fn reader_alive(&self) -> bool {
        self.reader_alive.load(Ordering::Acquire)
    }

    /// 读取快照并判定新鲜度
    pub fn read(&self, max_age: Duration) -> StateView {
        let latest = self.latest();
        let age = latest.as_ref().map(|s| s.age());
        let freshness = if !self.reader_alive() {
            StateFreshness::ReaderStopped { age }
        } else {
            match age {
                None => StateFreshness::Empty,
                Some(age) if age <= max_age => StateFreshness::Fresh { age },
                Some(age) => StateFreshness::Stale { age },
            }
        };
        StateView { freshness, latest }
    }

    pub fn freshness(&self, max_age: Duration) -> StateFreshness {
        self.read(max_age).freshness
    }
}
