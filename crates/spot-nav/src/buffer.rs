//! 变换查询
//!
//! [`TransformLookup`] 是中间件 TF 缓冲区的抽象；[`StaticTransformBuffer`]
//! 是进程内实现：保存最近一次广播的每条 `parent → child` 边，查询时沿帧树求解。

use crate::error::NavError;
use parking_lot::{Condvar, Mutex};
use spot_msgs::{
    FrameTreeSnapshot, Header, SE3Pose, Time, Transform, TransformStamped, get_a_tform_b,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// TF 缓冲区
pub trait TransformLookup: Send + Sync {
    /// 查询 `target_frame ← source_frame`（最新可用），最多等待 `timeout`
    ///
    /// 返回的变换把 `source_frame` 中的位姿变换到 `target_frame`。
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<TransformStamped, NavError>;
}

#[derive(Debug, Clone)]
struct Edge {
    parent: String,
    transform: Transform,
    stamp: Time,
}

/// 进程内 TF 缓冲区
///
/// 查询在变换尚未到达时阻塞等待，直到超时；任何线程都可以并发写入。
#[derive(Default)]
pub struct StaticTransformBuffer {
    edges: Mutex<HashMap<String, Edge>>,
    updated: Condvar,
}

impl StaticTransformBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖一条边（以 `child_frame_id` 为键）
    pub fn set_transform(&self, transform: TransformStamped) {
        trace!(
            "TF buffer: {} -> {}",
            transform.header.frame_id, transform.child_frame_id
        );
        self.edges.lock().insert(
            transform.child_frame_id,
            Edge {
                parent: transform.header.frame_id,
                transform: transform.transform,
                stamp: transform.header.stamp,
            },
        );
        self.updated.notify_all();
    }

    /// 已知帧名（含根帧）
    pub fn frames(&self) -> Vec<String> {
        let edges = self.edges.lock();
        let mut frames: Vec<String> = edges
            .iter()
            .flat_map(|(child, edge)| [child.clone(), edge.parent.clone()])
            .collect();
        frames.sort();
        frames.dedup();
        frames
    }

    fn try_lookup(
        edges: &HashMap<String, Edge>,
        target: &str,
        source: &str,
    ) -> Result<TransformStamped, NavError> {
        let mut snapshot = FrameTreeSnapshot::new();
        for (child, edge) in edges {
            let pose = SE3Pose::new(edge.transform.translation, edge.transform.rotation);
            snapshot = snapshot.with_edge(edge.parent.clone(), child.clone(), pose);
        }
        // 没有父边的帧即为根
        let roots: Vec<String> = edges
            .values()
            .filter(|e| !edges.contains_key(&e.parent))
            .map(|e| e.parent.clone())
            .collect();
        for root in roots {
            snapshot = snapshot.with_root(root);
        }
        if target == source && !snapshot.child_to_parent_edge_map.contains_key(target) {
            snapshot = snapshot.with_root(target);
        }

        let target_tform_source = get_a_tform_b(&snapshot, target, source)
            .map_err(|e| NavError::transform_unavailable(target, source, e))?;

        // 时间戳取 source 边
        let stamp = edges.get(source).map(|e| e.stamp).unwrap_or_default();
        Ok(TransformStamped {
            header: Header::new(target, stamp),
            child_frame_id: source.to_string(),
            transform: target_tform_source.into(),
        })
    }
}

impl TransformLookup for StaticTransformBuffer {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<TransformStamped, NavError> {
        let deadline = Instant::now() + timeout;
        let mut edges = self.edges.lock();
        loop {
            let result = Self::try_lookup(&edges, target_frame, source_frame);
            if result.is_ok() || Instant::now() >= deadline {
                return result;
            }
            if self.updated.wait_until(&mut edges, deadline).timed_out() {
                return Self::try_lookup(&edges, target_frame, source_frame);
            }
        }
    }
}
