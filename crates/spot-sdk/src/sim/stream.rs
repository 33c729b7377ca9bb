//! 模拟状态流

use super::SimInner;
use crate::{SdkError, StateStream};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use spot_msgs::{
    BODY_FRAME_NAME, FrameTreeSnapshot, GRAV_ALIGNED_BODY_FRAME_NAME, KinematicState,
    ODOM_FRAME_NAME, RobotState, SE3Pose, Time,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 脚本流轮询间隔（无数据时返回 Timeout 的周期）
const SCRIPT_POLL: Duration = Duration::from_millis(10);

pub(crate) enum StreamEvent {
    State(RobotState),
    Error(SdkError),
}

/// 脚本流推送端
///
/// drop 或 `close()` 之后，流在读完已推送事件后返回 `StreamClosed`。
pub struct StreamScript {
    tx: Sender<StreamEvent>,
}

impl StreamScript {
    pub(crate) fn new(tx: Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub fn push_state(&self, state: RobotState) {
        let _ = self.tx.send(StreamEvent::State(state));
    }

    /// 推送一次读取错误（`is_fatal()` 为 false 的错误会被读取线程跳过）
    pub fn push_error(&self, error: SdkError) {
        let _ = self.tx.send(StreamEvent::Error(error));
    }

    pub fn close(self) {}
}

/// 构造只含 odom → body → flat_body 的遥测记录
pub fn planar_state(sequence: u64, odom_tform_body: SE3Pose) -> RobotState {
    let snapshot = FrameTreeSnapshot::new()
        .with_root(ODOM_FRAME_NAME)
        .with_edge(ODOM_FRAME_NAME, BODY_FRAME_NAME, odom_tform_body)
        .with_edge(
            BODY_FRAME_NAME,
            GRAV_ALIGNED_BODY_FRAME_NAME,
            SE3Pose::IDENTITY,
        );
    RobotState {
        sequence,
        kinematic_state: KinematicState {
            acquisition_timestamp: Time::now(),
            transforms_snapshot: snapshot,
        },
    }
}

/// 脚本模式：逐条回放测试推送的事件
pub struct ScriptedStream {
    rx: Receiver<StreamEvent>,
}

impl ScriptedStream {
    pub(crate) fn new(rx: Receiver<StreamEvent>) -> Self {
        Self { rx }
    }
}

impl StateStream for ScriptedStream {
    fn next_state(&mut self) -> Result<RobotState, SdkError> {
        match self.rx.recv_timeout(SCRIPT_POLL) {
            Ok(StreamEvent::State(state)) => Ok(state),
            Ok(StreamEvent::Error(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(SdkError::Timeout(SCRIPT_POLL)),
            Err(RecvTimeoutError::Disconnected) => Err(SdkError::StreamClosed),
        }
    }
}

/// 实时模式：按固定周期产出积分后的位姿
pub struct LiveStream {
    inner: Arc<SimInner>,
    session_closed: Arc<AtomicBool>,
    sequence: u64,
}

impl LiveStream {
    pub(crate) fn new(inner: Arc<SimInner>, session_closed: Arc<AtomicBool>) -> Self {
        Self {
            inner,
            session_closed,
            sequence: 0,
        }
    }
}

impl StateStream for LiveStream {
    fn next_state(&mut self) -> Result<RobotState, SdkError> {
        std::thread::sleep(self.inner.live_period());

        if self.session_closed.load(Ordering::Acquire) {
            return Err(SdkError::StreamClosed);
        }

        let rate = self.inner.transient_error_rate();
        if rate > 0.0 && rand::random::<f64>() < rate {
            return Err(SdkError::Rpc("simulated stream hiccup".into()));
        }

        self.sequence += 1;
        Ok(planar_state(self.sequence, self.inner.snapshot_pose()))
    }
}
