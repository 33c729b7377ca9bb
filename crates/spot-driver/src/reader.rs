//! 状态流读取线程
//!
//! 专用后台线程阻塞拉取遥测记录并写入 [`LatestStateSlot`]：
//! - `SdkError::Timeout`：无新数据，检查运行标志后继续
//! - 其他非致命错误：记录日志，立即继续（重连由传输层负责）
//! - 致命错误：线程退出，缓存变为 `ReaderStopped`，不自动重启

use crate::error::StreamError;
use crate::metrics::DriverMetrics;
use crate::state::LatestStateSlot;
use spot_sdk::{SdkError, StateStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), SdkError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), SdkError> {
        let (tx, rx) = std::sync::mpsc::channel();

        // Watchdog joins the target so the caller can wait with a deadline.
        // If the deadline passes the watchdog is abandoned with the reader.
        std::thread::spawn(move || {
            let _ = tx.send(self.join().is_ok());
        });

        match rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SdkError::Rpc("state reader thread panicked".into())),
            Err(_) => Err(SdkError::Timeout(timeout)),
        }
    }
}

/// 线程退出时清除存活标志（包括 panic）
struct AliveGuard<'a>(&'a LatestStateSlot);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.set_reader_alive(false);
    }
}

/// 读取循环
///
/// 返回 `Ok(())` 表示被要求停止；`Err(StreamError::Terminated)` 表示流不可恢复。
pub fn state_stream_loop(
    mut stream: Box<dyn StateStream>,
    slot: &LatestStateSlot,
    is_running: &AtomicBool,
    metrics: &DriverMetrics,
) -> Result<(), StreamError> {
    slot.set_reader_alive(true);
    let _alive = AliveGuard(slot);

    loop {
        // Acquire: 看到 false 时，关闭方之前的写入对本线程可见
        if !is_running.load(Ordering::Acquire) {
            trace!("State reader: is_running flag is false, exiting");
            return Ok(());
        }

        match stream.next_state() {
            Ok(state) => {
                trace!("State reader: received record #{}", state.sequence);
                slot.publish(state);
                DriverMetrics::incr(&metrics.states_received);
            },
            Err(SdkError::Timeout(_)) => continue,
            Err(e) if e.is_fatal() => {
                let err = StreamError::Terminated(e);
                error!("State reader: {}; cached state will go stale", err);
                return Err(err);
            },
            Err(e) => {
                DriverMetrics::incr(&metrics.stream_read_errors);
                warn!("{}", StreamError::Read(e));
            },
        }
    }
}

/// 读取线程句柄
pub struct StateReader {
    handle: Option<JoinHandle<Result<(), StreamError>>>,
    is_running: Arc<AtomicBool>,
}

impl StateReader {
    /// 启动读取线程
    pub fn spawn(
        stream: Box<dyn StateStream>,
        slot: Arc<LatestStateSlot>,
        metrics: Arc<DriverMetrics>,
    ) -> std::io::Result<Self> {
        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();

        // 先置位，避免线程尚未调度时被误判为已退出
        slot.set_reader_alive(true);
        let thread_slot = slot.clone();
        let spawned = std::thread::Builder::new()
            .name("spot-state-reader".into())
            .spawn(move || state_stream_loop(stream, &thread_slot, &running, &metrics));

        match spawned {
            Ok(handle) => {
                info!("State streaming thread started");
                Ok(Self {
                    handle: Some(handle),
                    is_running,
                })
            },
            Err(e) => {
                slot.set_reader_alive(false);
                Err(e)
            },
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 请求停止并等待线程退出，超时后放弃
    ///
    /// 幂等：第二次调用直接返回 `Ok(())`。
    pub fn stop(&mut self, timeout: Duration) -> Result<(), SdkError> {
        // Release: 本线程之前的写入对读取线程可见
        self.is_running.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let result = handle.join_timeout(timeout);
        match &result {
            Ok(()) => debug!("State streaming thread joined"),
            Err(e) => error!(
                "State streaming thread did not exit within {:?}: {}",
                timeout, e
            ),
        }
        result
    }
}

impl Drop for StateReader {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_msgs::RobotState;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按序回放结果，回放完毕后一直超时
    struct VecStream {
        items: VecDeque<Result<RobotState, SdkError>>,
    }

    impl StateStream for VecStream {
        fn next_state(&mut self) -> Result<RobotState, SdkError> {
            match self.items.pop_front() {
                Some(item) => item,
                None => {
                    std::thread::sleep(Duration::from_millis(2));
                    Err(SdkError::Timeout(Duration::from_millis(2)))
                },
            }
        }
    }

    fn record(seq: u64) -> Result<RobotState, SdkError> {
        Ok(RobotState {
            sequence: seq,
            ..Default::default()
        })
    }

    #[test]
    fn test_loop_skips_transient_errors() {
        let slot = LatestStateSlot::new();
        let metrics = DriverMetrics::new();
        let running = AtomicBool::new(true);
        let stream = Box::new(VecStream {
            items: VecDeque::from(vec![
                record(1),
                Err(SdkError::Rpc("hiccup".into())),
                record(2),
                Err(SdkError::StreamClosed),
            ]),
        });

        let result = state_stream_loop(stream, &slot, &running, &metrics);
        assert_eq!(result, Err(StreamError::Terminated(SdkError::StreamClosed)));
        assert_eq!(slot.latest().unwrap().state.sequence, 2);
        assert!(!slot.reader_alive());

        let snap = metrics.snapshot();
        assert_eq!(snap.states_received, 2);
        assert_eq!(snap.stream_read_errors, 1);
    }

    #[test]
    fn test_loop_exits_when_flag_cleared() {
        let slot = LatestStateSlot::new();
        let metrics = DriverMetrics::new();
        let running = AtomicBool::new(false);
        let stream = Box::new(VecStream {
            items: VecDeque::from(vec![record(1)]),
        });
        assert_eq!(state_stream_loop(stream, &slot, &running, &metrics), Ok(()));
        assert!(slot.latest().is_none());
    }

    #[test]
    fn test_reader_stop_joins_thread() {
        let slot = Arc::new(LatestStateSlot::new());
        let metrics = Arc::new(DriverMetrics::new());
        let stream = Box::new(VecStream {
            items: VecDeque::from(vec![record(1)]),
        });

        let mut reader = StateReader::spawn(stream, slot.clone(), metrics).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(reader.is_alive());
        assert_eq!(slot.latest().unwrap().state.sequence, 1);

        reader.stop(Duration::from_secs(1)).unwrap();
        assert!(!reader.is_alive());
        assert!(!slot.reader_alive());
        // 幂等
        reader.stop(Duration::from_secs(1)).unwrap();
    }

    /// 永不返回的流（模拟卡死的传输层）
    struct StuckStream {
        release: Arc<Mutex<()>>,
    }

    impl StateStream for StuckStream {
        fn next_state(&mut self) -> Result<RobotState, SdkError> {
            let _held = self.release.lock().unwrap();
            Err(SdkError::Timeout(Duration::ZERO))
        }
    }

    #[test]
    fn test_reader_stop_abandons_stuck_thread() {
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();

        let slot = Arc::new(LatestStateSlot::new());
        let stream = Box::new(StuckStream {
            release: gate.clone(),
        });
        let mut reader =
            StateReader::spawn(stream, slot, Arc::new(DriverMetrics::new())).unwrap();

        let err = reader.stop(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, SdkError::Timeout(_)));
        drop(held);
    }
}
