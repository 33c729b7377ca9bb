//! 清理栈
//!
//! 启动序列每完成一步就立即压入对应的释放动作；失败或关闭时按 LIFO 逆序执行。
//! 每个动作最多执行一次，单个动作失败不影响后续动作。

use spot_sdk::SdkError;
use tracing::{error, info};

type ReleaseFn = Box<dyn FnOnce() -> Result<(), SdkError> + Send>;

struct CleanupAction {
    name: &'static str,
    release: ReleaseFn,
}

/// 一次展开的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// 执行的释放动作数
    pub attempted: usize,
    /// 其中失败的数量（已记录日志）
    pub failed: usize,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Default)]
pub(crate) struct CleanupStack {
    actions: Vec<CleanupAction>,
}

impl CleanupStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push<F>(&mut self, name: &'static str, release: F)
    where
        F: FnOnce() -> Result<(), SdkError> + Send + 'static,
    {
        self.actions.push(CleanupAction {
            name,
            release: Box::new(release),
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    /// 逆序执行全部动作，不短路
    pub(crate) fn unwind(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        while let Some(action) = self.actions.pop() {
            report.attempted += 1;
            match (action.release)() {
                Ok(()) => info!("Released {}", action.name),
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to release {}: {}", action.name, e);
                },
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_unwind_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        for name in ["session", "lease", "estop"] {
            let log = log.clone();
            stack.push(name, move || {
                log.lock().unwrap().push(name);
                Ok(())
            });
        }

        let report = stack.unwind();
        assert_eq!(report, ShutdownReport { attempted: 3, failed: 0 });
        assert_eq!(*log.lock().unwrap(), vec!["estop", "lease", "session"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_failure_does_not_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        let l1 = log.clone();
        stack.push("lease", move || {
            l1.lock().unwrap().push("lease");
            Ok(())
        });
        stack.push("power", || Err(SdkError::Rpc("unreachable".into())));

        let report = stack.unwind();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["lease"]);
    }

    #[test]
    fn test_second_unwind_is_noop() {
        let count = Arc::new(Mutex::new(0));
        let mut stack = CleanupStack::new();
        let c = count.clone();
        stack.push("lease", move || {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        assert_eq!(stack.len(), 1);

        stack.unwind();
        let report = stack.unwind();
        assert_eq!(report.attempted, 0);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
