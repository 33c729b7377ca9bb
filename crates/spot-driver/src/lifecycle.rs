//! 机器人会话生命周期管理
//!
//! 按固定顺序获取四类独占资源，并保证任何失败都按逆序释放已获取的资源：
//!
//! ```text
//! connect ─▶ time sync ─▶ E-Stop check ─▶ lease ─▶ E-Stop endpoint ─▶ power on ─▶ stand
//!    │                                      │            │               │
//!    └─ push(disconnect)                    │            │               └─ push(power off)
//!                                           │            └─ push(release E-Stop)
//!                                           └─ push(release lease)
//! ```
//!
//! 关闭时清理栈 LIFO 展开：读取线程 → 断电 → 释放急停 → 释放租约 → 断开会话。

use crate::cleanup::{CleanupStack, ShutdownReport};
use crate::error::{DriverError, LifecycleError};
use crate::metrics::DriverMetrics;
use crate::power::{AtomicPowerState, PowerState};
use crate::reader::StateReader;
use crate::state::LatestStateSlot;
use spot_sdk::{Connector, Credentials, EstopConfig, KeepAlive, RobotSession, SdkError};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 生命周期配置
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// 时钟同步等待上限
    pub time_sync_timeout: Duration,
    /// 急停端点参数
    pub estop: EstopConfig,
    /// 注册急停后、上电前的等待时间
    pub settle_delay: Duration,
    pub power_on_timeout: Duration,
    pub stand_timeout: Duration,
    pub power_off_timeout: Duration,
    /// 关闭时等待读取线程退出的上限
    pub reader_join_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            time_sync_timeout: Duration::from_secs(5),
            estop: EstopConfig::default(),
            settle_delay: Duration::from_secs(2),
            power_on_timeout: Duration::from_secs(20),
            stand_timeout: Duration::from_secs(10),
            power_off_timeout: Duration::from_secs(20),
            reader_join_timeout: Duration::from_secs(2),
        }
    }
}

/// 就绪句柄
///
/// 只持有非拥有引用：资源的生命周期始终归 [`RobotLifecycle`]。
/// 关闭之后，`session()` 返回 `None`、`lease_held()` 返回 false。
pub struct ReadyHandle<S: RobotSession> {
    session: Weak<S>,
    lease: Weak<dyn KeepAlive>,
    estop: Weak<dyn KeepAlive>,
    power: Arc<AtomicPowerState>,
}

impl<S: RobotSession> Clone for ReadyHandle<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            lease: self.lease.clone(),
            estop: self.estop.clone(),
            power: self.power.clone(),
        }
    }
}

impl<S: RobotSession> ReadyHandle<S> {
    pub fn session(&self) -> Option<Arc<S>> {
        self.session.upgrade()
    }

    /// 租约仍由本进程持有（未释放、未撤销）
    pub fn lease_held(&self) -> bool {
        self.lease.upgrade().is_some_and(|l| l.is_alive())
    }

    pub fn estop_healthy(&self) -> bool {
        self.estop.upgrade().is_some_and(|e| e.is_alive())
    }

    pub fn power_state(&self) -> PowerState {
        self.power.get()
    }

    /// 可以下发运动指令
    pub fn is_ready(&self) -> bool {
        self.power_state().accepts_commands() && self.lease_held()
    }
}

/// 机器人会话生命周期管理器
///
/// 独占持有会话、租约保活与急停保活。`shutdown()` 幂等，drop 时自动调用。
pub struct RobotLifecycle<S: RobotSession> {
    config: LifecycleConfig,
    cleanup: CleanupStack,
    session: Option<Arc<S>>,
    ready: Option<ReadyHandle<S>>,
    power: Arc<AtomicPowerState>,
}

impl<S: RobotSession> RobotLifecycle<S> {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            cleanup: CleanupStack::new(),
            session: None,
            ready: None,
            power: Arc::new(AtomicPowerState::new(PowerState::Off)),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn power_state(&self) -> PowerState {
        self.power.get()
    }

    /// 启动序列已完成且尚未关闭
    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    pub fn ready_handle(&self) -> Option<ReadyHandle<S>> {
        self.ready.clone()
    }

    /// 执行启动序列
    ///
    /// # 错误
    ///
    /// 任一步骤失败时，先逆序释放此前获取的资源，再返回对应的 [`LifecycleError`]。
    /// 此后的步骤不会被执行。
    ///
    /// # 阻塞行为
    ///
    /// 会阻塞当前线程直到机器人站立或超时；不要在 async 上下文中直接调用。
    pub fn start<C>(
        &mut self,
        connector: &C,
        hostname: &str,
        credentials: &Credentials,
    ) -> Result<ReadyHandle<S>, LifecycleError>
    where
        C: Connector<Session = S>,
    {
        if self.session.is_some() {
            return Err(LifecycleError::AlreadyStarted);
        }

        match self.run_startup(connector, hostname, credentials) {
            Ok(handle) => {
                self.ready = Some(handle.clone());
                Ok(handle)
            },
            Err(e) => {
                error!("Startup failed at {}: {}", display_step(&e), e);
                let report = self.release_all();
                warn!(
                    "Rolled back {} acquired resource(s) ({} release failure(s))",
                    report.attempted, report.failed
                );
                Err(e)
            },
        }
    }

    fn run_startup<C>(
        &mut self,
        connector: &C,
        hostname: &str,
        credentials: &Credentials,
    ) -> Result<ReadyHandle<S>, LifecycleError>
    where
        C: Connector<Session = S>,
    {
        // 1. 会话 + 认证
        let session = Arc::new(connector.connect(hostname, credentials).map_err(|source| {
            LifecycleError::Connection {
                hostname: hostname.to_string(),
                source,
            }
        })?);
        self.session = Some(session.clone());
        let s = session.clone();
        self.cleanup.push("session", move || s.disconnect());

        // 2. 时钟同步
        let timeout = self.config.time_sync_timeout;
        session
            .wait_for_time_sync(timeout)
            .map_err(|source| LifecycleError::TimeSync { timeout, source })?;

        // 3. 不覆盖外部急停
        match session.is_estopped() {
            Ok(false) => {},
            Ok(true) => {
                return Err(LifecycleError::SafetyPrecondition(
                    "robot is E-Stopped; use an external E-Stop client to clear it first".into(),
                ));
            },
            Err(e) => {
                return Err(LifecycleError::SafetyPrecondition(format!(
                    "could not verify E-Stop state: {}",
                    e
                )));
            },
        }
        info!("Successfully authenticated and connected to the robot at {}", hostname);

        // 4. 独占租约
        let lease = session.acquire_lease(true).map_err(LifecycleError::Lease)?;
        let weak_lease = Arc::downgrade(&lease);
        self.cleanup.push("lease", move || lease.shutdown());
        info!("Acquired lease");

        // 5. 急停端点
        let estop = session
            .register_estop(&self.config.estop)
            .map_err(LifecycleError::Estop)?;
        let weak_estop = Arc::downgrade(&estop);
        self.cleanup.push("E-Stop", move || estop.shutdown());
        info!("Acquired E-Stop '{}'", self.config.estop.name);

        if !self.config.settle_delay.is_zero() {
            std::thread::sleep(self.config.settle_delay);
        }

        // 6. 上电
        if !self.power.transition(PowerState::Off, PowerState::PoweringOn) {
            warn!("Unexpected power state {:?} before power on", self.power.get());
            self.power.set(PowerState::PoweringOn);
        }
        if let Err(e) = session.power_on(self.config.power_on_timeout) {
            self.power.set(PowerState::Off);
            return Err(LifecycleError::PowerOn(e));
        }
        let (s, power, timeout) = (
            session.clone(),
            self.power.clone(),
            self.config.power_off_timeout,
        );
        self.cleanup
            .push("motor power", move || power_off_if_on(&*s, &power, timeout));

        match session.is_powered_on() {
            Ok(true) => self.power.set(PowerState::On),
            Ok(false) => {
                return Err(LifecycleError::PowerOn(SdkError::Response(
                    "robot reports motors off after power on".into(),
                )));
            },
            Err(e) => return Err(LifecycleError::PowerOn(e)),
        }
        info!("Robot powered on");

        // 7. 站立
        session
            .blocking_stand(self.config.stand_timeout)
            .map_err(LifecycleError::Stand)?;
        info!("Robot standing");

        Ok(ReadyHandle {
            session: Arc::downgrade(&session),
            lease: weak_lease,
            estop: weak_estop,
            power: self.power.clone(),
        })
    }

    /// 打开状态流并启动读取线程
    ///
    /// 停止动作压入清理栈顶，关闭时先于断电与释放租约执行。
    pub fn attach_state_reader(
        &mut self,
        slot: Arc<LatestStateSlot>,
        metrics: Arc<DriverMetrics>,
    ) -> Result<(), DriverError> {
        let session = self
            .session
            .as_ref()
            .ok_or(DriverError::StreamOpen(SdkError::SessionClosed))?;
        let stream = session.open_state_stream().map_err(DriverError::StreamOpen)?;
        let mut reader = StateReader::spawn(stream, slot, metrics).map_err(DriverError::ReaderSpawn)?;

        let timeout = self.config.reader_join_timeout;
        self.cleanup
            .push("state reader", move || reader.stop(timeout));
        Ok(())
    }

    /// 逆序释放全部资源
    ///
    /// 幂等；可在启动失败后调用。失败只记录日志，不会中断后续释放。
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.cleanup.is_empty() {
            debug!("Shutdown: nothing to release");
            return ShutdownReport::default();
        }
        info!("Shutting down robot session");
        self.release_all()
    }

    fn release_all(&mut self) -> ShutdownReport {
        let report = self.cleanup.unwind();
        self.ready = None;
        self.session = None;
        report
    }
}

impl<S: RobotSession> Drop for RobotLifecycle<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 断电（仅当已上电）
///
/// 状态查询失败时按「已上电」处理，宁可多发一次断电。
fn power_off_if_on<S: RobotSession + ?Sized>(
    session: &S,
    power: &AtomicPowerState,
    timeout: Duration,
) -> Result<(), SdkError> {
    power.set(PowerState::PoweringOff);
    let powered = session.is_powered_on().unwrap_or_else(|e| {
        warn!("Could not query power state before power off: {}", e);
        true
    });
    if !powered {
        power.set(PowerState::Off);
        return Ok(());
    }

    if let Err(e) = session.power_off(false, timeout) {
        // 断电未确认：回写机器人报告的状态，查询失败时按仍上电处理
        let still_on = session.is_powered_on().unwrap_or(true);
        power.set(if still_on { PowerState::On } else { PowerState::Off });
        return Err(e);
    }
    power.set(PowerState::Off);
    info!("Robot powered off");
    Ok(())
}

fn display_step(e: &LifecycleError) -> String {
    e.step().map(|s| s.to_string()).unwrap_or_else(|| "start".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_sdk::sim::{SimRobot, SimStep};

    fn quick_config() -> LifecycleConfig {
        LifecycleConfig {
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.power_on_timeout, Duration::from_secs(20));
        assert_eq!(config.stand_timeout, Duration::from_secs(10));
        assert_eq!(config.estop.name, "SpotROS2DriverEStop");
    }

    #[test]
    fn test_start_reaches_ready() {
        let robot = SimRobot::new();
        let mut lifecycle = RobotLifecycle::new(quick_config());
        let handle = lifecycle
            .start(&robot, "192.168.80.3", &Credentials::default())
            .unwrap();

        assert!(lifecycle.is_ready());
        assert!(handle.is_ready());
        assert!(handle.estop_healthy());
        assert_eq!(handle.power_state(), PowerState::On);
        assert_eq!(
            robot.steps(),
            vec![
                SimStep::Connect,
                SimStep::TimeSync,
                SimStep::EstopCheck,
                SimStep::AcquireLease,
                SimStep::RegisterEstop,
                SimStep::PowerOn,
                SimStep::Stand,
            ]
        );
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let robot = SimRobot::new();
        let mut lifecycle = RobotLifecycle::new(quick_config());
        lifecycle.start(&robot, "h", &Credentials::default()).unwrap();
        let err = lifecycle.start(&robot, "h", &Credentials::default()).err();
        assert!(matches!(err, Some(LifecycleError::AlreadyStarted)));
        // 首次启动的资源不受影响
        assert!(lifecycle.is_ready());
    }

    #[test]
    fn test_handle_goes_dead_after_shutdown() {
        let robot = SimRobot::new();
        let mut lifecycle = RobotLifecycle::new(quick_config());
        let handle = lifecycle.start(&robot, "h", &Credentials::default()).unwrap();

        let report = lifecycle.shutdown();
        assert_eq!(report.attempted, 4);
        assert!(report.is_clean());
        assert!(handle.session().is_none());
        assert!(!handle.lease_held());
        assert_eq!(handle.power_state(), PowerState::Off);
    }

    #[test]
    fn test_power_off_is_graceful() {
        let robot = SimRobot::new();
        let mut lifecycle = RobotLifecycle::new(quick_config());
        lifecycle.start(&robot, "h", &Credentials::default()).unwrap();
        lifecycle.shutdown();
        assert!(robot.calls().contains(&spot_sdk::sim::SimCall::PowerOff {
            cut_immediately: false
        }));
    }

    #[test]
    fn test_unconfirmed_power_on_fails() {
        let robot = SimRobot::new();
        robot.set_power_on_stays_off(true);
        let mut lifecycle = RobotLifecycle::new(quick_config());
        let err = lifecycle.start(&robot, "h", &Credentials::default()).err();
        assert!(matches!(err, Some(LifecycleError::PowerOn(_))));
        assert_eq!(lifecycle.power_state(), PowerState::Off);
        // 未上电则不发断电
        assert_eq!(robot.count(SimStep::PowerOff), 0);
        assert_eq!(robot.count(SimStep::ReleaseLease), 1);
    }
}
