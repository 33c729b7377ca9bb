//! 进程内模拟机器人
//!
//! 实现全部 SDK trait，用于测试与无硬件演示：
//! - 每个步骤均可注入失败（`fail_at`）
//! - 所有调用按顺序记入 journal，测试据此断言获取/释放顺序与次数
//! - 状态流支持脚本模式（测试逐条推送）与实时模式（按指令积分位姿）

mod stream;

pub use stream::{LiveStream, ScriptedStream, StreamScript, planar_state};

use crate::{
    Connector, Credentials, EstopConfig, KeepAlive, MobilityCommand, RobotSession, SdkError,
    StateStream,
};
use parking_lot::Mutex;
use spot_msgs::SE3Pose;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, trace};

/// 可注入失败的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimStep {
    Connect,
    TimeSync,
    EstopCheck,
    AcquireLease,
    RegisterEstop,
    PowerOn,
    Stand,
    Command,
    PowerOff,
    ReleaseEstop,
    ReleaseLease,
    OpenStream,
    Disconnect,
}

/// journal 条目
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Connect { hostname: String },
    TimeSync,
    EstopCheck,
    AcquireLease { must_acquire: bool },
    RegisterEstop { name: String },
    PowerOn,
    Stand,
    Command {
        command: MobilityCommand,
        end_time: SystemTime,
    },
    PowerOff { cut_immediately: bool },
    ReleaseEstop,
    ReleaseLease,
    OpenStream,
    Disconnect,
}

impl SimCall {
    pub fn step(&self) -> SimStep {
        match self {
            SimCall::Connect { .. } => SimStep::Connect,
            SimCall::TimeSync => SimStep::TimeSync,
            SimCall::EstopCheck => SimStep::EstopCheck,
            SimCall::AcquireLease { .. } => SimStep::AcquireLease,
            SimCall::RegisterEstop { .. } => SimStep::RegisterEstop,
            SimCall::PowerOn => SimStep::PowerOn,
            SimCall::Stand => SimStep::Stand,
            SimCall::Command { .. } => SimStep::Command,
            SimCall::PowerOff { .. } => SimStep::PowerOff,
            SimCall::ReleaseEstop => SimStep::ReleaseEstop,
            SimCall::ReleaseLease => SimStep::ReleaseLease,
            SimCall::OpenStream => SimStep::OpenStream,
            SimCall::Disconnect => SimStep::Disconnect,
        }
    }
}

/// 模拟的机体状态
#[derive(Debug)]
struct Body {
    powered: bool,
    standing: bool,
    external_estop: bool,
    lease_held: bool,
    estop_registered: bool,
    /// 平面位姿 (x, y, yaw)
    pose: (f64, f64, f64),
    /// 当前速度指令及其失效时间
    velocity: Option<((f64, f64, f64), SystemTime)>,
    last_integration: Instant,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            powered: false,
            standing: false,
            external_estop: false,
            lease_held: false,
            estop_registered: false,
            pose: (0.0, 0.0, 0.0),
            velocity: None,
            last_integration: Instant::now(),
        }
    }
}

impl Body {
    /// 把速度指令积分到当前时刻
    fn integrate(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_integration).as_secs_f64();
        self.last_integration = now;

        let Some(((v_x, v_y, v_rot), end_time)) = self.velocity else {
            return;
        };
        if !(self.powered && self.standing) || SystemTime::now() > end_time {
            self.velocity = None;
            return;
        }

        let (x, y, yaw) = self.pose;
        self.pose = (
            x + (v_x * yaw.cos() - v_y * yaw.sin()) * dt,
            y + (v_x * yaw.sin() + v_y * yaw.cos()) * dt,
            yaw + v_rot * dt,
        );
    }
}

pub(crate) struct SimInner {
    expected_credentials: Mutex<Option<Credentials>>,
    failures: Mutex<HashMap<SimStep, SdkError>>,
    journal: Mutex<Vec<SimCall>>,
    body: Mutex<Body>,
    /// `power_on()` 返回成功但机器人仍未上电
    power_on_stays_off: AtomicBool,
    lease_revoked: AtomicBool,
    lease_taken_elsewhere: AtomicBool,
    script: Mutex<Option<crossbeam_channel::Receiver<stream::StreamEvent>>>,
    live_period: Mutex<Duration>,
    transient_error_rate: Mutex<f64>,
}

impl SimInner {
    fn record(&self, call: SimCall) {
        trace!("sim: {:?}", call);
        self.journal.lock().push(call);
    }

    fn check(&self, step: SimStep) -> Result<(), SdkError> {
        match self.failures.lock().get(&step) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn snapshot_pose(&self) -> SE3Pose {
        let mut body = self.body.lock();
        body.integrate();
        let (x, y, yaw) = body.pose;
        SE3Pose::planar(x, y, yaw)
    }

    pub(crate) fn live_period(&self) -> Duration {
        *self.live_period.lock()
    }

    pub(crate) fn transient_error_rate(&self) -> f64 {
        *self.transient_error_rate.lock()
    }
}

/// 模拟机器人（`Connector`）
///
/// 克隆共享同一台机器人，测试可在交给驱动之后继续注入故障、读取 journal。
///
/// # 示例
///
/// ```
/// use spot_sdk::sim::{SimRobot, SimStep};
/// use spot_sdk::{Connector, Credentials, RobotSession, SdkError};
///
/// let robot = SimRobot::new();
/// robot.fail_at(SimStep::TimeSync, SdkError::Rpc("no sync".into()));
/// let session = robot.connect("10.0.0.3", &Credentials::default()).unwrap();
/// assert!(session.wait_for_time_sync(std::time::Duration::from_secs(1)).is_err());
/// assert_eq!(robot.count(SimStep::Connect), 1);
/// ```
#[derive(Clone)]
pub struct SimRobot {
    inner: Arc<SimInner>,
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRobot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SimInner {
                expected_credentials: Mutex::new(None),
                failures: Mutex::new(HashMap::new()),
                journal: Mutex::new(Vec::new()),
                body: Mutex::new(Body::default()),
                power_on_stays_off: AtomicBool::new(false),
                lease_revoked: AtomicBool::new(false),
                lease_taken_elsewhere: AtomicBool::new(false),
                script: Mutex::new(None),
                live_period: Mutex::new(Duration::from_millis(20)),
                transient_error_rate: Mutex::new(0.0),
            }),
        }
    }

    /// 只接受指定凭据
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        *self.inner.expected_credentials.lock() = Some(credentials);
        self
    }

    /// 实时流的产出间隔
    pub fn with_live_period(self, period: Duration) -> Self {
        *self.inner.live_period.lock() = period;
        self
    }

    /// 实时流中每条记录以该概率变为瞬时读取错误
    pub fn with_transient_error_rate(self, rate: f64) -> Self {
        *self.inner.transient_error_rate.lock() = rate.clamp(0.0, 1.0);
        self
    }

    /// 在 `step` 注入失败
    pub fn fail_at(&self, step: SimStep, error: SdkError) {
        self.inner.failures.lock().insert(step, error);
    }

    pub fn clear_failure(&self, step: SimStep) {
        self.inner.failures.lock().remove(&step);
    }

    /// `power_on()` 成功返回但电源状态保持关闭
    pub fn set_power_on_stays_off(&self, value: bool) {
        self.inner.power_on_stays_off.store(value, Ordering::Release);
    }

    /// 模拟外部操作员按下/松开急停
    pub fn set_external_estop(&self, estopped: bool) {
        self.inner.body.lock().external_estop = estopped;
    }

    /// 模拟租约被其他客户端占用
    pub fn set_lease_taken_elsewhere(&self, taken: bool) {
        self.inner.lease_taken_elsewhere.store(taken, Ordering::Release);
    }

    /// 模拟租约被撤销
    pub fn revoke_lease(&self) {
        self.inner.lease_revoked.store(true, Ordering::Release);
        self.inner.body.lock().lease_held = false;
    }

    /// 切换为脚本流，返回推送端
    pub fn script_stream(&self) -> StreamScript {
        let (tx, rx) = crossbeam_channel::unbounded();
        *self.inner.script.lock() = Some(rx);
        StreamScript::new(tx)
    }

    /// 全部调用记录
    pub fn calls(&self) -> Vec<SimCall> {
        self.inner.journal.lock().clone()
    }

    /// 某一步骤被调用的次数
    pub fn count(&self, step: SimStep) -> usize {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|c| c.step() == step)
            .count()
    }

    /// 按调用顺序返回步骤序列
    pub fn steps(&self) -> Vec<SimStep> {
        self.inner.journal.lock().iter().map(SimCall::step).collect()
    }

    pub fn is_powered(&self) -> bool {
        self.inner.body.lock().powered
    }

    pub fn is_standing(&self) -> bool {
        self.inner.body.lock().standing
    }

    pub fn lease_held(&self) -> bool {
        self.inner.body.lock().lease_held
    }

    pub fn estop_registered(&self) -> bool {
        self.inner.body.lock().estop_registered
    }

    /// 当前积分位姿
    pub fn pose(&self) -> SE3Pose {
        self.inner.snapshot_pose()
    }
}

impl Connector for SimRobot {
    type Session = SimSession;

    fn connect(&self, hostname: &str, credentials: &Credentials) -> Result<SimSession, SdkError> {
        self.inner.record(SimCall::Connect {
            hostname: hostname.to_string(),
        });
        self.inner.check(SimStep::Connect)?;

        if let Some(expected) = self.inner.expected_credentials.lock().as_ref()
            && expected != credentials
        {
            return Err(SdkError::Authentication(format!(
                "invalid credentials for user '{}'",
                credentials.username
            )));
        }

        debug!("sim: session opened to {}", hostname);
        Ok(SimSession {
            inner: self.inner.clone(),
            hostname: hostname.to_string(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// 模拟会话
pub struct SimSession {
    inner: Arc<SimInner>,
    hostname: String,
    closed: Arc<AtomicBool>,
}

impl SimSession {
    fn ensure_open(&self) -> Result<(), SdkError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SdkError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl RobotSession for SimSession {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn wait_for_time_sync(&self, _timeout: Duration) -> Result<(), SdkError> {
        self.inner.record(SimCall::TimeSync);
        self.ensure_open()?;
        self.inner.check(SimStep::TimeSync)
    }

    fn is_estopped(&self) -> Result<bool, SdkError> {
        self.inner.record(SimCall::EstopCheck);
        self.ensure_open()?;
        self.inner.check(SimStep::EstopCheck)?;
        Ok(self.inner.body.lock().external_estop)
    }

    fn acquire_lease(&self, must_acquire: bool) -> Result<Arc<dyn KeepAlive>, SdkError> {
        self.inner.record(SimCall::AcquireLease { must_acquire });
        self.ensure_open()?;
        self.inner.check(SimStep::AcquireLease)?;

        if must_acquire && self.inner.lease_taken_elsewhere.load(Ordering::Acquire) {
            return Err(SdkError::Lease("lease is owned by another client".into()));
        }

        self.inner.lease_revoked.store(false, Ordering::Release);
        self.inner.body.lock().lease_held = true;
        Ok(Arc::new(SimKeepAlive {
            name: "body-lease".to_string(),
            kind: KeepAliveKind::Lease,
            inner: self.inner.clone(),
            active: AtomicBool::new(true),
        }))
    }

    fn register_estop(&self, config: &EstopConfig) -> Result<Arc<dyn KeepAlive>, SdkError> {
        self.inner.record(SimCall::RegisterEstop {
            name: config.name.clone(),
        });
        self.ensure_open()?;
        self.inner.check(SimStep::RegisterEstop)?;

        self.inner.body.lock().estop_registered = true;
        Ok(Arc::new(SimKeepAlive {
            name: config.name.clone(),
            kind: KeepAliveKind::Estop,
            inner: self.inner.clone(),
            active: AtomicBool::new(true),
        }))
    }

    fn power_on(&self, _timeout: Duration) -> Result<(), SdkError> {
        self.inner.record(SimCall::PowerOn);
        self.ensure_open()?;
        self.inner.check(SimStep::PowerOn)?;

        let mut body = self.inner.body.lock();
        if !body.lease_held {
            return Err(SdkError::Response("power on requires the body lease".into()));
        }
        if !body.estop_registered || body.external_estop {
            return Err(SdkError::Response("robot is E-Stopped".into()));
        }
        if !self.inner.power_on_stays_off.load(Ordering::Acquire) {
            body.powered = true;
        }
        Ok(())
    }

    fn is_powered_on(&self) -> Result<bool, SdkError> {
        self.ensure_open()?;
        Ok(self.inner.body.lock().powered)
    }

    fn power_off(&self, cut_immediately: bool, _timeout: Duration) -> Result<(), SdkError> {
        self.inner.record(SimCall::PowerOff { cut_immediately });
        self.ensure_open()?;
        self.inner.check(SimStep::PowerOff)?;

        let mut body = self.inner.body.lock();
        body.powered = false;
        body.standing = false;
        body.velocity = None;
        Ok(())
    }

    fn blocking_stand(&self, _timeout: Duration) -> Result<(), SdkError> {
        self.inner.record(SimCall::Stand);
        self.ensure_open()?;
        self.inner.check(SimStep::Stand)?;

        let mut body = self.inner.body.lock();
        if !body.powered {
            return Err(SdkError::Response("stand requires motor power".into()));
        }
        body.standing = true;
        Ok(())
    }

    fn robot_command(
        &self,
        command: &MobilityCommand,
        end_time: SystemTime,
    ) -> Result<(), SdkError> {
        self.inner.record(SimCall::Command {
            command: *command,
            end_time,
        });
        self.ensure_open()?;
        self.inner.check(SimStep::Command)?;

        let mut body = self.inner.body.lock();
        if !body.lease_held {
            return Err(SdkError::Lease("command issued without the body lease".into()));
        }
        if !body.powered {
            return Err(SdkError::Response("command issued while powered off".into()));
        }
        body.integrate();
        match *command {
            MobilityCommand::SynchroVelocity { v_x, v_y, v_rot } => {
                body.velocity = Some(((v_x, v_y, v_rot), end_time));
            },
        }
        Ok(())
    }

    fn open_state_stream(&self) -> Result<Box<dyn StateStream>, SdkError> {
        self.inner.record(SimCall::OpenStream);
        self.ensure_open()?;
        self.inner.check(SimStep::OpenStream)?;

        if let Some(rx) = self.inner.script.lock().take() {
            return Ok(Box::new(ScriptedStream::new(rx)));
        }
        Ok(Box::new(LiveStream::new(
            self.inner.clone(),
            self.closed.clone(),
        )))
    }

    fn disconnect(&self) -> Result<(), SdkError> {
        self.inner.record(SimCall::Disconnect);
        self.closed.store(true, Ordering::Release);
        self.inner.check(SimStep::Disconnect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeepAliveKind {
    Lease,
    Estop,
}

/// 模拟保活句柄
struct SimKeepAlive {
    name: String,
    kind: KeepAliveKind,
    inner: Arc<SimInner>,
    active: AtomicBool,
}

impl KeepAlive for SimKeepAlive {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        let revoked =
            self.kind == KeepAliveKind::Lease && self.inner.lease_revoked.load(Ordering::Acquire);
        self.active.load(Ordering::Acquire) && !revoked
    }

    fn shutdown(&self) -> Result<(), SdkError> {
        // 保活线程无论如何都会停止
        self.active.store(false, Ordering::Release);
        let step = match self.kind {
            KeepAliveKind::Lease => {
                self.inner.record(SimCall::ReleaseLease);
                SimStep::ReleaseLease
            },
            KeepAliveKind::Estop => {
                self.inner.record(SimCall::ReleaseEstop);
                SimStep::ReleaseEstop
            },
        };
        self.inner.check(step)?;

        let mut body = self.inner.body.lock();
        match self.kind {
            KeepAliveKind::Lease => body.lease_held = false,
            KeepAliveKind::Estop => body.estop_registered = false,
        }
        Ok(())
    }
}
