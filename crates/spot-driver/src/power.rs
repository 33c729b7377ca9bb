//! 电源状态定义
//!
//! 电源状态只由生命周期管理器驱动，指令分发器只读。

use std::sync::atomic::{AtomicU8, Ordering};

/// 机器人电源状态
///
/// # 状态转换
///
/// ```text
/// Off ──power_on()──▶ PoweringOn ──确认上电──▶ On
///  ▲                      │                      │
///  │                  失败回滚                shutdown
///  │                      ▼                      ▼
///  └──────────────── Off ◀──确认断电── PoweringOff
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PowerState {
    #[default]
    Off = 0,
    PoweringOn = 1,
    On = 2,
    PoweringOff = 3,
}

impl PowerState {
    /// 从 u8 转换
    ///
    /// 无效值按 Off 处理（宁可拒绝指令）。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::PoweringOn,
            2 => Self::On,
            3 => Self::PoweringOff,
            _ => Self::Off,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否允许发送运动指令
    pub fn accepts_commands(self) -> bool {
        self == Self::On
    }
}

/// 电源状态（原子版本，用于线程间共享）
#[derive(Debug, Default)]
pub struct AtomicPowerState {
    inner: AtomicU8,
}

impl AtomicPowerState {
    pub fn new(state: PowerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> PowerState {
        PowerState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: PowerState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    /// 比较并交换；当前值等于 `current` 时设置为 `new` 并返回 true
    pub fn transition(&self, current: PowerState, new: PowerState) -> bool {
        self.inner
            .compare_exchange(
                current.as_u8(),
                new.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_round_trip() {
        for state in [
            PowerState::Off,
            PowerState::PoweringOn,
            PowerState::On,
            PowerState::PoweringOff,
        ] {
            assert_eq!(PowerState::from_u8(state.as_u8()), state);
        }
        assert_eq!(PowerState::from_u8(200), PowerState::Off);
    }

    #[test]
    fn test_only_on_accepts_commands() {
        assert!(PowerState::On.accepts_commands());
        assert!(!PowerState::Off.accepts_commands());
        assert!(!PowerState::PoweringOn.accepts_commands());
        assert!(!PowerState::PoweringOff.accepts_commands());
    }

    #[test]
    fn test_atomic_transition() {
        let state = AtomicPowerState::default();
        assert_eq!(state.get(), PowerState::Off);
        assert!(state.transition(PowerState::Off, PowerState::PoweringOn));
        assert!(!state.transition(PowerState::Off, PowerState::On));
        state.set(PowerState::On);
        assert_eq!(state.get(), PowerState::On);
    }
}
