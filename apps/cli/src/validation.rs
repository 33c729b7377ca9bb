//! 输入验证模块
//!
//! 解析并校验命令行中的结构化参数

use anyhow::{Context, Result};
use spot_msgs::{Header, Quaternion, Time, Transform, TransformStamped, Vector3};
use spot_sdk::sim::SimStep;

/// 解析静态变换 `parent,child,x,y,yaw`
///
/// # 错误
/// 字段数量不是 5、帧名为空或数值无效时返回错误
pub fn parse_static_tf(arg: &str) -> Result<TransformStamped> {
    let fields: Vec<&str> = arg.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        anyhow::bail!(
            "静态变换需要 5 个字段 parent,child,x,y,yaw，得到 {} 个: {}",
            fields.len(),
            arg
        );
    }
    let (parent, child) = (fields[0], fields[1]);
    if parent.is_empty() || child.is_empty() {
        anyhow::bail!("静态变换的帧名不能为空: {}", arg);
    }

    let mut values = [0.0f64; 3];
    for (value, field) in values.iter_mut().zip(&fields[2..]) {
        *value = field
            .parse()
            .with_context(|| format!("无效的数值 '{}' ({})", field, arg))?;
        if !value.is_finite() {
            anyhow::bail!("数值必须有限: {}", arg);
        }
    }
    let [x, y, yaw] = values;

    Ok(TransformStamped {
        header: Header::new(parent, Time::now()),
        child_frame_id: child.to_string(),
        transform: Transform {
            translation: Vector3::new(x, y, 0.0),
            rotation: Quaternion::from_yaw(yaw),
        },
    })
}

/// 解析模拟机器人的故障注入步骤
pub fn parse_sim_step(name: &str) -> Result<SimStep> {
    let step = match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "connect" => SimStep::Connect,
        "time-sync" => SimStep::TimeSync,
        "estop-check" => SimStep::EstopCheck,
        "lease" => SimStep::AcquireLease,
        "estop" => SimStep::RegisterEstop,
        "power-on" => SimStep::PowerOn,
        "stand" => SimStep::Stand,
        "stream" => SimStep::OpenStream,
        other => anyhow::bail!(
            "未知的步骤 '{}'（可选: connect, time-sync, estop-check, lease, estop, power-on, stand, stream）",
            other
        ),
    };
    Ok(step)
}

/// 校验发布频率
pub fn validate_rate(rate_hz: f64) -> Result<f64> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 || rate_hz > 1000.0 {
        anyhow::bail!("发布频率 {} Hz 超出范围 (0, 1000]", rate_hz);
    }
    Ok(rate_hz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_msgs::yaw_from_quaternion;

    #[test]
    fn test_parse_static_tf() {
        let tf = parse_static_tf("map, odom, 1.5, -2, 0.5").unwrap();
        assert_eq!(tf.header.frame_id, "map");
        assert_eq!(tf.child_frame_id, "odom");
        assert_eq!(tf.transform.translation.x, 1.5);
        assert_eq!(tf.transform.translation.y, -2.0);
        assert!((yaw_from_quaternion(&tf.transform.rotation) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_static_tf_rejects_bad_input() {
        assert!(parse_static_tf("map,odom,1,2").is_err());
        assert!(parse_static_tf(",odom,1,2,3").is_err());
        assert!(parse_static_tf("map,odom,1,abc,3").is_err());
        assert!(parse_static_tf("map,odom,1,inf,3").is_err());
    }

    #[test]
    fn test_parse_sim_step() {
        assert_eq!(parse_sim_step("lease").unwrap(), SimStep::AcquireLease);
        assert_eq!(parse_sim_step("POWER_ON").unwrap(), SimStep::PowerOn);
        assert_eq!(parse_sim_step("time-sync").unwrap(), SimStep::TimeSync);
        assert!(parse_sim_step("dance").is_err());
    }

    #[test]
    fn test_validate_rate() {
        assert_eq!(validate_rate(10.0).unwrap(), 10.0);
        assert!(validate_rate(0.0).is_err());
        assert!(validate_rate(f64::NAN).is_err());
    }
}
