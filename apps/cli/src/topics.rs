//! JSON-lines 话题传输
//!
//! 每行一个 [`Envelope`]：`{"topic": "/tf", "data": {...}}`。
//! 标准输出只承载数据，日志一律写到标准错误。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spot_driver::TransformSink;
use spot_msgs::TransformStamped;
use std::io::{self, Write};

/// 速度指令输入
pub const CMD_VEL: &str = "/cmd_vel";
/// 导航目标输入
pub const GOAL_POSE: &str = "/goal_pose";
/// 动态变换
pub const TF: &str = "/tf";
/// 静态变换
pub const TF_STATIC: &str = "/tf_static";
/// 转发给动作服务端的目标
pub const MOVE_RELATIVE_XY_GOAL: &str = "move_relative_xy/goal";

/// 一行消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(topic: &str, data: &T) -> Result<Self> {
        Ok(Self {
            topic: topic.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// 解析一行输入；空行返回 `None`
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let envelope = serde_json::from_str(line)
            .with_context(|| format!("invalid message line: {}", line))?;
        Ok(Some(envelope))
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        serde_json::from_value(self.data)
            .with_context(|| format!("invalid payload for topic {}", self.topic))
    }
}

/// 写一行到标准输出并立即 flush
pub fn emit<T: Serialize>(topic: &str, data: &T) -> Result<()> {
    let line = serde_json::to_string(&Envelope::new(topic, data)?)?;
    let mut out = io::stdout().lock();
    writeln!(out, "{}", line)?;
    out.flush()?;
    Ok(())
}

/// 把变换写到标准输出的 `/tf` 话题
#[derive(Debug, Default)]
pub struct StdoutTfSink;

impl TransformSink for StdoutTfSink {
    type Error = anyhow::Error;

    fn send_transform(&mut self, transform: TransformStamped) -> Result<()> {
        emit(TF, &transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_msgs::Twist;

    #[test]
    fn test_parse_twist_line() {
        let line = r#"{"topic":"/cmd_vel","data":{"linear":{"x":0.3,"y":0.0,"z":0.0},"angular":{"x":0.0,"y":0.0,"z":0.1}}}"#;
        let envelope = Envelope::parse_line(line).unwrap().unwrap();
        assert_eq!(envelope.topic, CMD_VEL);
        let twist: Twist = envelope.decode().unwrap();
        assert_eq!(twist.linear.x, 0.3);
        assert_eq!(twist.angular.z, 0.1);
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(Envelope::parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_garbage_line_is_error() {
        assert!(Envelope::parse_line("not json").is_err());
    }

    #[test]
    fn test_wrong_payload_is_error() {
        let envelope = Envelope::parse_line(r#"{"topic":"/cmd_vel","data":42}"#)
            .unwrap()
            .unwrap();
        assert!(envelope.decode::<Twist>().is_err());
    }
}
