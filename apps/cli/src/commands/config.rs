//! 配置管理命令
//!
//! 用于管理 CLI 配置（机器人地址、本体帧名、用户名）。密码从不写入配置文件。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`<config_dir>/spot/config.toml`
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("spot");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置文件路径（`--config` 优先）
pub fn resolve_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_file(),
    }
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 机器人地址
    pub hostname: Option<String>,

    /// 机器人本体帧名
    pub robot_frame: Option<String>,

    /// 登录用户名
    pub username: Option<String>,
}

impl CliConfig {
    /// 加载配置；文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let content = format!("# Spot CLI Configuration\n\n{}", toml::to_string(self)?);
        fs::write(path, content).context("写入配置文件失败")?;
        Ok(())
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 机器人地址
        #[arg(long)]
        hostname: Option<String>,

        /// 机器人本体帧名
        #[arg(long)]
        robot_frame: Option<String>,

        /// 登录用户名
        #[arg(long)]
        username: Option<String>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（hostname / robot_frame / username / all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                hostname,
                robot_frame,
                username,
            } => Self::set_(path, hostname, robot_frame, username),

            ConfigCommand::Get { key } => Self::get_(path, &key),

            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    fn set_(
        path: &Path,
        hostname: Option<String>,
        robot_frame: Option<String>,
        username: Option<String>,
    ) -> Result<()> {
        let mut config = CliConfig::load(path)?;

        if hostname.is_none() && robot_frame.is_none() && username.is_none() {
            anyhow::bail!("至少需要一个配置项（--hostname / --robot-frame / --username）");
        }
        if let Some(hostname) = hostname {
            println!("✅ 设置机器人地址: {}", hostname);
            config.hostname = Some(hostname);
        }
        if let Some(frame) = robot_frame {
            println!("✅ 设置本体帧名: {}", frame);
            config.robot_frame = Some(frame);
        }
        if let Some(username) = username {
            println!("✅ 设置用户名: {}", username);
            config.username = Some(username);
        }

        config.save(path)
    }

    fn get_(path: &Path, key: &str) -> Result<()> {
        let config = CliConfig::load(path)?;
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "(未设置)".into());

        match key {
            "hostname" => println!("{}", show(&config.hostname)),
            "robot_frame" | "robot-frame" => println!("{}", show(&config.robot_frame)),
            "username" => println!("{}", show(&config.username)),
            "all" => {
                println!("Spot CLI 配置 ({}):", path.display());
                println!("  hostname:    {}", show(&config.hostname));
                println!("  robot_frame: {}", show(&config.robot_frame));
                println!("  username:    {}", show(&config.username));
            },
            other => anyhow::bail!("未知配置项: {}", other),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = CliConfig {
            hostname: Some("10.0.0.3".into()),
            robot_frame: None,
            username: Some("admin".into()),
        };
        config.save(&path).unwrap();
        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "robot_frame = \"body\"\n").unwrap();
        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.robot_frame.as_deref(), Some("body"));
        assert!(config.hostname.is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "hostname = [").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }
}
