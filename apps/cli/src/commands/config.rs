//! 配置管理命令
//!
//! 配置文件位于 `<config_dir>/ranger/config.toml`：
//!
//! ```toml
//! [robot]
//! interface = "can0"
//! mini_v1 = false
//!
//! # 以下各段与 SDK 的 RangerConfig 相同，[limits] 中省略的字段按车型取出厂限值
//! [limits]
//! max_linear_vel = 1.0
//!
//! [version]
//! request_timeout_ms = 3000
//! ```

use anyhow::{Context, Result};
use clap::Subcommand;
use ranger_sdk::driver::{DEFAULT_INTERFACE, PipelineConfig};
use ranger_sdk::{LimitOverrides, RangerConfig, VersionConfig};
use ranger_sdk::protocol::VehicleVariant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("ranger");
    Ok(path)
}

pub fn default_config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotSection {
    /// 默认 CAN 接口
    pub interface: Option<String>,
    pub mini_v1: bool,
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub robot: RobotSection,
    #[serde(skip_serializing_if = "LimitOverrides::is_empty")]
    pub limits: LimitOverrides,
    pub pipeline: PipelineConfig,
    pub version: VersionConfig,
}

impl CliConfig {
    /// 读取配置，文件不存在时返回默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content).context("写入配置文件失败")?;
        Ok(())
    }

    pub fn interface(&self) -> &str {
        self.robot.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }

    /// 转换为 SDK 配置并校验
    pub fn to_ranger_config(&self, is_mini_v1: bool) -> Result<RangerConfig> {
        let variant = VehicleVariant::from_mini_v1_flag(is_mini_v1);
        let config = RangerConfig {
            limits: self.limits.resolve(variant),
            pipeline: self.pipeline.clone(),
            version: self.version.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认 CAN 接口名称（如 can0）
        #[arg(long)]
        can: Option<String>,

        /// 是否为 Ranger Mini V1
        #[arg(long)]
        mini: Option<bool>,
    },

    /// 显示生效的配置
    Show,

    /// 打印配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set { can, mini } => Self::set_(path, can, mini),
            ConfigCommand::Show => Self::show_(path),
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    fn set_(path: &Path, interface: Option<String>, mini_v1: Option<bool>) -> Result<()> {
        let mut config = CliConfig::load_from(path)?;

        if let Some(iface) = interface {
            println!("设置默认接口: {}", iface);
            config.robot.interface = Some(iface);
        }
        if let Some(mini) = mini_v1 {
            println!("设置车型: {}", if mini { "Ranger Mini V1" } else { "Ranger" });
            config.robot.mini_v1 = mini;
        }

        config.save_to(path)?;
        println!("已保存到 {}", path.display());
        Ok(())
    }

    fn show_(path: &Path) -> Result<()> {
        let config = CliConfig::load_from(path)?;
        let effective = config.to_ranger_config(config.robot.mini_v1)?;

        println!("# {}", path.display());
        println!("[robot]");
        println!("interface = {:?}", config.interface());
        println!("mini_v1 = {}", config.robot.mini_v1);
        println!();
        print!("{}", effective.to_toml_string()?);
        Ok(())
    }
}
