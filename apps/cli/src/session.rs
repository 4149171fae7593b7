//! 连接建立
//!
//! 每个子命令独立执行：读取配置、合并命令行覆盖项、连接底盘。

use anyhow::{Context, Result};
use clap::Args;
use ranger_sdk::RangerRobot;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::commands::config::{CliConfig, default_config_file};

/// 所有子命令共享的连接参数
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// CAN 接口（覆盖配置）
    #[arg(short, long, global = true)]
    pub interface: Option<String>,

    /// 按 Ranger Mini V1 处理（覆盖配置）
    #[arg(long, global = true)]
    pub mini_v1: bool,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => default_config_file(),
        }
    }

    pub fn load_config(&self) -> Result<CliConfig> {
        CliConfig::load_from(&self.config_path()?)
    }

    /// 命令行参数优先于配置文件
    pub fn resolve(&self, config: &CliConfig) -> (String, bool) {
        let interface = self
            .interface
            .clone()
            .unwrap_or_else(|| config.interface().to_string());
        let mini_v1 = self.mini_v1 || config.robot.mini_v1;
        (interface, mini_v1)
    }

    pub fn connect(&self) -> Result<RangerRobot> {
        let config = self.load_config()?;
        let (interface, mini_v1) = self.resolve(&config);
        let ranger_config = config.to_ranger_config(mini_v1)?;
        debug!("Effective config: {:?}", ranger_config);

        println!("连接到 {} ...", interface);
        let mut robot = RangerRobot::with_config(mini_v1, ranger_config);
        robot
            .connect(&interface)
            .with_context(|| format!("无法连接到 {}", interface))?;
        Ok(robot)
    }
}

/// 等待累计发送帧数达到 `target`
///
/// 命令是异步入队的，进程退出前需要确认它们已经写到总线上。
pub fn wait_sent(robot: &RangerRobot, target: u64, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while robot.get_metrics().tx_frames_total < target {
        if Instant::now() >= deadline {
            warn!(
                "Only {} of {} frames sent before timeout",
                robot.get_metrics().tx_frames_total,
                target
            );
            return false;
        }
        spin_sleep::sleep(Duration::from_millis(1));
    }
    true
}
