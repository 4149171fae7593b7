//! 灯光控制

use anyhow::Result;
use clap::Args;
use ranger_sdk::protocol::LightOperation;
use std::time::Duration;

use crate::session::{ConnectionArgs, wait_sent};

/// 解析灯光参数：`off` / `on` / `breath` / `custom:<0-100>` / `<0-100>`
pub fn parse_light(s: &str) -> Result<LightOperation, String> {
    let s = s.trim().to_ascii_lowercase();
    let brightness = match s.as_str() {
        "off" => return Ok(LightOperation::Off),
        "on" => return Ok(LightOperation::On),
        "breath" => return Ok(LightOperation::Breath),
        other => other.strip_prefix("custom:").unwrap_or(other),
    };
    let brightness: u8 = brightness
        .parse()
        .map_err(|_| format!("invalid light setting '{}'", s))?;
    LightOperation::custom(brightness).map_err(|e| e.to_string())
}

#[derive(Args, Debug)]
pub struct LightCommand {
    /// 前灯：off / on / breath / custom:<0-100>
    #[arg(long, value_parser = parse_light, default_value = "on")]
    pub front: LightOperation,

    /// 后灯：off / on / breath / custom:<0-100>
    #[arg(long, value_parser = parse_light, default_value = "on")]
    pub rear: LightOperation,

    /// 交还灯光控制权
    #[arg(long, conflicts_with_all = ["front", "rear"])]
    pub release: bool,
}

impl LightCommand {
    pub fn execute(&self, conn: &ConnectionArgs) -> Result<()> {
        let robot = conn.connect()?;
        let base = robot.get_metrics().tx_frames_total;

        if self.release {
            robot.disable_light_control()?;
            println!("已交还灯光控制权");
        } else {
            robot.set_light_command(self.front, self.rear)?;
            println!("前灯: {:?}, 后灯: {:?}", self.front, self.rear);
        }
        wait_sent(&robot, base + 1, Duration::from_millis(500));
        Ok(())
    }
}
