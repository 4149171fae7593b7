//! 运动模式切换

use anyhow::Result;
use clap::{Args, ValueEnum};
use ranger_sdk::protocol::MotionMode;
use std::time::Duration;

use crate::session::{ConnectionArgs, wait_sent};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// 双阿克曼
    DualAckermann,
    /// 斜移
    Parallel,
    /// 原地自旋
    Spinning,
    /// 横移（Mini V1 不支持）
    SideSlip,
}

impl From<ModeArg> for MotionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::DualAckermann => MotionMode::DualAckermann,
            ModeArg::Parallel => MotionMode::Parallel,
            ModeArg::Spinning => MotionMode::Spinning,
            ModeArg::SideSlip => MotionMode::SideSlip,
        }
    }
}

#[derive(Args, Debug)]
pub struct ModeCommand {
    #[arg(value_enum)]
    pub mode: ModeArg,
}

impl ModeCommand {
    pub fn execute(&self, conn: &ConnectionArgs) -> Result<()> {
        let robot = conn.connect()?;
        let base = robot.get_metrics().tx_frames_total;

        robot.enable_commanded_mode()?;
        robot.set_motion_mode(self.mode.into())?;
        wait_sent(&robot, base + 2, Duration::from_millis(500));

        println!("运动模式: {:?}", MotionMode::from(self.mode));
        Ok(())
    }
}
