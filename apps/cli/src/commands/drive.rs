//! 定时运动指令
//!
//! 以固定频率重复发送同一条运动指令，结束（或 Ctrl-C）后发送零速指令。

use anyhow::{Result, ensure};
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use super::mode::ModeArg;
use crate::session::{ConnectionArgs, wait_sent};

#[derive(Args, Debug)]
pub struct DriveCommand {
    /// 线速度（m/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub linear: f64,

    /// 转向角（rad）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub steer: f64,

    /// 角速度（rad/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub angular: f64,

    /// 持续时间（秒）
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,

    /// 发送频率（Hz）
    #[arg(short, long, default_value_t = 20)]
    pub rate: u32,

    /// 发送前切换运动模式
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,
}

impl DriveCommand {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.duration.is_finite() && self.duration > 0.0,
            "duration must be a positive number of seconds"
        );
        ensure!((1..=200).contains(&self.rate), "rate must be within 1..=200 Hz");
        Ok(())
    }

    pub fn execute(&self, conn: &ConnectionArgs) -> Result<()> {
        self.validate()?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })?;

        let robot = conn.connect()?;
        robot.enable_commanded_mode()?;
        if let Some(mode) = self.mode {
            robot.set_motion_mode(mode.into())?;
        }

        let period = Duration::from_secs_f64(1.0 / self.rate as f64);
        let duration = Duration::from_secs_f64(self.duration);
        info!(
            "Driving linear={} steer={} angular={} for {:?}",
            self.linear, self.steer, self.angular, duration
        );

        let start = Instant::now();
        let mut sent = 0u64;
        while running.load(Ordering::SeqCst) && start.elapsed() < duration {
            robot.set_motion_command(self.linear, self.steer, self.angular)?;
            sent += 1;
            spin_sleep::sleep(period);
        }

        let base = robot.get_metrics().tx_frames_total;
        robot.set_motion_command(0.0, 0.0, 0.0)?;
        wait_sent(&robot, base + 1, Duration::from_millis(500));

        let state = robot.get_robot_state();
        println!(
            "已发送 {} 条指令，用时 {:.2}s；当前线速度 {:.3} m/s",
            sent,
            start.elapsed().as_secs_f64(),
            state.motion_state.linear_velocity
        );
        Ok(())
    }
}
