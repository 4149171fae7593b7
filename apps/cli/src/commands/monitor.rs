//! 周期打印底盘状态

use anyhow::{Result, ensure};
use clap::Args;
use ranger_sdk::RangerRobot;
use ranger_sdk::can::RangerFrame;
use ranger_sdk::driver::FrameCallback;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::session::ConnectionArgs;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 更新频率（Hz）
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u32,

    /// 同时打印每一帧原始数据
    #[arg(long)]
    pub raw: bool,
}

/// 原始帧打印
struct RawPrinter;

impl FrameCallback for RawPrinter {
    fn on_frame_received(&self, frame: &RangerFrame) {
        println!("  rx 0x{:03X} [{}] {}", frame.id, frame.len, hex::encode(frame.data_slice()));
    }
}

pub fn format_status(robot: &RangerRobot) -> String {
    let core = robot.get_robot_state();
    let actuator = robot.get_actuator_state();
    let bms = robot.get_common_sensor_state().bms_basic_state;

    format!(
        "[{}] {:?}/{:?} {:.1}V err=0x{:04X} | v={:.3} w={:.3} steer={:.3} mode={:?} | \
         odom L={:.3} R={:.3} | wheels {:?} | soc={}%",
        core.timestamp,
        core.system_state.vehicle_state,
        core.system_state.control_mode,
        core.system_state.battery_voltage,
        core.system_state.error_code,
        core.motion_state.linear_velocity,
        core.motion_state.angular_velocity,
        core.motion_state.steering_angle,
        core.motion_mode_state.motion_mode,
        core.odometry.left_wheel,
        core.odometry.right_wheel,
        *actuator.motor_speeds,
        bms.battery_soc,
    )
}

impl MonitorCommand {
    pub fn execute(&self, conn: &ConnectionArgs) -> Result<()> {
        ensure!(
            (1..=100).contains(&self.frequency),
            "frequency must be within 1..=100 Hz"
        );

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
            println!("\n收到退出信号，正在关闭...");
        })?;

        let robot = conn.connect()?;
        if self.raw {
            robot.add_frame_callback(Arc::new(RawPrinter))?;
        }

        let period = Duration::from_secs_f64(1.0 / self.frequency as f64);
        println!("按 Ctrl-C 退出");
        while running.load(Ordering::SeqCst) {
            if robot.is_connected() {
                println!("{}", format_status(&robot));
            } else {
                println!("等待反馈...");
            }
            spin_sleep::sleep(period);
        }

        let metrics = robot.get_metrics();
        println!(
            "rx {} 帧，有效率 {:.1}%",
            metrics.rx_frames_total,
            metrics.valid_frame_rate()
        );
        Ok(())
    }
}
