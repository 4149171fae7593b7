//! 连接并打印底盘信息

use anyhow::Result;
use clap::Args;
use ranger_sdk::RangerError;
use std::time::Duration;

use crate::session::ConnectionArgs;

#[derive(Args, Debug)]
pub struct InfoCommand {
    /// 版本查询超时（毫秒），缺省取配置
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl InfoCommand {
    pub fn execute(&self, conn: &ConnectionArgs) -> Result<()> {
        let robot = conn.connect()?;
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| robot.config().version.request_timeout());

        println!("车型:       {:?}", robot.variant());
        println!("接口:       {}", robot.interface().unwrap_or("-"));

        if robot.request_version(timeout)? {
            println!("协议版本:   {}", robot.get_parser_protocol_version());
            if let Some(firmware) = robot.get_firmware_versions() {
                println!("固件版本:   {}", firmware);
            }
        } else {
            println!("协议版本:   未收到应答（{:?}）", timeout);
        }

        match robot.wait_for_feedback(Duration::from_secs(1)) {
            Ok(()) => {
                let state = robot.get_robot_state();
                let system = state.system_state;
                println!("车体状态:   {:?}", system.vehicle_state);
                println!("控制模式:   {:?}", system.control_mode);
                println!("电池电压:   {:.1} V", system.battery_voltage);
                println!("故障码:     0x{:04X}", system.error_code);
                println!("解析版本:   {}", robot.get_parser_protocol_version());
            },
            Err(RangerError::Timeout(t)) => println!("状态反馈:   {:?} 内无反馈", t),
            Err(e) => return Err(e.into()),
        }

        let metrics = robot.get_metrics();
        println!(
            "收发统计:   rx {} (有效 {}, 错误 {}), tx {}",
            metrics.rx_frames_total,
            metrics.rx_frames_valid,
            metrics.rx_parse_errors,
            metrics.tx_frames_total
        );
        Ok(())
    }
}
