//! # Ranger SDK
//!
//! 松灵 Ranger 系列移动底盘（Ranger / Ranger Mini）的 CAN 控制 SDK。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`ranger-protocol`): 帧布局、指令编码、反馈解码、协议版本
//! - **CAN 层** (`ranger-can`): SocketCAN 与内存 Mock 总线
//! - **驱动层** (`ranger-driver`): IO 线程、状态聚合、版本解析、指标
//! - **SDK 层** (本 crate): `RangerRobot`、配置、日志初始化
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ranger_sdk::prelude::*;
//!
//! # fn main() -> Result<(), RangerError> {
//! ranger_sdk::init_logging();
//!
//! let mut robot = RangerRobot::new(false);
//! robot.connect("can0")?;
//! robot.enable_commanded_mode()?;
//! robot.set_motion_mode(MotionMode::DualAckermann)?;
//! robot.set_motion_command_default_angular(0.2, 0.1)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod robot;

pub mod prelude;

pub use config::{DEFAULT_VERSION_TIMEOUT, LimitOverrides, RangerConfig, VersionConfig};
pub use error::RangerError;
pub use robot::RangerRobot;

// 下层 crate 以模块路径暴露，供高级用户直接使用
pub use ranger_can as can;
pub use ranger_driver as driver;
pub use ranger_protocol as protocol;

/// 安装 `tracing` 订阅者
///
/// 过滤规则取自 `RUST_LOG`，未设置时为 `ranger=info`。重复调用无副作用。
pub fn init_logging() {
    init_logging_with("ranger=info");
}

/// 以指定的默认过滤规则安装订阅者（`RUST_LOG` 优先）
pub fn init_logging_with(default_directives: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
