//! # Ranger Driver
//!
//! 松灵 Ranger 底盘的设备驱动层：
//!
//! - IO 线程管理（单线程 / 双线程模式）
//! - 反馈帧解码与状态聚合（`ArcSwap` 快照，无锁读取）
//! - 协议版本解析（主动查询 + 被动识别）
//! - 指令编码与限幅
//! - 连接监控、IO 指标与帧钩子
//!
//! 大多数用户应使用 `ranger-sdk` 提供的 `RangerRobot`。

mod builder;
pub mod clock;
pub mod command;
mod driver;
mod error;
pub mod heartbeat;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod version;

pub use builder::{DEFAULT_INTERFACE, RangerBuilder};
pub use clock::Timestamp;
pub use command::{CommandEncoder, LimitPolicy, MotionLimits};
pub use driver::RangerDriver;
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use hooks::{FrameCallback, HookManager};
pub use metrics::{MetricsSnapshot, RangerMetrics};
pub use pipeline::{FrameDisposition, PipelineConfig, io_loop, rx_loop, tx_loop};
pub use state::*;
pub use version::{ResolvePhase, VersionResolver};
