//! 子命令定义和实现

pub mod config;
pub mod drive;
pub mod info;
pub mod light;
pub mod mode;
pub mod monitor;

pub use config::ConfigCommand;
pub use drive::DriveCommand;
pub use info::InfoCommand;
pub use light::LightCommand;
pub use mode::ModeCommand;
pub use monitor::MonitorCommand;
