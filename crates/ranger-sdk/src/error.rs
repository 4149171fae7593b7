//! 错误类型
//!
//! `RangerRobot` 对外只暴露 `RangerError`，下层错误通过 `From` 向上转换。

use ranger_driver::DriverError;
use ranger_protocol::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// SDK 层错误
#[derive(Error, Debug)]
pub enum RangerError {
    /// 打开 CAN 接口失败（接口不存在、未启动、权限不足等）
    #[error("Failed to connect to '{interface}': {source}")]
    Connection {
        interface: String,
        #[source]
        source: DriverError,
    },

    #[error("Already connected to '{0}'")]
    AlreadyConnected(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// 参数校验失败（同步返回，帧不会被发送）
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Driver error: {0}")]
    Driver(DriverError),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<DriverError> for RangerError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Validation(e) => RangerError::Validation(e),
            other => RangerError::Driver(other),
        }
    }
}

impl From<toml::de::Error> for RangerError {
    fn from(err: toml::de::Error) -> Self {
        RangerError::Config(err.to_string())
    }
}
