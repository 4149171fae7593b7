//! # Ranger CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN 接口抽象。
//!
//! - Linux: `SocketCanAdapter`（可分离为 RX/TX 两个适配器）
//! - 所有平台（`mock` feature）: `MockCanAdapter`，内存总线，用于测试与演示

use std::time::Duration;
use thiserror::Error;

// 重新导出 ranger-protocol 中的 RangerFrame
pub use ranger_protocol::RangerFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(target_os = "linux")]
pub use socketcan::split::{SocketCanRxAdapter, SocketCanTxAdapter};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCanAdapter, MockCanHandle, MockRxAdapter, MockTxAdapter};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

impl CanError {
    /// 错误是否意味着总线已不可用（接收循环应退出）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            CanError::BufferOverflow | CanError::BusOff => true,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    /// 接口不存在
    NotFound,
    /// 设备已断开
    NoDevice,
    /// 权限不足
    AccessDenied,
    /// 设备被占用
    Busy,
    /// 接口存在但未启动（DOWN）
    NotUp,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NoDevice
                | CanDeviceErrorKind::AccessDenied
                | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// 单线程 CAN 适配器
pub trait CanAdapter {
    /// 发送帧（Fire-and-Forget）
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError>;

    /// 接收帧，超过读超时返回 `CanError::Timeout`
    fn receive(&mut self) -> Result<RangerFrame, CanError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    fn receive_timeout(&mut self, timeout: Duration) -> Result<RangerFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    fn try_receive(&mut self) -> Result<Option<RangerFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 只读适配器（RX 线程持有）
pub trait RxAdapter {
    fn receive(&mut self) -> Result<RangerFrame, CanError>;
}

/// 只写适配器（TX 线程持有）
pub trait TxAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError>;
}

/// 可分离为独立 RX/TX 适配器的 CAN 适配器
pub trait SplittableAdapter: CanAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_fatal_kinds() {
        assert!(CanDeviceError::new(CanDeviceErrorKind::NotFound, "x").is_fatal());
        assert!(CanDeviceError::new(CanDeviceErrorKind::AccessDenied, "x").is_fatal());
        assert!(!CanDeviceError::new(CanDeviceErrorKind::Busy, "x").is_fatal());
        assert!(!CanDeviceError::from("plain message").is_fatal());
    }

    #[test]
    fn test_can_error_fatal() {
        assert!(CanError::BusOff.is_fatal());
        assert!(CanError::BufferOverflow.is_fatal());
        assert!(!CanError::Timeout.is_fatal());
        let err: CanError = CanDeviceError::new(CanDeviceErrorKind::NoDevice, "gone").into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_device_error_display() {
        let err = CanDeviceError::new(CanDeviceErrorKind::NotFound, "can9 missing");
        assert_eq!(err.to_string(), "NotFound: can9 missing");
        let err = CanError::from(err);
        assert_eq!(err.to_string(), "Device Error: NotFound: can9 missing");
    }
}
