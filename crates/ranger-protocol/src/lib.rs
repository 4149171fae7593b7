//! # Ranger Protocol
//!
//! 松灵 Ranger 系列底盘 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义
//! - `feedback`: 反馈帧解析（V2 与旧版 V1 布局）
//! - `control`: 控制帧构建
//! - `version`: 协议版本与版本查询应答
//! - `validation`: 指令参数校验错误
//!
//! ## 字节序
//!
//! 协议使用 Motorola (MSB) 高位在前（大端字节序）。
//! 本模块提供了字节序转换工具函数。

pub mod control;
pub mod feedback;
pub mod ids;
pub mod validation;
pub mod version;

// 重新导出常用类型
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use validation::ValidationError;
pub use version::*;

/// CAN 2.0 标准帧的统一抽象
///
/// `RangerFrame` 是协议层和硬件层之间的中间抽象：协议层通过
/// `TryFrom<RangerFrame>` 解析、通过 `to_frame()` 构建，CAN 层负责与
/// SocketCAN 等后端的帧类型互转。
///
/// ```text
/// Protocol Layer (ranger-protocol)
///     ↓ TryFrom<RangerFrame> 解析 / new_standard() 构建
/// RangerFrame (此类型)
///     ↓ 转换逻辑在 CAN 层实现
/// CAN Layer (ranger-can)
///     ↓ SocketCAN / Mock 适配器
/// Hardware
/// ```
///
/// # 转换示例
///
/// ```rust
/// use ranger_protocol::RangerFrame;
///
/// let frame = RangerFrame::new_standard(0x111, &[1, 2, 3, 4]);
/// assert_eq!(frame.id(), 0x111);
/// assert_eq!(frame.data_slice(), &[1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangerFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 硬件时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl RangerFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }

    /// 校验帧 ID 与最小数据长度，供各反馈帧解析复用
    pub(crate) fn expect(&self, id: u32, min_len: usize) -> Result<(), ProtocolError> {
        if self.id != id {
            return Err(ProtocolError::InvalidCanId { id: self.id });
        }
        if (self.len as usize) < min_len {
            return Err(ProtocolError::InvalidLength {
                expected: min_len,
                actual: self.len as usize,
            });
        }
        Ok(())
    }
}

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

// 字节序转换工具函数（Motorola 大端）

/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// 大端字节序转 i16
pub fn bytes_to_i16_be(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// i16 转大端字节序
pub fn i16_to_bytes_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

/// 将物理量按比例缩放并饱和到 i16 原始值
///
/// 超出 i16 表示范围的值会被截断到边界，NaN 映射为 0。
pub fn scale_to_i16(value: f64, scale: f64) -> i16 {
    let raw = (value * scale).round();
    if raw.is_nan() {
        0
    } else {
        raw.clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}
