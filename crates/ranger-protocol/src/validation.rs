//! 指令参数与状态赋值的校验错误

use thiserror::Error;

/// 校验错误
///
/// 在调用点同步返回给调用者，不会进入后台 IO 线程。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 固定长度集合的长度不符（执行器数组必须恰好 4 个元素）
    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// 参数超出允许范围
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// 参数不是有限值（NaN 或无穷大）
    #[error("{field} is not a finite number: {value}")]
    NotFinite { field: &'static str, value: f64 },

    /// 未知的枚举原始值
    #[error("Unknown {kind} value: {value}")]
    UnknownEnumValue { kind: &'static str, value: u8 },

    /// 当前车型不支持该操作
    #[error("Unsupported on this vehicle: {0}")]
    Unsupported(String),
}
