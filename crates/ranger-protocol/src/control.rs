//! 控制帧结构体定义
//!
//! 包含所有控制指令的结构体，提供构建控制帧的方法，
//! 以及控制指令与反馈帧共用的枚举类型。

use crate::validation::ValidationError;
use crate::{
    RangerFrame, i16_to_bytes_be,
    ids::{
        ID_CONTROL_MODE_COMMAND, ID_LIGHT_COMMAND, ID_MOTION_COMMAND, ID_MOTION_MODE_COMMAND,
        ID_STATE_RESET_COMMAND, ID_VERSION_REQUEST,
    },
    scale_to_i16,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ============================================================================
// 车型与枚举类型定义
// ============================================================================

/// 车型变体
///
/// Mini V1 是较早的硬件版本：转向角正方向与标准车型相反，且不支持横移模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleVariant {
    /// 标准 Ranger / Ranger Mini V2+
    #[default]
    Standard,
    /// Ranger Mini V1
    MiniV1,
}

impl VehicleVariant {
    /// 根据 `is_mini_v1` 标志选择车型
    pub fn from_mini_v1_flag(is_mini_v1: bool) -> Self {
        if is_mini_v1 {
            VehicleVariant::MiniV1
        } else {
            VehicleVariant::Standard
        }
    }

    /// 转向角在线缆上的符号（Mini V1 取反）
    pub fn steering_sign(self) -> f64 {
        match self {
            VehicleVariant::Standard => 1.0,
            VehicleVariant::MiniV1 => -1.0,
        }
    }

    /// 该车型是否支持指定的运动模式
    pub fn supports(self, mode: MotionMode) -> bool {
        !(self == VehicleVariant::MiniV1 && mode == MotionMode::SideSlip)
    }
}

/// 运动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MotionMode {
    /// 双阿克曼（前后轮反向转向）
    #[default]
    DualAckermann = 0x00,
    /// 斜移（四轮同向转向）
    Parallel = 0x01,
    /// 原地自旋
    Spinning = 0x02,
    /// 横移
    SideSlip = 0x03,
}

impl MotionMode {
    /// 从原始值解析，未知值返回 `UnknownEnumValue`
    pub fn from_raw(value: u8) -> Result<Self, ValidationError> {
        Self::try_from(value).map_err(|_| ValidationError::UnknownEnumValue {
            kind: "motion mode",
            value,
        })
    }
}

/// 灯光模式原始值
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum LightMode {
    /// 常关
    Off = 0x00,
    /// 常开
    On = 0x01,
    /// 呼吸
    Breath = 0x02,
    /// 自定义亮度
    Custom = 0x03,
}

/// 自定义亮度上限（百分比）
pub const MAX_LIGHT_BRIGHTNESS: u8 = 100;

/// 灯光操作
///
/// 亮度只对 `Custom` 有意义，因此作为该变体的负载，
/// 其它模式不携带亮度值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightOperation {
    #[default]
    Off,
    On,
    Breath,
    /// 自定义亮度（0-100）
    Custom { brightness: u8 },
}

impl LightOperation {
    /// 从线缆上的 (mode, value) 原始值构造
    ///
    /// # 错误
    /// - `UnknownEnumValue`: 未知灯光模式
    /// - `OutOfRange`: 自定义亮度超过 100
    pub fn from_raw(mode: u8, value: u8) -> Result<Self, ValidationError> {
        let mode = LightMode::try_from(mode).map_err(|_| ValidationError::UnknownEnumValue {
            kind: "light mode",
            value: mode,
        })?;
        match mode {
            LightMode::Off => Ok(LightOperation::Off),
            LightMode::On => Ok(LightOperation::On),
            LightMode::Breath => Ok(LightOperation::Breath),
            LightMode::Custom => Self::custom(value),
        }
    }

    /// 自定义亮度，超过 100 返回 `OutOfRange`
    pub fn custom(brightness: u8) -> Result<Self, ValidationError> {
        if brightness > MAX_LIGHT_BRIGHTNESS {
            return Err(ValidationError::OutOfRange {
                field: "brightness",
                value: brightness as f64,
                min: 0.0,
                max: MAX_LIGHT_BRIGHTNESS as f64,
            });
        }
        Ok(LightOperation::Custom { brightness })
    }

    /// 转换为 (mode, value) 原始值，非自定义模式的 value 为 0
    pub fn to_raw(self) -> (u8, u8) {
        match self {
            LightOperation::Off => (LightMode::Off.into(), 0),
            LightOperation::On => (LightMode::On.into(), 0),
            LightOperation::Breath => (LightMode::Breath.into(), 0),
            LightOperation::Custom { brightness } => (LightMode::Custom.into(), brightness),
        }
    }
}

// ============================================================================
// 运动控制指令
// ============================================================================

/// 运动控制指令 (0x111)
///
/// - Byte 0-1: 线速度，单位 mm/s
/// - Byte 2-3: 角速度，单位 0.001 rad/s
/// - Byte 4-5: 横向速度，单位 mm/s
/// - Byte 6-7: 转向角，单位 0.001 rad
///
/// 该帧不带滚动计数，相同参数总是编码为相同的字节。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionCommandFrame {
    pub linear_raw: i16,
    pub angular_raw: i16,
    pub lateral_raw: i16,
    pub steering_raw: i16,
}

impl MotionCommandFrame {
    /// 从物理量创建（m/s, rad/s, m/s, rad），超出 i16 表示范围的值饱和截断
    pub fn new(linear_vel: f64, angular_vel: f64, lateral_vel: f64, steering_angle: f64) -> Self {
        Self {
            linear_raw: scale_to_i16(linear_vel, 1000.0),
            angular_raw: scale_to_i16(angular_vel, 1000.0),
            lateral_raw: scale_to_i16(lateral_vel, 1000.0),
            steering_raw: scale_to_i16(steering_angle, 1000.0),
        }
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&i16_to_bytes_be(self.linear_raw));
        data[2..4].copy_from_slice(&i16_to_bytes_be(self.angular_raw));
        data[4..6].copy_from_slice(&i16_to_bytes_be(self.lateral_raw));
        data[6..8].copy_from_slice(&i16_to_bytes_be(self.steering_raw));

        RangerFrame::new_standard(ID_MOTION_COMMAND as u16, &data)
    }
}

// ============================================================================
// 灯光控制指令
// ============================================================================

/// 灯光控制指令 (0x121)
///
/// - Byte 0: 灯光指令控制使能（0：交还默认控制 1：指令控制）
/// - Byte 1-2: 前灯模式 / 自定义亮度
/// - Byte 3-4: 后灯模式 / 自定义亮度
/// - Byte 7: 滚动计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightCommandFrame {
    pub enable_cmd_ctrl: bool,
    pub front: LightOperation,
    pub rear: LightOperation,
    pub count: u8,
}

impl LightCommandFrame {
    /// 创建启用指令控制的灯光指令
    pub fn new(front: LightOperation, rear: LightOperation) -> Self {
        Self {
            enable_cmd_ctrl: true,
            front,
            rear,
            count: 0,
        }
    }

    /// 创建交还灯光控制权的指令
    pub fn disabled() -> Self {
        Self::default()
    }

    /// 设置滚动计数
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        let (front_mode, front_value) = self.front.to_raw();
        let (rear_mode, rear_value) = self.rear.to_raw();
        let data = [
            self.enable_cmd_ctrl as u8,
            front_mode,
            front_value,
            rear_mode,
            rear_value,
            0x00,
            0x00,
            self.count,
        ];
        RangerFrame::new_standard(ID_LIGHT_COMMAND as u16, &data)
    }
}

// ============================================================================
// 模式与系统指令
// ============================================================================

/// 运动模式设定指令 (0x141)
#[derive(Debug, Clone, Copy)]
pub struct MotionModeCommand {
    pub mode: MotionMode,
}

impl MotionModeCommand {
    pub fn new(mode: MotionMode) -> Self {
        Self { mode }
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        RangerFrame::new_standard(ID_MOTION_MODE_COMMAND as u16, &[self.mode.into()])
    }
}

/// 控制模式设定指令 (0x421)
///
/// Byte 0 = 0x01：进入 CAN 指令控制模式。
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlModeCommand;

impl ControlModeCommand {
    const ENABLE_CAN_CONTROL: u8 = 0x01;

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        RangerFrame::new_standard(
            ID_CONTROL_MODE_COMMAND as u16,
            &[Self::ENABLE_CAN_CONTROL],
        )
    }
}

/// 状态复位指令 (0x441)
///
/// Byte 0 = 0x00：清除全部故障码。
#[derive(Debug, Clone, Copy, Default)]
pub struct StateResetCommand;

impl StateResetCommand {
    const CLEAR_ALL: u8 = 0x00;

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        RangerFrame::new_standard(ID_STATE_RESET_COMMAND as u16, &[Self::CLEAR_ALL])
    }
}

/// 版本查询指令 (0x4A1)
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionRequestCommand;

impl VersionRequestCommand {
    const QUERY: u8 = 0x01;

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> RangerFrame {
        RangerFrame::new_standard(ID_VERSION_REQUEST as u16, &[Self::QUERY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_command_encoding() {
        let frame = MotionCommandFrame::new(1.0, 0.0, 0.0, 0.2).to_frame();
        assert_eq!(frame.id, ID_MOTION_COMMAND);
        assert_eq!(frame.len, 8);
        assert_eq!(&frame.data[0..2], &1000i16.to_be_bytes());
        assert_eq!(&frame.data[2..4], &[0, 0]);
        assert_eq!(&frame.data[6..8], &200i16.to_be_bytes());
    }

    #[test]
    fn test_motion_command_negative_values() {
        let cmd = MotionCommandFrame::new(-0.5, -1.25, 0.0, -0.35);
        assert_eq!(cmd.linear_raw, -500);
        assert_eq!(cmd.angular_raw, -1250);
        assert_eq!(cmd.steering_raw, -350);
    }

    #[test]
    fn test_light_command_encoding() {
        let front = LightOperation::custom(80).unwrap();
        let frame = LightCommandFrame::new(front, LightOperation::Breath)
            .with_count(7)
            .to_frame();
        assert_eq!(frame.id, ID_LIGHT_COMMAND);
        assert_eq!(frame.data, [0x01, 0x03, 80, 0x02, 0x00, 0x00, 0x00, 7]);
    }

    #[test]
    fn test_light_command_disabled() {
        let frame = LightCommandFrame::disabled().to_frame();
        assert_eq!(frame.data[0], 0x00);
    }

    #[test]
    fn test_light_operation_from_raw() {
        assert_eq!(LightOperation::from_raw(0, 55).unwrap(), LightOperation::Off);
        assert_eq!(LightOperation::from_raw(1, 0).unwrap(), LightOperation::On);
        assert_eq!(LightOperation::from_raw(2, 0).unwrap(), LightOperation::Breath);
        assert_eq!(
            LightOperation::from_raw(3, 100).unwrap(),
            LightOperation::Custom { brightness: 100 }
        );
        assert!(matches!(
            LightOperation::from_raw(3, 101),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            LightOperation::from_raw(9, 0),
            Err(ValidationError::UnknownEnumValue { value: 9, .. })
        ));
    }

    #[test]
    fn test_motion_mode_from_raw() {
        assert_eq!(MotionMode::from_raw(0).unwrap(), MotionMode::DualAckermann);
        assert_eq!(MotionMode::from_raw(3).unwrap(), MotionMode::SideSlip);
        assert!(MotionMode::from_raw(4).is_err());
        let raw: u8 = MotionMode::Spinning.into();
        assert_eq!(raw, 2);
    }

    #[test]
    fn test_variant_rules() {
        assert!(VehicleVariant::Standard.supports(MotionMode::SideSlip));
        assert!(!VehicleVariant::MiniV1.supports(MotionMode::SideSlip));
        assert!(VehicleVariant::MiniV1.supports(MotionMode::Spinning));
        assert_eq!(VehicleVariant::MiniV1.steering_sign(), -1.0);
        assert_eq!(VehicleVariant::from_mini_v1_flag(true), VehicleVariant::MiniV1);
    }

    #[test]
    fn test_system_commands() {
        assert_eq!(ControlModeCommand.to_frame().data_slice(), &[0x01]);
        assert_eq!(StateResetCommand.to_frame().data_slice(), &[0x00]);
        let frame = VersionRequestCommand.to_frame();
        assert_eq!(frame.id, ID_VERSION_REQUEST);
        assert_eq!(frame.data_slice(), &[0x01]);
        let frame = MotionModeCommand::new(MotionMode::Parallel).to_frame();
        assert_eq!(frame.data_slice(), &[0x01]);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// 物理量编码误差不超过半个量化单位
            #[test]
            fn motion_scaling_error_bounded(v in -30.0..30.0f64) {
                let frame = MotionCommandFrame::new(v, 0.0, 0.0, 0.0);
                let decoded = frame.linear_raw as f64 / 1000.0;
                prop_assert!((decoded - v).abs() <= 0.0005 + 1e-12);
            }

            /// 超出 i16 表示范围时饱和而不回绕
            #[test]
            fn motion_scaling_saturates(v in 33.0..1.0e6f64) {
                prop_assert_eq!(MotionCommandFrame::new(v, 0.0, 0.0, 0.0).linear_raw, i16::MAX);
                prop_assert_eq!(MotionCommandFrame::new(-v, 0.0, 0.0, 0.0).linear_raw, i16::MIN);
            }
        }
    }
}
