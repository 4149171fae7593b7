//! 反馈帧结构体定义
//!
//! 包含所有底盘反馈帧的结构体，提供从 `RangerFrame` 解析的方法
//! 和物理量转换方法。结构体保存原始值，物理量通过方法换算。

use crate::control::{LightOperation, MotionMode};
use crate::{
    ProtocolError, RangerFrame, bytes_to_i16_be, bytes_to_i32_be, bytes_to_u16_be,
    ids::{
        ACTUATOR_COUNT, ID_ACTUATOR_HS_BASE, ID_ACTUATOR_LS_BASE, ID_BMS_BASIC, ID_LIGHT_STATE,
        ID_MOTION_MODE_STATE, ID_MOTION_STATE, ID_MOTION_STATE_V1, ID_MOTOR_ANGLE, ID_MOTOR_SPEED,
        ID_ODOMETRY, ID_RC_STATE, ID_SYSTEM_STATE, ID_SYSTEM_STATE_V1, actuator_index,
    },
};
use bilge::prelude::*;
use num_enum::FromPrimitive;

// ============================================================================
// 枚举类型定义
// ============================================================================

/// 车体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum VehicleState {
    /// 正常
    Normal = 0x00,
    /// 急停
    EStop = 0x01,
    /// 异常
    #[num_enum(catch_all)]
    Exception(u8),
}

/// 控制模式（反馈）
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlMode {
    /// 待机
    Standby = 0x00,
    /// CAN 指令控制
    Can = 0x01,
    /// 串口控制
    Uart = 0x02,
    /// 遥控器控制
    Rc = 0x03,
    /// 未定义值
    #[num_enum(catch_all)]
    Unknown(u8),
}

// catch_all 与 `#[default]` 不能同时出现，默认值手动实现
impl Default for VehicleState {
    fn default() -> Self {
        VehicleState::Normal
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::Standby
    }
}

/// 遥控器拨杆位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RcSwitchState {
    Up = 0x01,
    Middle = 0x02,
    Down = 0x03,
    /// 未定义值（遥控器未连接时为 0）
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Default for RcSwitchState {
    fn default() -> Self {
        RcSwitchState::Up
    }
}

// ============================================================================
// 位域定义
// ============================================================================

/// 遥控器拨杆位域（0x241 Byte 0）
///
/// 每个拨杆占 2 bit，LSB first：
/// - Bit 0-1: SWA
/// - Bit 2-3: SWB
/// - Bit 4-5: SWC
/// - Bit 6-7: SWD
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct RcSwitchBits {
    pub swa: u2,
    pub swb: u2,
    pub swc: u2,
    pub swd: u2,
}

/// 执行器驱动器状态位域（低速反馈 Byte 5）
///
/// - Bit 0: 电源电压过低
/// - Bit 1: 电机过温
/// - Bit 2: 驱动器过流
/// - Bit 3: 驱动器过温
/// - Bit 4: 传感器异常
/// - Bit 5: 驱动器错误
/// - Bit 6: 驱动器使能
/// - Bit 7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStateBits {
    pub voltage_low: bool,
    pub motor_over_temp: bool,
    pub driver_over_current: bool,
    pub driver_over_temp: bool,
    pub sensor_error: bool,
    pub driver_error: bool,
    pub enabled: bool,
    pub reserved: u1,
}

// ============================================================================
// 系统与运动状态
// ============================================================================

/// 系统状态反馈 (0x211)
///
/// - Byte 0: 车体状态
/// - Byte 1: 控制模式
/// - Byte 2-3: 电池电压，单位 0.1V
/// - Byte 4-5: 故障码（位集合）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStateFeedback {
    pub vehicle_state: VehicleState,
    pub control_mode: ControlMode,
    pub battery_voltage_raw: u16,
    pub error_code: u16,
}

impl SystemStateFeedback {
    /// 电池电压（V）
    pub fn battery_voltage(&self) -> f64 {
        self.battery_voltage_raw as f64 / 10.0
    }
}

impl TryFrom<RangerFrame> for SystemStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_SYSTEM_STATE, 6)?;
        Ok(Self {
            vehicle_state: VehicleState::from(frame.data[0]),
            control_mode: ControlMode::from(frame.data[1]),
            battery_voltage_raw: bytes_to_u16_be([frame.data[2], frame.data[3]]),
            error_code: bytes_to_u16_be([frame.data[4], frame.data[5]]),
        })
    }
}

/// V1 系统状态反馈 (0x151)
///
/// 与 V2 字段相同，但 Byte 0 / Byte 1 顺序互换：
/// - Byte 0: 控制模式
/// - Byte 1: 车体状态
/// - Byte 2-3: 电池电压，单位 0.1V
/// - Byte 4-5: 故障码
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySystemStateFeedback(pub SystemStateFeedback);

impl TryFrom<RangerFrame> for LegacySystemStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_SYSTEM_STATE_V1, 6)?;
        Ok(Self(SystemStateFeedback {
            control_mode: ControlMode::from(frame.data[0]),
            vehicle_state: VehicleState::from(frame.data[1]),
            battery_voltage_raw: bytes_to_u16_be([frame.data[2], frame.data[3]]),
            error_code: bytes_to_u16_be([frame.data[4], frame.data[5]]),
        }))
    }
}

/// 运动状态反馈 (0x221)
///
/// 布局与运动控制指令相同：线速度 mm/s、角速度 0.001 rad/s、
/// 横向速度 mm/s、转向角 0.001 rad。
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionStateFeedback {
    pub linear_raw: i16,
    pub angular_raw: i16,
    pub lateral_raw: i16,
    pub steering_raw: i16,
}

impl MotionStateFeedback {
    /// 线速度（m/s）
    pub fn linear_velocity(&self) -> f64 {
        self.linear_raw as f64 / 1000.0
    }

    /// 角速度（rad/s）
    pub fn angular_velocity(&self) -> f64 {
        self.angular_raw as f64 / 1000.0
    }

    /// 横向速度（m/s）
    pub fn lateral_velocity(&self) -> f64 {
        self.lateral_raw as f64 / 1000.0
    }

    /// 转向角（rad，线缆方向）
    pub fn steering_angle(&self) -> f64 {
        self.steering_raw as f64 / 1000.0
    }
}

impl TryFrom<RangerFrame> for MotionStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_MOTION_STATE, 8)?;
        let d = frame.data;
        Ok(Self {
            linear_raw: bytes_to_i16_be([d[0], d[1]]),
            angular_raw: bytes_to_i16_be([d[2], d[3]]),
            lateral_raw: bytes_to_i16_be([d[4], d[5]]),
            steering_raw: bytes_to_i16_be([d[6], d[7]]),
        })
    }
}

/// V1 运动状态反馈 (0x131)
///
/// - Byte 0-1: 线速度，单位 mm/s
/// - Byte 2-3: 角速度，单位 0.001 rad/s
/// - Byte 4-5: 转向角，单位 0.01°
///
/// V1 没有横向速度字段。
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyMotionStateFeedback {
    pub linear_raw: i16,
    pub angular_raw: i16,
    pub steering_centi_deg: i16,
}

impl LegacyMotionStateFeedback {
    /// 线速度（m/s）
    pub fn linear_velocity(&self) -> f64 {
        self.linear_raw as f64 / 1000.0
    }

    /// 角速度（rad/s）
    pub fn angular_velocity(&self) -> f64 {
        self.angular_raw as f64 / 1000.0
    }

    /// 转向角（rad）
    pub fn steering_angle(&self) -> f64 {
        (self.steering_centi_deg as f64 / 100.0).to_radians()
    }
}

impl TryFrom<RangerFrame> for LegacyMotionStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_MOTION_STATE_V1, 6)?;
        let d = frame.data;
        Ok(Self {
            linear_raw: bytes_to_i16_be([d[0], d[1]]),
            angular_raw: bytes_to_i16_be([d[2], d[3]]),
            steering_centi_deg: bytes_to_i16_be([d[4], d[5]]),
        })
    }
}

// ============================================================================
// 灯光 / 运动模式 / 遥控器
// ============================================================================

/// 灯光状态反馈 (0x231)
#[derive(Debug, Clone, Copy, Default)]
pub struct LightStateFeedback {
    pub enable_cmd_ctrl: bool,
    pub front: LightOperation,
    pub rear: LightOperation,
}

impl TryFrom<RangerFrame> for LightStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_LIGHT_STATE, 5)?;
        let d = frame.data;
        let light = |field: &str, mode: u8, value: u8| {
            LightOperation::from_raw(mode, value).map_err(|_| ProtocolError::InvalidValue {
                field: field.to_string(),
                value: mode,
            })
        };
        Ok(Self {
            enable_cmd_ctrl: d[0] != 0,
            front: light("front_light_mode", d[1], d[2])?,
            rear: light("rear_light_mode", d[3], d[4])?,
        })
    }
}

/// 运动模式状态反馈 (0x291)
///
/// - Byte 0: 当前运动模式
/// - Byte 1: 模式切换中标志
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionModeFeedback {
    pub motion_mode: MotionMode,
    pub mode_changing: bool,
}

impl TryFrom<RangerFrame> for MotionModeFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_MOTION_MODE_STATE, 2)?;
        let motion_mode =
            MotionMode::try_from(frame.data[0]).map_err(|_| ProtocolError::InvalidValue {
                field: "motion_mode".to_string(),
                value: frame.data[0],
            })?;
        Ok(Self {
            motion_mode,
            mode_changing: frame.data[1] != 0,
        })
    }
}

/// 遥控器状态反馈 (0x241)
///
/// - Byte 0: 拨杆位域
/// - Byte 1-4: 右摇杆（竖直/水平）、左摇杆（竖直/水平），范围 [-100, 100]
/// - Byte 5: 旋钮 VRA
#[derive(Debug, Clone, Copy, Default)]
pub struct RcStateFeedback {
    pub switches: RcSwitchBits,
    pub stick_right_v: i8,
    pub stick_right_h: i8,
    pub stick_left_v: i8,
    pub stick_left_h: i8,
    pub var_a: i8,
}

impl RcStateFeedback {
    pub fn swa(&self) -> RcSwitchState {
        RcSwitchState::from(self.switches.swa().value())
    }

    pub fn swb(&self) -> RcSwitchState {
        RcSwitchState::from(self.switches.swb().value())
    }

    pub fn swc(&self) -> RcSwitchState {
        RcSwitchState::from(self.switches.swc().value())
    }

    pub fn swd(&self) -> RcSwitchState {
        RcSwitchState::from(self.switches.swd().value())
    }
}

impl TryFrom<RangerFrame> for RcStateFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_RC_STATE, 6)?;
        let d = frame.data;
        Ok(Self {
            switches: RcSwitchBits::from(u8::new(d[0])),
            stick_right_v: d[1] as i8,
            stick_right_h: d[2] as i8,
            stick_left_v: d[3] as i8,
            stick_left_h: d[4] as i8,
            var_a: d[5] as i8,
        })
    }
}

// ============================================================================
// 执行器反馈
// ============================================================================

/// 执行器高速反馈 (0x251~0x254)
///
/// - Byte 0-1: 转速，单位 RPM
/// - Byte 2-3: 电流，单位 0.1A
/// - Byte 4-7: 脉冲计数
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuatorHsFeedback {
    /// 执行器索引（0~3，由 CAN ID 推导）
    pub index: usize,
    pub rpm: i16,
    pub current_raw: i16,
    pub pulse_count: i32,
}

impl ActuatorHsFeedback {
    /// 电流（A）
    pub fn current(&self) -> f64 {
        self.current_raw as f64 / 10.0
    }
}

impl TryFrom<RangerFrame> for ActuatorHsFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        let index = actuator_index(frame.id, ID_ACTUATOR_HS_BASE)
            .ok_or(ProtocolError::InvalidCanId { id: frame.id })?;
        frame.expect(frame.id, 8)?;
        let d = frame.data;
        Ok(Self {
            index,
            rpm: bytes_to_i16_be([d[0], d[1]]),
            current_raw: bytes_to_i16_be([d[2], d[3]]),
            pulse_count: bytes_to_i32_be([d[4], d[5], d[6], d[7]]),
        })
    }
}

/// 执行器低速反馈 (0x261~0x264)
///
/// - Byte 0-1: 驱动器电压，单位 0.1V
/// - Byte 2-3: 驱动器温度，单位 1℃
/// - Byte 4: 电机温度，单位 1℃
/// - Byte 5: 驱动器状态位域
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuatorLsFeedback {
    /// 执行器索引（0~3，由 CAN ID 推导）
    pub index: usize,
    pub driver_voltage_raw: u16,
    pub driver_temp: i16,
    pub motor_temp: i8,
    pub driver_state: DriverStateBits,
}

impl ActuatorLsFeedback {
    /// 驱动器电压（V）
    pub fn driver_voltage(&self) -> f64 {
        self.driver_voltage_raw as f64 / 10.0
    }
}

impl TryFrom<RangerFrame> for ActuatorLsFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        let index = actuator_index(frame.id, ID_ACTUATOR_LS_BASE)
            .ok_or(ProtocolError::InvalidCanId { id: frame.id })?;
        frame.expect(frame.id, 6)?;
        let d = frame.data;
        Ok(Self {
            index,
            driver_voltage_raw: bytes_to_u16_be([d[0], d[1]]),
            driver_temp: bytes_to_i16_be([d[2], d[3]]),
            motor_temp: d[4] as i8,
            driver_state: DriverStateBits::from(u8::new(d[5])),
        })
    }
}

/// 四个 i16 大端字段（转向角 / 轮速帧共用）
fn quad_i16(frame: &RangerFrame) -> [i16; ACTUATOR_COUNT] {
    let d = frame.data;
    [
        bytes_to_i16_be([d[0], d[1]]),
        bytes_to_i16_be([d[2], d[3]]),
        bytes_to_i16_be([d[4], d[5]]),
        bytes_to_i16_be([d[6], d[7]]),
    ]
}

/// 转向电机角度反馈 (0x271)，每轮单位 0.001 rad
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorAngleFeedback {
    pub angles_raw: [i16; ACTUATOR_COUNT],
}

impl MotorAngleFeedback {
    /// 各轮转向角（rad）
    pub fn angles_rad(&self) -> [f64; ACTUATOR_COUNT] {
        self.angles_raw.map(|raw| raw as f64 / 1000.0)
    }
}

impl TryFrom<RangerFrame> for MotorAngleFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_MOTOR_ANGLE, 8)?;
        Ok(Self {
            angles_raw: quad_i16(&frame),
        })
    }
}

/// 轮速反馈 (0x281)，每轮单位 mm/s
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorSpeedFeedback {
    pub speeds_raw: [i16; ACTUATOR_COUNT],
}

impl MotorSpeedFeedback {
    /// 各轮速度（m/s）
    pub fn speeds_mps(&self) -> [f64; ACTUATOR_COUNT] {
        self.speeds_raw.map(|raw| raw as f64 / 1000.0)
    }
}

impl TryFrom<RangerFrame> for MotorSpeedFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_MOTOR_SPEED, 8)?;
        Ok(Self {
            speeds_raw: quad_i16(&frame),
        })
    }
}

// ============================================================================
// 里程计 / BMS
// ============================================================================

/// 里程计反馈 (0x311)
///
/// - Byte 0-3: 左轮累计里程，单位 mm
/// - Byte 4-7: 右轮累计里程，单位 mm
#[derive(Debug, Clone, Copy, Default)]
pub struct OdometryFeedback {
    pub left_mm: i32,
    pub right_mm: i32,
}

impl OdometryFeedback {
    pub fn left_m(&self) -> f64 {
        self.left_mm as f64 / 1000.0
    }

    pub fn right_m(&self) -> f64 {
        self.right_mm as f64 / 1000.0
    }
}

impl TryFrom<RangerFrame> for OdometryFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_ODOMETRY, 8)?;
        let d = frame.data;
        Ok(Self {
            left_mm: bytes_to_i32_be([d[0], d[1], d[2], d[3]]),
            right_mm: bytes_to_i32_be([d[4], d[5], d[6], d[7]]),
        })
    }
}

/// BMS 基础信息反馈 (0x361)
///
/// - Byte 0: SOC（%）
/// - Byte 1: SOH（%）
/// - Byte 2-3: 电池电压，单位 0.01V
/// - Byte 4-5: 电池电流，单位 0.1A
/// - Byte 6-7: 电池温度，单位 0.1℃
#[derive(Debug, Clone, Copy, Default)]
pub struct BmsBasicFeedback {
    pub soc: u8,
    pub soh: u8,
    pub voltage_raw: u16,
    pub current_raw: i16,
    pub temperature_raw: i16,
}

impl BmsBasicFeedback {
    pub fn voltage(&self) -> f64 {
        self.voltage_raw as f64 / 100.0
    }

    pub fn current(&self) -> f64 {
        self.current_raw as f64 / 10.0
    }

    pub fn temperature(&self) -> f64 {
        self.temperature_raw as f64 / 10.0
    }
}

impl TryFrom<RangerFrame> for BmsBasicFeedback {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_BMS_BASIC, 8)?;
        let d = frame.data;
        Ok(Self {
            soc: d[0],
            soh: d[1],
            voltage_raw: bytes_to_u16_be([d[2], d[3]]),
            current_raw: bytes_to_i16_be([d[4], d[5]]),
            temperature_raw: bytes_to_i16_be([d[6], d[7]]),
        })
    }
}
