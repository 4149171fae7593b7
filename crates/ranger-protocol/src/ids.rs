//! CAN ID 常量定义和枚举
//!
//! 定义所有协议帧的 CAN ID 常量，并提供 ID 分类功能。

// ============================================================================
// 控制帧 ID 常量（主机 -> 底盘）
// ============================================================================

/// 运动控制指令
pub const ID_MOTION_COMMAND: u32 = 0x111;

/// 灯光控制指令
pub const ID_LIGHT_COMMAND: u32 = 0x121;

/// 运动模式设定指令
pub const ID_MOTION_MODE_COMMAND: u32 = 0x141;

/// 控制模式设定指令（切换到 CAN 指令控制）
pub const ID_CONTROL_MODE_COMMAND: u32 = 0x421;

/// 状态复位指令（清除故障码）
pub const ID_STATE_RESET_COMMAND: u32 = 0x441;

/// 版本查询指令
pub const ID_VERSION_REQUEST: u32 = 0x4A1;

// ============================================================================
// 反馈帧 ID 常量（底盘 -> 主机，V2 协议）
// ============================================================================

/// 系统状态反馈
pub const ID_SYSTEM_STATE: u32 = 0x211;

/// 运动状态反馈
pub const ID_MOTION_STATE: u32 = 0x221;

/// 灯光状态反馈
pub const ID_LIGHT_STATE: u32 = 0x231;

/// 遥控器状态反馈
pub const ID_RC_STATE: u32 = 0x241;

/// 执行器高速反馈（0x251~0x254，按执行器编号递增）
pub const ID_ACTUATOR_HS_BASE: u32 = 0x251;

/// 执行器低速反馈（0x261~0x264，按执行器编号递增）
pub const ID_ACTUATOR_LS_BASE: u32 = 0x261;

/// 转向电机角度反馈（4 个轮）
pub const ID_MOTOR_ANGLE: u32 = 0x271;

/// 轮速反馈（4 个轮）
pub const ID_MOTOR_SPEED: u32 = 0x281;

/// 运动模式状态反馈
pub const ID_MOTION_MODE_STATE: u32 = 0x291;

/// 里程计反馈
pub const ID_ODOMETRY: u32 = 0x311;

/// BMS 基础信息反馈
pub const ID_BMS_BASIC: u32 = 0x361;

/// 版本查询应答
pub const ID_VERSION_RESPONSE: u32 = 0x4A2;

// ============================================================================
// 旧版 V1 协议反馈帧 ID
// ============================================================================

/// V1 运动状态反馈
pub const ID_MOTION_STATE_V1: u32 = 0x131;

/// V1 系统状态反馈
pub const ID_SYSTEM_STATE_V1: u32 = 0x151;

/// 执行器数量（4 个轮/转向单元）
pub const ACTUATOR_COUNT: usize = 4;

/// 根据 CAN ID 计算执行器索引（0~3）
///
/// 非执行器反馈帧返回 `None`。
pub fn actuator_index(id: u32, base: u32) -> Option<usize> {
    let offset = id.checked_sub(base)? as usize;
    (offset < ACTUATOR_COUNT).then_some(offset)
}
