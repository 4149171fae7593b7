//! 状态聚合
//!
//! 反馈帧解析后转换为物理单位的消息记录，按类别聚合为三个快照：
//!
//! - `CoreState`: 系统/运动/灯光/运动模式/遥控器/里程计
//! - `ActuatorState`: 四轮转向角、轮速与执行器高低速反馈
//! - `CommonSensorState`: BMS 等通用传感器
//!
//! 快照通过 `ArcSwap` 整体替换发布：读取方拿到的永远是某次完整更新后的副本，
//! 不会看到写到一半的状态。

use crate::clock::Timestamp;
use crate::heartbeat::ConnectionMonitor;
use crate::hooks::HookManager;
use crate::version::VersionResolver;
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use ranger_protocol::{
    ACTUATOR_COUNT, ActuatorHsFeedback, ActuatorLsFeedback, BmsBasicFeedback, ControlMode,
    DriverStateBits, LegacyMotionStateFeedback, LightOperation, LightStateFeedback, MotionMode,
    MotionModeFeedback, MotionStateFeedback, OdometryFeedback, RcStateFeedback, RcSwitchState,
    SystemStateFeedback, ValidationError, VehicleState, VehicleVariant,
};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// 消息记录（物理单位）
// ============================================================================

/// 系统状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemStateMessage {
    pub vehicle_state: VehicleState,
    pub control_mode: ControlMode,
    /// 电池电压（V）
    pub battery_voltage: f64,
    /// 故障码（位集合）
    pub error_code: u16,
}

impl From<SystemStateFeedback> for SystemStateMessage {
    fn from(fb: SystemStateFeedback) -> Self {
        Self {
            vehicle_state: fb.vehicle_state,
            control_mode: fb.control_mode,
            battery_voltage: fb.battery_voltage(),
            error_code: fb.error_code,
        }
    }
}

/// 运动状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionStateMessage {
    /// 线速度（m/s）
    pub linear_velocity: f64,
    /// 角速度（rad/s）
    pub angular_velocity: f64,
    /// 横向速度（m/s）
    pub lateral_velocity: f64,
    /// 转向角（rad），已按车型修正符号
    pub steering_angle: f64,
}

impl MotionStateMessage {
    pub fn from_feedback(fb: &MotionStateFeedback, variant: VehicleVariant) -> Self {
        Self {
            linear_velocity: fb.linear_velocity(),
            angular_velocity: fb.angular_velocity(),
            lateral_velocity: fb.lateral_velocity(),
            steering_angle: fb.steering_angle() * variant.steering_sign(),
        }
    }

    /// V1 布局没有横向速度
    pub fn from_legacy_feedback(fb: &LegacyMotionStateFeedback, variant: VehicleVariant) -> Self {
        Self {
            linear_velocity: fb.linear_velocity(),
            angular_velocity: fb.angular_velocity(),
            lateral_velocity: 0.0,
            steering_angle: fb.steering_angle() * variant.steering_sign(),
        }
    }
}

/// 灯光状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightStateMessage {
    /// 灯光是否处于 CAN 指令控制下
    pub enable_cmd_ctrl: bool,
    pub front_light: LightOperation,
    pub rear_light: LightOperation,
}

impl From<LightStateFeedback> for LightStateMessage {
    fn from(fb: LightStateFeedback) -> Self {
        Self {
            enable_cmd_ctrl: fb.enable_cmd_ctrl,
            front_light: fb.front,
            rear_light: fb.rear,
        }
    }
}

/// 运动模式状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionModeStateMessage {
    pub motion_mode: MotionMode,
    /// 模式切换进行中
    pub mode_changing: bool,
}

impl From<MotionModeFeedback> for MotionModeStateMessage {
    fn from(fb: MotionModeFeedback) -> Self {
        Self {
            motion_mode: fb.motion_mode,
            mode_changing: fb.mode_changing,
        }
    }
}

/// 遥控器状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RcStateMessage {
    pub swa: RcSwitchState,
    pub swb: RcSwitchState,
    pub swc: RcSwitchState,
    pub swd: RcSwitchState,
    pub stick_right_v: i8,
    pub stick_right_h: i8,
    pub stick_left_v: i8,
    pub stick_left_h: i8,
    pub var_a: i8,
}

impl From<RcStateFeedback> for RcStateMessage {
    fn from(fb: RcStateFeedback) -> Self {
        Self {
            swa: fb.swa(),
            swb: fb.swb(),
            swc: fb.swc(),
            swd: fb.swd(),
            stick_right_v: fb.stick_right_v,
            stick_right_h: fb.stick_right_h,
            stick_left_v: fb.stick_left_v,
            stick_left_h: fb.stick_left_h,
            var_a: fb.var_a,
        }
    }
}

/// 里程计（累计里程，m）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OdometryMessage {
    pub left_wheel: f64,
    pub right_wheel: f64,
}

impl From<OdometryFeedback> for OdometryMessage {
    fn from(fb: OdometryFeedback) -> Self {
        Self {
            left_wheel: fb.left_m(),
            right_wheel: fb.right_m(),
        }
    }
}

/// 执行器高速反馈
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorHsStateMessage {
    /// 执行器编号（0~3）
    pub motor_id: u8,
    pub rpm: i16,
    /// 电流（A）
    pub current: f64,
    pub pulse_count: i32,
}

impl From<ActuatorHsFeedback> for ActuatorHsStateMessage {
    fn from(fb: ActuatorHsFeedback) -> Self {
        Self {
            motor_id: fb.index as u8,
            rpm: fb.rpm,
            current: fb.current(),
            pulse_count: fb.pulse_count,
        }
    }
}

/// 执行器低速反馈
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorLsStateMessage {
    /// 执行器编号（0~3）
    pub motor_id: u8,
    /// 驱动器电压（V）
    pub driver_voltage: f64,
    /// 驱动器温度（℃）
    pub driver_temp: f64,
    /// 电机温度（℃）
    pub motor_temp: f64,
    /// 驱动器状态位（原始字节）
    pub driver_state: u8,
}

impl ActuatorLsStateMessage {
    /// 按位解析驱动器状态
    pub fn driver_state_bits(&self) -> DriverStateBits {
        DriverStateBits::from(self.driver_state)
    }
}

impl From<ActuatorLsFeedback> for ActuatorLsStateMessage {
    fn from(fb: ActuatorLsFeedback) -> Self {
        Self {
            motor_id: fb.index as u8,
            driver_voltage: fb.driver_voltage(),
            driver_temp: fb.driver_temp as f64,
            motor_temp: fb.motor_temp as f64,
            driver_state: u8::from(fb.driver_state),
        }
    }
}

/// BMS 基础信息
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BmsBasicMessage {
    /// 剩余电量（%）
    pub battery_soc: u8,
    /// 电池健康度（%）
    pub battery_soh: u8,
    /// 电压（V）
    pub voltage: f64,
    /// 电流（A）
    pub current: f64,
    /// 温度（℃）
    pub temperature: f64,
}

impl From<BmsBasicFeedback> for BmsBasicMessage {
    fn from(fb: BmsBasicFeedback) -> Self {
        Self {
            battery_soc: fb.soc,
            battery_soh: fb.soh,
            voltage: fb.voltage(),
            current: fb.current(),
            temperature: fb.temperature(),
        }
    }
}

// ============================================================================
// 固定长度执行器数组
// ============================================================================

/// 每个执行器一项、长度恒为 4 的数组
///
/// 只能从长度正确的集合构造，长度不符返回 `ValidationError::SizeMismatch`。
///
/// ```rust
/// use ranger_driver::ActuatorArray;
///
/// let ok = ActuatorArray::try_from(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(ok[2], 3.0);
/// assert!(ActuatorArray::try_from(vec![1.0, 2.0]).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorArray<T>([T; ACTUATOR_COUNT]);

impl<T> ActuatorArray<T> {
    pub const fn new(items: [T; ACTUATOR_COUNT]) -> Self {
        Self(items)
    }

    pub fn into_inner(self) -> [T; ACTUATOR_COUNT] {
        self.0
    }
}

impl<T: Default> Default for ActuatorArray<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| T::default()))
    }
}

impl<T> From<[T; ACTUATOR_COUNT]> for ActuatorArray<T> {
    fn from(items: [T; ACTUATOR_COUNT]) -> Self {
        Self(items)
    }
}

impl<T> TryFrom<Vec<T>> for ActuatorArray<T> {
    type Error = ValidationError;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        let actual = items.len();
        <[T; ACTUATOR_COUNT]>::try_from(items)
            .map(Self)
            .map_err(|_| ValidationError::SizeMismatch {
                expected: ACTUATOR_COUNT,
                actual,
            })
    }
}

impl<T: Clone> TryFrom<&[T]> for ActuatorArray<T> {
    type Error = ValidationError;

    fn try_from(items: &[T]) -> Result<Self, Self::Error> {
        <&[T; ACTUATOR_COUNT]>::try_from(items)
            .map(|arr| Self(arr.clone()))
            .map_err(|_| ValidationError::SizeMismatch {
                expected: ACTUATOR_COUNT,
                actual: items.len(),
            })
    }
}

impl<T> Deref for ActuatorArray<T> {
    type Target = [T; ACTUATOR_COUNT];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// 只暴露定长数组的可变引用，长度无法被改变
impl<T> DerefMut for ActuatorArray<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

// ============================================================================
// 状态快照
// ============================================================================

/// 核心状态快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreState {
    /// 最近一次更新时间，0 表示从未更新
    pub timestamp: Timestamp,
    pub system_state: SystemStateMessage,
    pub motion_state: MotionStateMessage,
    pub light_state: LightStateMessage,
    pub motion_mode_state: MotionModeStateMessage,
    pub rc_state: RcStateMessage,
    pub odometry: OdometryMessage,
}

impl CoreState {
    pub fn set_timestamp_ms(&mut self, ms: u64) {
        self.timestamp = Timestamp::from_millis(ms);
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis()
    }
}

/// 执行器状态快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorState {
    pub timestamp: Timestamp,
    /// 各轮转向角（rad）
    pub motor_angles: ActuatorArray<f64>,
    /// 各轮线速度（m/s）
    pub motor_speeds: ActuatorArray<f64>,
    pub actuator_hs_state: ActuatorArray<ActuatorHsStateMessage>,
    pub actuator_ls_state: ActuatorArray<ActuatorLsStateMessage>,
}

impl ActuatorState {
    pub fn set_timestamp_ms(&mut self, ms: u64) {
        self.timestamp = Timestamp::from_millis(ms);
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis()
    }

    /// 整体替换高速反馈，长度不为 4 时返回错误且保持原值
    pub fn set_actuator_hs_state(
        &mut self,
        states: Vec<ActuatorHsStateMessage>,
    ) -> Result<(), ValidationError> {
        self.actuator_hs_state = ActuatorArray::try_from(states)?;
        Ok(())
    }

    /// 整体替换低速反馈，长度不为 4 时返回错误且保持原值
    pub fn set_actuator_ls_state(
        &mut self,
        states: Vec<ActuatorLsStateMessage>,
    ) -> Result<(), ValidationError> {
        self.actuator_ls_state = ActuatorArray::try_from(states)?;
        Ok(())
    }

    pub fn set_motor_angles(&mut self, angles: Vec<f64>) -> Result<(), ValidationError> {
        self.motor_angles = ActuatorArray::try_from(angles)?;
        Ok(())
    }

    pub fn set_motor_speeds(&mut self, speeds: Vec<f64>) -> Result<(), ValidationError> {
        self.motor_speeds = ActuatorArray::try_from(speeds)?;
        Ok(())
    }
}

/// 通用传感器状态快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonSensorState {
    pub timestamp: Timestamp,
    pub bms_basic_state: BmsBasicMessage,
}

impl CommonSensorState {
    pub fn set_timestamp_ms(&mut self, ms: u64) {
        self.timestamp = Timestamp::from_millis(ms);
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis()
    }
}

// ============================================================================
// 上下文
// ============================================================================

/// 默认连接超时：超过该时间没有任何反馈视为断连
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// 驱动上下文
///
/// IO 线程是快照的唯一写者；任意线程都可以无锁读取。
pub struct RangerContext {
    pub core_state: Arc<ArcSwap<CoreState>>,
    pub actuator_state: Arc<ArcSwap<ActuatorState>>,
    pub common_sensor_state: Arc<ArcSwap<CommonSensorState>>,
    /// 协议版本解析
    pub version: VersionResolver,
    pub connection_monitor: ConnectionMonitor,
    pub hooks: Arc<RwLock<HookManager>>,
    /// 车型，决定转向角符号
    pub variant: VehicleVariant,
}

impl RangerContext {
    /// ```
    /// use ranger_driver::RangerContext;
    /// use ranger_protocol::VehicleVariant;
    ///
    /// let ctx = RangerContext::new(VehicleVariant::Standard);
    /// assert_eq!(ctx.core_state.load().timestamp_ms(), 0);
    /// ```
    pub fn new(variant: VehicleVariant) -> Self {
        Self::with_connection_timeout(variant, DEFAULT_CONNECTION_TIMEOUT)
    }

    pub fn with_connection_timeout(variant: VehicleVariant, timeout: Duration) -> Self {
        Self {
            core_state: Arc::new(ArcSwap::from_pointee(CoreState::default())),
            actuator_state: Arc::new(ArcSwap::from_pointee(ActuatorState::default())),
            common_sensor_state: Arc::new(ArcSwap::from_pointee(CommonSensorState::default())),
            version: VersionResolver::new(),
            connection_monitor: ConnectionMonitor::new(timeout),
            hooks: Arc::new(RwLock::new(HookManager::new())),
            variant,
        }
    }

    /// 复制当前核心状态、修改后以新时间戳整体发布
    pub fn update_core(&self, f: impl FnOnce(&mut CoreState)) {
        let mut next = CoreState::clone(&self.core_state.load());
        f(&mut next);
        next.timestamp = Timestamp::now();
        self.core_state.store(Arc::new(next));
    }

    pub fn update_actuator(&self, f: impl FnOnce(&mut ActuatorState)) {
        let mut next = ActuatorState::clone(&self.actuator_state.load());
        f(&mut next);
        next.timestamp = Timestamp::now();
        self.actuator_state.store(Arc::new(next));
    }

    pub fn update_common_sensor(&self, f: impl FnOnce(&mut CommonSensorState)) {
        let mut next = CommonSensorState::clone(&self.common_sensor_state.load());
        f(&mut next);
        next.timestamp = Timestamp::now();
        self.common_sensor_state.store(Arc::new(next));
    }
}

impl Default for RangerContext {
    fn default() -> Self {
        Self::new(VehicleVariant::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranger_protocol::RangerFrame;

    fn hs(motor_id: u8) -> ActuatorHsStateMessage {
        ActuatorHsStateMessage {
            motor_id,
            rpm: 100 * motor_id as i16,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_snapshots() {
        let core = CoreState::default();
        assert_eq!(core.timestamp_ms(), 0);
        assert_eq!(core.system_state.vehicle_state, VehicleState::Normal);
        assert_eq!(core.motion_mode_state.motion_mode, MotionMode::DualAckermann);

        let actuator = ActuatorState::default();
        assert_eq!(actuator.actuator_hs_state.len(), ACTUATOR_COUNT);
        assert_eq!(actuator.actuator_ls_state.len(), ACTUATOR_COUNT);
        assert_eq!(actuator.motor_angles.len(), ACTUATOR_COUNT);

        assert_eq!(CommonSensorState::default().bms_basic_state.battery_soc, 0);
    }

    #[test]
    fn test_actuator_array_size_check() {
        assert!(ActuatorArray::try_from(vec![1, 2, 3, 4]).is_ok());
        assert_eq!(
            ActuatorArray::try_from(vec![1, 2, 3]),
            Err(ValidationError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            ActuatorArray::<i32>::try_from(&[1, 2, 3, 4, 5][..]),
            Err(ValidationError::SizeMismatch {
                expected: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn test_set_actuator_hs_state_keeps_prior_on_error() {
        let mut state = ActuatorState::default();
        state
            .set_actuator_hs_state((0..4).map(hs).collect())
            .unwrap();
        assert_eq!(state.actuator_hs_state[3].rpm, 300);

        let err = state.set_actuator_hs_state((0..3).map(hs).collect());
        assert!(matches!(err, Err(ValidationError::SizeMismatch { actual: 3, .. })));
        assert_eq!(state.actuator_hs_state[3].rpm, 300);
    }

    #[test]
    fn test_set_actuator_ls_state_rejects_five() {
        let mut state = ActuatorState::default();
        let five = vec![ActuatorLsStateMessage::default(); 5];
        assert!(state.set_actuator_ls_state(five).is_err());
        assert_eq!(state.actuator_ls_state, ActuatorArray::default());
    }

    #[test]
    fn test_timestamp_setters() {
        let mut core = CoreState::default();
        core.set_timestamp_ms(1_700_000_000_123);
        assert_eq!(core.timestamp_ms(), 1_700_000_000_123);

        let mut sensor = CommonSensorState::default();
        sensor.set_timestamp_ms(42);
        assert_eq!(sensor.timestamp_ms(), 42);
    }

    #[test]
    fn test_motion_state_steering_sign() {
        let frame = RangerFrame::new_standard(0x221, &[0, 0, 0, 0, 0, 0, 0x01, 0xF4]);
        let fb = MotionStateFeedback::try_from(frame).unwrap();
        let standard = MotionStateMessage::from_feedback(&fb, VehicleVariant::Standard);
        let mini = MotionStateMessage::from_feedback(&fb, VehicleVariant::MiniV1);
        assert!((standard.steering_angle - 0.5).abs() < 1e-9);
        assert!((mini.steering_angle + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_actuator_ls_driver_state_bits() {
        let msg = ActuatorLsStateMessage {
            driver_state: 0b0100_0001,
            ..Default::default()
        };
        let bits = msg.driver_state_bits();
        assert!(bits.voltage_low());
        assert!(bits.enabled());
        assert!(!bits.driver_error());
    }

    #[test]
    fn test_context_update_publishes_new_snapshot() {
        let ctx = RangerContext::default();
        let before = ctx.core_state.load_full();
        ctx.update_core(|s| s.odometry.left_wheel = 1.25);
        let after = ctx.core_state.load();
        assert_eq!(before.odometry.left_wheel, 0.0);
        assert_eq!(after.odometry.left_wheel, 1.25);
        assert!(after.timestamp.is_set());
    }
}
