//! `RangerRobot`：面向用户的底盘接口
//!
//! 指令方法在调用线程完成校验与编码，随后把帧放入命令队列立即返回；
//! 状态读取返回最新快照的副本，从不阻塞。唯一的阻塞操作是
//! [`RangerRobot::request_version`]。

use crate::config::RangerConfig;
use crate::error::RangerError;
use ranger_can::{CanAdapter, SplittableAdapter};
use ranger_driver::{
    ActuatorState, CommandEncoder, CommonSensorState, CoreState, DriverError, FrameCallback,
    MetricsSnapshot, RangerBuilder, RangerDriver, ResolvePhase,
};
use ranger_protocol::{
    FirmwareVersions, LightOperation, MotionMode, ProtocolVersion, RangerFrame, VehicleVariant,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 松灵 Ranger 底盘
///
/// ```rust,no_run
/// use ranger_sdk::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), RangerError> {
/// let mut robot = RangerRobot::new(false);
/// robot.connect("can0")?;
/// robot.enable_commanded_mode()?;
/// if robot.request_version(Duration::from_secs(1))? {
///     println!("protocol: {}", robot.get_parser_protocol_version());
/// }
/// robot.set_motion_command(0.3, 0.0, 0.0)?;
/// println!("{:?}", robot.get_robot_state().motion_state);
/// # Ok(())
/// # }
/// ```
pub struct RangerRobot {
    variant: VehicleVariant,
    config: RangerConfig,
    encoder: CommandEncoder,
    driver: Option<RangerDriver>,
}

impl RangerRobot {
    /// 以车型默认配置创建（尚未连接）
    pub fn new(is_mini_v1: bool) -> Self {
        Self::with_config(is_mini_v1, RangerConfig::for_variant(is_mini_v1))
    }

    pub fn with_config(is_mini_v1: bool, config: RangerConfig) -> Self {
        let variant = VehicleVariant::from_mini_v1_flag(is_mini_v1);
        Self {
            variant,
            encoder: CommandEncoder::with_limits(variant, config.limits),
            config,
            driver: None,
        }
    }

    pub fn variant(&self) -> VehicleVariant {
        self.variant
    }

    pub fn config(&self) -> &RangerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // 连接
    // ------------------------------------------------------------------

    /// 打开 SocketCAN 接口并启动后台 IO 线程
    ///
    /// # 错误
    /// - `AlreadyConnected`: 本实例已持有一个通道
    /// - `Connection`: 接口不存在、未启动或权限不足
    pub fn connect(&mut self, can_name: &str) -> Result<(), RangerError> {
        self.ensure_disconnected()?;
        let driver = RangerBuilder::new()
            .interface(can_name)
            .variant(self.variant)
            .pipeline_config(self.config.pipeline.clone())
            .build()
            .map_err(|source| RangerError::Connection {
                interface: can_name.to_string(),
                source,
            })?;
        self.driver = Some(driver);
        Ok(())
    }

    /// 使用任意适配器连接（单 IO 线程）
    pub fn connect_with(
        &mut self,
        name: impl Into<String>,
        adapter: impl CanAdapter + Send + 'static,
    ) -> Result<(), RangerError> {
        self.ensure_disconnected()?;
        let name = name.into();
        let driver = RangerDriver::new(adapter, self.variant, Some(self.config.pipeline.clone()))
            .map_err(|e| RangerError::Connection {
                interface: name.clone(),
                source: e.into(),
            })?;
        info!("Connected to {} ({:?})", name, self.variant);
        self.driver = Some(driver.with_interface(name));
        Ok(())
    }

    /// 使用可拆分适配器连接（RX/TX 双线程）
    pub fn connect_split_with<C>(
        &mut self,
        name: impl Into<String>,
        adapter: C,
    ) -> Result<(), RangerError>
    where
        C: SplittableAdapter + Send + 'static,
        C::RxAdapter: Send + 'static,
        C::TxAdapter: Send + 'static,
    {
        self.ensure_disconnected()?;
        let name = name.into();
        let driver = RangerDriver::new_dual_thread(
            adapter,
            self.variant,
            Some(self.config.pipeline.clone()),
        )
        .map_err(|e| RangerError::Connection {
            interface: name.clone(),
            source: e.into(),
        })?;
        info!("Connected to {} ({:?}, dual thread)", name, self.variant);
        self.driver = Some(driver.with_interface(name));
        Ok(())
    }

    /// 停止 IO 线程并释放通道，之后可以重新连接
    pub fn disconnect(&mut self) {
        if let Some(driver) = self.driver.take() {
            info!("Disconnecting from {}", driver.interface());
        }
    }

    /// 是否持有通道（与 [`is_connected`](Self::is_connected) 的反馈判定不同）
    pub fn has_channel(&self) -> bool {
        self.driver.is_some()
    }

    pub fn interface(&self) -> Option<&str> {
        self.driver.as_ref().map(|d| d.interface())
    }

    /// 底层驱动（高级用法：原始帧发送、指标重置等）
    pub fn driver(&self) -> Option<&RangerDriver> {
        self.driver.as_ref()
    }

    fn ensure_disconnected(&self) -> Result<(), RangerError> {
        match &self.driver {
            Some(driver) => Err(RangerError::AlreadyConnected(driver.interface().to_string())),
            None => Ok(()),
        }
    }

    fn channel(&self) -> Result<&RangerDriver, RangerError> {
        self.driver.as_ref().ok_or(RangerError::NotConnected)
    }

    fn send(&self, frame: RangerFrame) -> Result<(), RangerError> {
        debug!("Queue frame 0x{:03X}", frame.id);
        self.channel()?.send_frame(frame)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 指令
    // ------------------------------------------------------------------

    /// 切换到 CAN 指令控制模式（可重复调用）
    pub fn enable_commanded_mode(&self) -> Result<(), RangerError> {
        self.send(self.encoder.encode_enable_commanded_mode())?;
        info!("Commanded mode requested");
        Ok(())
    }

    /// 发送版本查询并等待应答
    ///
    /// 超时返回 `Ok(false)`，通道保持可用，可以重试。
    pub fn request_version(&self, timeout: Duration) -> Result<bool, RangerError> {
        let received = self.channel()?.request_version(timeout)?;
        if received {
            info!("Protocol version: {}", self.get_parser_protocol_version());
        } else {
            info!("No version response within {:?}", timeout);
        }
        Ok(received)
    }

    /// 以配置中的超时（默认 3 秒）查询版本
    pub fn request_version_default(&self) -> Result<bool, RangerError> {
        self.request_version(self.config.version.request_timeout())
    }

    /// 清除底盘故障状态，不影响连接
    pub fn reset_robot_state(&self) -> Result<(), RangerError> {
        self.send(self.encoder.encode_state_reset())
    }

    /// 交还灯光控制权（可重复调用）
    pub fn disable_light_control(&self) -> Result<(), RangerError> {
        self.send(self.encoder.encode_light_disable())
    }

    pub fn set_motion_mode(&self, mode: MotionMode) -> Result<(), RangerError> {
        let frame = self.encoder.encode_motion_mode(mode)?;
        self.send(frame)?;
        info!("Motion mode set to {:?}", mode);
        Ok(())
    }

    /// 以原始值切换运动模式，未知值返回校验错误
    pub fn set_motion_mode_raw(&self, mode: u8) -> Result<(), RangerError> {
        self.set_motion_mode(MotionMode::from_raw(mode)?)
    }

    /// 运动指令（线速度 m/s、转向角 rad、角速度 rad/s）
    pub fn set_motion_command(
        &self,
        linear_vel: f64,
        steer_angle: f64,
        angular_vel: f64,
    ) -> Result<(), RangerError> {
        let frame = self.encoder.encode_motion(linear_vel, steer_angle, angular_vel)?;
        self.send(frame)
    }

    /// 角速度取 0 的运动指令
    pub fn set_motion_command_default_angular(
        &self,
        linear_vel: f64,
        steer_angle: f64,
    ) -> Result<(), RangerError> {
        self.set_motion_command(linear_vel, steer_angle, 0.0)
    }

    pub fn set_light_command(
        &self,
        front: LightOperation,
        rear: LightOperation,
    ) -> Result<(), RangerError> {
        self.send(self.encoder.encode_light(front, rear))
    }

    /// 以原始 mode/value 设置灯光
    pub fn set_light_command_raw(
        &self,
        front_mode: u8,
        front_value: u8,
        rear_mode: u8,
        rear_value: u8,
    ) -> Result<(), RangerError> {
        let frame = self
            .encoder
            .encode_light_raw(front_mode, front_value, rear_mode, rear_value)?;
        self.send(frame)
    }

    // ------------------------------------------------------------------
    // 状态
    // ------------------------------------------------------------------

    /// 未确定（或未连接）时为 `Unknown`
    pub fn get_parser_protocol_version(&self) -> ProtocolVersion {
        self.driver
            .as_ref()
            .map(|d| d.protocol_version())
            .unwrap_or_default()
    }

    pub fn version_phase(&self) -> ResolvePhase {
        self.driver
            .as_ref()
            .map(|d| d.version_phase())
            .unwrap_or(ResolvePhase::Unresolved)
    }

    pub fn get_firmware_versions(&self) -> Option<FirmwareVersions> {
        self.driver.as_ref().and_then(|d| d.firmware_versions())
    }

    pub fn get_robot_state(&self) -> CoreState {
        self.driver.as_ref().map(|d| d.get_core_state()).unwrap_or_default()
    }

    pub fn get_actuator_state(&self) -> ActuatorState {
        self.driver
            .as_ref()
            .map(|d| d.get_actuator_state())
            .unwrap_or_default()
    }

    pub fn get_common_sensor_state(&self) -> CommonSensorState {
        self.driver
            .as_ref()
            .map(|d| d.get_common_sensor_state())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // 诊断
    // ------------------------------------------------------------------

    /// 连接超时窗口内是否收到过反馈
    pub fn is_connected(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| d.is_connected())
    }

    pub fn connection_age(&self) -> Option<Duration> {
        self.driver.as_ref().and_then(|d| d.connection_age())
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.driver.as_ref().map(|d| d.get_metrics()).unwrap_or_default()
    }

    /// 阻塞直到收到第一帧核心状态反馈
    pub fn wait_for_feedback(&self, timeout: Duration) -> Result<(), RangerError> {
        self.channel()?.wait_for_feedback(timeout).map_err(|e| match e {
            DriverError::Timeout => RangerError::Timeout(timeout),
            other => other.into(),
        })
    }

    /// 注册原始帧回调（在 IO 线程中执行，必须快速返回）
    pub fn add_frame_callback(&self, callback: Arc<dyn FrameCallback>) -> Result<(), RangerError> {
        self.channel()?.hooks().write().add_callback(callback);
        Ok(())
    }
}

impl Default for RangerRobot {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranger_can::MockCanAdapter;
    use ranger_protocol::ValidationError;

    #[test]
    fn test_new_uses_variant_limits() {
        let standard = RangerRobot::default();
        assert_eq!(standard.variant(), VehicleVariant::Standard);
        assert_eq!(standard.config().limits.max_linear_vel, 1.5);

        let mini = RangerRobot::new(true);
        assert_eq!(mini.variant(), VehicleVariant::MiniV1);
        assert_eq!(mini.config().limits.max_linear_vel, 1.2);
    }

    #[test]
    fn test_commands_require_channel() {
        let robot = RangerRobot::default();
        assert!(matches!(robot.enable_commanded_mode(), Err(RangerError::NotConnected)));
        assert!(matches!(robot.reset_robot_state(), Err(RangerError::NotConnected)));
        assert!(matches!(
            robot.set_motion_command(0.1, 0.0, 0.0),
            Err(RangerError::NotConnected)
        ));
        assert!(matches!(
            robot.request_version(Duration::from_millis(10)),
            Err(RangerError::NotConnected)
        ));
    }

    #[test]
    fn test_validation_precedes_channel_check() {
        let robot = RangerRobot::default();
        assert!(matches!(
            robot.set_motion_command(f64::NAN, 0.0, 0.0),
            Err(RangerError::Validation(ValidationError::NotFinite { .. }))
        ));
        assert!(matches!(
            robot.set_motion_mode_raw(9),
            Err(RangerError::Validation(ValidationError::UnknownEnumValue { .. }))
        ));
    }

    #[test]
    fn test_reads_without_channel_are_default() {
        let robot = RangerRobot::default();
        assert_eq!(robot.get_robot_state(), CoreState::default());
        assert_eq!(robot.get_actuator_state(), ActuatorState::default());
        assert_eq!(robot.get_common_sensor_state(), CommonSensorState::default());
        assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::Unknown);
        assert_eq!(robot.version_phase(), ResolvePhase::Unresolved);
        assert!(robot.get_firmware_versions().is_none());
        assert!(!robot.is_connected());
        assert_eq!(robot.get_metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn test_second_connect_is_rejected() {
        let mut robot = RangerRobot::default();
        let (first, _h1) = MockCanAdapter::new();
        let (second, _h2) = MockCanAdapter::new();
        robot.connect_with("mock0", first).unwrap();
        assert_eq!(robot.interface(), Some("mock0"));

        match robot.connect_with("mock1", second) {
            Err(RangerError::AlreadyConnected(name)) => assert_eq!(name, "mock0"),
            other => panic!("expected AlreadyConnected, got {:?}", other.err()),
        }
        assert!(matches!(robot.connect("can0"), Err(RangerError::AlreadyConnected(_))));
    }

    #[test]
    fn test_disconnect_allows_reconnect() {
        let mut robot = RangerRobot::default();
        let (first, _h1) = MockCanAdapter::new();
        robot.connect_with("mock0", first).unwrap();
        robot.disconnect();
        assert!(!robot.has_channel());

        let (second, _h2) = MockCanAdapter::new();
        robot.connect_with("mock1", second).unwrap();
        assert_eq!(robot.interface(), Some("mock1"));
    }
}
