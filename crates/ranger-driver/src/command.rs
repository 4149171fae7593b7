//! 指令编码
//!
//! 把调用方的高层指令校验、限幅后编码为控制帧。
//! 校验在调用线程同步完成，错误直接返回，不会进入 IO 线程。

use ranger_protocol::{
    ControlModeCommand, LightCommandFrame, LightOperation, MotionCommandFrame, MotionMode,
    MotionModeCommand, RangerFrame, StateResetCommand, ValidationError, VehicleVariant,
    VersionRequestCommand,
};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::warn;

/// 超限处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LimitPolicy {
    /// 截断到限值并记录警告
    #[default]
    Clamp,
    /// 返回 `OutOfRange` 错误
    Reject,
}

/// 运动指令限幅（对称区间 `[-max, max]`）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionLimits {
    /// 最大线速度（m/s）
    pub max_linear_vel: f64,
    /// 最大角速度（rad/s）
    pub max_angular_vel: f64,
    /// 最大转向角（rad）
    pub max_steer_angle: f64,
    pub policy: LimitPolicy,
}

impl MotionLimits {
    /// 各车型出厂限值
    pub fn for_variant(variant: VehicleVariant) -> Self {
        match variant {
            VehicleVariant::Standard => Self {
                max_linear_vel: 1.5,
                max_angular_vel: 1.0,
                max_steer_angle: 0.6981,
                policy: LimitPolicy::Clamp,
            },
            VehicleVariant::MiniV1 => Self {
                max_linear_vel: 1.2,
                max_angular_vel: 0.8,
                max_steer_angle: 0.6981,
                policy: LimitPolicy::Clamp,
            },
        }
    }

    pub fn with_policy(mut self, policy: LimitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self::for_variant(VehicleVariant::Standard)
    }
}

/// 控制帧编码器
pub struct CommandEncoder {
    variant: VehicleVariant,
    limits: MotionLimits,
    light_count: AtomicU8,
}

impl CommandEncoder {
    pub fn new(variant: VehicleVariant) -> Self {
        Self::with_limits(variant, MotionLimits::for_variant(variant))
    }

    pub fn with_limits(variant: VehicleVariant, limits: MotionLimits) -> Self {
        Self {
            variant,
            limits,
            light_count: AtomicU8::new(0),
        }
    }

    pub fn variant(&self) -> VehicleVariant {
        self.variant
    }

    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// 运动指令（线速度 m/s、转向角 rad、角速度 rad/s）
    ///
    /// 横向速度固定为 0；Mini V1 的转向角在线缆上取反。
    pub fn encode_motion(
        &self,
        linear_vel: f64,
        steer_angle: f64,
        angular_vel: f64,
    ) -> Result<RangerFrame, ValidationError> {
        let linear = self.limit("linear_vel", linear_vel, self.limits.max_linear_vel)?;
        let steer = self.limit("steer_angle", steer_angle, self.limits.max_steer_angle)?;
        let angular = self.limit("angular_vel", angular_vel, self.limits.max_angular_vel)?;

        let steering = steer * self.variant.steering_sign();
        Ok(MotionCommandFrame::new(linear, angular, 0.0, steering).to_frame())
    }

    fn limit(&self, field: &'static str, value: f64, max: f64) -> Result<f64, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite { field, value });
        }
        if value.abs() <= max {
            return Ok(value);
        }
        match self.limits.policy {
            LimitPolicy::Clamp => {
                let clamped = value.clamp(-max, max);
                warn!("{} = {} exceeds limit {}, clamped to {}", field, value, max, clamped);
                Ok(clamped)
            },
            LimitPolicy::Reject => Err(ValidationError::OutOfRange {
                field,
                value,
                min: -max,
                max,
            }),
        }
    }

    /// 运动模式切换
    pub fn encode_motion_mode(&self, mode: MotionMode) -> Result<RangerFrame, ValidationError> {
        if !self.variant.supports(mode) {
            return Err(ValidationError::Unsupported(format!(
                "motion mode {:?} on {:?}",
                mode, self.variant
            )));
        }
        Ok(MotionModeCommand::new(mode).to_frame())
    }

    /// 运动模式切换（原始值）
    pub fn encode_motion_mode_raw(&self, mode: u8) -> Result<RangerFrame, ValidationError> {
        self.encode_motion_mode(MotionMode::from_raw(mode)?)
    }

    /// 灯光指令，每帧携带递增的滚动计数
    pub fn encode_light(&self, front: LightOperation, rear: LightOperation) -> RangerFrame {
        LightCommandFrame::new(front, rear)
            .with_count(self.next_light_count())
            .to_frame()
    }

    /// 灯光指令（原始 mode/value）
    pub fn encode_light_raw(
        &self,
        front_mode: u8,
        front_value: u8,
        rear_mode: u8,
        rear_value: u8,
    ) -> Result<RangerFrame, ValidationError> {
        let front = LightOperation::from_raw(front_mode, front_value)?;
        let rear = LightOperation::from_raw(rear_mode, rear_value)?;
        Ok(self.encode_light(front, rear))
    }

    /// 交还灯光控制权
    pub fn encode_light_disable(&self) -> RangerFrame {
        LightCommandFrame::disabled()
            .with_count(self.next_light_count())
            .to_frame()
    }

    fn next_light_count(&self) -> u8 {
        self.light_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn encode_enable_commanded_mode(&self) -> RangerFrame {
        ControlModeCommand.to_frame()
    }

    pub fn encode_state_reset(&self) -> RangerFrame {
        StateResetCommand.to_frame()
    }

    pub fn encode_version_request(&self) -> RangerFrame {
        VersionRequestCommand.to_frame()
    }
}
