//! 配置
//!
//! TOML 格式，所有段和字段都可省略：
//!
//! ```toml
//! [limits]
//! max_linear_vel = 1.5
//! max_angular_vel = 1.0
//! max_steer_angle = 0.6981
//! policy = "clamp"        # 或 "reject"
//!
//! [pipeline]
//! receive_timeout_ms = 2
//! connection_timeout_ms = 1000
//!
//! [version]
//! request_timeout_ms = 3000
//! ```
//!
//! 省略的 `[limits]` 字段取车型的出厂值：`from_toml_str` / `load` 按标准车型，
//! `from_toml_str_for_variant` / `load_for_variant` 按指定车型。

use crate::error::RangerError;
use ranger_driver::{LimitPolicy, MotionLimits, PipelineConfig};
use ranger_protocol::VehicleVariant;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 版本查询的默认超时
pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    pub request_timeout_ms: u64,
}

impl VersionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_VERSION_TIMEOUT.as_millis() as u64,
        }
    }
}

/// `[limits]` 段中显式给出的字段，其余字段由车型出厂值补齐
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_linear_vel: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_angular_vel: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steer_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<LimitPolicy>,
}

impl LimitOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, base: MotionLimits) -> MotionLimits {
        MotionLimits {
            max_linear_vel: self.max_linear_vel.unwrap_or(base.max_linear_vel),
            max_angular_vel: self.max_angular_vel.unwrap_or(base.max_angular_vel),
            max_steer_angle: self.max_steer_angle.unwrap_or(base.max_steer_angle),
            policy: self.policy.unwrap_or(base.policy),
        }
    }

    /// 以 `variant` 的出厂值补齐
    pub fn resolve(&self, variant: VehicleVariant) -> MotionLimits {
        self.apply(MotionLimits::for_variant(variant))
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    limits: LimitOverrides,
    pipeline: PipelineConfig,
    version: VersionConfig,
}

/// SDK 配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangerConfig {
    pub limits: MotionLimits,
    pub pipeline: PipelineConfig,
    pub version: VersionConfig,
}

impl RangerConfig {
    /// 车型默认配置
    pub fn for_variant(is_mini_v1: bool) -> Self {
        Self {
            limits: MotionLimits::for_variant(VehicleVariant::from_mini_v1_flag(is_mini_v1)),
            ..Default::default()
        }
    }

    /// 解析配置，省略的限值取标准车型出厂值
    pub fn from_toml_str(s: &str) -> Result<Self, RangerError> {
        Self::from_toml_str_for_variant(s, false)
    }

    /// 解析配置，省略的限值取指定车型出厂值
    pub fn from_toml_str_for_variant(s: &str, is_mini_v1: bool) -> Result<Self, RangerError> {
        let raw: RawConfig = toml::from_str(s)?;
        let variant = VehicleVariant::from_mini_v1_flag(is_mini_v1);
        let config = Self {
            limits: raw.limits.resolve(variant),
            pipeline: raw.pipeline,
            version: raw.version,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RangerError> {
        Self::load_for_variant(path, false)
    }

    pub fn load_for_variant(
        path: impl AsRef<Path>,
        is_mini_v1: bool,
    ) -> Result<Self, RangerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RangerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str_for_variant(&content, is_mini_v1)
    }

    pub fn to_toml_string(&self) -> Result<String, RangerError> {
        toml::to_string_pretty(self).map_err(|e| RangerError::Config(e.to_string()))
    }

    /// 限值必须为有限正数，超时不能为 0
    pub fn validate(&self) -> Result<(), RangerError> {
        let limits = [
            ("max_linear_vel", self.limits.max_linear_vel),
            ("max_angular_vel", self.limits.max_angular_vel),
            ("max_steer_angle", self.limits.max_steer_angle),
        ];
        for (name, value) in limits {
            if !value.is_finite() || value <= 0.0 {
                return Err(RangerError::Config(format!(
                    "limits.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.pipeline.receive_timeout_ms == 0 {
            return Err(RangerError::Config(
                "pipeline.receive_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.version.request_timeout_ms == 0 {
            return Err(RangerError::Config(
                "version.request_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
