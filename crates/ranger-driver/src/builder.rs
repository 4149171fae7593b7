//! Builder 模式实现
//!
//! 链式构造基于 SocketCAN 的 `RangerDriver`。

use crate::driver::RangerDriver;
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
#[cfg(target_os = "linux")]
use ranger_can::SocketCanAdapter;
#[cfg(not(target_os = "linux"))]
use ranger_can::{CanDeviceError, CanDeviceErrorKind, CanError};
use ranger_protocol::VehicleVariant;

/// 默认 CAN 接口
pub const DEFAULT_INTERFACE: &str = "can0";

/// RangerDriver Builder
///
/// ```no_run
/// use ranger_driver::{PipelineConfig, RangerBuilder};
/// use ranger_protocol::VehicleVariant;
///
/// let driver = RangerBuilder::new()
///     .interface("can1")
///     .variant(VehicleVariant::MiniV1)
///     .pipeline_config(PipelineConfig {
///         receive_timeout_ms: 5,
///         ..Default::default()
///     })
///     .build()
///     .unwrap();
/// ```
pub struct RangerBuilder {
    /// SocketCAN 接口名（默认 can0）
    interface: Option<String>,
    variant: VehicleVariant,
    pipeline_config: Option<PipelineConfig>,
}

impl RangerBuilder {
    pub fn new() -> Self {
        Self {
            interface: None,
            variant: VehicleVariant::default(),
            pipeline_config: None,
        }
    }

    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn variant(mut self, variant: VehicleVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 打开接口并以双线程模式启动驱动
    ///
    /// # 错误
    /// - 接口不存在、未启动或权限不足：`DriverError::Can(CanError::Device(..))`
    /// - 非 Linux 平台：SocketCAN 不可用
    pub fn build(self) -> Result<RangerDriver, DriverError> {
        let interface = self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE);

        #[cfg(target_os = "linux")]
        {
            let config = self.pipeline_config.clone().unwrap_or_default();
            let mut can = SocketCanAdapter::new(interface)?;
            can.set_read_timeout(config.receive_timeout())?;

            let driver = RangerDriver::new_dual_thread(can, self.variant, Some(config))?;
            tracing::info!("Connected to {} ({:?})", interface, self.variant);
            Ok(driver.with_interface(interface))
        }

        #[cfg(not(target_os = "linux"))]
        {
            Err(DriverError::Can(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("SocketCAN is only available on Linux (interface '{}')", interface),
            ))))
        }
    }
}

impl Default for RangerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_new() {
        let builder = RangerBuilder::new();
        assert_eq!(builder.interface, None);
        assert_eq!(builder.variant, VehicleVariant::Standard);
        assert!(builder.pipeline_config.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig {
            receive_timeout_ms: 3,
            connection_timeout_ms: 500,
        };
        let builder = RangerBuilder::new()
            .interface("can1")
            .variant(VehicleVariant::MiniV1)
            .pipeline_config(config.clone());

        assert_eq!(builder.interface, Some("can1".to_string()));
        assert_eq!(builder.variant, VehicleVariant::MiniV1);
        assert_eq!(builder.pipeline_config, Some(config));
    }

    #[test]
    fn test_builder_default() {
        let builder = RangerBuilder::default();
        assert_eq!(builder.interface, None);
    }

    #[test]
    fn test_build_missing_interface_fails() {
        let result = RangerBuilder::new().interface("can999").build();
        assert!(matches!(result, Err(DriverError::Can(_))));
    }
}
