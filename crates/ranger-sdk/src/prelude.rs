//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ranger_sdk::prelude::*;
//! ```

pub use crate::{DEFAULT_VERSION_TIMEOUT, RangerConfig, RangerError, RangerRobot};

// 状态快照
pub use ranger_driver::{
    ActuatorArray, ActuatorState, CommonSensorState, CoreState, MetricsSnapshot, ResolvePhase,
    Timestamp,
};

// 指令参数
pub use ranger_driver::{LimitPolicy, MotionLimits};
pub use ranger_protocol::{
    ControlMode, FirmwareVersions, LightOperation, MotionMode, ProtocolVersion, ValidationError,
    VehicleState, VehicleVariant,
};

pub use ranger_can::{CanAdapter, CanError, RangerFrame};
pub use ranger_driver::{DriverError, FrameCallback};
