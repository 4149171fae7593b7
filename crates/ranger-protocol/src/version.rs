//! 协议版本与版本查询应答
//!
//! Ranger 底盘存在两代 CAN 协议布局：
//! - V1：旧版固件（系统状态 0x151、运动状态 0x131）
//! - V2：当前固件（系统状态 0x211、运动状态 0x221 等）

use crate::{ProtocolError, RangerFrame, bytes_to_u16_be, ids::ID_VERSION_RESPONSE};
use semver::Version;

/// 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolVersion {
    /// 尚未确定
    #[default]
    Unknown,
    /// AgileX V1 协议
    AgxV1,
    /// AgileX V2 协议
    AgxV2,
}

impl ProtocolVersion {
    pub fn is_known(self) -> bool {
        self != ProtocolVersion::Unknown
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtocolVersion::Unknown => "unknown",
            ProtocolVersion::AgxV1 => "AGX_V1",
            ProtocolVersion::AgxV2 => "AGX_V2",
        };
        f.write_str(name)
    }
}

/// 版本查询应答 (0x4A2)
///
/// - Byte 0-1: 控制器硬件版本
/// - Byte 2-3: 驱动器硬件版本
/// - Byte 4-5: 控制器软件版本
/// - Byte 6-7: 驱动器软件版本
///
/// 每个版本号高字节为主版本，低字节为次版本。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionResponse {
    pub controller_hw_raw: u16,
    pub driver_hw_raw: u16,
    pub controller_sw_raw: u16,
    pub driver_sw_raw: u16,
}

impl VersionResponse {
    pub fn firmware_versions(&self) -> FirmwareVersions {
        FirmwareVersions {
            controller_hw: raw_to_version(self.controller_hw_raw),
            driver_hw: raw_to_version(self.driver_hw_raw),
            controller_sw: raw_to_version(self.controller_sw_raw),
            driver_sw: raw_to_version(self.driver_sw_raw),
        }
    }
}

impl TryFrom<RangerFrame> for VersionResponse {
    type Error = ProtocolError;

    fn try_from(frame: RangerFrame) -> Result<Self, Self::Error> {
        frame.expect(ID_VERSION_RESPONSE, 8)?;
        let d = frame.data;
        Ok(Self {
            controller_hw_raw: bytes_to_u16_be([d[0], d[1]]),
            driver_hw_raw: bytes_to_u16_be([d[2], d[3]]),
            controller_sw_raw: bytes_to_u16_be([d[4], d[5]]),
            driver_sw_raw: bytes_to_u16_be([d[6], d[7]]),
        })
    }
}

fn raw_to_version(raw: u16) -> Version {
    Version::new((raw >> 8) as u64, (raw & 0xFF) as u64, 0)
}

/// 底盘固件版本信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersions {
    pub controller_hw: Version,
    pub driver_hw: Version,
    pub controller_sw: Version,
    pub driver_sw: Version,
}

impl Default for FirmwareVersions {
    fn default() -> Self {
        let zero = Version::new(0, 0, 0);
        Self {
            controller_hw: zero.clone(),
            driver_hw: zero.clone(),
            controller_sw: zero.clone(),
            driver_sw: zero,
        }
    }
}

impl std::fmt::Display for FirmwareVersions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "controller hw {} sw {}, driver hw {} sw {}",
            self.controller_hw, self.controller_sw, self.driver_hw, self.driver_sw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_response_parse() {
        let frame = RangerFrame::new_standard(
            ID_VERSION_RESPONSE as u16,
            &[0x01, 0x02, 0x01, 0x00, 0x02, 0x0A, 0x03, 0x01],
        );
        let resp = VersionResponse::try_from(frame).unwrap();
        let fw = resp.firmware_versions();
        assert_eq!(fw.controller_hw, Version::new(1, 2, 0));
        assert_eq!(fw.driver_hw, Version::new(1, 0, 0));
        assert_eq!(fw.controller_sw, Version::new(2, 10, 0));
        assert_eq!(fw.driver_sw, Version::new(3, 1, 0));
    }

    #[test]
    fn test_version_response_requires_full_frame() {
        let frame = RangerFrame::new_standard(ID_VERSION_RESPONSE as u16, &[0x01, 0x02]);
        assert!(VersionResponse::try_from(frame).is_err());
    }

    #[test]
    fn test_protocol_version_default_and_display() {
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::Unknown);
        assert!(!ProtocolVersion::Unknown.is_known());
        assert_eq!(ProtocolVersion::AgxV2.to_string(), "AGX_V2");
    }
}
