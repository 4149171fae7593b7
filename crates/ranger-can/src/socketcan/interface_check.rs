//! CAN 接口状态检查
//!
//! 使用 `if_nametoindex` 与 `ioctl(SIOCGIFFLAGS)` 判断接口是否存在、是否 UP。
//! 只读操作，不需要特殊权限。

use crate::{CanDeviceError, CanDeviceErrorKind, CanError};
use libc::{AF_INET, IFF_UP, SIOCGIFFLAGS, SOCK_DGRAM, if_nametoindex, ifreq};
use std::ffi::CString;
use std::io;
use tracing::trace;

/// IFNAMSIZ - 1
const MAX_IFACE_NAME_LEN: usize = 15;

/// 检查 CAN 接口是否存在且已启动
///
/// # 返回值
/// - `Ok(true)`: 接口存在且 UP
/// - `Ok(false)`: 接口存在但 DOWN
/// - `Err(CanError::Device)`: 接口名无效或接口不存在（`NotFound`）
/// - `Err(CanError::Io)`: socket/ioctl 调用失败
pub fn check_interface_status(interface: &str) -> Result<bool, CanError> {
    if interface.is_empty() || interface.len() > MAX_IFACE_NAME_LEN {
        return Err(CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!(
                "Interface name '{}' is invalid (1..={} characters)",
                interface, MAX_IFACE_NAME_LEN
            ),
        )
        .into());
    }

    let c_iface = CString::new(interface).map_err(|e| {
        CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!("Invalid interface name: {}", e),
        )
    })?;

    let ifindex = unsafe { if_nametoindex(c_iface.as_ptr()) };
    if ifindex == 0 {
        let errno = io::Error::last_os_error();
        return Err(CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!(
                "CAN interface '{}' does not exist ({}). Please create it first:\n  sudo ip link add dev {} type can",
                interface, errno, interface
            ),
        )
        .into());
    }

    let mut ifr: ifreq = unsafe { std::mem::zeroed() };
    let name = interface.as_bytes();
    unsafe {
        std::ptr::copy_nonoverlapping(
            name.as_ptr(),
            ifr.ifr_name.as_mut_ptr() as *mut u8,
            name.len(),
        );
    }
    ifr.ifr_name[name.len()] = 0;

    struct FdGuard(libc::c_int);
    impl Drop for FdGuard {
        fn drop(&mut self) {
            if self.0 >= 0 {
                unsafe { libc::close(self.0) };
            }
        }
    }

    let sockfd = unsafe { libc::socket(AF_INET, SOCK_DGRAM, 0) };
    if sockfd < 0 {
        return Err(CanError::Io(io::Error::last_os_error()));
    }
    let _guard = FdGuard(sockfd);

    let result = unsafe { libc::ioctl(sockfd, SIOCGIFFLAGS, &mut ifr as *mut _ as *mut libc::c_void) };
    if result < 0 {
        return Err(CanError::Io(io::Error::last_os_error()));
    }

    // ifru_flags 是 union 的第一个字段（c_short）
    let flags = unsafe { *(std::ptr::addr_of!(ifr.ifr_ifru) as *const libc::c_short) };
    let is_up = (flags as i32 & IFF_UP) != 0;

    trace!(
        "Interface '{}' status: {}",
        interface,
        if is_up { "UP" } else { "DOWN" }
    );
    Ok(is_up)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_kind(result: Result<bool, CanError>) -> Option<CanDeviceErrorKind> {
        match result {
            Err(CanError::Device(e)) => Some(e.kind),
            _ => None,
        }
    }

    #[test]
    fn test_missing_interface_is_not_found() {
        let kind = device_kind(check_interface_status("can999"));
        assert_eq!(kind, Some(CanDeviceErrorKind::NotFound));
    }

    #[test]
    fn test_name_too_long() {
        let kind = device_kind(check_interface_status("a_very_long_interface_name"));
        assert_eq!(kind, Some(CanDeviceErrorKind::NotFound));
    }

    #[test]
    fn test_name_with_nul() {
        let kind = device_kind(check_interface_status("can\0x"));
        assert_eq!(kind, Some(CanDeviceErrorKind::NotFound));
    }

    #[test]
    fn test_empty_name() {
        assert!(check_interface_status("").is_err());
    }

    #[test]
    fn test_loopback_is_up() {
        // lo 在所有 Linux 主机上都存在且 UP
        if let Ok(up) = check_interface_status("lo") {
            assert!(up);
        }
    }
}
