//! 协议版本解析
//!
//! 版本的确定有两条路径：
//!
//! 1. 主动查询：发送版本查询帧，收到 0x4A2 应答后确定为 V2 并记录固件版本
//! 2. 被动识别：收到只存在于某一代协议的系统状态帧（0x211 → V2，0x151 → V1）
//!
//! 版本一旦确定就不再改变。确定之前按 V2 解码（当前固件的布局）。

use parking_lot::{Condvar, Mutex};
use ranger_protocol::{FirmwareVersions, ProtocolVersion};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 解析阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePhase {
    /// 尚无任何信息
    Unresolved,
    /// 已发出查询，等待应答
    Resolving,
    /// 已确定
    Resolved(ProtocolVersion),
    /// 查询超时且仍未确定
    TimedOut,
}

struct Inner {
    phase: ResolvePhase,
    firmware: Option<FirmwareVersions>,
    /// 已收到的版本应答数，用于区分"本次查询之后"的应答
    responses: u64,
}

/// 协议版本解析器
///
/// 由 IO 线程写入、由调用方线程等待，内部以 `Mutex + Condvar` 同步。
pub struct VersionResolver {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl VersionResolver {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: ResolvePhase::Unresolved,
                firmware: None,
                responses: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn phase(&self) -> ResolvePhase {
        self.inner.lock().phase
    }

    /// 已确定的版本，未确定时为 `Unknown`
    pub fn current(&self) -> ProtocolVersion {
        match self.inner.lock().phase {
            ResolvePhase::Resolved(version) => version,
            _ => ProtocolVersion::Unknown,
        }
    }

    /// 解码反馈帧时使用的版本（未确定时按 V2）
    pub fn decode_version(&self) -> ProtocolVersion {
        match self.current() {
            ProtocolVersion::Unknown => ProtocolVersion::AgxV2,
            version => version,
        }
    }

    /// 最近一次版本应答携带的固件版本
    pub fn firmware(&self) -> Option<FirmwareVersions> {
        self.inner.lock().firmware.clone()
    }

    /// 标记一次查询开始
    ///
    /// 返回当前应答计数（供 `wait_for_response` 使用）和开始前的阶段（供 `abort_request` 使用）。
    pub fn begin_request(&self) -> (u64, ResolvePhase) {
        let mut inner = self.inner.lock();
        let previous = inner.phase;
        if !matches!(inner.phase, ResolvePhase::Resolved(_)) {
            inner.phase = ResolvePhase::Resolving;
        }
        (inner.responses, previous)
    }

    /// 查询帧未能发出，恢复到 `begin_request` 之前的阶段
    pub fn abort_request(&self, previous: ResolvePhase) {
        let mut inner = self.inner.lock();
        if inner.phase == ResolvePhase::Resolving {
            debug!("Version request aborted, phase restored to {:?}", previous);
            inner.phase = previous;
        }
    }

    /// 收到版本应答（IO 线程调用）
    pub fn on_version_response(&self, firmware: FirmwareVersions) {
        let mut inner = self.inner.lock();
        info!("Firmware version: {}", firmware);
        inner.firmware = Some(firmware);
        inner.responses += 1;
        Self::resolve_locked(&mut inner, ProtocolVersion::AgxV2);
        self.cond.notify_all();
    }

    /// 被动识别到协议版本，返回是否是首次确定
    pub fn detect(&self, version: ProtocolVersion) -> bool {
        if !version.is_known() {
            return false;
        }
        let mut inner = self.inner.lock();
        let resolved = Self::resolve_locked(&mut inner, version);
        if resolved {
            self.cond.notify_all();
        }
        resolved
    }

    fn resolve_locked(inner: &mut Inner, version: ProtocolVersion) -> bool {
        if let ResolvePhase::Resolved(existing) = inner.phase {
            if existing != version {
                debug!(
                    "Ignoring protocol version {} (already resolved as {})",
                    version, existing
                );
            }
            return false;
        }
        info!("Protocol version resolved: {}", version);
        inner.phase = ResolvePhase::Resolved(version);
        true
    }

    /// 等待 `seq` 之后的版本应答，超时返回 `false`
    ///
    /// 超时时若版本仍未确定，阶段置为 `TimedOut`。
    pub fn wait_for_response(&self, seq: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.responses <= seq {
            if self.cond.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if inner.responses > seq {
            return true;
        }
        if inner.phase == ResolvePhase::Resolving {
            inner.phase = ResolvePhase::TimedOut;
        }
        false
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new()
    }
}
