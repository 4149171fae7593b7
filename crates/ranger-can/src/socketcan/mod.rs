//! SocketCAN CAN 适配器实现
//!
//! Linux 内核 SocketCAN 后端。波特率等接口配置由系统工具（`ip link`）完成，
//! 适配器只负责打开已启动的接口并收发标准帧/扩展帧。
//!
//! ```bash
//! sudo ip link set can0 up type can bitrate 500000
//! ```

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, RangerFrame};
use socketcan::{
    CanError as SocketCanError, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Socket,
    StandardId,
};
use std::io;
use std::time::Duration;
use tracing::{error, trace, warn};

mod interface_check;
pub mod split;

pub use interface_check::check_interface_status;
pub use split::{SocketCanRxAdapter, SocketCanTxAdapter};

/// 默认读超时，与 `PipelineConfig` 的默认接收超时一致，保证 IO 线程能及时响应退出
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// SO_RCVTIMEO 为 0 表示无限阻塞，零超时用该最小值代替
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(100);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use ranger_can::{CanAdapter, RangerFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(RangerFrame::new_standard(0x421, &[0x01])).unwrap();
/// let frame = adapter.receive();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 打开 CAN 接口
    ///
    /// 打开前检查接口存在且为 UP 状态。
    ///
    /// # 错误
    /// - `CanDeviceErrorKind::NotFound`: 接口不存在
    /// - `CanDeviceErrorKind::NotUp`: 接口存在但未启动
    /// - `CanDeviceErrorKind::AccessDenied` / `Busy`: 打开 socket 失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        if !check_interface_status(&interface)? {
            return Err(CanDeviceError::new(
                CanDeviceErrorKind::NotUp,
                format!(
                    "CAN interface '{}' exists but is not UP. Please start it first:\n  sudo ip link set up {}",
                    interface, interface
                ),
            )
            .into());
        }

        let socket = CanSocket::open(&interface).map_err(|e| open_error(&interface, e))?;

        socket.set_read_timeout(DEFAULT_READ_TIMEOUT).map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        trace!("[Auto-Drop] SocketCAN interface '{}' closed", self.interface);
    }
}

impl crate::SplittableAdapter for SocketCanAdapter {
    type RxAdapter = SocketCanRxAdapter;
    type TxAdapter = SocketCanTxAdapter;

    /// 分离为独立的 RX 和 TX 适配器
    ///
    /// 两者通过 `dup()` 出的 FD 共享同一个打开文件描述，
    /// 分离后不得使用 `set_nonblocking()`，超时只依赖 `SO_RCVTIMEO` / `SO_SNDTIMEO`。
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        let rx = SocketCanRxAdapter::new(&self.socket, self.read_timeout)?;
        let tx = SocketCanTxAdapter::new(&self.socket)?;
        trace!(
            "SocketCanAdapter split into RX and TX adapters (interface: {})",
            self.interface
        );
        Ok((rx, tx))
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError> {
        let can_frame = to_can_frame(&frame)?;
        self.socket.write_frame(&can_frame).map_err(map_write_error)?;
        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<RangerFrame, CanError> {
        read_data_frame(&self.socket)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<RangerFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }
}

/// 打开 socket 失败时的错误分类
fn open_error(interface: &str, e: io::Error) -> CanError {
    let kind = match e.kind() {
        io::ErrorKind::PermissionDenied => CanDeviceErrorKind::AccessDenied,
        io::ErrorKind::NotFound => CanDeviceErrorKind::NotFound,
        io::ErrorKind::AddrInUse | io::ErrorKind::ResourceBusy => CanDeviceErrorKind::Busy,
        _ => CanDeviceErrorKind::Backend,
    };
    CanDeviceError::new(
        kind,
        format!("Failed to open CAN interface '{}': {}", interface, e),
    )
    .into()
}

/// RangerFrame -> socketcan::CanFrame
pub(crate) fn to_can_frame(frame: &RangerFrame) -> Result<CanFrame, CanError> {
    let data = frame.data_slice();
    let can_frame = if frame.is_extended {
        ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, data))
    } else {
        u16::try_from(frame.id)
            .ok()
            .and_then(StandardId::new)
            .and_then(|id| CanFrame::new(id, data))
    };
    can_frame.ok_or_else(|| {
        CanDeviceError::new(
            CanDeviceErrorKind::InvalidFrame,
            format!("Failed to create CAN frame with ID 0x{:X}", frame.id),
        )
        .into()
    })
}

/// socketcan::CanFrame -> RangerFrame
pub(crate) fn from_can_frame(can_frame: &CanFrame) -> RangerFrame {
    let mut data = [0u8; 8];
    let payload = can_frame.data();
    let len = payload.len().min(8);
    data[..len].copy_from_slice(&payload[..len]);
    RangerFrame {
        id: can_frame.raw_id(),
        data,
        len: len as u8,
        is_extended: can_frame.is_extended(),
        timestamp_us: 0,
    }
}

pub(crate) fn map_write_error(e: io::Error) -> CanError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => CanError::Timeout,
        _ => CanError::Io(e),
    }
}

/// 读取下一个数据帧
///
/// 错误帧被过滤：Bus Off 与缓冲区溢出作为错误返回，其余记录警告后继续读取。
pub(crate) fn read_data_frame(socket: &CanSocket) -> Result<RangerFrame, CanError> {
    loop {
        let can_frame = match socket.read_frame() {
            Ok(frame) => frame,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(CanError::Timeout);
            },
            Err(e) => return Err(CanError::Io(e)),
        };

        match can_frame {
            CanFrame::Error(error_frame) => match SocketCanError::from(error_frame) {
                SocketCanError::BusOff => {
                    error!("CAN Bus Off error detected");
                    return Err(CanError::BusOff);
                },
                SocketCanError::ControllerProblem(problem) => {
                    let text = problem.to_string();
                    if text.to_lowercase().contains("overflow") {
                        error!("CAN Buffer Overflow detected: {}", text);
                        return Err(CanError::BufferOverflow);
                    }
                    warn!("CAN Controller Problem: {}, ignoring", text);
                },
                other => warn!("CAN Error Frame received: {}, ignoring", other),
            },
            frame => {
                let frame = from_can_frame(&frame);
                trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
                return Ok(frame);
            },
        }
    }
}
