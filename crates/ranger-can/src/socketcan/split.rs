//! SocketCAN 适配器分离实现
//!
//! RX 与 TX 适配器各持有一个复制出的文件描述符（`dup()`），可在不同线程并发使用。
//! RX 侧配置硬件过滤器，只接收底盘反馈帧。

use super::{map_write_error, read_data_frame, to_can_frame};
use crate::{CanError, RangerFrame, RxAdapter, TxAdapter};
use ranger_protocol::ids::{
    ACTUATOR_COUNT, ID_ACTUATOR_HS_BASE, ID_ACTUATOR_LS_BASE, ID_BMS_BASIC, ID_LIGHT_STATE,
    ID_MOTION_MODE_STATE, ID_MOTION_STATE, ID_MOTION_STATE_V1, ID_MOTOR_ANGLE, ID_MOTOR_SPEED,
    ID_ODOMETRY, ID_RC_STATE, ID_SYSTEM_STATE, ID_SYSTEM_STATE_V1, ID_VERSION_RESPONSE,
};
use socketcan::{CanFilter, CanSocket, Socket, SocketOptions};
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::trace;

/// TX 写超时，总线异常时快速失败
const TX_WRITE_TIMEOUT: Duration = Duration::from_millis(5);

/// 所有底盘反馈帧 ID（V1 + V2）
pub fn feedback_ids() -> Vec<u32> {
    let mut ids = vec![
        ID_SYSTEM_STATE,
        ID_MOTION_STATE,
        ID_LIGHT_STATE,
        ID_RC_STATE,
        ID_MOTOR_ANGLE,
        ID_MOTOR_SPEED,
        ID_MOTION_MODE_STATE,
        ID_ODOMETRY,
        ID_BMS_BASIC,
        ID_VERSION_RESPONSE,
        ID_MOTION_STATE_V1,
        ID_SYSTEM_STATE_V1,
    ];
    for i in 0..ACTUATOR_COUNT as u32 {
        ids.push(ID_ACTUATOR_HS_BASE + i);
        ids.push(ID_ACTUATOR_LS_BASE + i);
    }
    ids
}

/// 复制 socket 的文件描述符，两个 FD 共享同一个打开文件描述
fn duplicate_socket(socket: &CanSocket, side: &str) -> Result<CanSocket, CanError> {
    let fd = socket.as_fd().try_clone_to_owned().map_err(|e| {
        CanError::Io(std::io::Error::other(format!(
            "Failed to clone SocketCAN socket for {}: {}",
            side, e
        )))
    })?;
    Ok(CanSocket::from(fd))
}

/// 只读适配器（RX 线程）
pub struct SocketCanRxAdapter {
    socket: CanSocket,
    read_timeout: Duration,
}

impl SocketCanRxAdapter {
    pub fn new(socket: &CanSocket, read_timeout: Duration) -> Result<Self, CanError> {
        let rx_socket = duplicate_socket(socket, "RX")?;

        rx_socket.set_read_timeout(read_timeout).map_err(CanError::Io)?;

        let filters: Vec<CanFilter> = feedback_ids()
            .into_iter()
            .map(|id| CanFilter::new(id, 0x7FF))
            .collect();
        rx_socket.set_filters(&filters).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "Failed to set hardware filters: {}",
                e
            )))
        })?;
        trace!("SocketCAN RX filters configured: {} IDs", filters.len());

        Ok(Self {
            socket: rx_socket,
            read_timeout,
        })
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl RxAdapter for SocketCanRxAdapter {
    fn receive(&mut self) -> Result<RangerFrame, CanError> {
        read_data_frame(&self.socket)
    }
}

impl Drop for SocketCanRxAdapter {
    fn drop(&mut self) {
        trace!("[Auto-Drop] SocketCanRxAdapter closed");
    }
}

/// 只写适配器（TX 线程）
pub struct SocketCanTxAdapter {
    socket: CanSocket,
}

impl SocketCanTxAdapter {
    pub fn new(socket: &CanSocket) -> Result<Self, CanError> {
        let tx_socket = duplicate_socket(socket, "TX")?;

        tx_socket.set_write_timeout(TX_WRITE_TIMEOUT).map_err(CanError::Io)?;

        Ok(Self { socket: tx_socket })
    }
}

impl TxAdapter for SocketCanTxAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError> {
        let can_frame = to_can_frame(&frame)?;
        self.socket.write_frame(&can_frame).map_err(map_write_error)?;
        trace!("TX: Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }
}

impl Drop for SocketCanTxAdapter {
    fn drop(&mut self) {
        trace!("[Auto-Drop] SocketCanTxAdapter closed");
    }
}
