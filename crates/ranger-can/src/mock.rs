//! 内存 Mock 总线
//!
//! `MockCanAdapter` 模拟一条只连接了本机与底盘的 CAN 总线：
//! - 测试代码通过 `MockCanHandle::inject()` 注入"底盘 -> 主机"的帧
//! - 适配器发出的帧可通过 `MockCanHandle::sent_frames()` / `recv_sent()` 观察
//!
//! 不依赖任何硬件，所有平台可用。

use crate::{CanAdapter, CanError, RangerFrame, RxAdapter, SplittableAdapter, TxAdapter};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use std::time::Duration;

/// 默认读超时，与 SocketCAN 适配器一致
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// 内存 CAN 适配器
pub struct MockCanAdapter {
    rx: Receiver<RangerFrame>,
    tx: Sender<RangerFrame>,
    // 保留一个注入端，handle 被丢弃后适配器仍只会超时而不会报断开
    _inject_keepalive: Sender<RangerFrame>,
    read_timeout: Duration,
}

/// 测试侧句柄：注入 RX 帧、观察 TX 帧
#[derive(Clone)]
pub struct MockCanHandle {
    inject: Sender<RangerFrame>,
    sent: Receiver<RangerFrame>,
}

impl MockCanAdapter {
    /// 创建 Mock 适配器与对应的测试句柄
    pub fn new() -> (Self, MockCanHandle) {
        let (inject_tx, inject_rx) = unbounded();
        let (sent_tx, sent_rx) = unbounded();
        let adapter = Self {
            rx: inject_rx,
            tx: sent_tx,
            _inject_keepalive: inject_tx.clone(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        };
        let handle = MockCanHandle {
            inject: inject_tx,
            sent: sent_rx,
        };
        (adapter, handle)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

fn recv_with_timeout(
    rx: &Receiver<RangerFrame>,
    timeout: Duration,
) -> Result<RangerFrame, CanError> {
    if timeout.is_zero() {
        return match rx.try_recv() {
            Ok(frame) => Ok(frame),
            Err(TryRecvError::Empty) => Err(CanError::Timeout),
            Err(TryRecvError::Disconnected) => Err(CanError::NotStarted),
        };
    }
    match rx.recv_timeout(timeout) {
        Ok(frame) => Ok(frame),
        Err(RecvTimeoutError::Timeout) => Err(CanError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(CanError::NotStarted),
    }
}

fn send_to(tx: &Sender<RangerFrame>, frame: RangerFrame) -> Result<(), CanError> {
    // 测试句柄已丢弃时，帧直接丢在总线上
    let _ = tx.send(frame);
    Ok(())
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError> {
        send_to(&self.tx, frame)
    }

    fn receive(&mut self) -> Result<RangerFrame, CanError> {
        recv_with_timeout(&self.rx, self.read_timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }
}

/// Mock RX 半部
pub struct MockRxAdapter {
    rx: Receiver<RangerFrame>,
    _inject_keepalive: Sender<RangerFrame>,
    read_timeout: Duration,
}

impl RxAdapter for MockRxAdapter {
    fn receive(&mut self) -> Result<RangerFrame, CanError> {
        recv_with_timeout(&self.rx, self.read_timeout)
    }
}

/// Mock TX 半部
pub struct MockTxAdapter {
    tx: Sender<RangerFrame>,
}

impl TxAdapter for MockTxAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError> {
        send_to(&self.tx, frame)
    }
}

impl SplittableAdapter for MockCanAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        Ok((
            MockRxAdapter {
                rx: self.rx,
                _inject_keepalive: self._inject_keepalive,
                read_timeout: self.read_timeout,
            },
            MockTxAdapter { tx: self.tx },
        ))
    }
}

impl MockCanHandle {
    /// 注入一帧"底盘 -> 主机"的数据
    pub fn inject(&self, frame: RangerFrame) {
        let _ = self.inject.send(frame);
    }

    /// 取出适配器迄今发送的所有帧（按发送顺序）
    pub fn sent_frames(&self) -> Vec<RangerFrame> {
        self.sent.try_iter().collect()
    }

    /// 等待下一帧发送，超时返回 `None`
    pub fn recv_sent(&self, timeout: Duration) -> Option<RangerFrame> {
        self.sent.recv_timeout(timeout).ok()
    }

    /// 等待直到发送出指定 ID 的帧，期间其他帧被丢弃
    pub fn wait_for_sent(&self, id: u32, timeout: Duration) -> Option<RangerFrame> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let frame = self.sent.recv_timeout(remaining).ok()?;
            if frame.id == id {
                return Some(frame);
            }
        }
    }
}
