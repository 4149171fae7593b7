//! 线程隔离测试
//!
//! 验证双线程模式：
//! 1. RX 线程不受 TX 故障影响
//! 2. RX 致命错误后 TX 线程随之退出
//! 3. 命令按入队顺序发出

use ranger_sdk::can::{CanDeviceError, CanDeviceErrorKind, CanError, RangerFrame, RxAdapter, TxAdapter};
use ranger_sdk::driver::{RangerContext, RangerMetrics, rx_loop, tx_loop};
use ranger_sdk::protocol::VehicleVariant;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Mock RX 适配器：按固定间隔吐出预置帧
struct MockRxAdapter {
    frames: VecDeque<RangerFrame>,
    receive_delay: Duration,
    should_fail: Arc<AtomicBool>,
}

impl MockRxAdapter {
    fn new(frames: Vec<RangerFrame>, receive_delay: Duration) -> Self {
        Self {
            frames: VecDeque::from(frames),
            receive_delay,
            should_fail: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RxAdapter for MockRxAdapter {
    fn receive(&mut self) -> Result<RangerFrame, CanError> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NoDevice,
                "Device disconnected",
            )));
        }

        thread::sleep(self.receive_delay);

        self.frames.pop_front().ok_or(CanError::Timeout)
    }
}

/// Mock TX 适配器：可模拟超时，记录发送顺序
struct MockTxAdapter {
    send_delay: Duration,
    should_timeout: Arc<AtomicBool>,
    sent: Arc<parking_lot::Mutex<Vec<RangerFrame>>>,
}

impl MockTxAdapter {
    fn new(send_delay: Duration) -> Self {
        Self {
            send_delay,
            should_timeout: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }
}

impl TxAdapter for MockTxAdapter {
    fn send(&mut self, frame: RangerFrame) -> Result<(), CanError> {
        if self.should_timeout.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(20));
            return Err(CanError::Timeout);
        }

        thread::sleep(self.send_delay);
        self.sent.lock().push(frame);
        Ok(())
    }
}

/// 执行器高速反馈帧（0x251~0x254 轮换）
fn generate_test_frames(count: usize) -> Vec<RangerFrame> {
    (0..count)
        .map(|i| RangerFrame::new_standard((0x251 + (i % 4)) as u16, &[i as u8; 8]))
        .collect()
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

struct Harness {
    ctx: Arc<RangerContext>,
    metrics: Arc<RangerMetrics>,
    is_running: Arc<AtomicBool>,
    cmd_tx: crossbeam_channel::Sender<RangerFrame>,
    rx_handle: thread::JoinHandle<()>,
    tx_handle: thread::JoinHandle<()>,
}

impl Harness {
    fn start(rx_adapter: MockRxAdapter, tx_adapter: MockTxAdapter) -> Self {
        let ctx = Arc::new(RangerContext::new(VehicleVariant::Standard));
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(RangerMetrics::new());
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<RangerFrame>(10);

        let rx_handle = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            thread::spawn(move || rx_loop(rx_adapter, ctx, is_running, metrics))
        };

        let tx_handle = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            thread::spawn(move || tx_loop(tx_adapter, cmd_rx, ctx, is_running, metrics))
        };

        Self {
            ctx,
            metrics,
            is_running,
            cmd_tx,
            rx_handle,
            tx_handle,
        }
    }

    fn stop(self) {
        self.is_running.store(false, Ordering::Relaxed);
        let _ = self.rx_handle.join();
        let _ = self.tx_handle.join();
    }
}

#[test]
fn test_rx_unaffected_by_tx_timeout() {
    // RX 每 2ms 一帧，TX 每次发送都超时
    let rx_adapter = MockRxAdapter::new(generate_test_frames(100), Duration::from_millis(2));
    let tx_adapter = MockTxAdapter::new(Duration::from_millis(1));
    tx_adapter.should_timeout.store(true, Ordering::Relaxed);

    let harness = Harness::start(rx_adapter, tx_adapter);

    thread::sleep(Duration::from_millis(20));
    let initial_rx_count = harness.metrics.rx_frames_valid.load(Ordering::Relaxed);

    for i in 0..3u8 {
        harness
            .cmd_tx
            .send(RangerFrame::new_standard(0x111, &[i; 8]))
            .unwrap();
    }

    thread::sleep(Duration::from_millis(100));

    let rx_updates = harness
        .metrics
        .rx_frames_valid
        .load(Ordering::Relaxed)
        .saturating_sub(initial_rx_count);
    assert!(
        rx_updates > 0,
        "RX should continue receiving frames even when TX has issues. Received: {}",
        rx_updates
    );
    assert!(wait_until(Duration::from_secs(1), || {
        harness.metrics.tx_timeouts.load(Ordering::Relaxed) > 0
    }));
    assert!(harness.ctx.actuator_state.load().timestamp.is_set());

    harness.stop();
}

#[test]
fn test_tx_detects_rx_failure() {
    let rx_adapter = MockRxAdapter::new(generate_test_frames(10), Duration::from_millis(2));
    let rx_should_fail = rx_adapter.should_fail.clone();
    let tx_adapter = MockTxAdapter::new(Duration::from_millis(1));

    let harness = Harness::start(rx_adapter, tx_adapter);
    thread::sleep(Duration::from_millis(20));

    rx_should_fail.store(true, Ordering::Relaxed);
    let start = Instant::now();

    let mut both_exited = false;
    for _ in 0..30 {
        if harness.rx_handle.is_finished() && harness.tx_handle.is_finished() {
            both_exited = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let elapsed = start.elapsed();

    assert!(
        both_exited,
        "Both threads should exit after RX failure. Elapsed: {:?}",
        elapsed
    );
    assert!(
        !harness.is_running.load(Ordering::Relaxed),
        "is_running flag should be false after RX failure"
    );
    assert!(harness.metrics.device_errors.load(Ordering::Relaxed) >= 1);

    harness.stop();
}

#[test]
fn test_commands_sent_in_queue_order() {
    let rx_adapter = MockRxAdapter::new(Vec::new(), Duration::from_millis(1));
    let tx_adapter = MockTxAdapter::new(Duration::ZERO);
    let sent = tx_adapter.sent.clone();

    let harness = Harness::start(rx_adapter, tx_adapter);

    for i in 0..8u8 {
        harness
            .cmd_tx
            .send(RangerFrame::new_standard(0x121, &[1, 0, 0, 0, 0, 0, 0, i]))
            .unwrap();
    }

    let deadline = Instant::now() + Duration::from_millis(500);
    while sent.lock().len() < 8 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    let counts: Vec<u8> = sent.lock().iter().map(|f| f.data[7]).collect();
    assert_eq!(counts, (0..8).collect::<Vec<_>>());
    assert_eq!(harness.metrics.tx_frames_total.load(Ordering::Relaxed), 8);

    harness.stop();
}
