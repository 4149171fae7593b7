//! Ranger 底盘驱动
//!
//! 持有 IO 线程与共享上下文。指令经有界通道交给 IO 线程发送，
//! 状态通过 `ArcSwap` 快照无锁读取。丢弃驱动即停止并回收 IO 线程。

use crate::error::DriverError;
use crate::hooks::HookManager;
use crate::metrics::{MetricsSnapshot, RangerMetrics};
use crate::pipeline::{PipelineConfig, io_loop, rx_loop, tx_loop};
use crate::state::{ActuatorState, CommonSensorState, CoreState, RangerContext};
use crate::version::ResolvePhase;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use ranger_can::{CanAdapter, CanError, SplittableAdapter};
use ranger_protocol::{
    FirmwareVersions, ProtocolVersion, RangerFrame, VehicleVariant, VersionRequestCommand,
};
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// 命令通道容量
const COMMAND_CHANNEL_CAPACITY: usize = 10;

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // watchdog 线程代为 join，超时后它会继续存活直到目标线程结束
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// Ranger 底盘驱动
///
/// - 单线程模式（`new`）：`io_thread` 交替收发
/// - 双线程模式（`new_dual_thread`）：`rx_thread` / `tx_thread` 物理隔离
pub struct RangerDriver {
    /// 命令发送端
    ///
    /// Drop 时必须先于 join 关闭，否则 IO 线程收不到 `Disconnected`。
    cmd_tx: ManuallyDrop<Sender<RangerFrame>>,
    ctx: Arc<RangerContext>,
    io_thread: Option<JoinHandle<()>>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RangerMetrics>,
    /// CAN 接口名称
    interface: String,
}

impl RangerDriver {
    /// 单线程模式
    ///
    /// 适配器被移动到 IO 线程。
    pub fn new(
        mut can: impl CanAdapter + Send + 'static,
        variant: VehicleVariant,
        config: Option<PipelineConfig>,
    ) -> Result<Self, CanError> {
        let config = config.unwrap_or_default();
        can.set_receive_timeout(config.receive_timeout());

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY);
        let ctx = Arc::new(RangerContext::with_connection_timeout(
            variant,
            config.connection_timeout(),
        ));
        let metrics = Arc::new(RangerMetrics::new());

        let io_thread = {
            let ctx = ctx.clone();
            let metrics = metrics.clone();
            spawn(move || io_loop(can, cmd_rx, ctx, metrics))
        };

        Ok(Self {
            cmd_tx: ManuallyDrop::new(cmd_tx),
            ctx,
            io_thread: Some(io_thread),
            rx_thread: None,
            tx_thread: None,
            is_running: Arc::new(AtomicBool::new(true)),
            metrics,
            interface: "unknown".to_string(),
        })
    }

    /// 双线程模式
    ///
    /// 适配器被拆分为 RX/TX 两半，分别由独立线程持有。
    pub fn new_dual_thread<C>(
        mut can: C,
        variant: VehicleVariant,
        config: Option<PipelineConfig>,
    ) -> Result<Self, CanError>
    where
        C: SplittableAdapter + Send + 'static,
        C::RxAdapter: Send + 'static,
        C::TxAdapter: Send + 'static,
    {
        let config = config.unwrap_or_default();
        can.set_receive_timeout(config.receive_timeout());
        let (rx_adapter, tx_adapter) = can.split()?;

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY);
        let ctx = Arc::new(RangerContext::with_connection_timeout(
            variant,
            config.connection_timeout(),
        ));
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(RangerMetrics::new());

        let rx_thread = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            spawn(move || rx_loop(rx_adapter, ctx, is_running, metrics))
        };

        let tx_thread = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            spawn(move || tx_loop(tx_adapter, cmd_rx, ctx, is_running, metrics))
        };

        // 给 RX 线程启动时间，避免紧随其后的 wait_for_feedback 错过首帧
        spin_sleep::sleep(Duration::from_millis(10));

        Ok(Self {
            cmd_tx: ManuallyDrop::new(cmd_tx),
            ctx,
            io_thread: None,
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
            is_running,
            metrics,
            interface: "unknown".to_string(),
        })
    }

    /// 设置接口名称（由 Builder / 上层在构造后调用）
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn variant(&self) -> VehicleVariant {
        self.ctx.variant
    }

    /// 共享上下文（高级用法）
    pub fn context(&self) -> &Arc<RangerContext> {
        &self.ctx
    }

    // ------------------------------------------------------------------
    // 状态读取（无锁）
    // ------------------------------------------------------------------

    pub fn get_core_state(&self) -> CoreState {
        self.ctx.core_state.load().as_ref().clone()
    }

    pub fn get_actuator_state(&self) -> ActuatorState {
        self.ctx.actuator_state.load().as_ref().clone()
    }

    pub fn get_common_sensor_state(&self) -> CommonSensorState {
        self.ctx.common_sensor_state.load().as_ref().clone()
    }

    /// 已确定的协议版本，未确定时为 `Unknown`
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.ctx.version.current()
    }

    pub fn version_phase(&self) -> ResolvePhase {
        self.ctx.version.phase()
    }

    /// 最近一次版本应答携带的固件版本
    pub fn firmware_versions(&self) -> Option<FirmwareVersions> {
        self.ctx.version.firmware()
    }

    // ------------------------------------------------------------------
    // 发送
    // ------------------------------------------------------------------

    /// 发送一帧（非阻塞，Fire-and-Forget）
    ///
    /// # 错误
    /// - `ChannelFull`: 命令通道已满，本帧被丢弃
    /// - `ChannelClosed`: IO 线程已退出
    pub fn send_frame(&self, frame: RangerFrame) -> Result<(), DriverError> {
        self.cmd_tx.try_send(frame).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => {
                self.metrics.tx_drops.fetch_add(1, Ordering::Relaxed);
                DriverError::ChannelFull
            },
            crossbeam_channel::TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 发送一帧，通道满时最多等待 `timeout`
    pub fn send_frame_blocking(
        &self,
        frame: RangerFrame,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.cmd_tx.send_timeout(frame, timeout).map_err(|e| match e {
            crossbeam_channel::SendTimeoutError::Timeout(_) => DriverError::Timeout,
            crossbeam_channel::SendTimeoutError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 发送版本查询并阻塞等待应答
    ///
    /// 返回 `Ok(true)` 表示超时前收到了本次查询之后的应答。
    pub fn request_version(&self, timeout: Duration) -> Result<bool, DriverError> {
        let (seq, previous) = self.ctx.version.begin_request();
        if let Err(e) = self.send_frame(VersionRequestCommand.to_frame()) {
            self.ctx.version.abort_request(previous);
            return Err(e);
        }
        let received = self.ctx.version.wait_for_response(seq, timeout);
        debug!(
            "Version request finished: received={}, version={}",
            received,
            self.ctx.version.current()
        );
        Ok(received)
    }

    // ------------------------------------------------------------------
    // 诊断
    // ------------------------------------------------------------------

    /// 等待任意核心状态反馈
    pub fn wait_for_feedback(&self, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            if self.ctx.core_state.load().timestamp.is_set() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            spin_sleep::sleep(Duration::from_millis(1));
        }
    }

    /// 在连接超时窗口内是否收到过反馈
    pub fn is_connected(&self) -> bool {
        self.ctx.connection_monitor.check_connection()
    }

    /// 距离上一次反馈的时间
    pub fn connection_age(&self) -> Option<Duration> {
        self.ctx.connection_monitor.time_since_last_feedback()
    }

    /// 线程存活状态 `(rx_alive, tx_alive)`；单线程模式下以 IO 线程为准
    pub fn check_health(&self) -> (bool, bool) {
        if let Some(io) = self.io_thread.as_ref() {
            let alive = !io.is_finished();
            return (alive, alive);
        }
        let rx_alive = self.rx_thread.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        let tx_alive = self.tx_thread.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        (rx_alive, tx_alive)
    }

    pub fn is_healthy(&self) -> bool {
        let (rx_alive, tx_alive) = self.check_health();
        rx_alive && tx_alive
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// 钩子管理器
    ///
    /// ```rust,no_run
    /// # use ranger_driver::RangerDriver;
    /// # use ranger_driver::hooks::FrameCallback;
    /// # use ranger_protocol::RangerFrame;
    /// # use std::sync::Arc;
    /// struct Logger;
    /// impl FrameCallback for Logger {
    ///     fn on_frame_received(&self, frame: &RangerFrame) {
    ///         println!("0x{:X}", frame.id);
    ///     }
    /// }
    /// # fn example(driver: &RangerDriver) {
    /// driver.hooks().write().add_callback(Arc::new(Logger));
    /// # }
    /// ```
    pub fn hooks(&self) -> &Arc<RwLock<HookManager>> {
        &self.ctx.hooks
    }
}

impl Drop for RangerDriver {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        // SAFETY: cmd_tx 只在这里被 drop 一次，之后不再访问
        unsafe {
            ManuallyDrop::drop(&mut self.cmd_tx);
        }

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.rx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.tx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.io_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
