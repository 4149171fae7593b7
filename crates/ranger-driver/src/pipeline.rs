//! IO 循环
//!
//! 两种运行方式：
//!
//! - 单线程：`io_loop` 在同一线程内交替收发（任意 `CanAdapter`）
//! - 双线程：`rx_loop` / `tx_loop` 分别持有可分离适配器的两半，互不阻塞
//!
//! 接收到的帧先触发钩子，再按 ID 解码、写入状态快照。

use crate::metrics::RangerMetrics;
use crate::state::{
    ActuatorHsStateMessage, ActuatorLsStateMessage, BmsBasicMessage, LightStateMessage,
    MotionModeStateMessage, MotionStateMessage, OdometryMessage, RangerContext, RcStateMessage,
    SystemStateMessage,
};
use crossbeam_channel::Receiver;
use ranger_can::{CanAdapter, CanError, RxAdapter, TxAdapter};
use ranger_protocol::{
    ActuatorHsFeedback, ActuatorLsFeedback, BmsBasicFeedback, ID_ACTUATOR_HS_BASE,
    ID_ACTUATOR_LS_BASE, ID_BMS_BASIC, ID_LIGHT_STATE, ID_MOTION_MODE_STATE, ID_MOTION_STATE,
    ID_MOTION_STATE_V1, ID_MOTOR_ANGLE, ID_MOTOR_SPEED, ID_ODOMETRY, ID_RC_STATE,
    ID_SYSTEM_STATE, ID_SYSTEM_STATE_V1, ID_VERSION_RESPONSE, LegacyMotionStateFeedback,
    LegacySystemStateFeedback, LightStateFeedback, MotionModeFeedback, MotionStateFeedback,
    MotorAngleFeedback, MotorSpeedFeedback, OdometryFeedback, ProtocolError, ProtocolVersion,
    RangerFrame, RcStateFeedback, SystemStateFeedback, VersionResponse, actuator_index,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, trace, warn};

/// Pipeline 配置
///
/// ```
/// use ranger_driver::PipelineConfig;
///
/// let config = PipelineConfig {
///     receive_timeout_ms: 5,
///     ..Default::default()
/// };
/// assert_eq!(config.connection_timeout_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// CAN 接收超时（毫秒），决定 IO 线程检查退出标志的最大间隔
    pub receive_timeout_ms: u64,
    /// 超过该时间没有反馈视为断连（毫秒）
    pub connection_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 2,
            connection_timeout_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// 已解码并写入状态
    Applied,
    /// 未知 ID，或不属于已确定的协议版本
    Ignored,
}

/// IO 线程循环（单线程模式）
///
/// 命令通道断开（驱动被丢弃）时退出。
pub fn io_loop(
    mut can: impl CanAdapter,
    cmd_rx: Receiver<RangerFrame>,
    ctx: Arc<RangerContext>,
    metrics: Arc<RangerMetrics>,
) {
    loop {
        // 进入循环先发一波积压的命令
        if drain_tx_queue(&mut can, &cmd_rx, &ctx, &metrics) {
            break;
        }

        let frame = match can.receive() {
            Ok(frame) => {
                metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
                frame
            },
            Err(CanError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) => {
                error!("CAN receive error: {}", e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            },
        };

        handle_frame(&frame, &ctx, &metrics);

        // 收到帧后立即发送（上层往往已计算出新的指令）
        if drain_tx_queue(&mut can, &cmd_rx, &ctx, &metrics) {
            break;
        }
    }

    trace!("IO thread: loop exited");
}

/// Drain TX 队列（带时间预算）
///
/// 单次最多 32 帧、0.5ms，避免积压命令拖慢接收。
/// 返回命令通道是否已断开。
fn drain_tx_queue(
    can: &mut impl CanAdapter,
    cmd_rx: &Receiver<RangerFrame>,
    ctx: &RangerContext,
    metrics: &RangerMetrics,
) -> bool {
    const MAX_DRAIN_PER_CYCLE: usize = 32;
    const TIME_BUDGET: Duration = Duration::from_micros(500);

    let start = std::time::Instant::now();

    for _ in 0..MAX_DRAIN_PER_CYCLE {
        if start.elapsed() > TIME_BUDGET {
            trace!("Drain time budget exhausted, deferred {} frames", cmd_rx.len());
            break;
        }

        match cmd_rx.try_recv() {
            Ok(frame) => match can.send(frame) {
                Ok(()) => on_frame_sent(&frame, ctx, metrics),
                Err(e) => {
                    // 发送失败不中断 drain
                    error!("Failed to send control frame: {}", e);
                    metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                },
            },
            Err(crossbeam_channel::TryRecvError::Empty) => break,
            Err(crossbeam_channel::TryRecvError::Disconnected) => return true,
        }
    }

    false
}

/// RX 线程主循环（双线程模式）
///
/// `is_running` 为 false 或遇到致命错误时退出；致命错误会同时清除
/// `is_running`，让 TX 线程一并退出。
pub fn rx_loop(
    mut rx: impl RxAdapter,
    ctx: Arc<RangerContext>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RangerMetrics>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("RX thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set RX thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let frame = match rx.receive() {
            Ok(frame) => {
                metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
                frame
            },
            Err(CanError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) => {
                error!("RX thread: CAN receive error: {}", e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);

                if e.is_fatal() {
                    error!("RX thread: Fatal error detected, setting is_running = false");
                    is_running.store(false, Ordering::Release);
                    break;
                }
                continue;
            },
        };

        handle_frame(&frame, &ctx, &metrics);
    }

    trace!("RX thread: loop exited");
}

/// TX 线程主循环（双线程模式）
///
/// 命令按入队顺序逐帧发送。
pub fn tx_loop(
    mut tx: impl TxAdapter,
    cmd_rx: Receiver<RangerFrame>,
    ctx: Arc<RangerContext>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RangerMetrics>,
) {
    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        let frame = match crossbeam_channel::select! {
            recv(cmd_rx) -> msg => msg,
            default(Duration::from_millis(1)) => {
                // 超时，回到循环开头检查 is_running
                continue;
            },
        } {
            Ok(frame) => frame,
            Err(_) => {
                trace!("TX thread: command channel disconnected");
                break;
            },
        };

        match tx.send(frame) {
            Ok(()) => on_frame_sent(&frame, &ctx, &metrics),
            Err(e) => {
                error!("TX thread: Failed to send frame: {}", e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                if matches!(e, CanError::Timeout) {
                    metrics.tx_timeouts.fetch_add(1, Ordering::Relaxed);
                }

                if e.is_fatal() {
                    error!("TX thread: Fatal error detected, setting is_running = false");
                    is_running.store(false, Ordering::Release);
                    break;
                }
            },
        }
    }

    trace!("TX thread: loop exited");
}

fn on_frame_sent(frame: &RangerFrame, ctx: &RangerContext, metrics: &RangerMetrics) {
    // try_read：锁被占用时跳过本次回调，不阻塞 IO
    if let Some(hooks) = ctx.hooks.try_read() {
        hooks.trigger_all_sent(frame);
    }
    metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
}

/// 收到一帧后的公共处理：钩子、解码、指标、连接监控
fn handle_frame(frame: &RangerFrame, ctx: &RangerContext, metrics: &RangerMetrics) {
    if let Some(hooks) = ctx.hooks.try_read() {
        hooks.trigger_all(frame);
    }

    match parse_and_update_state(frame, ctx) {
        Ok(FrameDisposition::Applied) => {
            metrics.rx_frames_valid.fetch_add(1, Ordering::Relaxed);
        },
        Ok(FrameDisposition::Ignored) => {
            trace!("Ignoring frame 0x{:X}", frame.id);
            metrics.rx_frames_ignored.fetch_add(1, Ordering::Relaxed);
        },
        Err(e) => {
            warn!("Dropping malformed frame 0x{:X}: {}", frame.id, e);
            metrics.rx_parse_errors.fetch_add(1, Ordering::Relaxed);
        },
    }

    ctx.connection_monitor.register_feedback();
}

/// 按 CAN ID 解码一帧并写入对应快照
///
/// 版本规则：
/// - 0x211 / 0x151 在解码成功后触发被动版本识别
/// - 版本确定后，另一代协议独有的帧被忽略
/// - 版本未确定时按 V2 解码，V1 独有的运动状态帧被忽略
///
/// 解码失败时快照保持不变。
pub fn parse_and_update_state(
    frame: &RangerFrame,
    ctx: &RangerContext,
) -> Result<FrameDisposition, ProtocolError> {
    let resolved = ctx.version.current();
    let variant = ctx.variant;

    match frame.id {
        ID_SYSTEM_STATE => {
            if resolved == ProtocolVersion::AgxV1 {
                return Ok(FrameDisposition::Ignored);
            }
            let fb = SystemStateFeedback::try_from(*frame)?;
            ctx.version.detect(ProtocolVersion::AgxV2);
            ctx.update_core(|s| s.system_state = SystemStateMessage::from(fb));
        },
        ID_SYSTEM_STATE_V1 => {
            if resolved == ProtocolVersion::AgxV2 {
                return Ok(FrameDisposition::Ignored);
            }
            let LegacySystemStateFeedback(fb) = LegacySystemStateFeedback::try_from(*frame)?;
            ctx.version.detect(ProtocolVersion::AgxV1);
            ctx.update_core(|s| s.system_state = SystemStateMessage::from(fb));
        },
        ID_MOTION_STATE => {
            if ctx.version.decode_version() != ProtocolVersion::AgxV2 {
                return Ok(FrameDisposition::Ignored);
            }
            let fb = MotionStateFeedback::try_from(*frame)?;
            ctx.update_core(|s| s.motion_state = MotionStateMessage::from_feedback(&fb, variant));
        },
        ID_MOTION_STATE_V1 => {
            if ctx.version.decode_version() != ProtocolVersion::AgxV1 {
                return Ok(FrameDisposition::Ignored);
            }
            let fb = LegacyMotionStateFeedback::try_from(*frame)?;
            ctx.update_core(|s| {
                s.motion_state = MotionStateMessage::from_legacy_feedback(&fb, variant)
            });
        },
        ID_LIGHT_STATE => {
            let fb = LightStateFeedback::try_from(*frame)?;
            ctx.update_core(|s| s.light_state = LightStateMessage::from(fb));
        },
        ID_MOTION_MODE_STATE => {
            let fb = MotionModeFeedback::try_from(*frame)?;
            ctx.update_core(|s| s.motion_mode_state = MotionModeStateMessage::from(fb));
        },
        ID_RC_STATE => {
            let fb = RcStateFeedback::try_from(*frame)?;
            ctx.update_core(|s| s.rc_state = RcStateMessage::from(fb));
        },
        ID_ODOMETRY => {
            let fb = OdometryFeedback::try_from(*frame)?;
            ctx.update_core(|s| s.odometry = OdometryMessage::from(fb));
        },
        ID_MOTOR_ANGLE => {
            let fb = MotorAngleFeedback::try_from(*frame)?;
            let sign = variant.steering_sign();
            let angles = fb.angles_rad().map(|a| a * sign);
            ctx.update_actuator(|s| s.motor_angles = angles.into());
        },
        ID_MOTOR_SPEED => {
            let fb = MotorSpeedFeedback::try_from(*frame)?;
            ctx.update_actuator(|s| s.motor_speeds = fb.speeds_mps().into());
        },
        ID_BMS_BASIC => {
            let fb = BmsBasicFeedback::try_from(*frame)?;
            ctx.update_common_sensor(|s| s.bms_basic_state = BmsBasicMessage::from(fb));
        },
        ID_VERSION_RESPONSE => {
            let response = VersionResponse::try_from(*frame)?;
            ctx.version.on_version_response(response.firmware_versions());
        },
        id if actuator_index(id, ID_ACTUATOR_HS_BASE).is_some() => {
            let fb = ActuatorHsFeedback::try_from(*frame)?;
            let index = fb.index;
            ctx.update_actuator(|s| s.actuator_hs_state[index] = ActuatorHsStateMessage::from(fb));
        },
        id if actuator_index(id, ID_ACTUATOR_LS_BASE).is_some() => {
            let fb = ActuatorLsFeedback::try_from(*frame)?;
            let index = fb.index;
            ctx.update_actuator(|s| s.actuator_ls_state[index] = ActuatorLsStateMessage::from(fb));
        },
        _ => return Ok(FrameDisposition::Ignored),
    }

    Ok(FrameDisposition::Applied)
}
