//! IO 链路指标
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use ranger_driver::RangerMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = RangerMetrics::new();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct RangerMetrics {
    /// RX 接收的总帧数
    pub rx_frames_total: AtomicU64,

    /// 成功解析并写入状态的帧数
    pub rx_frames_valid: AtomicU64,

    /// 解析失败（长度不足、非法枚举值等）被丢弃的帧数
    pub rx_parse_errors: AtomicU64,

    /// 未知 ID 或不属于当前协议版本而被忽略的帧数
    pub rx_frames_ignored: AtomicU64,

    /// TX 发送的总帧数
    pub tx_frames_total: AtomicU64,

    /// 命令通道满导致的丢弃次数
    pub tx_drops: AtomicU64,

    /// CAN 设备错误次数
    pub device_errors: AtomicU64,

    /// RX 超时次数（无数据时正常出现）
    pub rx_timeouts: AtomicU64,

    /// TX 超时次数（说明总线拥塞或设备响应慢）
    pub tx_timeouts: AtomicU64,
}

impl RangerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器的当前值
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_valid: self.rx_frames_valid.load(Ordering::Relaxed),
            rx_parse_errors: self.rx_parse_errors.load(Ordering::Relaxed),
            rx_frames_ignored: self.rx_frames_ignored.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_drops: self.tx_drops.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_timeouts: self.tx_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 所有计数器清零
    pub fn reset(&self) {
        self.rx_frames_total.store(0, Ordering::Relaxed);
        self.rx_frames_valid.store(0, Ordering::Relaxed);
        self.rx_parse_errors.store(0, Ordering::Relaxed);
        self.rx_frames_ignored.store(0, Ordering::Relaxed);
        self.tx_frames_total.store(0, Ordering::Relaxed);
        self.tx_drops.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.tx_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_frames_valid: u64,
    pub rx_parse_errors: u64,
    pub rx_frames_ignored: u64,
    pub tx_frames_total: u64,
    pub tx_drops: u64,
    pub device_errors: u64,
    pub rx_timeouts: u64,
    pub tx_timeouts: u64,
}

impl MetricsSnapshot {
    /// 有效帧率（百分比），`rx_frames_total` 为 0 时返回 0.0
    pub fn valid_frame_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_frames_valid as f64 / self.rx_frames_total as f64) * 100.0
    }

    /// 解析错误率（百分比），`rx_frames_total` 为 0 时返回 0.0
    pub fn parse_error_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_parse_errors as f64 / self.rx_frames_total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = RangerMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_increment() {
        let metrics = RangerMetrics::new();
        metrics.rx_frames_total.fetch_add(10, Ordering::Relaxed);
        metrics.rx_frames_valid.fetch_add(7, Ordering::Relaxed);
        metrics.rx_parse_errors.fetch_add(1, Ordering::Relaxed);
        metrics.rx_frames_ignored.fetch_add(2, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_frames_total, 10);
        assert_eq!(snapshot.rx_frames_valid, 7);
        assert_eq!(snapshot.rx_parse_errors, 1);
        assert_eq!(snapshot.rx_frames_ignored, 2);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = RangerMetrics::new();
        metrics.rx_frames_total.fetch_add(100, Ordering::Relaxed);
        metrics.tx_frames_total.fetch_add(50, Ordering::Relaxed);
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_rates() {
        let snapshot = MetricsSnapshot {
            rx_frames_total: 200,
            rx_frames_valid: 150,
            rx_parse_errors: 10,
            ..Default::default()
        };
        assert!((snapshot.valid_frame_rate() - 75.0).abs() < 1e-9);
        assert!((snapshot.parse_error_rate() - 5.0).abs() < 1e-9);
        assert_eq!(MetricsSnapshot::default().valid_frame_rate(), 0.0);
    }

    #[test]
    fn test_metrics_concurrent_updates() {
        let metrics = Arc::new(RangerMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tx_frames_total, 4000);
    }
}
