//! Connection monitoring based on feedback arrival.
//!
//! The chassis streams feedback continuously while it is powered and the
//! bus is healthy, so "no feedback for `timeout`" is treated as lost contact.

use crate::clock::monotonic_micros;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Tracks when the last feedback frame was received.
pub struct ConnectionMonitor {
    /// Monotonic timestamp of the last feedback (microseconds), 0 = never.
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_feedback: AtomicU64::new(0),
            timeout,
        }
    }

    /// `true` if at least one feedback frame arrived within the timeout.
    pub fn check_connection(&self) -> bool {
        let last = self.last_feedback.load(Ordering::Relaxed);
        if last == 0 {
            return false;
        }
        let elapsed = monotonic_micros().saturating_sub(last);
        elapsed < self.timeout.as_micros() as u64
    }

    /// Record a feedback frame. Called from the receive loop.
    pub fn register_feedback(&self) {
        // max(1): a frame at the very origin must still count as "received"
        self.last_feedback
            .store(monotonic_micros().max(1), Ordering::Relaxed);
    }

    /// Time since the last feedback frame; `None` if nothing was received yet.
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        let last = self.last_feedback.load(Ordering::Relaxed);
        if last == 0 {
            return None;
        }
        Some(Duration::from_micros(
            monotonic_micros().saturating_sub(last),
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_connection_monitor_initial_state() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(100));
        assert!(!monitor.check_connection());
        assert!(monitor.time_since_last_feedback().is_none());
    }

    #[test]
    fn test_connection_monitor_register_feedback() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(100));
        monitor.register_feedback();
        assert!(monitor.check_connection());
        assert!(monitor.time_since_last_feedback().unwrap() < Duration::from_millis(50));
    }

    #[test]
    fn test_connection_monitor_timeout() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(20));
        monitor.register_feedback();
        thread::sleep(Duration::from_millis(40));
        assert!(!monitor.check_connection());
        assert!(monitor.time_since_last_feedback().unwrap() >= Duration::from_millis(20));
    }
}
