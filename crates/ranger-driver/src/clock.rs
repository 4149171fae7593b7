//! Monotonic clock shared by state snapshots and the connection monitor.

use std::sync::OnceLock;
use std::time::Instant;

/// Process-wide time origin, initialized on first use.
static APP_START: OnceLock<Instant> = OnceLock::new();

fn app_start() -> Instant {
    *APP_START.get_or_init(Instant::now)
}

/// Microseconds elapsed since the process-wide origin.
pub fn monotonic_micros() -> u64 {
    app_start().elapsed().as_micros() as u64
}

/// Millisecond timestamp on the monotonic clock.
///
/// `Timestamp::default()` (zero) marks a snapshot that has never been updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Current time. Never returns zero so that updated snapshots are
    /// distinguishable from the default.
    pub fn now() -> Self {
        Self((monotonic_micros() / 1000).max(1))
    }

    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for Timestamp {
    fn from(ms: u64) -> Self {
        Self(ms)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
