//! Poll timestamps.
//!
//! Rates are measured on a monotonic clock so that wall-clock steps (NTP,
//! manual changes) never distort them. The wall clock is only used to stamp
//! views and history points for display.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// When a poll happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTime {
    /// Unix timestamp in milliseconds, for display.
    pub wall_ms: u64,
    /// Milliseconds on a monotonic clock, for elapsed time.
    pub monotonic_ms: u64,
}

impl PollTime {
    /// Both clocks read the same value. Handy for replaying fixtures.
    pub const fn at(ms: u64) -> Self {
        Self {
            wall_ms: ms,
            monotonic_ms: ms,
        }
    }

    /// Read both clocks, measuring the monotonic part from `origin`.
    pub fn since(origin: Instant) -> Self {
        Self {
            wall_ms: now_ms(),
            monotonic_ms: origin.elapsed().as_millis() as u64,
        }
    }

    /// Seconds between two polls on the monotonic clock, if positive.
    pub fn secs_since(&self, earlier: &PollTime) -> Option<f64> {
        let secs = self.monotonic_ms.saturating_sub(earlier.monotonic_ms) as f64 / 1000.0;
        (secs > 0.0).then_some(secs)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
