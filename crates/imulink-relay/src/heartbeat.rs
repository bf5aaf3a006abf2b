//! Liveness heartbeat.
//!
//! Fires on a fixed period independent of the data path; the forwarder
//! polls it every loop iteration and emits a `HEARTBEAT` line while the
//! upstream link is connected. It keeps firing with no samples flowing.

use std::time::{Duration, Instant};

/// Default emission period.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(3000);

/// Period timer for the liveness frame.
pub struct HeartbeatMonitor {
    period: Duration,
    last: Instant,
}

impl HeartbeatMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Instant::now(),
        }
    }

    /// True once per elapsed period; the timer rearms on a true return.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last) >= self.period {
            self.last = now;
            return true;
        }
        false
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_PERIOD)
    }
}
