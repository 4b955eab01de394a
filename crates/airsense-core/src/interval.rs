//! Millisecond interval timer driven by the caller's clock

/// Fires once every `interval_ms` of caller-supplied time.
///
/// The timer starts at time zero, so the first firing is one full interval
/// after boot. Each firing restarts the interval from the time it fired,
/// whether or not the caller's work then succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u64,
    last_ms: u64,
}

impl IntervalTimer {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_ms: 0,
        }
    }

    pub const fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Whether the interval has elapsed at `now_ms`. Restarts it if so.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_ms) >= self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}
