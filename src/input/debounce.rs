//! Click debouncing
//!
//! A click is accepted only once a full window has passed since the last
//! accepted one. Times are passed in so the filter stays deterministic.

use std::time::{Duration, Instant};

/// Time-window filter over accepted clicks
#[derive(Debug, Clone)]
pub struct ClickDebouncer {
    window: Duration,
    /// Time of last accepted click (monitor start before the first one)
    last_accepted: Instant,
}

impl ClickDebouncer {
    pub fn new(window: Duration, origin: Instant) -> Self {
        Self {
            window,
            last_accepted: origin,
        }
    }

    /// True if a click at `now` falls outside the window
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accepted) >= self.window
    }

    /// Record an accepted click; never moves backwards
    pub fn record(&mut self, now: Instant) {
        if now > self.last_accepted {
            self.last_accepted = now;
        }
    }

    #[cfg(test)]
    pub fn last_accepted(&self) -> Instant {
        self.last_accepted
    }
}
