//! Fixed-window rate limiting for throttled queues.
//!
//! The worker loop is the single caller, so the limiter needs no
//! internal locking: check the budget before claiming, record after a
//! claim actually succeeds. Tokens never carry over between windows.

use std::time::Duration;

use tokio::time::Instant;

/// How many job starts a queue allows per window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max_starts: u32,
    pub window: Duration,
}

/// Fixed-window counter over [`RateLimit`].
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    window_started: Instant,
    used: u32,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window_started: Instant::now(),
            used: 0,
        }
    }

    fn roll_window(&mut self) {
        if self.window_started.elapsed() >= self.limit.window {
            self.window_started = Instant::now();
            self.used = 0;
        }
    }

    /// Whether another job may start in the current window.
    pub fn has_budget(&mut self) -> bool {
        self.roll_window();
        self.used < self.limit.max_starts
    }

    /// Count one job start against the current window.
    pub fn record_start(&mut self) {
        self.roll_window();
        self.used = self.used.saturating_add(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
