//! Per-worker request pacing.
//!
//! Every worker owns one token bucket with burst 1, replenished at the
//! configured interval. Aggregate request rate is therefore
//! worker-count / interval; there is deliberately no global cap.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};

/// Single-token bucket backed by a tokio interval.
pub struct RateLimiter {
    ticker: Interval,
}

impl RateLimiter {
    /// One token per `period`. The first acquire is immediate.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }

    /// Wait until a token is available.
    pub async fn acquire(&mut self) {
        self.ticker.tick().await;
    }
}
