//! Single-timestamp throttle for continuous pointer updates.
//!
//! # How the gate works
//!
//! The gate remembers only when it last admitted an update.  A new update is
//! admitted when at least `interval` has elapsed since then (a tie admits);
//! anything earlier is rejected and simply discarded by the caller.  There is
//! no queue and no token bucket, so a rejected update never comes back later:
//! the next admitted update carries the latest position anyway.
//!
//! The caller passes `now` explicitly, which keeps the gate deterministic in
//! tests and lets the publisher read the clock once per callback.

use std::time::{Duration, Instant};

use crate::domain::config::PublishInterval;

/// Admits at most one continuous update per interval.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl IntervalGate {
    /// Creates an open gate for `interval`; the first update is always admitted.
    pub fn new(interval: PublishInterval) -> Self {
        Self {
            interval: interval.as_duration(),
            last_admitted: None,
        }
    }

    /// Returns the configured spacing between admitted updates.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decides whether an update arriving at `now` may be published.
    ///
    /// Records `now` as the last admission when it returns `true`.
    pub fn try_admit(&mut self, now: Instant) -> bool {
        let admit = match self.last_admitted {
            None => true,
            // `saturating_duration_since` guards against a caller-supplied
            // clock that steps backwards.
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if admit {
            self.last_admitted = Some(now);
        }
        admit
    }

    /// Forgets the last admission so the next update is admitted immediately.
    pub fn reset(&mut self) {
        self.last_admitted = None;
    }

    /// Adopts a new interval and reopens the gate.
    pub fn rearm(&mut self, interval: PublishInterval) {
        self.interval = interval.as_duration();
        self.last_admitted = None;
    }
}

impl Default for IntervalGate {
    fn default() -> Self {
        Self::new(PublishInterval::default())
    }
}
