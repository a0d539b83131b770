//! Retransmission timer.
//!
//! Reliable delivery requires that the oldest unacknowledged packet is
//! re-sent if no ACK arrives within a bounded time.  [`RetransmitTimer`]
//! records when that packet was last (re)transmitted and reports whether the
//! fixed retransmission timeout (RTO) has elapsed since then.
//!
//! The timer never reads the clock itself; every call takes `now` so the
//! event loop (and tests) decide what time it is.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    started_at: Instant,
}

impl RetransmitTimer {
    pub fn new(rto: Duration, now: Instant) -> Self {
        Self {
            rto,
            started_at: now,
        }
    }

    /// Restart the interval at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.started_at = now;
    }

    /// `true` once at least one RTO has passed since the last reset.
    pub fn expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.rto
    }

    /// Time since the last reset; zero if `now` is earlier than the reset.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}
