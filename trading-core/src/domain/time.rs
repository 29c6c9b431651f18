//! Clock abstraction.
//!
//! Every cooldown, circuit-breaker window, and reconciliation cadence in this
//! crate reads the time through a [`Clock`] rather than calling
//! `Utc::now()` directly, so tests can drive a fake clock instead of sleeping.
//! The teacher doesn't need this (its HFT engine reads `Instant::now()`
//! inline), but spec.md §5's clock-discipline requirement (server-time
//! offset, deterministic replay of time-gated logic) calls for it.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Anything that can report the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, adjusted by a signed offset maintained by
/// `resilience::clock_sync` to track exchange server time.
#[derive(Debug, Default)]
pub struct SystemClock {
    offset_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Update the signed offset (server_time - local_time) in milliseconds.
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::milliseconds(self.offset_ms());
        Utc::now() + offset
    }
}

/// Convenience free function for call sites that don't carry a `Clock`
/// handle (logging timestamps, one-off diagnostics).
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_shifts_now() {
        let clock = SystemClock::new();
        let before = clock.now();
        clock.set_offset_ms(60_000);
        let after = clock.now();
        assert!(after - before >= chrono::Duration::seconds(59));
    }
}
