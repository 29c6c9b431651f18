//! Server-time offset discipline (spec.md §5: "signed exchange requests use
//! `local_time + offset`... addresses timestamp-tolerance errors").
//!
//! Thin orchestration wrapper around [`crate::domain::time::SystemClock`]:
//! a periodic task calls [`ClockSync::resync`] with a freshly fetched
//! server time and the offset is applied process-wide through the shared
//! clock.

use crate::domain::SystemClock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ClockSync {
    clock: Arc<SystemClock>,
    max_acceptable_drift_ms: i64,
}

impl ClockSync {
    pub fn new(clock: Arc<SystemClock>, max_acceptable_drift_ms: i64) -> Self {
        Self { clock, max_acceptable_drift_ms }
    }

    /// Recompute the offset from a freshly fetched `server_time`, sampled at
    /// local time `local_now`. Warns (but still applies) when drift exceeds
    /// `max_acceptable_drift_ms` — large drift usually means the sync call
    /// itself took a while, not that the exchange clock is wrong.
    pub fn resync(&self, server_time: DateTime<Utc>, local_now: DateTime<Utc>) {
        let offset_ms = (server_time - local_now).num_milliseconds();
        if offset_ms.abs() > self.max_acceptable_drift_ms {
            warn!(offset_ms, max_acceptable_drift_ms = self.max_acceptable_drift_ms, "large clock drift detected");
        } else {
            info!(offset_ms, "clock sync updated offset");
        }
        self.clock.set_offset_ms(offset_ms);
    }

    pub fn current_offset_ms(&self) -> i64 {
        self.clock.offset_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn resync_applies_offset_to_shared_clock() {
        let clock = Arc::new(SystemClock::default());
        let sync = ClockSync::new(clock.clone(), 5_000);
        let local_now = Utc::now();
        let server_time = local_now + Duration::milliseconds(1_500);

        sync.resync(server_time, local_now);

        assert!((sync.current_offset_ms() - 1_500).abs() < 50);
    }

    #[test]
    fn large_drift_still_applies_offset() {
        let clock = Arc::new(SystemClock::default());
        let sync = ClockSync::new(clock, 1_000);
        let local_now = Utc::now();
        let server_time = local_now + Duration::seconds(30);

        sync.resync(server_time, local_now);

        assert!(sync.current_offset_ms() >= 29_000);
    }
}
