//! Cadence-loop driver: wraps a [`LoopTask`] in a `tokio::time::interval`
//! ticker, isolates per-iteration failures, and checks the kill switch at
//! every tick boundary (spec.md §5's "each loop checks for cancellation at
//! every suspension point").
//!
//! Grounded on the teacher-adjacent `cooprefr-bettersys` vault engine's
//! `run_long_engine`/`run_nav_snapshot_loop` shape (`interval.tick().await`
//! in a loop, `MissedTickBehavior::Skip`, log-and-continue on error),
//! generalized into one reusable driver instead of one hand-written loop per
//! concern.

use super::task::BoxedLoopTask;
use crate::resilience::KillSwitch;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Spawns a cadence loop. On a failed iteration, the next tick uses
/// `retry_cadence` instead of `cadence` (spec.md §5: "Universe: 24h, 5m
/// retry on failure") — tasks with no distinct retry cadence simply pass the
/// same duration for both.
pub fn spawn_cadence_loop(
    mut task: BoxedLoopTask,
    cadence: Duration,
    retry_cadence: Duration,
    kill_switch: KillSwitch,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name().to_string();
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if kill_switch.should_stop() {
                info!(loop_name = %name, "cadence loop stopping on kill switch");
                return;
            }
            if kill_switch.is_paused() {
                continue;
            }

            match task.run_once().await {
                Ok(()) => interval.reset_after(cadence),
                Err(e) => {
                    warn!(loop_name = %name, error = %e, "loop iteration failed, retrying on retry cadence");
                    interval.reset_after(retry_cadence);
                }
            }
        }
    })
}

/// Spawns a loop that performs `task` once at every UTC midnight boundary,
/// alongside whatever recurring cadence already covers the rest of the day
/// (spec.md §5: "Telemetry: 5m, plus a daily summary at UTC 00:00").
pub fn spawn_daily_summary_loop(mut task: BoxedLoopTask, kill_switch: KillSwitch) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name().to_string();
        loop {
            let sleep_for = duration_until_next_midnight_utc();
            tokio::time::sleep(sleep_for).await;
            if kill_switch.should_stop() {
                info!(loop_name = %name, "daily summary loop stopping on kill switch");
                return;
            }
            if let Err(e) = task.run_once().await {
                error!(loop_name = %name, error = %e, "daily summary task failed");
            }
        }
    })
}

fn duration_until_next_midnight_utc() -> Duration {
    let now = crate::domain::now();
    let next_midnight = (now + chrono::Duration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    (next_midnight - now).to_std().unwrap_or(Duration::from_secs(60))
}

/// Spawns the continuous user-stream loop, processing messages from `rx` in
/// arrival order until the channel closes or the kill switch fires.
pub fn spawn_user_stream_loop(
    mut rx: tokio::sync::mpsc::Receiver<Box<dyn std::any::Any + Send>>,
    mut task: BoxedLoopTask,
    kill_switch: KillSwitch,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name().to_string();
        loop {
            tokio::select! {
                message = rx.recv() => {
                    if message.is_none() {
                        info!(loop_name = %name, "user-stream channel closed");
                        return;
                    }
                    if kill_switch.should_stop() {
                        return;
                    }
                    if let Err(e) = task.run_once().await {
                        warn!(loop_name = %name, error = %e, "user-stream message handling failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTask {
        count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl crate::orchestrator::task::LoopTask for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run_once(&mut self) -> anyhow::Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn stops_promptly_on_kill_switch() {
        let count = Arc::new(AtomicUsize::new(0));
        let kill_switch = KillSwitch::new();
        let task: BoxedLoopTask = Box::new(CountingTask { count: count.clone() });

        let handle = spawn_cadence_loop(task, Duration::from_millis(10), Duration::from_millis(10), kill_switch.clone());
        tokio::time::sleep(Duration::from_millis(35)).await;
        kill_switch.shutdown("test");
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert!(count.load(Ordering::SeqCst) >= 1);
    }
}
