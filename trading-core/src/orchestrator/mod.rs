//! The concurrent loop set (spec.md §5, L5): one independent, cancellable
//! task per cadence-driven concern, all sharing a [`KillSwitch`] for
//! cooperative shutdown.
//!
//! `trading-core` owns only the scheduling harness ([`task::LoopTask`],
//! [`driver`]); the concrete tasks (universe refresh, news ingest, a
//! strategy cycle, reconciliation, the watchdog sweep, telemetry) are
//! assembled by the binary that wires an exchange client and the strategy
//! crate together, then handed to [`Orchestrator::spawn`].

mod driver;
mod task;

pub use driver::{spawn_cadence_loop, spawn_daily_summary_loop, spawn_user_stream_loop};
pub use task::{BoxedLoopTask, LoopTask};

use crate::config::LoopCadences;
use crate::resilience::KillSwitch;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Named slots matching spec.md §5's loop catalogue. `Orchestrator::spawn`
/// reads the matching cadence out of [`LoopCadences`] for each slot so
/// callers never have to duplicate the cadence table.
pub enum LoopSlot {
    Universe,
    News,
    Strategy,
    Reconciliation,
    Watchdog,
    Telemetry,
}

pub struct Orchestrator {
    cadences: LoopCadences,
    kill_switch: KillSwitch,
    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(cadences: LoopCadences, kill_switch: KillSwitch) -> Self {
        Self { cadences, kill_switch, handles: Vec::new() }
    }

    /// Spawns `task` on the cadence named by `slot`, tracking its handle for
    /// [`Orchestrator::join_all`].
    pub fn spawn(&mut self, slot: LoopSlot, task: BoxedLoopTask) {
        let (cadence, retry_cadence) = self.cadence_for(slot);
        let handle = spawn_cadence_loop(task, cadence, retry_cadence, self.kill_switch.clone());
        self.handles.push(handle);
    }

    /// Spawns `task` to run once per UTC day boundary, independent of the
    /// telemetry cadence loop (spec.md §5: "Telemetry: 5m, plus a daily
    /// summary at UTC 00:00").
    pub fn spawn_daily(&mut self, task: BoxedLoopTask) {
        let handle = spawn_daily_summary_loop(task, self.kill_switch.clone());
        self.handles.push(handle);
    }

    /// Spawns the continuous user-stream consumer.
    pub fn spawn_user_stream(
        &mut self,
        rx: tokio::sync::mpsc::Receiver<Box<dyn std::any::Any + Send>>,
        task: BoxedLoopTask,
    ) {
        let handle = spawn_user_stream_loop(rx, task, self.kill_switch.clone());
        self.handles.push(handle);
    }

    fn cadence_for(&self, slot: LoopSlot) -> (Duration, Duration) {
        let c = &self.cadences;
        match slot {
            LoopSlot::Universe => {
                (Duration::from_secs(c.universe_interval_sec), Duration::from_secs(c.universe_retry_interval_sec))
            }
            LoopSlot::News => (Duration::from_secs(c.news_interval_sec), Duration::from_secs(c.news_interval_sec)),
            LoopSlot::Strategy => {
                (Duration::from_secs(c.strategy_interval_sec), Duration::from_secs(c.strategy_interval_sec))
            }
            LoopSlot::Reconciliation => (
                Duration::from_secs(c.reconciliation_interval_sec),
                Duration::from_secs(c.reconciliation_interval_sec),
            ),
            LoopSlot::Watchdog => {
                (Duration::from_secs(c.watchdog_interval_sec), Duration::from_secs(c.watchdog_interval_sec))
            }
            LoopSlot::Telemetry => {
                (Duration::from_secs(c.telemetry_interval_sec), Duration::from_secs(c.telemetry_interval_sec))
            }
        }
    }

    /// Awaits every spawned loop. Returns once all have exited, which only
    /// happens after the kill switch fires.
    pub async fn join_all(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoopTask(Arc<AtomicUsize>);

    #[async_trait]
    impl LoopTask for NoopTask {
        fn name(&self) -> &str {
            "noop"
        }

        async fn run_once(&mut self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn spawned_loop_runs_until_kill_switch() {
        let count = Arc::new(AtomicUsize::new(0));
        let kill_switch = KillSwitch::new();
        let mut cadences = LoopCadences::default();
        cadences.watchdog_interval_sec = 1;
        let mut orchestrator = Orchestrator::new(cadences, kill_switch.clone());

        orchestrator.spawn(LoopSlot::Watchdog, Box::new(NoopTask(count.clone())));
        tokio::time::sleep(Duration::from_millis(20)).await;
        kill_switch.shutdown("test");
        tokio::time::timeout(Duration::from_secs(3), orchestrator.join_all()).await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 1);
    }
}
