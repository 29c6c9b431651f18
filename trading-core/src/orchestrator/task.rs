//! The unit of work a cadence loop repeats. Concrete tasks (universe
//! refresh, news ingest, a strategy cycle, reconciliation, the watchdog
//! sweep, telemetry) live outside this crate — `trading-core` only owns the
//! scheduling harness, since the work itself needs an exchange client or the
//! scoring engine, neither of which this crate depends on.

use async_trait::async_trait;

#[async_trait]
pub trait LoopTask: Send {
    /// Human-readable name used in log fields; does not need to be unique.
    fn name(&self) -> &str;

    /// Run one iteration. A single iteration's failure is isolated by the
    /// driver (spec.md §7 propagation policy: "a single loop-iteration
    /// failure logs and continues on the next cadence") — this should not
    /// panic on a transient error.
    async fn run_once(&mut self) -> anyhow::Result<()>;
}

pub type BoxedLoopTask = Box<dyn LoopTask>;
