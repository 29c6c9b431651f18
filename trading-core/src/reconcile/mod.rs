//! Drift detectors (spec.md L4): [`Reconciler`] compares internal state
//! against exchange truth on a cadence; [`Watchdog`] checks that every open
//! position still has its expected protective orders.
//!
//! Grounded on the teacher's `engine::position_reconciliation::PositionReconciler`
//! for the drift-accounting shape (auto-correct small drift, halt on large
//! drift), generalized from a single scalar position size to the full
//! per-symbol position/order/equity comparison spec.md §4 calls for, and
//! adapted to return pure decisions (`ReconcileOutcome`/`ProtectiveOrdersCheck`)
//! rather than mutate atomics directly, since this crate funnels all state
//! change through the event bus instead.

mod reconciler;
mod watchdog;

pub use reconciler::{ExchangeSnapshot, PositionDrift, ReconcileOutcome, Reconciler};
pub use watchdog::{ProtectiveOrdersCheck, Watchdog};
