//! Trading core for a single-exchange perpetual-futures execution system.
//!
//! The crate is organized leaves-first, the same dependency order the teacher
//! codebase uses for its engine/execution/resilience split:
//!
//! - [`domain`]: shared value types (ids, Side, Decimal newtypes, clock).
//! - [`event`]: the event bus and durable ledger (L0).
//! - [`state`]: the single-writer reducer that turns an event stream into a
//!   [`state::TradingState`] snapshot (L1).
//! - [`risk`]: the deterministic risk engine (L2).
//! - [`execution`]: order placement, protective-order attachment, trailing
//!   stops, entry timeouts (L3).
//! - [`paper`]: the paper/backtest fill simulator (L3, paper/backtest only).
//! - [`pending`]: the durable pending-entry store (L4).
//! - [`reconcile`]: reconciliation and watchdog drift detectors (L4).
//! - [`resilience`]: backoff, kill switch, single-instance lock, clock sync.
//! - [`logs`]: trade/order CSV logs and the JSON-lines thinking log.
//! - [`config`]: runtime configuration.
//! - [`metrics`]: Prometheus exposition.
//! - [`operator`]: the operator HTTP surface.
//! - [`orchestrator`]: the concurrent loop set (L5).

pub mod config;
pub mod domain;
pub mod event;
pub mod execution;
pub mod logs;
pub mod metrics;
pub mod operator;
pub mod orchestrator;
pub mod paper;
pub mod pending;
pub mod reconcile;
pub mod resilience;
pub mod risk;
pub mod state;

pub use anyhow::{Error, Result};
