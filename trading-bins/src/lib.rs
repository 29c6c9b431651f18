//! Shared bootstrap and concrete loop tasks for the three run-mode
//! binaries (`trading-paper`, `trading-testnet`, `trading-live`).
//!
//! Grounded on the teacher's `bog-bins` crate: one binary per strategy/mode
//! combination sharing a `common` module, generalized here to one binary
//! per run mode sharing both `common` (bootstrap) and `tasks` (the concrete
//! `LoopTask`s `trading-core::orchestrator` doesn't own).

pub mod common;
pub mod market_data;
pub mod tasks;
