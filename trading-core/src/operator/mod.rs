//! The operator HTTP surface (spec.md §6): read endpoints for health/state/
//! events/positions/orders, action endpoints that append ledger events
//! rather than mutate state directly.

mod routes;
mod state;

pub use routes::router;
pub use state::OperatorState;
