//! Trade/order CSV logs and the JSON-lines thinking log (spec.md §6) —
//! analyst-facing records, distinct from the event ledger which is the
//! sole source of truth for state.

mod order_log;
mod thinking_log;
mod trade_log;

pub use order_log::{OrderLog, OrderLogRow};
pub use thinking_log::{symbol_key, ThinkingLog, ThinkingLogRecord};
pub use trade_log::{TradeLog, TradeLogRow};
