//! The signal layer's output (`TradeProposal`) and the execution engine's
//! durable record of an in-flight entry (`PendingEntry`), per spec.md §3.

use super::{ClientOrderId, Side, Symbol, TradeId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Produced by the scoring/selection layer, consumed by the risk engine and
/// the execution engine. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub take_profit: Option<Decimal>,
    pub atr: Decimal,
    pub leverage: Decimal,
    pub composite_score: Decimal,
    pub funding_rate: Decimal,
    pub news_risk: super::NewsRisk,
    pub trade_id: TradeId,
    pub candle_timestamp: DateTime<Utc>,
}

/// Lifecycle state of a [`PendingEntry`], distinct from [`super::OrderStatus`]
/// because a pending entry tracks the *intent*, not the order itself — it
/// survives cancel-and-replace (timeout conversion) under a new
/// `client_order_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingEntryState {
    Placed,
    Open,
}

/// The durable record of an in-flight entry, installed on `OrderPlaced` and
/// removed on fill finalization or explicit cancel/expiry (spec.md §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub client_order_id: ClientOrderId,
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub side: Side,
    pub intended_entry_price: Decimal,
    pub intended_stop: Decimal,
    pub intended_take_profit: Option<Decimal>,
    pub quantity: Decimal,
    pub leverage: Decimal,
    pub lifecycle_state: PendingEntryState,
    pub candle_timestamp: DateTime<Utc>,
    pub attempt_count: u32,
    /// Set when this entry is a timeout-driven replacement of an earlier
    /// order, preserving lineage across cancel/re-place (spec.md §4.7).
    pub original_client_order_id: Option<ClientOrderId>,
}

impl PendingEntry {
    /// The key the execution engine uses for the duplicate-proposal check in
    /// spec.md §4.7 step 1.
    pub fn dedup_key(&self) -> (Symbol, DateTime<Utc>) {
        (self.symbol.clone(), self.candle_timestamp)
    }
}
