//! Shared value types used across every layer of the trading core.

mod errors;
mod ids;
mod position;
mod proposal;
mod time;

pub use errors::{DomainError, TransportError};
pub use ids::{ClientOrderId, EventId, Sequence, Symbol, TradeId};
pub use position::{Order, OrderStatus, OrderType, Position, Side};
pub use proposal::{PendingEntry, PendingEntryState, TradeProposal};
pub use time::{now, Clock, SystemClock};

use serde::{Deserialize, Serialize};

/// Market-wide risk classification attached to a symbol by the (external) news
/// ingestion pipeline. Only the classification matters to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsRisk {
    Low,
    Medium,
    High,
}

/// A per-symbol news risk flag with an expiry, as reduced into `TradingState`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewsRiskFlag {
    pub level: NewsRisk,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl NewsRiskFlag {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}
