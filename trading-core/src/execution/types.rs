//! The `Executor` trait and the `Fill` record it produces.
//!
//! Grounded on the teacher's `execution::{Executor, Fill}` — the
//! architecture diagram in `execution::mod` names three implementations
//! (`SimulatedExecutor`, a live DEX executor, a journaled production
//! executor); this crate keeps the same seam: `paper::PaperExecutor`
//! (renamed from `SimulatedExecutor`, §4.8) is one implementor, a live
//! exchange adapter (out of scope here, §1) is another.

use crate::domain::{ClientOrderId, OrderType, Side, Symbol};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fill reported by an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Fill {
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Signed position delta this fill causes: positive for a buy-side fill,
    /// negative for a sell-side fill.
    pub fn position_change(&self) -> Decimal {
        self.quantity * self.side.sign()
    }

    /// Net cash flow including fees: negative for a buy (cash out), positive
    /// for a sell (cash in), fee always deducted.
    pub fn cash_flow(&self) -> Decimal {
        -self.position_change() * self.price - self.fee
    }
}

/// A request to place an order, independent of lifecycle bookkeeping (that
/// lives in `order_fsm`).
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
}

/// Order placement/cancellation/status backend. Implemented once for paper
/// trading (`paper::PaperExecutor`) and once per live exchange adapter
/// (out of scope for this crate per spec.md §1).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn place_order(&self, request: OrderRequest) -> Result<String>;
    async fn cancel_order(&self, client_order_id: &ClientOrderId) -> Result<()>;
    async fn get_fills(&self, client_order_id: &ClientOrderId) -> Result<Vec<Fill>>;
    async fn best_bid_ask(&self, symbol: &Symbol) -> Result<(Decimal, Decimal)>;
}
