//! Order and position data model.
//!
//! Grounded on the teacher's `execution::types::{Order, Side, OrderType}` and
//! `risk::types::Position`, adapted from the teacher's bare-`String`
//! `OrderId`/`f64`-adjacent fields to the crate-wide [`ClientOrderId`] and
//! [`rust_decimal::Decimal`] everywhere money or quantity is represented —
//! spec.md forbids floats for anything that touches PnL.

use super::{ClientOrderId, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The side that would close a position opened on `self`.
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Sign multiplier: +1 for Long, -1 for Short. Used throughout the risk
    /// and PnL math so direction never needs an `if`.
    pub fn sign(self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => -Decimal::ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Order type, restricted to what the execution engine actually emits
/// (spec.md §4.7): entries are always market or limit, protective orders are
/// always reduce-only stop/take-profit markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

/// Lifecycle status of an order as tracked in `TradingState`. This is the
/// type-erased status attached to an [`Order`] record; the compile-time
/// typestate transitions that produce it live in `execution::order_fsm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// An order as tracked by `TradingState`, keyed by [`ClientOrderId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
    /// Leverage the entry was sized at, carried on the order so the reducer
    /// can open the position at the right leverage once it fills rather
    /// than guessing a default (spec.md §3: `Position.leverage`).
    pub leverage: Decimal,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Order {
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }
}

/// An open position, as tracked by `TradingState`, keyed by [`Symbol`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    /// Best price seen since entry in the position's favor, used by the
    /// trailing stop to enforce "never widen" (spec.md §4.7 invariant).
    pub trailing_high_water: Option<Decimal>,
    pub cumulative_funding: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.entry_price
    }

    /// Unrealized PnL against a mark price, signed by side.
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        (mark_price - self.entry_price) * self.quantity * self.side.sign()
    }

    pub fn is_long(&self) -> bool {
        matches!(self.side, Side::Long)
    }

    pub fn is_short(&self) -> bool {
        matches!(self.side, Side::Short)
    }
}
