//! Order lifecycle as a typestate machine.
//!
//! Compile-time verified transitions: an `OrderOpen` has no `reject` method,
//! a terminal state has no `fill` method — invalid transitions simply don't
//! compile. Adapted from the teacher's `core::order_fsm` (fixed-point `u64`
//! price/quantity, zero-cost marker structs) to `rust_decimal::Decimal`,
//! since this crate's quantities are never on a fixed tick grid known at
//! compile time. The type-erased [`OrderState`] enum is kept as-is: it's
//! what lets heterogeneous lifecycle states live in one `HashMap`.

use crate::domain::{ClientOrderId, OrderStatus, OrderType, Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillError {
    ZeroQuantity,
    ZeroPrice,
    ExceedsRemaining { fill_qty: Decimal, remaining_qty: Decimal },
}

impl std::fmt::Display for FillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillError::ZeroQuantity => write!(f, "fill quantity cannot be zero"),
            FillError::ZeroPrice => write!(f, "fill price cannot be zero"),
            FillError::ExceedsRemaining { fill_qty, remaining_qty } => {
                write!(f, "fill quantity {fill_qty} exceeds remaining {remaining_qty}")
            }
        }
    }
}

impl std::error::Error for FillError {}

/// Fields shared by every lifecycle state.
#[derive(Debug, Clone)]
pub struct OrderData {
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderData {
    fn new(client_order_id: ClientOrderId, symbol: Symbol, side: Side, order_type: OrderType, quantity: Decimal) -> Self {
        let now = crate::domain::now();
        Self {
            client_order_id,
            exchange_order_id: None,
            symbol,
            side,
            order_type,
            quantity,
            limit_price: None,
            stop_price: None,
            reduce_only: false,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }
}

macro_rules! state_struct {
    ($name:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            data: OrderData,
        }

        impl $name {
            pub fn data(&self) -> &OrderData {
                &self.data
            }
        }
    };
}

state_struct!(OrderPending);
state_struct!(OrderOpen);
state_struct!(OrderPartiallyFilled);
state_struct!(OrderFilled);
state_struct!(OrderCancelled);
state_struct!(OrderRejected);
state_struct!(OrderExpired);

pub enum FillResult {
    Filled(OrderFilled),
    PartiallyFilled(OrderPartiallyFilled),
}

pub enum FillResultOrError {
    Ok(FillResult),
    Err(FillError),
}

pub enum PartialFillResult {
    Filled(OrderFilled),
    PartiallyFilled(OrderPartiallyFilled),
}

pub enum PartialFillResultOrError {
    Ok(PartialFillResult),
    Err(FillError),
}

impl OrderPending {
    pub fn new(client_order_id: ClientOrderId, symbol: Symbol, side: Side, order_type: OrderType, quantity: Decimal) -> Self {
        Self {
            data: OrderData::new(client_order_id, symbol, side, order_type, quantity),
        }
    }

    pub fn with_prices(mut self, limit_price: Option<Decimal>, stop_price: Option<Decimal>) -> Self {
        self.data.limit_price = limit_price;
        self.data.stop_price = stop_price;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.data.reduce_only = true;
        self
    }

    pub fn acknowledge(mut self, exchange_order_id: String) -> OrderOpen {
        self.data.exchange_order_id = Some(exchange_order_id);
        self.data.updated_at = crate::domain::now();
        OrderOpen { data: self.data }
    }

    pub fn reject(mut self) -> OrderRejected {
        self.data.updated_at = crate::domain::now();
        OrderRejected { data: self.data }
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Pending
    }
}

impl OrderOpen {
    fn apply_fill(&mut self, fill_quantity: Decimal, fill_price: Decimal) -> Result<(), FillError> {
        if fill_quantity.is_zero() {
            return Err(FillError::ZeroQuantity);
        }
        if fill_price.is_zero() {
            return Err(FillError::ZeroPrice);
        }
        let remaining = self.data.remaining_quantity();
        if fill_quantity > remaining {
            return Err(FillError::ExceedsRemaining { fill_qty: fill_quantity, remaining_qty: remaining });
        }
        self.data.filled_quantity += fill_quantity;
        self.data.avg_fill_price = Some(fill_price);
        self.data.updated_at = crate::domain::now();
        Ok(())
    }

    pub fn fill(mut self, fill_quantity: Decimal, fill_price: Decimal) -> FillResultOrError {
        match self.apply_fill(fill_quantity, fill_price) {
            Err(e) => FillResultOrError::Err(e),
            Ok(()) => {
                if self.data.is_fully_filled() {
                    FillResultOrError::Ok(FillResult::Filled(OrderFilled { data: self.data }))
                } else {
                    FillResultOrError::Ok(FillResult::PartiallyFilled(OrderPartiallyFilled { data: self.data }))
                }
            }
        }
    }

    pub fn cancel(mut self) -> OrderCancelled {
        self.data.updated_at = crate::domain::now();
        OrderCancelled { data: self.data }
    }

    pub fn expire(mut self) -> OrderExpired {
        self.data.updated_at = crate::domain::now();
        OrderExpired { data: self.data }
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Open
    }
}

impl OrderPartiallyFilled {
    fn apply_fill(&mut self, fill_quantity: Decimal, fill_price: Decimal) -> Result<(), FillError> {
        if fill_quantity.is_zero() {
            return Err(FillError::ZeroQuantity);
        }
        if fill_price.is_zero() {
            return Err(FillError::ZeroPrice);
        }
        let remaining = self.data.remaining_quantity();
        if fill_quantity > remaining {
            return Err(FillError::ExceedsRemaining { fill_qty: fill_quantity, remaining_qty: remaining });
        }
        let prior_notional = self.data.avg_fill_price.unwrap_or(fill_price) * self.data.filled_quantity;
        self.data.filled_quantity += fill_quantity;
        self.data.avg_fill_price = Some((prior_notional + fill_price * fill_quantity) / self.data.filled_quantity);
        self.data.updated_at = crate::domain::now();
        Ok(())
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.data.filled_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.data.remaining_quantity()
    }

    pub fn fill(mut self, fill_quantity: Decimal, fill_price: Decimal) -> PartialFillResultOrError {
        match self.apply_fill(fill_quantity, fill_price) {
            Err(e) => PartialFillResultOrError::Err(e),
            Ok(()) => {
                if self.data.is_fully_filled() {
                    PartialFillResultOrError::Ok(PartialFillResult::Filled(OrderFilled { data: self.data }))
                } else {
                    PartialFillResultOrError::Ok(PartialFillResult::PartiallyFilled(OrderPartiallyFilled { data: self.data }))
                }
            }
        }
    }

    pub fn cancel(mut self) -> OrderCancelled {
        self.data.updated_at = crate::domain::now();
        OrderCancelled { data: self.data }
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::PartiallyFilled
    }
}

impl OrderFilled {
    pub fn filled_quantity(&self) -> Decimal {
        self.data.filled_quantity
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Filled
    }
}

impl OrderCancelled {
    pub fn filled_quantity(&self) -> Decimal {
        self.data.filled_quantity
    }

    pub fn was_partially_filled(&self) -> bool {
        self.data.filled_quantity > Decimal::ZERO
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Cancelled
    }
}

impl OrderRejected {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::Rejected
    }
}

impl OrderExpired {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::Expired
    }
}

/// Type-erased wrapper so a `HashMap<ClientOrderId, OrderState>` can hold
/// orders in any lifecycle stage.
pub enum OrderState {
    Pending(OrderPending),
    Open(OrderOpen),
    PartiallyFilled(OrderPartiallyFilled),
    Filled(OrderFilled),
    Cancelled(OrderCancelled),
    Rejected(OrderRejected),
    Expired(OrderExpired),
}

impl OrderState {
    pub fn data(&self) -> &OrderData {
        match self {
            OrderState::Pending(o) => o.data(),
            OrderState::Open(o) => o.data(),
            OrderState::PartiallyFilled(o) => o.data(),
            OrderState::Filled(o) => o.data(),
            OrderState::Cancelled(o) => o.data(),
            OrderState::Rejected(o) => o.data(),
            OrderState::Expired(o) => o.data(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        match self {
            OrderState::Pending(o) => o.status(),
            OrderState::Open(o) => o.status(),
            OrderState::PartiallyFilled(o) => o.status(),
            OrderState::Filled(o) => o.status(),
            OrderState::Cancelled(o) => o.status(),
            OrderState::Rejected(o) => o.status(),
            OrderState::Expired(o) => o.status(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl From<OrderPending> for OrderState {
    fn from(o: OrderPending) -> Self {
        OrderState::Pending(o)
    }
}
impl From<OrderOpen> for OrderState {
    fn from(o: OrderOpen) -> Self {
        OrderState::Open(o)
    }
}
impl From<OrderPartiallyFilled> for OrderState {
    fn from(o: OrderPartiallyFilled) -> Self {
        OrderState::PartiallyFilled(o)
    }
}
impl From<OrderFilled> for OrderState {
    fn from(o: OrderFilled) -> Self {
        OrderState::Filled(o)
    }
}
impl From<OrderCancelled> for OrderState {
    fn from(o: OrderCancelled) -> Self {
        OrderState::Cancelled(o)
    }
}
impl From<OrderRejected> for OrderState {
    fn from(o: OrderRejected) -> Self {
        OrderState::Rejected(o)
    }
}
impl From<OrderExpired> for OrderState {
    fn from(o: OrderExpired) -> Self {
        OrderState::Expired(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending() -> OrderPending {
        OrderPending::new(
            ClientOrderId::new("BTCUSDT_LONG_1"),
            Symbol::new("BTCUSDT"),
            Side::Long,
            OrderType::Market,
            dec!(1),
        )
    }

    #[test]
    fn full_fill_reaches_terminal_state() {
        let open = pending().acknowledge("EX-1".into());
        match open.fill(dec!(1), dec!(42000)) {
            FillResultOrError::Ok(FillResult::Filled(filled)) => {
                assert_eq!(filled.filled_quantity(), dec!(1));
            }
            _ => panic!("expected full fill"),
        }
    }

    #[test]
    fn partial_then_complete_fill() {
        let open = pending().acknowledge("EX-1".into());
        let partial = match open.fill(dec!(0.4), dec!(42000)) {
            FillResultOrError::Ok(FillResult::PartiallyFilled(p)) => p,
            _ => panic!("expected partial fill"),
        };
        assert_eq!(partial.remaining_quantity(), dec!(0.6));

        match partial.fill(dec!(0.6), dec!(42010)) {
            PartialFillResultOrError::Ok(PartialFillResult::Filled(filled)) => {
                assert_eq!(filled.filled_quantity(), dec!(1));
            }
            _ => panic!("expected final fill"),
        }
    }

    #[test]
    fn overfill_is_rejected() {
        let open = pending().acknowledge("EX-1".into());
        match open.fill(dec!(2), dec!(42000)) {
            FillResultOrError::Err(FillError::ExceedsRemaining { .. }) => {}
            _ => panic!("expected overfill error"),
        }
    }

    #[test]
    fn order_state_reports_terminal_correctly() {
        let cancelled: OrderState = pending().acknowledge("EX-1".into()).cancel().into();
        assert!(cancelled.is_terminal());
        assert!(!cancelled.is_active());
    }
}
