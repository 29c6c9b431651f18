//! The pure, table-driven reducer: folds one [`Event`] into a
//! [`TradingState`] at a time. Exactly the fields named per event kind in
//! spec.md §4.2 change; everything else is left untouched.

use super::TradingState;
use crate::domain::{NewsRiskFlag, Order, OrderStatus, OrderType, Position};
use crate::event::{Event, EventKind};
use rust_decimal::Decimal;
use tracing::warn;

/// Fold `event` into `state` in place. Idempotent: applying the same event
/// twice is a no-op the second time because `last_applied_sequence` gates
/// re-application (spec.md §8's idempotence property). `has_applied_event`
/// is tracked separately from `last_applied_sequence` so that replaying
/// sequence zero a second time is caught too — sequences start at zero, so
/// the sequence field alone can't tell "nothing applied yet" from "the last
/// applied event was zero".
pub fn apply(state: &mut TradingState, event: &Event) {
    if state.has_applied_event && event.sequence <= state.last_applied_sequence {
        return;
    }

    match &event.kind {
        EventKind::UniverseUpdated { symbols } => {
            state.universe = symbols.iter().cloned().collect();
        }

        EventKind::OrderPlaced { order } => {
            state.open_orders.insert(order.client_order_id.as_str().to_string(), order.clone());
        }

        EventKind::OrderFilled {
            client_order_id,
            fill_price,
            fill_quantity,
            reduce_only,
        } => apply_order_filled(state, client_order_id.as_str(), *fill_price, *fill_quantity, *reduce_only),

        EventKind::OrderPartialFill {
            client_order_id,
            fill_price,
            fill_quantity,
        } => apply_partial_fill(state, client_order_id.as_str(), *fill_price, *fill_quantity),

        EventKind::OrderCancelled { client_order_id } => {
            if let Some(order) = state.open_orders.get_mut(client_order_id.as_str()) {
                order.status = OrderStatus::Cancelled;
            }
            state.open_orders.remove(client_order_id.as_str());
        }

        EventKind::OrderExpired { client_order_id, .. } => {
            if let Some(order) = state.open_orders.get_mut(client_order_id.as_str()) {
                order.status = OrderStatus::Expired;
            }
            state.open_orders.remove(client_order_id.as_str());
        }

        EventKind::PositionOpened { position } => {
            state.positions.insert(position.symbol.clone(), position.clone());
        }

        EventKind::PositionClosed { symbol, realized_pnl, .. } => {
            state.positions.remove(symbol);
            state.realized_pnl_today += *realized_pnl;
            if *realized_pnl < Decimal::ZERO {
                state.consecutive_losses += 1;
                state.daily_loss += -*realized_pnl;
            } else {
                state.consecutive_losses = 0;
            }
            if state.equity > state.peak_equity {
                state.peak_equity = state.equity;
            }
        }

        EventKind::NewsClassified { symbol, level, expires_at } => {
            state.news_risk_flags.insert(
                symbol.clone(),
                NewsRiskFlag { level: *level, expires_at: *expires_at },
            );
        }

        EventKind::ManualInterventionDetected { .. } => {
            state.requires_manual_review = true;
        }

        EventKind::ManualReviewAcknowledged { .. } => {
            // Acknowledging clears the review flag but not the breaker itself
            // (spec.md §4.2): the breaker condition must independently clear.
            state.requires_manual_review = false;
        }

        EventKind::CircuitBreakerTriggered { .. } => {
            state.circuit_breaker_active = true;
            state.requires_manual_review = true;
        }

        EventKind::FundingSettlement { symbol, cashflow, .. } => {
            state.equity -= *cashflow;
            if let Some(position) = state.positions.get_mut(symbol) {
                position.cumulative_funding += *cashflow;
            }
        }

        EventKind::ReconciliationCompleted { .. } => {
            state.last_reconciliation_time = Some(event.timestamp);
        }

        // Events that don't change TradingState fields directly: audit-only,
        // or their effects are captured by a companion event kind above.
        EventKind::SystemStarted
        | EventKind::SystemStopped
        | EventKind::ShutdownInitiated { .. }
        | EventKind::SymbolFiltered { .. }
        | EventKind::NewsIngested { .. }
        | EventKind::SignalComputed { .. }
        | EventKind::TradeProposed { .. }
        | EventKind::TradeCycleCompleted { .. }
        | EventKind::RiskApproved { .. }
        | EventKind::RiskRejected { .. }
        | EventKind::EntrySkipped { .. }
        | EventKind::PositionUpdated { .. }
        | EventKind::StopTriggered { .. }
        | EventKind::AccountSettingUpdated { .. }
        | EventKind::AccountSettingFailed { .. }
        | EventKind::ProtectiveOrdersVerified { .. }
        | EventKind::ProtectiveOrdersMissing { .. }
        | EventKind::ProtectiveOrdersReplaced { .. }
        | EventKind::FundingUpdate { .. } => {}
    }

    state.last_applied_sequence = event.sequence;
    state.has_applied_event = true;
}

fn apply_order_filled(
    state: &mut TradingState,
    client_order_id: &str,
    fill_price: Decimal,
    fill_quantity: Decimal,
    reduce_only: bool,
) {
    let Some(order) = state.open_orders.get_mut(client_order_id) else {
        warn!(client_order_id, "OrderFilled for unknown order, ignoring");
        return;
    };
    order.filled_quantity = fill_quantity;
    order.avg_fill_price = Some(fill_price);
    order.status = OrderStatus::Filled;
    order.last_updated = crate::domain::now();

    let order_snapshot = order.clone();
    state.open_orders.remove(client_order_id);

    if !reduce_only {
        let position = Position {
            symbol: order_snapshot.symbol.clone(),
            side: order_snapshot.side,
            quantity: fill_quantity,
            entry_price: fill_price,
            leverage: order_snapshot.leverage,
            opened_at: crate::domain::now(),
            stop_price: order_snapshot.stop_price,
            take_profit_price: None,
            trailing_high_water: None,
            cumulative_funding: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        };
        state.positions.insert(position.symbol.clone(), position);
    } else if let Some(position) = state.positions.get(&order_snapshot.symbol).cloned() {
        let realized_pnl = position.unrealized_pnl(fill_price);
        state.equity += realized_pnl;
        state.realized_pnl_today += realized_pnl;
        if realized_pnl < Decimal::ZERO {
            state.consecutive_losses += 1;
            state.daily_loss += -realized_pnl;
        } else {
            state.consecutive_losses = 0;
        }
        if state.equity > state.peak_equity {
            state.peak_equity = state.equity;
        }
        state.positions.remove(&order_snapshot.symbol);
    }
}

fn apply_partial_fill(state: &mut TradingState, client_order_id: &str, fill_price: Decimal, fill_quantity: Decimal) {
    let Some(order) = state.open_orders.get_mut(client_order_id) else {
        warn!(client_order_id, "OrderPartialFill for unknown order, ignoring");
        return;
    };
    order.filled_quantity += fill_quantity;
    order.avg_fill_price = Some(weighted_avg_price(order, fill_price, fill_quantity));
    order.status = OrderStatus::PartiallyFilled;
    order.last_updated = crate::domain::now();

    if !order.reduce_only && order.order_type != OrderType::StopMarket {
        let filled_so_far = order.filled_quantity;
        let avg_price = order.avg_fill_price.unwrap_or(fill_price);
        let symbol = order.symbol.clone();
        let side = order.side;
        let stop_price = order.stop_price;
        let leverage = order.leverage;

        state
            .positions
            .entry(symbol.clone())
            .and_modify(|p| {
                p.quantity = filled_so_far;
                p.entry_price = avg_price;
            })
            .or_insert_with(|| Position {
                symbol,
                side,
                quantity: filled_so_far,
                entry_price: avg_price,
                leverage,
                opened_at: crate::domain::now(),
                stop_price,
                take_profit_price: None,
                trailing_high_water: None,
                cumulative_funding: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
            });
    }
}

fn weighted_avg_price(order: &Order, new_fill_price: Decimal, new_fill_quantity: Decimal) -> Decimal {
    let prior_quantity = order.filled_quantity - new_fill_quantity;
    if prior_quantity <= Decimal::ZERO {
        return new_fill_price;
    }
    let prior_notional = order.avg_fill_price.unwrap_or(new_fill_price) * prior_quantity;
    let new_notional = new_fill_price * new_fill_quantity;
    (prior_notional + new_notional) / order.filled_quantity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientOrderId, EventId, Sequence, Side, Symbol};
    use crate::event::Metadata;
    use rust_decimal_macros::dec;

    fn order_placed_event(seq: u64, coid: &str) -> Event {
        let order = Order {
            client_order_id: ClientOrderId::new(coid),
            exchange_order_id: None,
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            order_type: OrderType::Market,
            quantity: dec!(1),
            limit_price: None,
            stop_price: Some(dec!(41000)),
            reduce_only: false,
            leverage: dec!(3),
            status: OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            created_at: crate::domain::now(),
            last_updated: crate::domain::now(),
        };
        Event {
            event_id: EventId::generate(),
            timestamp: crate::domain::now(),
            sequence: Sequence(seq),
            kind: EventKind::OrderPlaced { order },
            metadata: Metadata::source("test"),
        }
    }

    fn order_filled_event(seq: u64, coid: &str, reduce_only: bool) -> Event {
        Event {
            event_id: EventId::generate(),
            timestamp: crate::domain::now(),
            sequence: Sequence(seq),
            kind: EventKind::OrderFilled {
                client_order_id: ClientOrderId::new(coid),
                fill_price: dec!(42000),
                fill_quantity: dec!(1),
                reduce_only,
            },
            metadata: Metadata::source("test"),
        }
    }

    #[test]
    fn order_placed_then_filled_opens_position() {
        let mut state = TradingState::new(dec!(10000));
        apply(&mut state, &order_placed_event(0, "abc"));
        assert!(state.open_orders.contains_key("abc"));

        apply(&mut state, &order_filled_event(1, "abc", false));
        assert!(!state.open_orders.contains_key("abc"));
        let position = state.positions.get(&Symbol::new("BTCUSDT")).unwrap();
        assert_eq!(position.leverage, dec!(3));
        assert_eq!(state.last_applied_sequence, Sequence(1));
    }

    #[test]
    fn replaying_same_event_twice_is_idempotent() {
        let mut state = TradingState::new(dec!(10000));
        let event = order_placed_event(0, "abc");
        apply(&mut state, &event);
        apply(&mut state, &event);
        assert_eq!(state.open_orders.len(), 1);
    }

    #[test]
    fn replaying_sequence_zero_twice_is_idempotent() {
        let event = Event {
            event_id: EventId::generate(),
            timestamp: crate::domain::now(),
            sequence: Sequence(0),
            kind: EventKind::FundingSettlement { symbol: Symbol::new("BTCUSDT"), settled_at: crate::domain::now(), cashflow: dec!(5) },
            metadata: Metadata::source("test"),
        };
        let mut state = TradingState::new(dec!(10000));
        apply(&mut state, &event);
        apply(&mut state, &event);
        assert_eq!(state.equity, dec!(9995));
    }

    #[test]
    fn reduce_only_fill_closes_position_and_updates_pnl() {
        let mut state = TradingState::new(dec!(10000));
        state.positions.insert(
            Symbol::new("BTCUSDT"),
            Position {
                symbol: Symbol::new("BTCUSDT"),
                side: Side::Long,
                quantity: dec!(1),
                entry_price: dec!(40000),
                leverage: dec!(1),
                opened_at: crate::domain::now(),
                stop_price: None,
                take_profit_price: None,
                trailing_high_water: None,
                cumulative_funding: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
            },
        );
        apply(&mut state, &order_placed_event(0, "close1"));
        // Mark the placed order reduce-only by re-inserting it directly, since
        // the fixture helper always builds a non-reduce-only entry order.
        if let Some(order) = state.open_orders.get_mut("close1") {
            order.reduce_only = true;
        }

        apply(&mut state, &order_filled_event(1, "close1", true));

        assert!(!state.positions.contains_key(&Symbol::new("BTCUSDT")));
        assert_eq!(state.equity, dec!(12000));
        assert_eq!(state.consecutive_losses, 0);
    }
}
