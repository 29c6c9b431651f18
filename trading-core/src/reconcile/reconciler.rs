//! Periodic comparison of internal `TradingState` against exchange truth
//! (spec.md §4, glossary: "Reconciliation").

use crate::domain::Symbol;
use crate::state::TradingState;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// What the exchange reports, fetched independently of the ledger.
#[derive(Debug, Clone, Default)]
pub struct ExchangeSnapshot {
    pub positions: HashMap<Symbol, Decimal>,
    pub open_order_ids: HashSet<String>,
    pub equity: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionDrift {
    pub symbol: Symbol,
    pub internal_quantity: Decimal,
    pub exchange_quantity: Decimal,
}

impl PositionDrift {
    pub fn magnitude(&self) -> Decimal {
        (self.internal_quantity - self.exchange_quantity).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub position_drifts: Vec<PositionDrift>,
    pub orphaned_exchange_orders: Vec<String>,
    pub orphaned_internal_orders: Vec<String>,
    pub equity_drift: Decimal,
}

impl ReconcileOutcome {
    pub fn is_clean(&self) -> bool {
        self.position_drifts.is_empty()
            && self.orphaned_exchange_orders.is_empty()
            && self.orphaned_internal_orders.is_empty()
    }
}

pub struct Reconciler {
    pub auto_correct_threshold: Decimal,
    pub halt_threshold: Decimal,
}

impl Reconciler {
    pub fn new(auto_correct_threshold: Decimal, halt_threshold: Decimal) -> Self {
        Self { auto_correct_threshold, halt_threshold }
    }

    /// Compare `state` against `exchange`. Drift within
    /// `auto_correct_threshold` is reported but not escalated; drift at or
    /// above `halt_threshold` should make the caller emit
    /// `ManualInterventionDetected` (spec.md §7: "state drift... pause
    /// trading, do not self-heal").
    pub fn reconcile(&self, state: &TradingState, exchange: &ExchangeSnapshot) -> ReconcileOutcome {
        let mut position_drifts = Vec::new();
        let mut symbols: Vec<&Symbol> = state.positions.keys().chain(exchange.positions.keys()).collect();
        symbols.sort();
        symbols.dedup();

        for symbol in symbols {
            let internal_quantity =
                state.positions.get(symbol).map(|p| p.quantity * p.side.sign()).unwrap_or(Decimal::ZERO);
            let exchange_quantity = exchange.positions.get(symbol).copied().unwrap_or(Decimal::ZERO);
            if internal_quantity != exchange_quantity {
                position_drifts.push(PositionDrift {
                    symbol: symbol.clone(),
                    internal_quantity,
                    exchange_quantity,
                });
            }
        }

        let internal_order_ids: HashSet<&String> =
            state.open_orders.values().filter_map(|o| o.exchange_order_id.as_ref()).collect();
        let orphaned_exchange_orders: Vec<String> =
            exchange.open_order_ids.iter().filter(|id| !internal_order_ids.contains(id)).cloned().collect();
        let orphaned_internal_orders: Vec<String> = internal_order_ids
            .into_iter()
            .filter(|id| !exchange.open_order_ids.contains(*id))
            .cloned()
            .collect();

        ReconcileOutcome {
            position_drifts,
            orphaned_exchange_orders,
            orphaned_internal_orders,
            equity_drift: (state.equity - exchange.equity).abs(),
        }
    }

    /// Whether a given drift magnitude requires halting (escalating to
    /// `ManualInterventionDetected`) rather than logging and continuing.
    pub fn requires_halt(&self, drift: &PositionDrift) -> bool {
        drift.magnitude() > self.halt_threshold
    }

    pub fn is_auto_correctable(&self, drift: &PositionDrift) -> bool {
        drift.magnitude() <= self.auto_correct_threshold
    }
}
