//! Periodic check that every open position still has its expected
//! protective orders on the exchange (spec.md glossary: "Watchdog").

use crate::domain::{OrderType, Symbol};
use crate::state::TradingState;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum ProtectiveOrdersCheck {
    Verified,
    Missing { kind: &'static str },
}

pub struct Watchdog;

impl Watchdog {
    /// For each symbol with an open position, check whether a live
    /// reduce-only STOP_MARKET (and, if the position carries one, a
    /// TAKE_PROFIT_MARKET) is present among `live_order_symbols` — the set
    /// of `(symbol, order_type)` pairs the exchange reports as open.
    pub fn check(
        state: &TradingState,
        live_orders: &HashSet<(Symbol, OrderType)>,
    ) -> Vec<(Symbol, ProtectiveOrdersCheck)> {
        let mut results = Vec::new();
        for (symbol, position) in &state.positions {
            let has_stop = live_orders.contains(&(symbol.clone(), OrderType::StopMarket));
            if !has_stop {
                results.push((symbol.clone(), ProtectiveOrdersCheck::Missing { kind: "STOP_MARKET" }));
                continue;
            }
            if position.take_profit_price.is_some() {
                let has_take_profit = live_orders.contains(&(symbol.clone(), OrderType::TakeProfitMarket));
                if !has_take_profit {
                    results.push((symbol.clone(), ProtectiveOrdersCheck::Missing { kind: "TAKE_PROFIT_MARKET" }));
                    continue;
                }
            }
            results.push((symbol.clone(), ProtectiveOrdersCheck::Verified));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, take_profit: Option<Decimal>) -> Position {
        Position {
            symbol: Symbol::new(symbol),
            side: Side::Long,
            quantity: dec!(1),
            entry_price: dec!(100),
            leverage: dec!(5),
            opened_at: Utc::now(),
            stop_price: Some(dec!(95)),
            take_profit_price: take_profit,
            trailing_high_water: None,
            cumulative_funding: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    #[test]
    fn flags_missing_stop() {
        let mut state = TradingState::new(dec!(10000));
        state.positions.insert(Symbol::new("BTCUSDT"), position("BTCUSDT", None));
        let live = HashSet::new();

        let results = Watchdog::check(&state, &live);
        assert_eq!(results[0].1, ProtectiveOrdersCheck::Missing { kind: "STOP_MARKET" });
    }

    #[test]
    fn verified_when_stop_and_take_profit_present() {
        let mut state = TradingState::new(dec!(10000));
        state.positions.insert(Symbol::new("BTCUSDT"), position("BTCUSDT", Some(dec!(110))));
        let mut live = HashSet::new();
        live.insert((Symbol::new("BTCUSDT"), OrderType::StopMarket));
        live.insert((Symbol::new("BTCUSDT"), OrderType::TakeProfitMarket));

        let results = Watchdog::check(&state, &live);
        assert_eq!(results[0].1, ProtectiveOrdersCheck::Verified);
    }

    #[test]
    fn flags_missing_take_profit_when_expected() {
        let mut state = TradingState::new(dec!(10000));
        state.positions.insert(Symbol::new("BTCUSDT"), position("BTCUSDT", Some(dec!(110))));
        let mut live = HashSet::new();
        live.insert((Symbol::new("BTCUSDT"), OrderType::StopMarket));

        let results = Watchdog::check(&state, &live);
        assert_eq!(results[0].1, ProtectiveOrdersCheck::Missing { kind: "TAKE_PROFIT_MARKET" });
    }
}
