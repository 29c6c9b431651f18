//! Cross-sectional candidate ranking and top-K selection.
//!
//! Grounded on the teacher's `bog-strategies::simple_spread` validation-gate
//! chain (a sequence of named checks producing a reject reason, rather than
//! a single fail-fast predicate) — here applied across a whole candidate set
//! instead of a single quote decision, followed by a deterministic sort the
//! teacher's per-symbol logic never needed.

use crate::scoring::ScoreResult;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use trading_core::domain::Symbol;
use trading_core::event::{ErrorTag, EventBus, Metadata};
use trading_core::state::TradingState;

/// A scored candidate awaiting cross-sectional ranking.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub symbol: Symbol,
    pub score: ScoreResult,
    pub funding_score: Decimal,
    pub liquidity_score: Decimal,
}

pub struct PortfolioSelector {
    max_positions: usize,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub selected: Vec<Symbol>,
    /// Every candidate in ranked order, selected or not, for the audit
    /// record.
    pub ranked: Vec<Symbol>,
    pub rejections: HashMap<String, ErrorTag>,
}

impl PortfolioSelector {
    pub fn new(max_positions: usize) -> Self {
        Self { max_positions }
    }

    /// Filters `candidates` against open positions, blocked symbols, and the
    /// circuit breaker, ranks the eligible remainder, and keeps the top
    /// `K = min(max_positions - open, eligible)`. Publishes
    /// `TradeCycleCompleted` as the single auditable record of the cycle.
    pub fn select(
        &self,
        candidates: Vec<Candidate>,
        blocked_symbols: &HashSet<Symbol>,
        state: &TradingState,
        event_bus: &EventBus,
    ) -> anyhow::Result<SelectionOutcome> {
        let all_symbols: Vec<Symbol> = candidates.iter().map(|c| c.symbol.clone()).collect();
        let mut rejections = HashMap::new();
        let mut eligible: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if state.circuit_breaker_active {
                rejections.insert(candidate.symbol.to_string(), ErrorTag::StrategyPaused);
                continue;
            }
            if state.has_position(&candidate.symbol) {
                rejections.insert(candidate.symbol.to_string(), ErrorTag::SymbolBusy);
                continue;
            }
            if blocked_symbols.contains(&candidate.symbol) {
                rejections.insert(candidate.symbol.to_string(), ErrorTag::NewsBlocked);
                continue;
            }
            eligible.push(candidate);
        }

        eligible.sort_by(|a, b| {
            b.score
                .composite
                .cmp(&a.score.composite)
                .then_with(|| b.funding_score.cmp(&a.funding_score))
                .then_with(|| b.liquidity_score.cmp(&a.liquidity_score))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let open_positions = state.open_position_count();
        let capacity = self.max_positions.saturating_sub(open_positions);
        let k = capacity.min(eligible.len());

        let ranked: Vec<Symbol> = eligible.iter().map(|c| c.symbol.clone()).collect();
        let selected: Vec<Symbol> = eligible.iter().take(k).map(|c| c.symbol.clone()).collect();

        for candidate in eligible.iter().skip(k) {
            rejections.insert(candidate.symbol.to_string(), ErrorTag::PositionLimit);
        }

        event_bus.publish(
            trading_core::event::EventKind::TradeCycleCompleted {
                candidates: all_symbols,
                selected: selected.clone(),
                rejections: rejections.clone(),
            },
            Metadata::source("trading-strategy:portfolio-selector"),
        )?;

        Ok(SelectionOutcome { selected, ranked, rejections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{FactorScores, SignalType};
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;
    use tempfile::tempdir;
    use trading_core::domain::Side;
    use trading_core::event::EventLedger;
    use std::sync::Arc;

    fn candidate(symbol: &str, composite: Decimal) -> Candidate {
        Candidate {
            symbol: Symbol::new(symbol),
            score: ScoreResult {
                composite,
                factors: FactorScores { scores: StdHashMap::new(), missing: Vec::new() },
                signal: SignalType::Signal(Side::Long),
            },
            funding_score: dec!(0.5),
            liquidity_score: dec!(0.5),
        }
    }

    fn test_bus() -> (Arc<EventBus>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(EventLedger::open(dir.path().join("ledger.log")).unwrap());
        (Arc::new(EventBus::new(ledger)), dir)
    }

    #[test]
    fn selects_top_k_by_capacity() {
        let (bus, _dir) = test_bus();
        let selector = PortfolioSelector::new(1);
        let candidates = vec![
            candidate("ADAUSDT", dec!(0.80)),
            candidate("ETHUSDT", dec!(0.78)),
            candidate("BTCUSDT", dec!(0.80)),
        ];
        let state = TradingState::new(dec!(10000));
        let outcome = selector.select(candidates, &HashSet::new(), &state, &bus).unwrap();

        assert_eq!(outcome.selected, vec![Symbol::new("ADAUSDT")]);
        assert_eq!(outcome.ranked[0], Symbol::new("ADAUSDT"));
        assert_eq!(outcome.ranked[1], Symbol::new("BTCUSDT"));
        assert_eq!(outcome.rejections.get("ETHUSDT"), Some(&ErrorTag::PositionLimit));
        assert_eq!(outcome.rejections.get("BTCUSDT"), Some(&ErrorTag::PositionLimit));
    }

    #[test]
    fn blocked_symbols_are_excluded_before_ranking() {
        let (bus, _dir) = test_bus();
        let selector = PortfolioSelector::new(5);
        let candidates = vec![candidate("BTCUSDT", dec!(0.9))];
        let mut blocked = HashSet::new();
        blocked.insert(Symbol::new("BTCUSDT"));
        let state = TradingState::new(dec!(10000));
        let outcome = selector.select(candidates, &blocked, &state, &bus).unwrap();

        assert!(outcome.selected.is_empty());
        assert_eq!(outcome.rejections.get("BTCUSDT"), Some(&ErrorTag::NewsBlocked));
    }

    #[test]
    fn circuit_breaker_rejects_every_candidate() {
        let (bus, _dir) = test_bus();
        let selector = PortfolioSelector::new(5);
        let candidates = vec![candidate("BTCUSDT", dec!(0.9))];
        let mut state = TradingState::new(dec!(10000));
        state.circuit_breaker_active = true;
        let outcome = selector.select(candidates, &HashSet::new(), &state, &bus).unwrap();

        assert!(outcome.selected.is_empty());
        assert_eq!(outcome.rejections.get("BTCUSDT"), Some(&ErrorTag::StrategyPaused));
    }

    proptest::proptest! {
        /// spec.md §8: "PortfolioSelector.select is deterministic modulo
        /// ties; symbol-ascending tie-break yields byte-identical
        /// TradeCycleCompleted for the same candidate set."
        #[test]
        fn select_is_deterministic_for_any_score_assignment(
            scores in proptest::collection::vec(0u32..100, 1..6),
        ) {
            let symbols = ["ADAUSDT", "BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"];
            let candidates: Vec<Candidate> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| candidate(symbols[i], Decimal::new(*s as i64, 2)))
                .collect();

            let (bus_a, _dir_a) = test_bus();
            let (bus_b, _dir_b) = test_bus();
            let selector = PortfolioSelector::new(2);
            let state = TradingState::new(dec!(10000));

            let outcome_a = selector.select(candidates.clone(), &HashSet::new(), &state, &bus_a).unwrap();
            let outcome_b = selector.select(candidates, &HashSet::new(), &state, &bus_b).unwrap();

            proptest::prop_assert_eq!(outcome_a.selected, outcome_b.selected);
            proptest::prop_assert_eq!(outcome_a.ranked, outcome_b.ranked);
        }
    }
}
