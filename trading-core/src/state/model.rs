//! `TradingState`: the single reducer output, externally read-only.
//!
//! Grounded on the teacher's `risk::types::Position`/`RiskLimits` shape
//! (Decimal fields, helper methods rather than public mutation), generalized
//! from a single-symbol risk snapshot to the whole-account state spec.md §3
//! names.

use crate::domain::{NewsRiskFlag, Order, Position, Sequence, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The full account/trading snapshot produced by folding the event ledger.
/// Never mutated directly outside [`super::reducer::reduce`]; every other
/// consumer holds a clone (point-in-time snapshot) or a shared immutable
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingState {
    pub equity: Decimal,
    pub peak_equity: Decimal,
    pub realized_pnl_today: Decimal,
    pub daily_loss: Decimal,

    pub consecutive_losses: u32,
    pub cooldown_until: Option<DateTime<Utc>>,

    pub circuit_breaker_active: bool,
    pub requires_manual_review: bool,

    pub last_reconciliation_time: Option<DateTime<Utc>>,
    pub last_applied_sequence: Sequence,
    /// Distinguishes "no event applied yet" from "the last applied event
    /// happened to be sequence zero" — `last_applied_sequence` alone can't,
    /// since sequences start at zero too.
    pub has_applied_event: bool,

    pub universe: BTreeSet<Symbol>,
    pub positions: HashMap<Symbol, Position>,
    pub open_orders: HashMap<String, Order>,
    pub news_risk_flags: HashMap<Symbol, NewsRiskFlag>,
}

impl TradingState {
    pub fn new(starting_equity: Decimal) -> Self {
        Self {
            equity: starting_equity,
            peak_equity: starting_equity,
            realized_pnl_today: Decimal::ZERO,
            daily_loss: Decimal::ZERO,
            consecutive_losses: 0,
            cooldown_until: None,
            circuit_breaker_active: false,
            requires_manual_review: false,
            last_reconciliation_time: None,
            last_applied_sequence: Sequence::ZERO,
            has_applied_event: false,
            universe: BTreeSet::new(),
            positions: HashMap::new(),
            open_orders: HashMap::new(),
            news_risk_flags: HashMap::new(),
        }
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, symbol: &Symbol) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn is_news_blocked(&self, symbol: &Symbol, now: DateTime<Utc>) -> bool {
        self.news_risk_flags
            .get(symbol)
            .map(|flag| !flag.is_expired(now) && matches!(flag.level, crate::domain::NewsRisk::High))
            .unwrap_or(false)
    }

    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.circuit_breaker_active
            || self.requires_manual_review
            || self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity.is_zero() {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity
    }
}
