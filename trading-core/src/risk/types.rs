//! Risk engine inputs/outputs.
//!
//! `SymbolFilters` and `RiskCheckResult` play the role the teacher's
//! `risk::types::RiskLimits`/`RiskViolation` play: a plain config struct and
//! an accumulating reason list, rather than a single fail-fast error.

use crate::event::ErrorTag;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-symbol and account-wide thresholds the risk engine checks a proposal
/// against. Loaded from [`crate::config::TradingConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub max_positions: usize,
    pub max_leverage: Decimal,
    pub max_funding_rate_pct: Decimal,
    pub min_stop_distance_atr: Decimal,
    pub max_stop_distance_atr: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub min_notional: Decimal,
}

/// The risk engine's verdict. Rejection reasons accumulate rather than
/// short-circuit (spec.md §4.3): a proposal can be both `SIZE_BELOW_MIN` and
/// `NEWS_BLOCKED` at once, and the caller sees both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub approved: bool,
    pub reasons: Vec<ErrorTag>,
    pub adjusted_leverage: Decimal,
    pub adjusted_quantity: Decimal,
    pub circuit_breaker: bool,
}

impl RiskCheckResult {
    /// `LEVERAGE_CLAMPED` is the one reason that doesn't veto approval on its
    /// own (spec.md §4.3): this helper separates fatal reasons from it.
    pub fn fatal_reasons(&self) -> impl Iterator<Item = &ErrorTag> {
        self.reasons.iter().filter(|r| !matches!(r, ErrorTag::LeverageClamped))
    }
}
