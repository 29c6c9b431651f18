//! Pre-trade microstructure gate (spec.md §4.7.1): the last check before an
//! entry order reaches the exchange.
//!
//! Grounded on the teacher's `risk::pre_trade::PreTradeValidator` — same
//! "last line of defense right before the API call" placement — generalized
//! from the teacher's fixed `ExchangeRules`/tick-distance check to the
//! spec's regime-aware dynamic spread threshold and slippage gate.

use crate::event::ErrorTag;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityBucket {
    Calm,
    Normal,
    Volatile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadThresholds {
    pub dynamic: bool,
    pub fixed_max_spread_pct: Decimal,
    pub calm_max_spread_pct: Decimal,
    pub normal_max_spread_pct: Decimal,
    pub volatile_max_spread_pct: Decimal,
    pub max_slippage_pct: Decimal,
}

impl SpreadThresholds {
    fn threshold_for(&self, bucket: VolatilityBucket) -> Decimal {
        if !self.dynamic {
            return self.fixed_max_spread_pct;
        }
        match bucket {
            VolatilityBucket::Calm => self.calm_max_spread_pct,
            VolatilityBucket::Normal => self.normal_max_spread_pct,
            VolatilityBucket::Volatile => self.volatile_max_spread_pct,
        }
    }
}

/// Spread/slippage snapshot attached to the subsequent `RiskRejected` /
/// `OrderPlaced` event's metadata (spec.md §4.7.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub spread_pct: Decimal,
    pub ticker_fetch_failed: bool,
}

pub struct GateResult {
    pub allowed: bool,
    pub reasons: Vec<ErrorTag>,
    pub snapshot: Option<SpreadSnapshot>,
}

/// ATR% buckets into a volatility regime for threshold selection.
pub fn classify_volatility(atr_pct: Decimal, calm_ceiling: Decimal, volatile_floor: Decimal) -> VolatilityBucket {
    if atr_pct <= calm_ceiling {
        VolatilityBucket::Calm
    } else if atr_pct >= volatile_floor {
        VolatilityBucket::Volatile
    } else {
        VolatilityBucket::Normal
    }
}

/// Evaluate the gate given a best bid/ask fetch result. `ticker` is `None`
/// when the fetch failed — per spec.md, that fails open rather than
/// rejecting, with the failure recorded in the snapshot.
pub fn evaluate(
    ticker: Option<(Decimal, Decimal)>,
    intended_entry: Decimal,
    mark_price: Decimal,
    atr_pct: Decimal,
    thresholds: &SpreadThresholds,
    volatility_floor_ceiling: (Decimal, Decimal),
) -> GateResult {
    let Some((bid, ask)) = ticker else {
        warn!("ticker fetch failed for pre-trade gate, failing open");
        return GateResult {
            allowed: true,
            reasons: Vec::new(),
            snapshot: Some(SpreadSnapshot {
                bid: Decimal::ZERO,
                ask: Decimal::ZERO,
                mid: Decimal::ZERO,
                spread_pct: Decimal::ZERO,
                ticker_fetch_failed: true,
            }),
        };
    };

    let mid = (bid + ask) / Decimal::TWO;
    let spread_pct = if mid.is_zero() { Decimal::ZERO } else { (ask - bid) / mid * Decimal::ONE_HUNDRED };

    let (calm_ceiling, volatile_floor) = volatility_floor_ceiling;
    let bucket = classify_volatility(atr_pct, calm_ceiling, volatile_floor);
    let max_spread = thresholds.threshold_for(bucket);

    let mut reasons = Vec::new();
    if spread_pct > max_spread {
        reasons.push(ErrorTag::SpreadTooWide);
    }

    if !mark_price.is_zero() {
        let slippage_pct = (mark_price - intended_entry).abs() / mark_price * Decimal::ONE_HUNDRED;
        if slippage_pct > thresholds.max_slippage_pct {
            reasons.push(ErrorTag::SlippageExceeded);
        }
    }

    GateResult {
        allowed: reasons.is_empty(),
        reasons,
        snapshot: Some(SpreadSnapshot { bid, ask, mid, spread_pct, ticker_fetch_failed: false }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn thresholds() -> SpreadThresholds {
        SpreadThresholds {
            dynamic: false,
            fixed_max_spread_pct: dec!(0.1),
            calm_max_spread_pct: dec!(0.05),
            normal_max_spread_pct: dec!(0.1),
            volatile_max_spread_pct: dec!(0.2),
            max_slippage_pct: dec!(0.3),
        }
    }

    #[test]
    fn rejects_wide_spread() {
        let result = evaluate(
            Some((dec!(100), dec!(100.5))),
            dec!(100.2),
            dec!(100.2),
            dec!(0.01),
            &thresholds(),
            (dec!(0.005), dec!(0.02)),
        );
        assert!(!result.allowed);
        assert!(result.reasons.contains(&ErrorTag::SpreadTooWide));
    }

    #[test]
    fn fails_open_on_missing_ticker() {
        let result = evaluate(None, dec!(100), dec!(100), dec!(0.01), &thresholds(), (dec!(0.005), dec!(0.02)));
        assert!(result.allowed);
        assert!(result.snapshot.unwrap().ticker_fetch_failed);
    }
}
