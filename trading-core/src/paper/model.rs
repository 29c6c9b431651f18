//! Pure functions behind the paper simulator's fill decision: slippage,
//! half-spread floor, fill probability, and funding cashflow. Kept free of
//! any executor state so each can be property-tested independently
//! (spec.md §8).

use crate::domain::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Low,
    Normal,
    High,
}

impl Regime {
    /// LOW 0.5, NORMAL 1.0, HIGH 2.0 (spec.md §4.8).
    pub fn multiplier(self) -> Decimal {
        match self {
            Regime::Low => Decimal::new(5, 1),
            Regime::Normal => Decimal::ONE,
            Regime::High => Decimal::TWO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlippageModel {
    pub base_bps: Decimal,
    pub atr_scale: Decimal,
    pub market_order_penalty_bps: Decimal,
}

/// `base_bps + atr_scale * atr_pct`, scaled by the regime multiplier; adds a
/// fixed penalty for MARKET orders. Returns slippage as a fraction (not bps).
pub fn modelled_slippage(model: &SlippageModel, atr_pct: Decimal, regime: Regime, is_market: bool) -> Decimal {
    let mut bps = model.base_bps + model.atr_scale * atr_pct;
    bps *= regime.multiplier();
    if is_market {
        bps += model.market_order_penalty_bps;
    }
    bps / Decimal::new(10_000, 0)
}

/// Direction-aware, never-favorable fill price: buys fill worse (higher),
/// sells fill worse (lower). `effective_slippage` is the larger of the
/// modelled slippage and the half-spread floor for marketable orders.
pub fn apply_slippage(reference_price: Decimal, side: Side, effective_slippage: Decimal) -> Decimal {
    match side {
        Side::Long => reference_price * (Decimal::ONE + effective_slippage),
        Side::Short => reference_price * (Decimal::ONE - effective_slippage),
    }
}

/// For marketable orders (MARKET, or LIMIT within 5bps of the opposing
/// quote), effective slippage floors at half the spread; passive limits get
/// no floor (spec.md §4.8).
pub fn effective_slippage(modelled: Decimal, spread_pct: Decimal, is_marketable: bool) -> Decimal {
    if is_marketable {
        modelled.max(spread_pct / Decimal::TWO)
    } else {
        modelled
    }
}

/// Whether a limit order is "through the market" at bar close — an
/// immediate, certain fill.
pub fn is_marketable_limit(side: Side, limit_price: Decimal, bar_close: Decimal, through_bps: Decimal) -> bool {
    let threshold = bar_close * through_bps / Decimal::new(10_000, 0);
    match side {
        Side::Long => limit_price + threshold >= bar_close,
        Side::Short => limit_price - threshold <= bar_close,
    }
}

/// Distance-decayed fill probability for a resting limit order, with
/// bonuses for bars held and high volatility (spec.md §4.8). Bounded to
/// `[0, 1]`.
pub fn fill_probability(
    distance_pct: Decimal,
    decay: Decimal,
    bars_held: u32,
    bars_held_bonus: Decimal,
    is_high_vol: bool,
    high_vol_bonus: Decimal,
) -> Decimal {
    let base = (Decimal::ONE - distance_pct * decay).max(Decimal::ZERO);
    let mut probability = base + Decimal::from(bars_held) * bars_held_bonus;
    if is_high_vol {
        probability += high_vol_bonus;
    }
    probability.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Signed cashflow of one funding settlement (spec.md §4.8): LONG pays when
/// `rate > 0`, receives when `rate < 0`; SHORT is the mirror. No leverage
/// multiplier — notional is `|qty| * mark_price`.
pub fn funding_cashflow(side: Side, quantity: Decimal, mark_price: Decimal, rate: Decimal) -> Decimal {
    let notional = quantity.abs() * mark_price;
    match side {
        Side::Long => notional * rate,
        Side::Short => -notional * rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn slippage_is_never_favorable() {
        let model = SlippageModel { base_bps: dec!(2), atr_scale: dec!(1), market_order_penalty_bps: dec!(3) };
        let slip = modelled_slippage(&model, dec!(0.5), Regime::Normal, true);
        let buy_price = apply_slippage(dec!(100), Side::Long, slip);
        let sell_price = apply_slippage(dec!(100), Side::Short, slip);
        assert!(buy_price > dec!(100));
        assert!(sell_price < dec!(100));
    }

    #[test]
    fn half_spread_floor_applies_to_marketable_orders() {
        let floored = effective_slippage(dec!(0.0001), dec!(0.01), true);
        assert_eq!(floored, dec!(0.005));
    }

    #[test]
    fn passive_limit_has_no_floor() {
        let unfloored = effective_slippage(dec!(0.0001), dec!(0.01), false);
        assert_eq!(unfloored, dec!(0.0001));
    }

    #[test]
    fn funding_long_pays_on_positive_rate() {
        let cashflow = funding_cashflow(Side::Long, dec!(1), dec!(100), dec!(0.01));
        assert_eq!(cashflow, dec!(1));
    }

    #[test]
    fn funding_short_receives_on_positive_rate() {
        let cashflow = funding_cashflow(Side::Short, dec!(1), dec!(100), dec!(0.01));
        assert_eq!(cashflow, dec!(-1));
    }

    #[test]
    fn fill_probability_is_bounded() {
        let p = fill_probability(dec!(5), dec!(1), 10, dec!(0.1), true, dec!(0.2));
        assert!(p <= Decimal::ONE);
        assert!(p >= Decimal::ZERO);
    }
}
