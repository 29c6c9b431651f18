//! Regime classification from trend-strength/choppiness indicators.
//!
//! Grounded on the teacher's `bog-strategies::volatility` const-generic
//! estimator gating (`is_ready()` before a value is trusted), adapted here to
//! a threshold classifier over externally-computed ADX/Choppiness rather than
//! a rolling estimator this crate owns.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Trending,
    Choppy,
    Transitional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilitySubRegime {
    Contraction,
    Normal,
    Expansion,
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeInputs {
    pub adx: Decimal,
    pub choppiness: Decimal,
    /// ATR as a percentage of price, used only if `atr_sma` is also present.
    pub atr_pct: Option<Decimal>,
    pub atr_sma: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub adx_trending: Decimal,
    pub adx_ranging: Decimal,
    pub chop_trending: Decimal,
    pub chop_ranging: Decimal,
    /// `atr_pct / atr_sma` ratio below which volatility is contracting.
    pub vol_contraction_ratio: Decimal,
    /// Ratio above which volatility is expanding.
    pub vol_expansion_ratio: Decimal,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            adx_trending: dec!(25),
            adx_ranging: dec!(18),
            chop_trending: dec!(38.2),
            chop_ranging: dec!(61.8),
            vol_contraction_ratio: dec!(0.8),
            vol_expansion_ratio: dec!(1.25),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub regime: Regime,
    pub blocks_entry: bool,
    pub size_multiplier: Decimal,
    pub volatility_sub_regime: Option<VolatilitySubRegime>,
}

pub struct RegimeClassifier {
    thresholds: RegimeThresholds,
}

impl RegimeClassifier {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    /// Classifies `inputs` per spec: TRENDING requires both ADX and
    /// Choppiness on the trend-favorable side; CHOPPY trips on either
    /// indicator alone reading into range-bound territory; anything else is
    /// TRANSITIONAL.
    pub fn classify(&self, inputs: RegimeInputs) -> RegimeResult {
        let t = &self.thresholds;
        let regime = if inputs.adx >= t.adx_trending && inputs.choppiness <= t.chop_trending {
            Regime::Trending
        } else if inputs.adx <= t.adx_ranging || inputs.choppiness >= t.chop_ranging {
            Regime::Choppy
        } else {
            Regime::Transitional
        };

        let (blocks_entry, size_multiplier) = match regime {
            Regime::Trending => (false, Decimal::ONE),
            Regime::Transitional => (false, dec!(0.5)),
            Regime::Choppy => (true, Decimal::ZERO),
        };

        let volatility_sub_regime = match (inputs.atr_pct, inputs.atr_sma) {
            (Some(atr_pct), Some(atr_sma)) if !atr_sma.is_zero() => {
                let ratio = atr_pct / atr_sma;
                Some(if ratio <= t.vol_contraction_ratio {
                    VolatilitySubRegime::Contraction
                } else if ratio >= t.vol_expansion_ratio {
                    VolatilitySubRegime::Expansion
                } else {
                    VolatilitySubRegime::Normal
                })
            }
            _ => None,
        };

        RegimeResult { regime, blocks_entry, size_multiplier, volatility_sub_regime }
    }
}
