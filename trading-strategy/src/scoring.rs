//! Composite multi-factor scoring: a weighted linear combination of
//! normalized [0,1] factors, each computed independently and gated by a
//! configured threshold.
//!
//! Grounded on the teacher's `bog-strategies::simple_spread` factor-gating
//! style (named checks that each independently clamp/reject, combined into
//! one signal decision) — adapted from a market-making quote decision to a
//! weighted composite score, and from `u64` fixed-point to [`Decimal`] since
//! this crate's cadence has no latency budget forcing integer math.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trading_core::domain::{NewsRisk, Side};

/// Per-candidate inputs to the scoring engine. Any field left `None`
/// produces a neutral 0.5 for that factor plus a diagnostic flag, rather
/// than blocking the score (spec.md §4.4: "missing inputs produce a neutral
/// 0.5 and a diagnostic flag").
#[derive(Debug, Clone)]
pub struct ScoringInputs {
    /// Directional trend alignment in [-1, 1]: +1 fully aligned with
    /// `candidate_side`, -1 fully against it.
    pub trend_alignment: Option<Decimal>,
    /// How well current volatility fits the strategy's preferred regime, in
    /// [0, 1].
    pub volatility_regime_fit: Option<Decimal>,
    /// Distance from the breakout/pullback reference, in ATR units.
    pub entry_distance_atr: Option<Decimal>,
    /// Signed funding rate (positive = longs pay).
    pub funding_rate: Option<Decimal>,
    pub news_risk: Option<NewsRisk>,
    pub spread_pct: Option<Decimal>,
    /// Long/short ratio across the market, 1.0 = balanced.
    pub long_short_ratio: Option<Decimal>,
    pub funding_volatility: Option<Decimal>,
    pub open_interest_change_pct: Option<Decimal>,
    /// Taker buy volume minus taker sell volume, normalized to [-1, 1].
    pub taker_imbalance: Option<Decimal>,
    /// Current volume versus its rolling average, 1.0 = average.
    pub volume_ratio: Option<Decimal>,
}

/// Weight applied to each normalized factor. Not required to sum to 1
/// (spec.md §4.4: "weights sum to 1 by convention but are not enforced").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorWeights {
    pub trend_alignment: Decimal,
    pub volatility_regime_fit: Decimal,
    pub entry_quality: Decimal,
    pub funding_penalty: Decimal,
    pub news_modifier: Decimal,
    pub liquidity: Decimal,
    pub crowding: Decimal,
    pub funding_volatility: Decimal,
    pub open_interest_expansion: Decimal,
    pub taker_imbalance: Decimal,
    pub volume_ratio: Decimal,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            trend_alignment: dec!(0.22),
            volatility_regime_fit: dec!(0.12),
            entry_quality: dec!(0.14),
            funding_penalty: dec!(0.10),
            news_modifier: dec!(0.08),
            liquidity: dec!(0.08),
            crowding: dec!(0.08),
            funding_volatility: dec!(0.06),
            open_interest_expansion: dec!(0.06),
            taker_imbalance: dec!(0.04),
            volume_ratio: dec!(0.02),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    pub entry_threshold: Decimal,
    pub max_funding_penalty_rate: Decimal,
    pub max_spread_pct: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            entry_threshold: dec!(0.55),
            max_funding_penalty_rate: dec!(0.01),
            max_spread_pct: dec!(0.5),
        }
    }
}

/// The per-factor normalized scores that made up a composite, kept for the
/// thinking log (spec.md §6: "fields include factor scores").
#[derive(Debug, Clone)]
pub struct FactorScores {
    pub scores: HashMap<&'static str, Decimal>,
    /// Names of factors that fell back to the neutral 0.5 for missing input.
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    None,
    Signal(Side),
}

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub composite: Decimal,
    pub factors: FactorScores,
    pub signal: SignalType,
}

const NEUTRAL: Decimal = dec!(0.5);

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Scores `inputs` for a candidate entry on `candidate_side`. The side
    /// is a hint from an upstream trend/momentum computation, not derived
    /// here — this engine only decides whether the composite clears the
    /// entry threshold.
    pub fn evaluate(&self, inputs: &ScoringInputs, candidate_side: Side) -> ScoreResult {
        let mut scores = HashMap::new();
        let mut missing = Vec::new();
        let mut note = |name: &'static str, value: Option<Decimal>, scores: &mut HashMap<&'static str, Decimal>| {
            match value {
                Some(v) => {
                    scores.insert(name, v);
                }
                None => {
                    scores.insert(name, NEUTRAL);
                    missing.push(name);
                }
            }
        };

        note(
            "trend_alignment",
            inputs.trend_alignment.map(|alignment| normalize_unit_interval(alignment)),
            &mut scores,
        );
        note("volatility_regime_fit", inputs.volatility_regime_fit, &mut scores);
        note(
            "entry_quality",
            inputs.entry_distance_atr.map(entry_quality_from_atr_distance),
            &mut scores,
        );
        note(
            "funding_penalty",
            inputs.funding_rate.map(|rate| {
                funding_penalty(rate, candidate_side, self.config.max_funding_penalty_rate)
            }),
            &mut scores,
        );
        note("news_modifier", inputs.news_risk.map(news_modifier), &mut scores);
        note(
            "liquidity",
            inputs.spread_pct.map(|spread| liquidity_from_spread(spread, self.config.max_spread_pct)),
            &mut scores,
        );
        note("crowding", inputs.long_short_ratio.map(crowding_from_ratio), &mut scores);
        note(
            "funding_volatility",
            inputs.funding_volatility.map(|v| clamp_unit(Decimal::ONE - v)),
            &mut scores,
        );
        note(
            "open_interest_expansion",
            inputs.open_interest_change_pct.map(|pct| clamp_unit(NEUTRAL + pct)),
            &mut scores,
        );
        note(
            "taker_imbalance",
            inputs.taker_imbalance.map(|imbalance| normalize_unit_interval(imbalance)),
            &mut scores,
        );
        note("volume_ratio", inputs.volume_ratio.map(|ratio| clamp_unit(ratio / dec!(2))), &mut scores);

        let w = &self.config.weights;
        let composite = scores["trend_alignment"] * w.trend_alignment
            + scores["volatility_regime_fit"] * w.volatility_regime_fit
            + scores["entry_quality"] * w.entry_quality
            + scores["funding_penalty"] * w.funding_penalty
            + scores["news_modifier"] * w.news_modifier
            + scores["liquidity"] * w.liquidity
            + scores["crowding"] * w.crowding
            + scores["funding_volatility"] * w.funding_volatility
            + scores["open_interest_expansion"] * w.open_interest_expansion
            + scores["taker_imbalance"] * w.taker_imbalance
            + scores["volume_ratio"] * w.volume_ratio;

        let signal =
            if composite >= self.config.entry_threshold { SignalType::Signal(candidate_side) } else { SignalType::None };

        ScoreResult { composite, factors: FactorScores { scores, missing }, signal }
    }
}

fn clamp_unit(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Maps a value already in [-1, 1] into [0, 1].
fn normalize_unit_interval(value: Decimal) -> Decimal {
    clamp_unit((value + Decimal::ONE) / dec!(2))
}

/// Inverted-U shape: entry quality peaks when the breakout/pullback
/// distance sits between 0.5 and 1.0 ATR, and falls off on either side
/// (spec.md §4.4: "inverted-U-shaped with peak at 0.5-1.0 ATR").
fn entry_quality_from_atr_distance(distance_atr: Decimal) -> Decimal {
    let distance = distance_atr.abs();
    if distance < dec!(0.5) {
        clamp_unit(distance / dec!(0.5))
    } else if distance <= dec!(1.0) {
        Decimal::ONE
    } else {
        let excess = distance - Decimal::ONE;
        clamp_unit(Decimal::ONE - excess / dec!(2))
    }
}

/// Funding that pays the candidate's side scores favorably; funding that
/// the candidate's side would pay scores down to zero at
/// `max_penalty_rate`.
fn funding_penalty(rate: Decimal, side: Side, max_penalty_rate: Decimal) -> Decimal {
    let cost_to_side = rate * side.sign();
    if max_penalty_rate.is_zero() {
        return NEUTRAL;
    }
    clamp_unit(NEUTRAL - cost_to_side / (max_penalty_rate * dec!(2)))
}

fn news_modifier(risk: NewsRisk) -> Decimal {
    match risk {
        NewsRisk::Low => Decimal::ONE,
        NewsRisk::Medium => dec!(0.5),
        NewsRisk::High => Decimal::ZERO,
    }
}

fn liquidity_from_spread(spread_pct: Decimal, max_spread_pct: Decimal) -> Decimal {
    if max_spread_pct.is_zero() {
        return NEUTRAL;
    }
    clamp_unit(Decimal::ONE - spread_pct / max_spread_pct)
}

/// Extreme long/short ratios (in either direction) indicate a crowded
/// trade; a balanced ratio of 1.0 scores best.
fn crowding_from_ratio(ratio: Decimal) -> Decimal {
    if ratio <= Decimal::ZERO {
        return NEUTRAL;
    }
    let extremity = (ratio - Decimal::ONE).abs();
    clamp_unit(Decimal::ONE - extremity / dec!(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs_all_neutral() -> ScoringInputs {
        ScoringInputs {
            trend_alignment: None,
            volatility_regime_fit: None,
            entry_distance_atr: None,
            funding_rate: None,
            news_risk: None,
            spread_pct: None,
            long_short_ratio: None,
            funding_volatility: None,
            open_interest_change_pct: None,
            taker_imbalance: None,
            volume_ratio: None,
        }
    }

    #[test]
    fn all_missing_inputs_composite_is_neutral() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let result = engine.evaluate(&inputs_all_neutral(), Side::Long);
        assert_eq!(result.composite, dec!(0.5));
        assert_eq!(result.factors.missing.len(), 11);
    }

    #[test]
    fn strong_aligned_trend_clears_threshold() {
        let mut inputs = inputs_all_neutral();
        inputs.trend_alignment = Some(Decimal::ONE);
        inputs.entry_distance_atr = Some(dec!(0.75));
        inputs.news_risk = Some(NewsRisk::Low);
        let engine = ScoringEngine::new(ScoringConfig::default());
        let result = engine.evaluate(&inputs, Side::Long);
        assert!(matches!(result.signal, SignalType::Signal(Side::Long)));
    }

    #[test]
    fn below_threshold_yields_no_signal() {
        let mut inputs = inputs_all_neutral();
        inputs.trend_alignment = Some(-Decimal::ONE);
        let engine = ScoringEngine::new(ScoringConfig::default());
        let result = engine.evaluate(&inputs, Side::Long);
        assert_eq!(result.signal, SignalType::None);
    }

    #[test]
    fn entry_quality_peaks_between_half_and_one_atr() {
        assert_eq!(entry_quality_from_atr_distance(dec!(0.75)), Decimal::ONE);
        assert!(entry_quality_from_atr_distance(dec!(0.1)) < Decimal::ONE);
        assert!(entry_quality_from_atr_distance(dec!(3.0)) < entry_quality_from_atr_distance(dec!(1.0)));
    }

    #[test]
    fn funding_that_the_side_pays_scores_below_neutral() {
        let score = funding_penalty(dec!(0.0005), Side::Long, dec!(0.01));
        assert!(score < NEUTRAL);
        let score = funding_penalty(dec!(0.0005), Side::Short, dec!(0.01));
        assert!(score > NEUTRAL);
    }
}
