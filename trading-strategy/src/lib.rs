//! Signal generation: the composite scoring engine, regime classifier, and
//! cross-sectional portfolio selector (L3 in the component table).
//!
//! Depends on `trading-core` for its domain types and event bus, but owns no
//! state itself — every call here is a pure function of its inputs plus one
//! `TradeCycleCompleted` publish from [`portfolio::PortfolioSelector::select`].

pub mod portfolio;
pub mod regime;
pub mod scoring;
pub mod sizing;

pub use portfolio::{Candidate, PortfolioSelector, SelectionOutcome};
pub use regime::{Regime, RegimeClassifier, RegimeInputs, RegimeResult, RegimeThresholds, VolatilitySubRegime};
pub use scoring::{FactorScores, FactorWeights, ScoreResult, ScoringConfig, ScoringEngine, ScoringInputs, SignalType};
pub use sizing::ProposalSizing;
