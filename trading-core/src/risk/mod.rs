//! The deterministic risk engine (L2): a pure function from `(state,
//! proposal, filters, now)` to a [`RiskCheckResult`]. No I/O, no clock reads
//! beyond the `now` argument — every rejection is reproducible from its
//! inputs alone.

mod types;

pub use types::{RiskCheckResult, SymbolFilters};

use crate::domain::{NewsRisk, TradeProposal};
use crate::event::ErrorTag;
use crate::state::TradingState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Evaluate a proposal against account and symbol-level limits. Reasons
/// accumulate; callers should not assume the first reason found is the only
/// one (spec.md §4.3).
pub fn evaluate(
    state: &TradingState,
    proposal: &TradeProposal,
    filters: &SymbolFilters,
    now: DateTime<Utc>,
) -> RiskCheckResult {
    let mut reasons = Vec::new();
    let circuit_breaker = state.circuit_breaker_active;

    if state.is_paused(now) {
        reasons.push(ErrorTag::StrategyPaused);
    }

    if state.open_position_count() >= filters.max_positions {
        reasons.push(ErrorTag::PositionLimit);
    }

    if state.has_position(&proposal.symbol) {
        reasons.push(ErrorTag::SymbolBusy);
    }

    if matches!(proposal.news_risk, NewsRisk::High) {
        reasons.push(ErrorTag::NewsBlocked);
    }

    if proposal.funding_rate.abs() > filters.max_funding_rate_pct {
        reasons.push(ErrorTag::FundingExcess);
    }

    let stop_distance_atr = if proposal.atr.is_zero() {
        Decimal::ZERO
    } else {
        (proposal.entry_price - proposal.stop_price).abs() / proposal.atr
    };
    if stop_distance_atr < filters.min_stop_distance_atr || stop_distance_atr > filters.max_stop_distance_atr {
        reasons.push(ErrorTag::StopDistanceInvalid);
    }

    let mut adjusted_leverage = proposal.leverage;
    if adjusted_leverage > filters.max_leverage {
        adjusted_leverage = filters.max_leverage;
        reasons.push(ErrorTag::LeverageClamped);
    }

    let adjusted_quantity = size_position(state.equity, proposal, filters);
    if adjusted_quantity < filters.min_qty || adjusted_quantity * proposal.entry_price < filters.min_notional {
        reasons.push(ErrorTag::SizeBelowMin);
    }

    let approved = reasons.iter().all(|r| matches!(r, ErrorTag::LeverageClamped));

    RiskCheckResult {
        approved,
        reasons,
        adjusted_leverage,
        adjusted_quantity,
        circuit_breaker,
    }
}

/// `risk_capital / |entry - stop|`, rounded down to `step_size` (spec.md
/// §4.3's sizing formula).
fn size_position(equity: Decimal, proposal: &TradeProposal, filters: &SymbolFilters) -> Decimal {
    let risk_capital = equity * filters.risk_per_trade_pct;
    let stop_distance = (proposal.entry_price - proposal.stop_price).abs();
    if stop_distance.is_zero() {
        return Decimal::ZERO;
    }
    let raw_qty = risk_capital / stop_distance;
    round_down_to_step(raw_qty, filters.step_size)
}

fn round_down_to_step(quantity: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return quantity;
    }
    (quantity / step_size).trunc() * step_size
}
