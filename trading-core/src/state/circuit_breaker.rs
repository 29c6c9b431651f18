//! Trading circuit breaker: the drawdown/loss-streak trip conditions
//! evaluated after every `PositionClosed` / equity update (spec.md §4.2).
//!
//! Distinct from `resilience::circuit_breaker`, which guards transport calls
//! against cascading failures — this one guards capital against a losing
//! strategy. Config-object shape grounded on the teacher's
//! `CircuitBreakerConfig`, trip conditions are the reducer's own.

use super::TradingState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerThresholds {
    pub max_drawdown_pct: Decimal,
    pub max_consecutive_losses: u32,
    pub max_daily_loss_pct: Decimal,
}

/// Why the breaker tripped, for the `CircuitBreakerTriggered` event's reason
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReason {
    Drawdown,
    ConsecutiveLosses,
    DailyLoss,
}

impl TripReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TripReason::Drawdown => "max_drawdown_exceeded",
            TripReason::ConsecutiveLosses => "max_consecutive_losses_exceeded",
            TripReason::DailyLoss => "max_daily_loss_exceeded",
        }
    }
}

/// Evaluate the three trip conditions against the current state. Conditions
/// are independent: whichever trips first is reported, but all are checked
/// so a caller logging diagnostics can see every breached condition.
pub fn evaluate(state: &TradingState, thresholds: &CircuitBreakerThresholds) -> Vec<TripReason> {
    let mut reasons = Vec::new();

    if state.drawdown_pct() >= thresholds.max_drawdown_pct {
        reasons.push(TripReason::Drawdown);
    }
    if state.consecutive_losses >= thresholds.max_consecutive_losses {
        reasons.push(TripReason::ConsecutiveLosses);
    }
    if !state.equity.is_zero() {
        let daily_loss_pct = state.daily_loss / state.equity;
        if daily_loss_pct >= thresholds.max_daily_loss_pct {
            reasons.push(TripReason::DailyLoss);
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn thresholds() -> CircuitBreakerThresholds {
        CircuitBreakerThresholds {
            max_drawdown_pct: dec!(0.1),
            max_consecutive_losses: 3,
            max_daily_loss_pct: dec!(0.05),
        }
    }

    #[test]
    fn trips_on_drawdown() {
        let mut state = TradingState::new(dec!(10000));
        state.peak_equity = dec!(10000);
        state.equity = dec!(8900);

        let reasons = evaluate(&state, &thresholds());
        assert!(reasons.contains(&TripReason::Drawdown));
    }

    #[test]
    fn does_not_trip_when_within_limits() {
        let state = TradingState::new(dec!(10000));
        assert!(evaluate(&state, &thresholds()).is_empty());
    }

    #[test]
    fn trips_on_consecutive_losses() {
        let mut state = TradingState::new(dec!(10000));
        state.consecutive_losses = 3;
        assert!(evaluate(&state, &thresholds()).contains(&TripReason::ConsecutiveLosses));
    }
}
