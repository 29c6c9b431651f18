//! Discrete funding settlement application for the replay loop (spec.md
//! §4.8): walk settlements in `(last_applied, now]`, applying each to the
//! open position at most once.

use super::model::funding_cashflow;
use super::mux::FundingSettlement;
use crate::domain::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Settlements strictly after `last_applied` and up to and including `now`,
/// in the order given. Marks each due settlement's timestamp so the caller
/// can advance its own watermark.
pub fn due_settlements<'a>(
    settlements: &'a [FundingSettlement],
    last_applied: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<&'a FundingSettlement> {
    settlements
        .iter()
        .filter(|s| s.timestamp <= now && last_applied.map_or(true, |last| s.timestamp > last))
        .collect()
}

/// Cashflow and mark price to apply to `position` for one settlement. Falls
/// back to the settlement's own mark price when no fresher bar-close price
/// is supplied (spec.md's "bar-close fallback").
pub fn apply_settlement(position: &Position, settlement: &FundingSettlement, bar_close: Option<Decimal>) -> Decimal {
    let mark_price = bar_close.unwrap_or(settlement.mark_price);
    funding_cashflow(position.side, position.quantity, mark_price, settlement.rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, Symbol};
    use rust_decimal_macros::dec;

    fn settlement_at(secs: i64, rate: Decimal) -> FundingSettlement {
        FundingSettlement {
            symbol: Symbol::new("BTCUSDT"),
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            rate,
            mark_price: dec!(100),
        }
    }

    #[test]
    fn only_settlements_after_watermark_are_due() {
        let settlements = vec![settlement_at(1, dec!(0.01)), settlement_at(2, dec!(0.01)), settlement_at(3, dec!(0.01))];
        let due = due_settlements(&settlements, Some(DateTime::from_timestamp(1, 0).unwrap()), DateTime::from_timestamp(3, 0).unwrap());
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn no_watermark_takes_everything_up_to_now() {
        let settlements = vec![settlement_at(1, dec!(0.01)), settlement_at(2, dec!(0.01))];
        let due = due_settlements(&settlements, None, DateTime::from_timestamp(2, 0).unwrap());
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn falls_back_to_settlement_mark_price_when_no_bar_close() {
        let position = Position {
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            quantity: dec!(1),
            entry_price: dec!(90),
            leverage: dec!(5),
            opened_at: DateTime::from_timestamp(0, 0).unwrap(),
            stop_price: None,
            take_profit_price: None,
            trailing_high_water: None,
            cumulative_funding: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        };
        let settlement = settlement_at(1, dec!(0.01));
        let cashflow = apply_settlement(&position, &settlement, None);
        assert_eq!(cashflow, dec!(1));
    }
}
