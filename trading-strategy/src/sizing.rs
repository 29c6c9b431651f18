//! Converts a selected candidate into a sized [`TradeProposal`], attaching
//! an initial stop and take-profit at fixed ATR multiples (spec.md §4.7:
//! entries are proposed with a stop already attached; §8 scenario 1 uses a
//! 2×ATR take-profit).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::domain::{NewsRisk, Side, Symbol, TradeId, TradeProposal};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProposalSizing {
    pub stop_atr_multiple: Decimal,
    pub take_profit_atr_multiple: Decimal,
    pub leverage: Decimal,
}

impl Default for ProposalSizing {
    fn default() -> Self {
        Self { stop_atr_multiple: dec!(1.5), take_profit_atr_multiple: dec!(2), leverage: dec!(3) }
    }
}

impl ProposalSizing {
    /// Places the stop on the side that protects the position and the
    /// take-profit on the side that favors it, both `multiple * atr` from
    /// the entry price.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &self,
        symbol: Symbol,
        side: Side,
        entry_price: Decimal,
        atr: Decimal,
        composite_score: Decimal,
        funding_rate: Decimal,
        news_risk: NewsRisk,
        candle_timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TradeProposal {
        let (stop_price, take_profit) = match side {
            Side::Long => {
                (entry_price - self.stop_atr_multiple * atr, entry_price + self.take_profit_atr_multiple * atr)
            }
            Side::Short => {
                (entry_price + self.stop_atr_multiple * atr, entry_price - self.take_profit_atr_multiple * atr)
            }
        };
        TradeProposal {
            symbol,
            side,
            entry_price,
            stop_price,
            take_profit: Some(take_profit),
            atr,
            leverage: self.leverage,
            composite_score,
            funding_rate,
            news_risk,
            trade_id: TradeId::generate(),
            candle_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::domain::now;

    #[test]
    fn long_stop_sits_below_entry_and_take_profit_above() {
        let sizing = ProposalSizing { stop_atr_multiple: dec!(1.5), take_profit_atr_multiple: dec!(2), leverage: dec!(3) };
        let proposal = sizing.propose(
            Symbol::new("BTCUSDT"),
            Side::Long,
            dec!(42000),
            dec!(500),
            dec!(0.7),
            dec!(0.0001),
            NewsRisk::Low,
            now(),
        );
        assert_eq!(proposal.stop_price, dec!(41250));
        assert_eq!(proposal.take_profit, Some(dec!(43000)));
    }

    #[test]
    fn short_stop_sits_above_entry_and_take_profit_below() {
        let sizing = ProposalSizing::default();
        let proposal = sizing.propose(
            Symbol::new("ETHUSDT"),
            Side::Short,
            dec!(2000),
            dec!(40),
            dec!(0.6),
            dec!(0.0002),
            NewsRisk::Low,
            now(),
        );
        assert!(proposal.stop_price > dec!(2000));
        assert!(proposal.take_profit.unwrap() < dec!(2000));
    }
}
