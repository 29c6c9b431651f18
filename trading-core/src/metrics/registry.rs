//! Prometheus metric families for the trading core.
//!
//! Trimmed from the teacher's `monitoring::metrics::MetricsRegistry` (which
//! tracks latency histograms this crate's 15-minute cadence has no use
//! for) down to the series spec.md's ambient observability actually needs:
//! trading activity, account health, and system liveness.

use prometheus::{Counter, Gauge, IntCounterVec, IntGauge, Opts, Registry};

pub struct MetricsRegistry {
    registry: Registry,
    pub orders_total: IntCounterVec,
    pub fills_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub trading_volume_usd_total: Counter,
    pub equity: Gauge,
    pub drawdown_pct: Gauge,
    pub positions_open: IntGauge,
    pub circuit_breaker_active: IntGauge,
    pub requires_manual_review: IntGauge,
    pub last_applied_sequence: IntGauge,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_total = IntCounterVec::new(
            Opts::new("orders_total", "Total number of orders submitted").namespace("trading_core"),
            &["symbol", "side", "order_type"],
        )?;
        registry.register(Box::new(orders_total.clone()))?;

        let fills_total = IntCounterVec::new(
            Opts::new("fills_total", "Total number of fills received").namespace("trading_core"),
            &["symbol", "side"],
        )?;
        registry.register(Box::new(fills_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("risk_rejections_total", "Total number of risk-gate rejections").namespace("trading_core"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let trading_volume_usd_total =
            Counter::new("trading_core_trading_volume_usd_total", "Total trading volume in USD")?;
        registry.register(Box::new(trading_volume_usd_total.clone()))?;

        let equity = Gauge::new("trading_core_equity", "Current account equity")?;
        registry.register(Box::new(equity.clone()))?;

        let drawdown_pct = Gauge::new("trading_core_drawdown_pct", "Current drawdown from peak equity")?;
        registry.register(Box::new(drawdown_pct.clone()))?;

        let positions_open = IntGauge::new("trading_core_positions_open", "Number of open positions")?;
        registry.register(Box::new(positions_open.clone()))?;

        let circuit_breaker_active =
            IntGauge::new("trading_core_circuit_breaker_active", "1 if the circuit breaker is tripped")?;
        registry.register(Box::new(circuit_breaker_active.clone()))?;

        let requires_manual_review =
            IntGauge::new("trading_core_requires_manual_review", "1 if manual review is required")?;
        registry.register(Box::new(requires_manual_review.clone()))?;

        let last_applied_sequence =
            IntGauge::new("trading_core_last_applied_sequence", "Last event sequence applied to state")?;
        registry.register(Box::new(last_applied_sequence.clone()))?;

        Ok(Self {
            registry,
            orders_total,
            fills_total,
            rejections_total,
            trading_volume_usd_total,
            equity,
            drawdown_pct,
            positions_open,
            circuit_breaker_active,
            requires_manual_review,
            last_applied_sequence,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_duplicate_collector_errors() {
        let metrics = MetricsRegistry::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }
}
