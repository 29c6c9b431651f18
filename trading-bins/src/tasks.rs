//! Concrete `LoopTask` implementations assembled from `trading-core` and
//! `trading-strategy`. These are the pieces `trading-core::orchestrator`
//! deliberately doesn't own (spec.md §5, L5) because they need either an
//! exchange connection or the strategy crate.
//!
//! The strategy/reconciliation/watchdog tasks here run in **self-reconciling
//! mode**: they compare `TradingState` against itself rather than against a
//! live exchange, since no exchange adapter crate is wired into this
//! workspace (`execution::types`'s own doc comment calls a live adapter
//! "out of scope here"). A real deployment swaps in a `MarketDataSource`
//! backed by an exchange client and reconciliation/watchdog inputs fetched
//! from it; the task bodies below are otherwise exactly what that
//! deployment would run.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use trading_core::domain::{NewsRisk, Side, Symbol};
use trading_core::event::{EventBus, EventKind, Metadata};
use trading_core::execution::{Executor, ExecutionEngine};
use trading_core::metrics::MetricsRegistry;
use trading_core::orchestrator::LoopTask;
use trading_core::reconcile::{ExchangeSnapshot, Reconciler, Watchdog};
use trading_core::risk::{self, SymbolFilters};
use trading_core::state::StateManager;
use trading_strategy::{
    Candidate, PortfolioSelector, ProposalSizing, RegimeClassifier, RegimeInputs, ScoringEngine, ScoringInputs,
};

/// A single symbol's externally-sourced indicator snapshot for one strategy
/// cycle. In this workspace `CsvMarketDataSource` (see `bin/paper.rs`) is
/// the only implementor; a live deployment would fetch the same shape from
/// its exchange/indicator pipeline.
#[derive(Debug, Clone)]
pub struct SymbolSnapshot {
    pub adx: Decimal,
    pub choppiness: Decimal,
    pub trend_alignment: Decimal,
    pub entry_distance_atr: Decimal,
    pub funding_rate: Decimal,
    pub news_risk: NewsRisk,
    pub spread_pct: Decimal,
    pub entry_price: Decimal,
    pub atr: Decimal,
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn snapshot(&self, symbol: &Symbol) -> Result<SymbolSnapshot>;
}

/// Pushes a cycle's indicator snapshot into an executor's own market model
/// before that executor is asked to fill anything against it. `PaperExecutor`
/// is the only implementor in this workspace (see `market_data.rs`); a live
/// exchange adapter needs no such push since its fills come from the
/// exchange itself.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn feed(&self, symbol: &Symbol, snapshot: &SymbolSnapshot);
}

struct NoopMarketFeed;

#[async_trait]
impl MarketFeed for NoopMarketFeed {
    async fn feed(&self, _symbol: &Symbol, _snapshot: &SymbolSnapshot) {}
}

/// Lists the symbols a universe cycle should trade. `DirectoryUniverseSource`
/// (see `bin/paper.rs`) derives this from the indicator directory's
/// filenames; a live deployment would ask the exchange for its active
/// perpetual contracts instead.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn symbols(&self) -> Result<Vec<Symbol>>;
}

/// L1 Universe loop (spec.md §5): refreshes the tradeable symbol set.
/// `StrategyCycleTask` only scores `state.universe`, so without this loop
/// running the strategy cycle scores nothing.
pub struct UniverseTask {
    event_bus: Arc<EventBus>,
    source: Arc<dyn UniverseSource>,
}

impl UniverseTask {
    pub fn new(event_bus: Arc<EventBus>, source: Arc<dyn UniverseSource>) -> Self {
        Self { event_bus, source }
    }
}

#[async_trait]
impl LoopTask for UniverseTask {
    fn name(&self) -> &str {
        "universe"
    }

    async fn run_once(&mut self) -> Result<()> {
        let symbols = self.source.symbols().await?;
        self.event_bus.publish(EventKind::UniverseUpdated { symbols }, Metadata::source("trading-bins:universe"))?;
        Ok(())
    }
}

/// L3 Strategy cycle (spec.md §5): scores the universe, classifies regime
/// per candidate, hands the survivors to `PortfolioSelector`, then pushes
/// approved proposals through risk and into the execution engine. Also
/// ingests fills for entries placed on earlier cycles (spec.md §4.7 "fill
/// ingestion") before scoring the next bar, so a position opens and gets its
/// protective orders before it's scored again.
pub struct StrategyCycleTask<E: Executor> {
    state_manager: Arc<StateManager>,
    event_bus: Arc<EventBus>,
    source: Arc<dyn MarketDataSource>,
    market_feed: Arc<dyn MarketFeed>,
    scoring: ScoringEngine,
    regime: RegimeClassifier,
    selector: PortfolioSelector,
    risk_filters: SymbolFilters,
    sizing: ProposalSizing,
    execution: Arc<ExecutionEngine<E>>,
}

impl<E: Executor> StrategyCycleTask<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state_manager: Arc<StateManager>,
        event_bus: Arc<EventBus>,
        source: Arc<dyn MarketDataSource>,
        market_feed: Arc<dyn MarketFeed>,
        scoring: ScoringEngine,
        regime: RegimeClassifier,
        risk_filters: SymbolFilters,
        sizing: ProposalSizing,
        execution: Arc<ExecutionEngine<E>>,
    ) -> Self {
        let max_positions = risk_filters.max_positions;
        Self {
            state_manager,
            event_bus,
            source,
            market_feed,
            scoring,
            regime,
            selector: PortfolioSelector::new(max_positions),
            risk_filters,
            sizing,
            execution,
        }
    }

    /// Test/no-execution-feed convenience constructor: every production
    /// path goes through [`StrategyCycleTask::new`] with a real `market_feed`
    /// and `execution` engine.
    #[cfg(test)]
    fn without_market_feed(
        state_manager: Arc<StateManager>,
        event_bus: Arc<EventBus>,
        source: Arc<dyn MarketDataSource>,
        scoring: ScoringEngine,
        regime: RegimeClassifier,
        risk_filters: SymbolFilters,
        execution: Arc<ExecutionEngine<E>>,
    ) -> Self {
        Self::new(
            state_manager,
            event_bus,
            source,
            Arc::new(NoopMarketFeed),
            scoring,
            regime,
            risk_filters,
            ProposalSizing::default(),
            execution,
        )
    }
}

#[async_trait]
impl<E: Executor + 'static> LoopTask for StrategyCycleTask<E> {
    fn name(&self) -> &str {
        "strategy-cycle"
    }

    async fn run_once(&mut self) -> Result<()> {
        self.execution.poll_fills().await?;

        let state = self.state_manager.snapshot();
        let mut candidates = Vec::new();
        let mut blocked = HashSet::new();
        let mut snapshots: HashMap<Symbol, (SymbolSnapshot, Side, Decimal)> = HashMap::new();

        for symbol in &state.universe {
            let snapshot = match self.source.snapshot(symbol).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(%symbol, error = %e, "market data fetch failed, skipping symbol this cycle");
                    continue;
                }
            };
            self.market_feed.feed(symbol, &snapshot).await;

            if matches!(snapshot.news_risk, NewsRisk::High) {
                blocked.insert(symbol.clone());
            }

            let regime_result = self.regime.classify(RegimeInputs {
                adx: snapshot.adx,
                choppiness: snapshot.choppiness,
                atr_pct: None,
                atr_sma: None,
            });
            if regime_result.blocks_entry {
                continue;
            }

            let side = if snapshot.trend_alignment >= Decimal::ZERO { Side::Long } else { Side::Short };
            let score = self.scoring.evaluate(
                &ScoringInputs {
                    trend_alignment: Some(snapshot.trend_alignment),
                    volatility_regime_fit: Some(regime_result.size_multiplier),
                    entry_distance_atr: Some(snapshot.entry_distance_atr),
                    funding_rate: Some(snapshot.funding_rate),
                    news_risk: Some(snapshot.news_risk),
                    spread_pct: Some(snapshot.spread_pct),
                    long_short_ratio: None,
                    funding_volatility: None,
                    open_interest_change_pct: None,
                    taker_imbalance: None,
                    volume_ratio: None,
                },
                side,
            );

            if matches!(score.signal, trading_strategy::SignalType::None) {
                continue;
            }

            let composite_score = score.composite;
            candidates.push(Candidate {
                symbol: symbol.clone(),
                funding_score: score.factors.scores.get("funding_penalty").copied().unwrap_or(Decimal::new(5, 1)),
                liquidity_score: score.factors.scores.get("liquidity").copied().unwrap_or(Decimal::new(5, 1)),
                score,
            });
            snapshots.insert(symbol.clone(), (snapshot, side, composite_score));
        }

        let outcome = self.selector.select(candidates, &blocked, &state, &self.event_bus)?;

        for symbol in &outcome.selected {
            let Some((snapshot, side, composite_score)) = snapshots.get(symbol) else { continue };
            let proposal = self.sizing.propose(
                symbol.clone(),
                *side,
                snapshot.entry_price,
                snapshot.atr,
                *composite_score,
                snapshot.funding_rate,
                snapshot.news_risk,
                trading_core::domain::now(),
            );

            let check = risk::evaluate(&state, &proposal, &self.risk_filters, trading_core::domain::now());
            if !check.approved {
                self.event_bus.publish(
                    EventKind::RiskRejected { symbol: symbol.clone(), reasons: check.reasons },
                    Metadata::source("trading-bins:strategy-cycle"),
                )?;
                continue;
            }
            self.event_bus.publish(
                EventKind::RiskApproved {
                    symbol: symbol.clone(),
                    adjusted_leverage: check.adjusted_leverage,
                    adjusted_quantity: check.adjusted_quantity,
                },
                Metadata::source("trading-bins:strategy-cycle"),
            )?;

            let mut approved_proposal = proposal;
            approved_proposal.leverage = check.adjusted_leverage;
            self.execution.place_entry(&approved_proposal, check.adjusted_quantity).await?;
        }

        Ok(())
    }
}

/// L4 Reconciliation loop. Self-reconciling in this workspace (see module
/// doc): compares `TradingState` to a snapshot built from its own records,
/// so it always reports clean — the comparison logic itself is the part
/// spec.md §4 asks every deployment to run identically.
pub struct ReconciliationTask {
    state_manager: Arc<StateManager>,
    event_bus: Arc<EventBus>,
    reconciler: Reconciler,
}

impl ReconciliationTask {
    pub fn new(state_manager: Arc<StateManager>, event_bus: Arc<EventBus>, reconciler: Reconciler) -> Self {
        Self { state_manager, event_bus, reconciler }
    }
}

#[async_trait]
impl LoopTask for ReconciliationTask {
    fn name(&self) -> &str {
        "reconciliation"
    }

    async fn run_once(&mut self) -> Result<()> {
        let state = self.state_manager.snapshot();
        let exchange = ExchangeSnapshot {
            positions: state.positions.iter().map(|(s, p)| (s.clone(), p.quantity * p.side.sign())).collect(),
            open_order_ids: state.open_orders.values().filter_map(|o| o.exchange_order_id.clone()).collect(),
            equity: state.equity,
        };
        let outcome = self.reconciler.reconcile(&state, &exchange);

        for drift in &outcome.position_drifts {
            if self.reconciler.requires_halt(drift) {
                self.event_bus.publish(
                    EventKind::ManualInterventionDetected {
                        reason: format!("position drift on {} exceeds halt threshold", drift.symbol),
                    },
                    Metadata::source("trading-bins:reconciliation"),
                )?;
            }
        }

        self.event_bus.publish(
            EventKind::ReconciliationCompleted {
                drift_detected: !outcome.is_clean(),
                details: format!(
                    "{} position drift(s), {} orphaned exchange order(s), {} orphaned internal order(s)",
                    outcome.position_drifts.len(),
                    outcome.orphaned_exchange_orders.len(),
                    outcome.orphaned_internal_orders.len(),
                ),
            },
            Metadata::source("trading-bins:reconciliation"),
        )?;
        Ok(())
    }
}

/// L4 Watchdog loop: verifies every open position still has its expected
/// protective orders present.
pub struct WatchdogTask {
    state_manager: Arc<StateManager>,
    event_bus: Arc<EventBus>,
}

impl WatchdogTask {
    pub fn new(state_manager: Arc<StateManager>, event_bus: Arc<EventBus>) -> Self {
        Self { state_manager, event_bus }
    }
}

#[async_trait]
impl LoopTask for WatchdogTask {
    fn name(&self) -> &str {
        "watchdog"
    }

    async fn run_once(&mut self) -> Result<()> {
        let state = self.state_manager.snapshot();
        let live_orders: HashSet<(Symbol, trading_core::domain::OrderType)> = state
            .open_orders
            .values()
            .map(|o| (o.symbol.clone(), o.order_type))
            .collect();

        for (symbol, check) in Watchdog::check(&state, &live_orders) {
            match check {
                trading_core::reconcile::ProtectiveOrdersCheck::Verified => {
                    self.event_bus.publish(
                        EventKind::ProtectiveOrdersVerified { symbol },
                        Metadata::source("trading-bins:watchdog"),
                    )?;
                }
                trading_core::reconcile::ProtectiveOrdersCheck::Missing { kind } => {
                    self.event_bus.publish(
                        EventKind::ProtectiveOrdersMissing { symbol, kind: kind.to_string() },
                        Metadata::source("trading-bins:watchdog"),
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// L5 Telemetry loop: mirrors the current `TradingState` into the
/// Prometheus registry every cadence tick.
pub struct TelemetryTask {
    state_manager: Arc<StateManager>,
    metrics: Arc<MetricsRegistry>,
}

impl TelemetryTask {
    pub fn new(state_manager: Arc<StateManager>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { state_manager, metrics }
    }
}

#[async_trait]
impl LoopTask for TelemetryTask {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn run_once(&mut self) -> Result<()> {
        let state = self.state_manager.snapshot();
        self.metrics.equity.set(state.equity.to_f64().unwrap_or(0.0));
        self.metrics.drawdown_pct.set(state.drawdown_pct().to_f64().unwrap_or(0.0));
        self.metrics.positions_open.set(state.open_position_count() as i64);
        self.metrics.circuit_breaker_active.set(state.circuit_breaker_active as i64);
        self.metrics.requires_manual_review.set(state.requires_manual_review as i64);
        self.metrics.last_applied_sequence.set(state.last_applied_sequence.0 as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::domain::ClientOrderId;
    use trading_core::domain::EventId;
    use trading_core::domain::Sequence;
    use trading_core::event::{Event, EventKind, EventLedger, Metadata};
    use trading_core::execution::{ExecutionConfig, Fill, OrderRequest, SpreadThresholds, TimeoutAction, TimeoutMode};
    use trading_core::pending::PendingEntryStore;
    use trading_strategy::{RegimeThresholds, ScoringConfig};

    struct FixedSource {
        snapshots: std::collections::HashMap<String, SymbolSnapshot>,
    }

    #[async_trait]
    impl MarketDataSource for FixedSource {
        async fn snapshot(&self, symbol: &Symbol) -> Result<SymbolSnapshot> {
            self.snapshots
                .get(symbol.as_str())
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no fixture for {symbol}"))
        }
    }

    struct StubExecutor;

    #[async_trait]
    impl Executor for StubExecutor {
        async fn place_order(&self, request: OrderRequest) -> Result<String> {
            Ok(format!("EX-{}", request.client_order_id))
        }

        async fn cancel_order(&self, _client_order_id: &ClientOrderId) -> Result<()> {
            Ok(())
        }

        async fn get_fills(&self, _client_order_id: &ClientOrderId) -> Result<Vec<Fill>> {
            Ok(Vec::new())
        }

        async fn best_bid_ask(&self, _symbol: &Symbol) -> Result<(Decimal, Decimal)> {
            Ok((dec!(99), dec!(101)))
        }
    }

    fn execution_config() -> ExecutionConfig {
        ExecutionConfig {
            retry_attempts: 3,
            timeout_mode: TimeoutMode::Fixed,
            timeout_action: TimeoutAction::Cancel,
            entry_fixed_timeout_sec: 300,
            entry_max_duration_sec: 3600,
            trailing_start_atr: dec!(1),
            trailing_distance_atr: dec!(0.5),
            take_profit_atr_multiple: dec!(2),
            take_profit_fraction: dec!(1),
            tick_size: dec!(0.01),
            spread_thresholds: SpreadThresholds {
                dynamic: false,
                fixed_max_spread_pct: dec!(0.1),
                calm_max_spread_pct: dec!(0.05),
                normal_max_spread_pct: dec!(0.1),
                volatile_max_spread_pct: dec!(0.2),
                max_slippage_pct: dec!(0.3),
            },
            volatility_floor_ceiling: (dec!(1), dec!(3)),
        }
    }

    fn risk_filters() -> SymbolFilters {
        SymbolFilters {
            max_positions: 1,
            max_leverage: dec!(10),
            max_funding_rate_pct: dec!(0.01),
            min_stop_distance_atr: dec!(0.1),
            max_stop_distance_atr: dec!(5),
            risk_per_trade_pct: dec!(0.01),
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            min_notional: dec!(1),
        }
    }

    fn strong_trend_snapshot() -> SymbolSnapshot {
        SymbolSnapshot {
            adx: dec!(32),
            choppiness: dec!(30),
            trend_alignment: dec!(0.9),
            entry_distance_atr: dec!(0.7),
            funding_rate: dec!(0.0001),
            news_risk: NewsRisk::Low,
            spread_pct: dec!(0.0005),
            entry_price: dec!(100),
            atr: dec!(2),
        }
    }

    fn test_handles() -> (Arc<StateManager>, Arc<EventBus>, Arc<ExecutionEngine<StubExecutor>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(EventLedger::open(dir.path().join("ledger.log")).unwrap());
        let event_bus = Arc::new(EventBus::new(ledger));
        let state_manager = StateManager::new(dec!(10000));
        let universe_event = Event {
            event_id: EventId::generate(),
            timestamp: trading_core::domain::now(),
            sequence: Sequence(0),
            kind: EventKind::UniverseUpdated { symbols: vec![Symbol::new("BTCUSDT")] },
            metadata: Metadata::source("test"),
        };
        state_manager.apply(&universe_event);
        let pending = Arc::new(PendingEntryStore::open(dir.path().join("pending.log")).unwrap());
        let execution =
            Arc::new(ExecutionEngine::new(event_bus.clone(), Arc::new(StubExecutor), pending, execution_config()));
        (state_manager, event_bus, execution, dir)
    }

    #[tokio::test]
    async fn strategy_cycle_publishes_trade_cycle_completed_for_a_qualifying_symbol() {
        let (state_manager, event_bus, execution, _dir) = test_handles();
        let mut snapshots = std::collections::HashMap::new();
        snapshots.insert("BTCUSDT".to_string(), strong_trend_snapshot());
        let source: Arc<dyn MarketDataSource> = Arc::new(FixedSource { snapshots });

        let mut task = StrategyCycleTask::without_market_feed(
            state_manager,
            event_bus.clone(),
            source,
            ScoringEngine::new(ScoringConfig::default()),
            RegimeClassifier::new(RegimeThresholds::default()),
            risk_filters(),
            execution,
        );
        task.run_once().await.unwrap();

        let history = event_bus.ledger().read_all().unwrap();
        assert!(history.iter().any(|e| matches!(e.kind, EventKind::TradeCycleCompleted { .. })));
    }

    #[tokio::test]
    async fn strategy_cycle_skips_symbols_with_no_fixture() {
        let (state_manager, event_bus, execution, _dir) = test_handles();
        let source: Arc<dyn MarketDataSource> = Arc::new(FixedSource { snapshots: std::collections::HashMap::new() });

        let mut task = StrategyCycleTask::without_market_feed(
            state_manager,
            event_bus,
            source,
            ScoringEngine::new(ScoringConfig::default()),
            RegimeClassifier::new(RegimeThresholds::default()),
            risk_filters(),
            execution,
        );
        assert!(task.run_once().await.is_ok());
    }

    #[tokio::test]
    async fn self_reconciling_reconciliation_always_reports_clean() {
        let (state_manager, event_bus, _execution, _dir) = test_handles();
        let mut task = ReconciliationTask::new(state_manager, event_bus.clone(), Reconciler::new(dec!(0.001), dec!(0.01)));
        task.run_once().await.unwrap();

        let history = event_bus.ledger().read_all().unwrap();
        let completed = history.iter().find_map(|e| match &e.kind {
            EventKind::ReconciliationCompleted { drift_detected, .. } => Some(*drift_detected),
            _ => None,
        });
        assert_eq!(completed, Some(false));
    }

    #[tokio::test]
    async fn watchdog_with_no_open_positions_publishes_nothing() {
        let (state_manager, event_bus, _execution, _dir) = test_handles();
        let mut task = WatchdogTask::new(state_manager, event_bus.clone());
        task.run_once().await.unwrap();
        assert!(event_bus.ledger().read_all().unwrap().is_empty());
    }
}
