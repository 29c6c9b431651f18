//! Entry placement, protective-order attachment, trailing-stop updates, and
//! entry-timeout handling (spec.md §4.7) — the execution engine proper.
//!
//! This module is the part of the crate with no single teacher file to
//! adapt wholesale; it's assembled from several teacher pieces: the
//! `Executor` trait call shape (`execution::mod`), retry-with-backoff
//! (`resilience::circuit_breaker`'s timeout/backoff vocabulary), and the
//! journal's "never half-persist, always emit an event for every outcome"
//! discipline.

use super::pretrade::{self, SpreadThresholds};
use super::types::{Executor, Fill, OrderRequest};
use crate::domain::{ClientOrderId, OrderType, PendingEntry, PendingEntryState, Side, Symbol, TradeProposal};
use crate::event::{ErrorTag, EventBus, EventKind, Metadata};
use crate::pending::PendingEntryStore;
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How an entry order's deadline is resolved when it hasn't filled
/// (spec.md §4.7: "Entry-order lifecycle and timeouts").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutMode {
    Fixed,
    Timeframe,
    Unlimited,
}

/// What to do when an entry order's deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutAction {
    Cancel,
    ConvertMarket,
    ConvertStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub retry_attempts: u32,
    pub timeout_mode: TimeoutMode,
    pub timeout_action: TimeoutAction,
    pub entry_fixed_timeout_sec: i64,
    pub entry_max_duration_sec: i64,
    pub trailing_start_atr: Decimal,
    pub trailing_distance_atr: Decimal,
    pub take_profit_atr_multiple: Decimal,
    pub take_profit_fraction: Decimal,
    pub tick_size: Decimal,
    pub spread_thresholds: SpreadThresholds,
    pub volatility_floor_ceiling: (Decimal, Decimal),
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            timeout_mode: TimeoutMode::Fixed,
            timeout_action: TimeoutAction::Cancel,
            entry_fixed_timeout_sec: 300,
            entry_max_duration_sec: 3600,
            trailing_start_atr: Decimal::ONE,
            trailing_distance_atr: Decimal::new(5, 1),
            take_profit_atr_multiple: Decimal::TWO,
            take_profit_fraction: Decimal::ONE,
            tick_size: Decimal::new(1, 2),
            spread_thresholds: SpreadThresholds {
                dynamic: false,
                fixed_max_spread_pct: Decimal::new(1, 1),
                calm_max_spread_pct: Decimal::new(5, 2),
                normal_max_spread_pct: Decimal::new(1, 1),
                volatile_max_spread_pct: Decimal::new(2, 1),
                max_slippage_pct: Decimal::new(3, 1),
            },
            volatility_floor_ceiling: (Decimal::ONE, Decimal::new(3, 0)),
        }
    }
}

pub struct ExecutionEngine<E: Executor> {
    bus: Arc<EventBus>,
    executor: Arc<E>,
    pending: Arc<PendingEntryStore>,
    config: ExecutionConfig,
    trailing_counters: dashmap::DashMap<Symbol, u64>,
}

impl<E: Executor> ExecutionEngine<E> {
    pub fn new(bus: Arc<EventBus>, executor: Arc<E>, pending: Arc<PendingEntryStore>, config: ExecutionConfig) -> Self {
        Self { bus, executor, pending, config, trailing_counters: dashmap::DashMap::new() }
    }

    /// Entry placement pipeline (spec.md §4.7 "Entry placement").
    pub async fn place_entry(&self, proposal: &TradeProposal, adjusted_quantity: Decimal) -> Result<()> {
        if let Some(existing) = self.pending.find_by_dedup_key(&proposal.symbol, proposal.candle_timestamp) {
            info!(symbol = %proposal.symbol, client_order_id = %existing.client_order_id, "duplicate entry proposal, not reissuing");
            return Ok(());
        }

        let bid_ask = match self.executor.best_bid_ask(&proposal.symbol).await {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(symbol = %proposal.symbol, error = %e, "ticker fetch failed for pre-trade gate");
                None
            }
        };

        let gate = pretrade::evaluate(
            bid_ask,
            proposal.entry_price,
            proposal.entry_price,
            Decimal::ZERO,
            &self.config.spread_thresholds,
            self.config.volatility_floor_ceiling,
        );
        if !gate.allowed {
            self.bus.publish(
                EventKind::RiskRejected { symbol: proposal.symbol.clone(), reasons: gate.reasons },
                Metadata::source("execution"),
            )?;
            return Ok(());
        }

        let client_order_id = ClientOrderId::generate(&proposal.symbol, side_tag(proposal.side));
        let order = crate::domain::Order {
            client_order_id: client_order_id.clone(),
            exchange_order_id: None,
            symbol: proposal.symbol.clone(),
            side: proposal.side,
            order_type: OrderType::Market,
            quantity: adjusted_quantity,
            limit_price: None,
            stop_price: None,
            reduce_only: false,
            leverage: proposal.leverage,
            status: crate::domain::OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            created_at: crate::domain::now(),
            last_updated: crate::domain::now(),
        };
        self.bus.publish(EventKind::OrderPlaced { order }, Metadata::source("execution"))?;

        let request = OrderRequest {
            client_order_id: client_order_id.clone(),
            symbol: proposal.symbol.clone(),
            side: proposal.side,
            order_type: OrderType::Market,
            quantity: adjusted_quantity,
            limit_price: None,
            stop_price: None,
            reduce_only: false,
        };

        match self.place_with_retry(request).await {
            Ok(_exchange_order_id) => {
                self.pending.insert(PendingEntry {
                    client_order_id,
                    trade_id: proposal.trade_id.clone(),
                    symbol: proposal.symbol.clone(),
                    side: proposal.side,
                    intended_entry_price: proposal.entry_price,
                    intended_stop: proposal.stop_price,
                    intended_take_profit: proposal.take_profit,
                    quantity: adjusted_quantity,
                    leverage: proposal.leverage,
                    lifecycle_state: PendingEntryState::Placed,
                    candle_timestamp: proposal.candle_timestamp,
                    attempt_count: 1,
                    original_client_order_id: None,
                });
                Ok(())
            }
            Err(_) => {
                self.bus.publish(
                    EventKind::OrderExpired { client_order_id, reason: ErrorTag::PlacementFailed },
                    Metadata::source("execution"),
                )?;
                Ok(())
            }
        }
    }

    async fn place_with_retry(&self, request: OrderRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.executor.place_order(request.clone()).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < self.config.retry_attempts => {
                    let backoff_ms = 200u64 * (1u64 << attempt.min(6));
                    warn!(attempt, error = %e, backoff_ms, "order placement failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    error!(error = %e, "order placement failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Protective-order attachment (spec.md §4.7): on the first fill for an
    /// entry, open the position and place the reduce-only stop/take-profit.
    pub async fn attach_protective_orders(&self, fill: &Fill, pending: &PendingEntry) -> Result<()> {
        self.bus.publish(
            EventKind::OrderFilled {
                client_order_id: fill.client_order_id.clone(),
                fill_price: fill.price,
                fill_quantity: fill.quantity,
                reduce_only: false,
            },
            Metadata::source("execution"),
        )?;

        self.bus.publish(
            EventKind::PositionOpened {
                position: crate::domain::Position {
                    symbol: pending.symbol.clone(),
                    side: pending.side,
                    quantity: fill.quantity,
                    entry_price: fill.price,
                    leverage: pending.leverage,
                    opened_at: crate::domain::now(),
                    stop_price: Some(pending.intended_stop),
                    take_profit_price: pending.intended_take_profit,
                    trailing_high_water: None,
                    cumulative_funding: Decimal::ZERO,
                    realized_pnl: Decimal::ZERO,
                },
            },
            Metadata::source("execution"),
        )?;

        let stop_request = OrderRequest {
            client_order_id: ClientOrderId::new(format!("{}_SL-{}", pending.symbol.as_str(), side_tag(pending.side))),
            symbol: pending.symbol.clone(),
            side: pending.side.opposite(),
            order_type: OrderType::StopMarket,
            quantity: fill.quantity,
            limit_price: None,
            stop_price: Some(pending.intended_stop),
            reduce_only: true,
        };
        if let Err(e) = self.executor.place_order(stop_request).await {
            error!(symbol = %pending.symbol, error = %e, "failed to attach protective stop");
            self.bus.publish(
                EventKind::ManualInterventionDetected { reason: format!("protective stop placement failed for {}: {e}", pending.symbol) },
                Metadata::source("execution"),
            )?;
            return Ok(());
        }

        if let Some(take_profit) = pending.intended_take_profit {
            let tp_quantity = fill.quantity * self.config.take_profit_fraction;
            let tp_request = OrderRequest {
                client_order_id: ClientOrderId::new(format!("{}_TP-{}", pending.symbol.as_str(), side_tag(pending.side))),
                symbol: pending.symbol.clone(),
                side: pending.side.opposite(),
                order_type: OrderType::TakeProfitMarket,
                quantity: tp_quantity,
                limit_price: None,
                stop_price: Some(take_profit),
                reduce_only: true,
            };
            if let Err(e) = self.executor.place_order(tp_request).await {
                error!(symbol = %pending.symbol, error = %e, "failed to attach take-profit");
                self.bus.publish(
                    EventKind::ManualInterventionDetected { reason: format!("take-profit placement failed for {}: {e}", pending.symbol) },
                    Metadata::source("execution"),
                )?;
            }
        }

        self.pending.remove(&pending.client_order_id);
        Ok(())
    }

    /// Fill ingestion (spec.md §4.7, the generic half — works against any
    /// `Executor`, paper or live): polls every working entry for fills and
    /// attaches protective orders to the ones that filled. A paper run's
    /// bar-close simulation decides *when* a fill exists; this is what
    /// notices and acts on it either way.
    pub async fn poll_fills(&self) -> Result<()> {
        for pending in self.pending.all() {
            let fills = match self.executor.get_fills(&pending.client_order_id).await {
                Ok(fills) => fills,
                Err(e) => {
                    warn!(client_order_id = %pending.client_order_id, error = %e, "fill poll failed");
                    continue;
                }
            };
            for fill in fills {
                if let Err(e) = self.attach_protective_orders(&fill, &pending).await {
                    error!(client_order_id = %pending.client_order_id, error = %e, "failed to attach protective orders for fill");
                }
            }
        }
        Ok(())
    }

    /// Trailing-stop update for one open position, called each strategy
    /// cycle (spec.md §4.7 "Trailing stop update").
    pub async fn update_trailing_stop(
        &self,
        symbol: &Symbol,
        side: Side,
        entry_price: Decimal,
        current_price: Decimal,
        atr: Decimal,
        current_stop: Option<Decimal>,
        quantity: Decimal,
    ) -> Result<Option<Decimal>> {
        let excursion = match side {
            Side::Long => current_price - entry_price,
            Side::Short => entry_price - current_price,
        };
        if excursion < self.config.trailing_start_atr * atr {
            return Ok(None);
        }

        let candidate_stop = match side {
            Side::Long => current_price - self.config.trailing_distance_atr * atr,
            Side::Short => current_price + self.config.trailing_distance_atr * atr,
        };

        let improves = match (side, current_stop) {
            (Side::Long, Some(stop)) => candidate_stop >= stop + self.config.tick_size,
            (Side::Short, Some(stop)) => candidate_stop <= stop - self.config.tick_size,
            (_, None) => true,
        };
        if !improves {
            return Ok(None);
        }

        let counter = {
            let mut entry = self.trailing_counters.entry(symbol.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let client_order_id = ClientOrderId::trailing_stop(symbol, side_tag(side), counter);

        let request = OrderRequest {
            client_order_id: client_order_id.clone(),
            symbol: symbol.clone(),
            side: side.opposite(),
            order_type: OrderType::StopMarket,
            quantity,
            limit_price: None,
            stop_price: Some(candidate_stop),
            reduce_only: true,
        };

        match self.executor.place_order(request).await {
            Ok(_) => {
                self.bus.publish(
                    EventKind::ProtectiveOrdersReplaced { symbol: symbol.clone(), new_client_order_id: client_order_id },
                    Metadata::source("execution"),
                )?;
                Ok(Some(candidate_stop))
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "trailing-stop replacement failed");
                self.bus.publish(
                    EventKind::ManualInterventionDetected { reason: format!("trailing-stop replacement failed for {symbol}: {e}") },
                    Metadata::source("execution"),
                )?;
                Ok(None)
            }
        }
    }

    /// Resolve an entry's deadline per its `TimeoutMode` and apply
    /// `TimeoutAction` if it has passed.
    pub async fn handle_timeout(&self, pending: &PendingEntry, now: chrono::DateTime<chrono::Utc>, next_bar_close: Option<chrono::DateTime<chrono::Utc>>) -> Result<()> {
        let deadline = match self.config.timeout_mode {
            TimeoutMode::Fixed => pending.candle_timestamp + chrono::Duration::seconds(self.config.entry_fixed_timeout_sec),
            TimeoutMode::Timeframe => next_bar_close.unwrap_or(pending.candle_timestamp),
            TimeoutMode::Unlimited => pending.candle_timestamp + chrono::Duration::seconds(self.config.entry_max_duration_sec),
        };
        if now < deadline {
            return Ok(());
        }

        match self.config.timeout_action {
            TimeoutAction::Cancel => {
                self.executor.cancel_order(&pending.client_order_id).await.ok();
                self.bus.publish(
                    EventKind::OrderExpired { client_order_id: pending.client_order_id.clone(), reason: ErrorTag::Timeout },
                    Metadata::source("execution"),
                )?;
                self.pending.remove(&pending.client_order_id);
            }
            TimeoutAction::ConvertMarket | TimeoutAction::ConvertStop => {
                self.executor.cancel_order(&pending.client_order_id).await.ok();
                let order_type = if self.config.timeout_action == TimeoutAction::ConvertMarket {
                    OrderType::Market
                } else {
                    OrderType::StopMarket
                };
                let new_client_order_id = ClientOrderId::new(format!("{}_CONV-{}", pending.client_order_id, pending.attempt_count + 1));
                let request = OrderRequest {
                    client_order_id: new_client_order_id.clone(),
                    symbol: pending.symbol.clone(),
                    side: pending.side,
                    order_type,
                    quantity: pending.quantity,
                    limit_price: None,
                    stop_price: if order_type == OrderType::StopMarket { Some(pending.intended_entry_price) } else { None },
                    reduce_only: false,
                };
                if self.executor.place_order(request).await.is_ok() {
                    self.pending.remove(&pending.client_order_id);
                    self.pending.insert(PendingEntry {
                        client_order_id: new_client_order_id,
                        original_client_order_id: Some(pending.client_order_id.clone()),
                        attempt_count: pending.attempt_count + 1,
                        ..pending.clone()
                    });
                }
            }
        }
        Ok(())
    }
}

fn side_tag(side: Side) -> &'static str {
    match side {
        Side::Long => "LONG",
        Side::Short => "SHORT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewsRisk, TradeId};
    use crate::event::EventLedger;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubExecutor {
        fail_stop_placement: AtomicBool,
    }

    #[async_trait]
    impl Executor for StubExecutor {
        async fn place_order(&self, request: OrderRequest) -> Result<String> {
            if request.order_type == OrderType::StopMarket && self.fail_stop_placement.load(Ordering::SeqCst) {
                anyhow::bail!("exchange rejected stop order");
            }
            Ok(format!("EX-{}", request.client_order_id))
        }

        async fn cancel_order(&self, _client_order_id: &ClientOrderId) -> Result<()> {
            Ok(())
        }

        async fn get_fills(&self, _client_order_id: &ClientOrderId) -> Result<Vec<Fill>> {
            Ok(Vec::new())
        }

        async fn best_bid_ask(&self, _symbol: &Symbol) -> Result<(Decimal, Decimal)> {
            Ok((dec!(41999), dec!(42000)))
        }
    }

    fn config() -> ExecutionConfig {
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

    fn proposal() -> TradeProposal {
        TradeProposal {
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            entry_price: dec!(42000),
            stop_price: dec!(40000),
            take_profit: Some(dec!(46000)),
            atr: dec!(500),
            leverage: dec!(3),
            composite_score: dec!(0.72),
            funding_rate: dec!(0.0001),
            news_risk: NewsRisk::Low,
            trade_id: TradeId::generate(),
            candle_timestamp: crate::domain::now(),
        }
    }

    fn test_engine(executor: StubExecutor) -> (ExecutionEngine<StubExecutor>, Arc<EventBus>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(EventLedger::open(dir.path().join("ledger.log")).unwrap());
        let bus = Arc::new(EventBus::new(ledger));
        let pending = Arc::new(PendingEntryStore::open(dir.path().join("pending.log")).unwrap());
        let engine = ExecutionEngine::new(bus.clone(), Arc::new(executor), pending, config());
        (engine, bus, dir)
    }

    /// spec.md §8 scenario 1: entry happy path. A proposal is placed, fills,
    /// and both protective orders attach without a manual-review event.
    #[tokio::test]
    async fn entry_happy_path_places_order_and_attaches_protective_orders() {
        let (engine, bus, _dir) = test_engine(StubExecutor { fail_stop_placement: AtomicBool::new(false) });
        let proposal = proposal();

        engine.place_entry(&proposal, dec!(0.001)).await.unwrap();
        let history = bus.ledger().read_all().unwrap();
        assert!(history.iter().any(|e| matches!(e.kind, EventKind::OrderPlaced { .. })));

        let pending = engine.pending.find_by_dedup_key(&proposal.symbol, proposal.candle_timestamp).unwrap();
        let fill = Fill {
            client_order_id: pending.client_order_id.clone(),
            symbol: proposal.symbol.clone(),
            side: proposal.side,
            price: dec!(42000),
            quantity: dec!(0.001),
            fee: dec!(0.01),
            timestamp: crate::domain::now(),
        };
        engine.attach_protective_orders(&fill, &pending).await.unwrap();

        let history = bus.ledger().read_all().unwrap();
        let kinds: Vec<&str> = history.iter().map(|e| e.kind.tag()).collect();
        let filled_at = kinds.iter().position(|k| *k == "OrderFilled").unwrap();
        let opened_at = kinds.iter().position(|k| *k == "PositionOpened").unwrap();
        assert!(filled_at < opened_at, "OrderFilled must precede PositionOpened, got {kinds:?}");
        assert!(!history.iter().any(|e| matches!(e.kind, EventKind::ManualInterventionDetected { .. })));
        assert!(engine.pending.find_by_dedup_key(&proposal.symbol, proposal.candle_timestamp).is_none());
    }

    /// spec.md §8 scenario 2: protective failure. The stop placement is
    /// permanently rejected; the engine must flag it for manual review
    /// rather than silently leaving the position unprotected.
    #[tokio::test]
    async fn stop_placement_failure_raises_manual_intervention() {
        let (engine, bus, _dir) = test_engine(StubExecutor { fail_stop_placement: AtomicBool::new(true) });
        let proposal = proposal();
        engine.place_entry(&proposal, dec!(0.001)).await.unwrap();
        let pending = engine.pending.find_by_dedup_key(&proposal.symbol, proposal.candle_timestamp).unwrap();

        let fill = Fill {
            client_order_id: pending.client_order_id.clone(),
            symbol: proposal.symbol.clone(),
            side: proposal.side,
            price: dec!(42000),
            quantity: dec!(0.001),
            fee: dec!(0.01),
            timestamp: crate::domain::now(),
        };
        engine.attach_protective_orders(&fill, &pending).await.unwrap();

        let history = bus.ledger().read_all().unwrap();
        let reason = history.iter().find_map(|e| match &e.kind {
            EventKind::ManualInterventionDetected { reason } => Some(reason.clone()),
            _ => None,
        });
        assert!(reason.is_some_and(|r| r.contains("protective stop")));
    }
}
