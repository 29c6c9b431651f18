//! `PaperExecutor`: the spec.md §4.8 fill simulator, implementing the same
//! [`Executor`] trait a live exchange adapter would.
//!
//! Grounded on the teacher's `execution::simulated::SimulatedExecutor` for
//! the overall shape (bounded pending-fill queue, in-memory order table,
//! immediate-fill-at-placement-time for market orders) and its unused
//! `RealisticSimulator` sketch for the probability/slippage direction this
//! module fully implements via [`super::model`].
//!
//! Reproducibility across runs comes from seeding the PRNG once at
//! construction rather than pulling from thread-local entropy the way the
//! teacher's sketch did.

use super::model::{self, Regime};
use crate::domain::{ClientOrderId, OrderType, Symbol};
use crate::execution::{Executor, Fill, OrderRequest, SpreadThresholds};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use crossbeam::queue::ArrayQueue;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

const MAX_PENDING_FILLS: usize = 1024;

#[derive(Debug, Clone)]
struct SimOrder {
    request: OrderRequest,
    filled_quantity: Decimal,
    bars_held: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub close: Decimal,
    pub atr_pct: Decimal,
    pub regime: Regime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    pub slippage: model::SlippageModel,
    pub spread_thresholds: SpreadThresholds,
    pub marketable_through_bps: Decimal,
    pub fill_distance_decay: Decimal,
    pub bars_held_bonus: Decimal,
    pub high_vol_bonus: Decimal,
    pub high_vol_atr_floor: Decimal,
    pub partial_fill_rate: Decimal,
    pub taker_fee_pct: Decimal,
    pub maker_fee_pct: Decimal,
    pub seed: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            slippage: model::SlippageModel { base_bps: dec!(1), atr_scale: dec!(0.5), market_order_penalty_bps: dec!(3) },
            spread_thresholds: SpreadThresholds {
                dynamic: false,
                fixed_max_spread_pct: dec!(0.5),
                calm_max_spread_pct: dec!(0.1),
                normal_max_spread_pct: dec!(0.2),
                volatile_max_spread_pct: dec!(0.5),
                max_slippage_pct: dec!(0.5),
            },
            marketable_through_bps: dec!(5),
            fill_distance_decay: dec!(1),
            bars_held_bonus: dec!(0.05),
            high_vol_bonus: dec!(0.1),
            high_vol_atr_floor: dec!(2),
            partial_fill_rate: dec!(0.1),
            taker_fee_pct: dec!(0.0004),
            maker_fee_pct: dec!(0.0002),
            seed: 42,
        }
    }
}

/// Deterministic paper-trading fill simulator. One instance covers the
/// whole universe; market snapshots are pushed in by the orchestrator's
/// replay loop as each bar closes.
pub struct PaperExecutor {
    config: PaperConfig,
    orders: DashMap<ClientOrderId, SimOrder>,
    market: DashMap<Symbol, MarketSnapshot>,
    pending_fills: ArrayQueue<Fill>,
    rng: Mutex<StdRng>,
    dropped_fills: Mutex<u64>,
}

impl PaperExecutor {
    pub fn new(config: PaperConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            orders: DashMap::new(),
            market: DashMap::new(),
            pending_fills: ArrayQueue::new(MAX_PENDING_FILLS),
            rng: Mutex::new(rng),
            dropped_fills: Mutex::new(0),
        }
    }

    /// Called by the replay loop when a bar closes for `symbol`.
    pub fn update_market(&self, symbol: Symbol, snapshot: MarketSnapshot) {
        self.market.insert(symbol, snapshot);
    }

    fn push_fill(&self, fill: Fill) {
        if let Err(dropped) = self.pending_fills.push(fill) {
            *self.dropped_fills.lock().unwrap() += 1;
            warn!(client_order_id = %dropped.client_order_id, "paper executor fill queue overflow, dropping oldest");
            let _ = self.pending_fills.pop();
            let _ = self.pending_fills.push(dropped);
        }
    }

    /// On every bar close: advance `bars_held` for resting limits and decide
    /// whether each fills, partially or fully, per spec.md §4.8.
    pub fn on_bar_close(&self, symbol: &Symbol) {
        let Some(snapshot) = self.market.get(symbol).map(|s| *s) else { return };
        let mut to_remove = Vec::new();

        for mut entry in self.orders.iter_mut() {
            if entry.request.symbol != *symbol {
                continue;
            }
            let client_order_id_key = entry.key().clone();
            let sim_order = entry.value_mut();
            sim_order.bars_held += 1;

            let Some(fill_price) = self.decide_fill_price(sim_order, snapshot) else { continue };
            let remaining = sim_order.request.quantity - sim_order.filled_quantity;
            let partial_fill_rate = self.config.partial_fill_rate.to_f64().unwrap_or(0.0);
            let is_partial = {
                let mut rng = self.rng.lock().unwrap();
                rng.gen::<f64>() < partial_fill_rate
            } && sim_order.filled_quantity.is_zero();

            let fill_qty = if is_partial { remaining / Decimal::TWO } else { remaining };
            sim_order.filled_quantity += fill_qty;

            let fee_pct = if matches!(sim_order.request.order_type, OrderType::Market) {
                self.config.taker_fee_pct
            } else {
                self.config.maker_fee_pct
            };
            let fee = fill_qty * fill_price * fee_pct;

            self.push_fill(Fill {
                client_order_id: client_order_id_key.clone(),
                symbol: symbol.clone(),
                side: sim_order.request.side,
                price: fill_price,
                quantity: fill_qty,
                fee,
                timestamp: Utc::now(),
            });

            if sim_order.filled_quantity >= sim_order.request.quantity {
                to_remove.push(client_order_id_key);
            }
        }

        for client_order_id in to_remove {
            self.orders.remove(&client_order_id);
        }
    }

    fn decide_fill_price(&self, sim_order: &SimOrder, snapshot: MarketSnapshot) -> Option<Decimal> {
        let side = sim_order.request.side;
        let is_market = matches!(sim_order.request.order_type, OrderType::Market);

        let is_marketable = is_market
            || sim_order.request.limit_price.is_some_and(|limit| {
                model::is_marketable_limit(side, limit, snapshot.close, self.config.marketable_through_bps)
            });

        let spread_pct = if snapshot.close.is_zero() {
            Decimal::ZERO
        } else {
            (snapshot.ask - snapshot.bid) / snapshot.close * Decimal::ONE_HUNDRED
        };

        if !is_marketable {
            let limit_price = sim_order.request.limit_price?;
            let distance_pct = (limit_price - snapshot.close).abs() / snapshot.close * Decimal::ONE_HUNDRED;
            let is_high_vol = snapshot.atr_pct >= self.config.high_vol_atr_floor;
            let probability = model::fill_probability(
                distance_pct,
                self.config.fill_distance_decay,
                sim_order.bars_held,
                self.config.bars_held_bonus,
                is_high_vol,
                self.config.high_vol_bonus,
            );
            let roll: Decimal = {
                let mut rng = self.rng.lock().unwrap();
                Decimal::try_from(rng.gen::<f64>()).unwrap_or(Decimal::ONE)
            };
            if roll >= probability {
                return None;
            }
            return Some(limit_price);
        }

        let modelled = model::modelled_slippage(&self.config.slippage, snapshot.atr_pct, snapshot.regime, is_market);
        let effective = model::effective_slippage(modelled, spread_pct, true);
        Some(model::apply_slippage(snapshot.close, side, effective))
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    async fn place_order(&self, request: OrderRequest) -> Result<String> {
        if request.quantity <= Decimal::ZERO {
            return Err(anyhow!("paper order quantity must be positive"));
        }
        let client_order_id = request.client_order_id.clone();
        debug!(%client_order_id, symbol = %request.symbol, "paper executor accepted order");
        self.orders.insert(client_order_id.clone(), SimOrder { request, filled_quantity: Decimal::ZERO, bars_held: 0 });
        Ok(client_order_id.as_str().to_string())
    }

    async fn cancel_order(&self, client_order_id: &ClientOrderId) -> Result<()> {
        self.orders.remove(client_order_id).map(|_| ()).ok_or_else(|| anyhow!("order {client_order_id} not found"))
    }

    async fn get_fills(&self, client_order_id: &ClientOrderId) -> Result<Vec<Fill>> {
        let mut matched = Vec::new();
        let mut rest = Vec::new();
        while let Some(fill) = self.pending_fills.pop() {
            if &fill.client_order_id == client_order_id {
                matched.push(fill);
            } else {
                rest.push(fill);
            }
        }
        for fill in rest {
            let _ = self.pending_fills.push(fill);
        }
        Ok(matched)
    }

    async fn best_bid_ask(&self, symbol: &Symbol) -> Result<(Decimal, Decimal)> {
        self.market.get(symbol).map(|s| (s.bid, s.ask)).ok_or_else(|| anyhow!("no market snapshot for {symbol}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rust_decimal_macros::dec;

    fn config() -> PaperConfig {
        PaperConfig {
            slippage: model::SlippageModel { base_bps: dec!(1), atr_scale: dec!(0.5), market_order_penalty_bps: dec!(3) },
            spread_thresholds: SpreadThresholds {
                dynamic: false,
                fixed_max_spread_pct: dec!(0.5),
                calm_max_spread_pct: dec!(0.1),
                normal_max_spread_pct: dec!(0.2),
                volatile_max_spread_pct: dec!(0.5),
                max_slippage_pct: dec!(0.5),
            },
            marketable_through_bps: dec!(5),
            fill_distance_decay: dec!(1),
            bars_held_bonus: dec!(0.05),
            high_vol_bonus: dec!(0.1),
            high_vol_atr_floor: dec!(2),
            partial_fill_rate: dec!(0),
            taker_fee_pct: dec!(0.0004),
            maker_fee_pct: dec!(0.0002),
            seed: 42,
        }
    }

    #[tokio::test]
    async fn market_order_fills_on_bar_close_with_unfavorable_slippage() {
        let executor = PaperExecutor::new(config());
        let symbol = Symbol::new("BTCUSDT");
        executor.update_market(
            symbol.clone(),
            MarketSnapshot { bid: dec!(99.9), ask: dec!(100.1), close: dec!(100), atr_pct: dec!(0.3), regime: Regime::Normal },
        );

        let request = OrderRequest {
            client_order_id: ClientOrderId::new("entry-1"),
            symbol: symbol.clone(),
            side: Side::Long,
            order_type: OrderType::Market,
            quantity: dec!(1),
            limit_price: None,
            stop_price: None,
            reduce_only: false,
        };
        let coid = request.client_order_id.clone();
        executor.place_order(request).await.unwrap();
        executor.on_bar_close(&symbol);

        let fills = executor.get_fills(&coid).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert!(fills[0].price > dec!(100));
    }

    #[tokio::test]
    async fn far_limit_order_does_not_fill_immediately() {
        let executor = PaperExecutor::new(config());
        let symbol = Symbol::new("BTCUSDT");
        executor.update_market(
            symbol.clone(),
            MarketSnapshot { bid: dec!(99.9), ask: dec!(100.1), close: dec!(100), atr_pct: dec!(0.3), regime: Regime::Normal },
        );

        let request = OrderRequest {
            client_order_id: ClientOrderId::new("entry-2"),
            symbol: symbol.clone(),
            side: Side::Long,
            order_type: OrderType::Limit,
            quantity: dec!(1),
            limit_price: Some(dec!(80)),
            stop_price: None,
            reduce_only: false,
        };
        let coid = request.client_order_id.clone();
        executor.place_order(request).await.unwrap();
        executor.on_bar_close(&symbol);

        let fills = executor.get_fills(&coid).await.unwrap();
        assert!(fills.is_empty());
    }

    #[tokio::test]
    async fn cancel_removes_resting_order() {
        let executor = PaperExecutor::new(config());
        let request = OrderRequest {
            client_order_id: ClientOrderId::new("entry-3"),
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            order_type: OrderType::Limit,
            quantity: dec!(1),
            limit_price: Some(dec!(80)),
            stop_price: None,
            reduce_only: false,
        };
        let coid = request.client_order_id.clone();
        executor.place_order(request).await.unwrap();
        executor.cancel_order(&coid).await.unwrap();
        assert!(executor.cancel_order(&coid).await.is_err());
    }
}
