//! The closed set of event kinds this crate produces and consumes, and the
//! tagged-union payload carried by each.
//!
//! Grounded on the teacher's `execution::journal::JournalEvent` (a
//! `#[serde(tag = "event", content = "data")]` enum), extended from the
//! teacher's four order-lifecycle variants to the full taxonomy.

use crate::domain::{ClientOrderId, NewsRisk, Order, Position, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form context attached to every event. At minimum carries a `source`
/// tag identifying which loop or handler produced the event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata(pub HashMap<String, String>);

impl Metadata {
    pub fn source(source: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert("source".to_string(), source.into());
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

/// Reason tag attached to rejections, skips, and protective-order failures.
/// Closed set per spec.md §4.3/§4.7/§4.7.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorTag {
    StrategyPaused,
    PositionLimit,
    SymbolBusy,
    NewsBlocked,
    FundingExcess,
    StopDistanceInvalid,
    LeverageClamped,
    SizeBelowMin,
    SpreadTooWide,
    SlippageExceeded,
    PlacementFailed,
    Timeout,
}

/// The full tagged-union payload, keyed by `kind` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum EventKind {
    // --- System ---
    SystemStarted,
    SystemStopped,
    ShutdownInitiated { reason: String },

    // --- Universe ---
    UniverseUpdated { symbols: Vec<Symbol> },
    SymbolFiltered { symbol: Symbol, reason: String },

    // --- News ---
    NewsIngested { symbol: Symbol, headline: String },
    NewsClassified {
        symbol: Symbol,
        level: NewsRisk,
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    // --- Signals ---
    SignalComputed { symbol: Symbol, composite_score: Decimal },
    TradeProposed {
        symbol: Symbol,
        side: Side,
        entry: Decimal,
        stop: Decimal,
        candle_timestamp: chrono::DateTime<chrono::Utc>,
    },
    TradeCycleCompleted {
        candidates: Vec<Symbol>,
        selected: Vec<Symbol>,
        rejections: HashMap<String, ErrorTag>,
    },

    // --- Risk ---
    RiskApproved {
        symbol: Symbol,
        adjusted_leverage: Decimal,
        adjusted_quantity: Decimal,
    },
    RiskRejected { symbol: Symbol, reasons: Vec<ErrorTag> },
    EntrySkipped { symbol: Symbol, reason: String },

    // --- Orders ---
    OrderPlaced { order: Order },
    OrderFilled {
        client_order_id: ClientOrderId,
        fill_price: Decimal,
        fill_quantity: Decimal,
        reduce_only: bool,
    },
    OrderPartialFill {
        client_order_id: ClientOrderId,
        fill_price: Decimal,
        fill_quantity: Decimal,
    },
    OrderCancelled { client_order_id: ClientOrderId },
    OrderExpired { client_order_id: ClientOrderId, reason: ErrorTag },

    // --- Positions ---
    PositionOpened { position: Position },
    PositionUpdated { symbol: Symbol },
    PositionClosed {
        symbol: Symbol,
        realized_pnl: Decimal,
        exit_price: Decimal,
    },
    StopTriggered { symbol: Symbol, stop_price: Decimal },

    // --- Account ---
    AccountSettingUpdated { symbol: Symbol, setting: String },
    AccountSettingFailed { symbol: Symbol, setting: String, reason: String },

    // --- Alerts ---
    CircuitBreakerTriggered { reason: String },
    ManualInterventionDetected { reason: String },
    ManualReviewAcknowledged { operator: String },

    // --- Reconciliation / Watchdog ---
    ReconciliationCompleted { drift_detected: bool, details: String },
    ProtectiveOrdersVerified { symbol: Symbol },
    ProtectiveOrdersMissing { symbol: Symbol, kind: String },
    ProtectiveOrdersReplaced { symbol: Symbol, new_client_order_id: ClientOrderId },

    // --- Funding ---
    FundingUpdate { symbol: Symbol, rate: Decimal },
    FundingSettlement {
        symbol: Symbol,
        settled_at: chrono::DateTime<chrono::Utc>,
        cashflow: Decimal,
    },
}

impl EventKind {
    /// The string tag used as `kind` on the wire and in logs — matches the
    /// variant name exactly, per spec.md's closed enumeration.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::SystemStarted => "SystemStarted",
            EventKind::SystemStopped => "SystemStopped",
            EventKind::ShutdownInitiated { .. } => "ShutdownInitiated",
            EventKind::UniverseUpdated { .. } => "UniverseUpdated",
            EventKind::SymbolFiltered { .. } => "SymbolFiltered",
            EventKind::NewsIngested { .. } => "NewsIngested",
            EventKind::NewsClassified { .. } => "NewsClassified",
            EventKind::SignalComputed { .. } => "SignalComputed",
            EventKind::TradeProposed { .. } => "TradeProposed",
            EventKind::TradeCycleCompleted { .. } => "TradeCycleCompleted",
            EventKind::RiskApproved { .. } => "RiskApproved",
            EventKind::RiskRejected { .. } => "RiskRejected",
            EventKind::EntrySkipped { .. } => "EntrySkipped",
            EventKind::OrderPlaced { .. } => "OrderPlaced",
            EventKind::OrderFilled { .. } => "OrderFilled",
            EventKind::OrderPartialFill { .. } => "OrderPartialFill",
            EventKind::OrderCancelled { .. } => "OrderCancelled",
            EventKind::OrderExpired { .. } => "OrderExpired",
            EventKind::PositionOpened { .. } => "PositionOpened",
            EventKind::PositionUpdated { .. } => "PositionUpdated",
            EventKind::PositionClosed { .. } => "PositionClosed",
            EventKind::StopTriggered { .. } => "StopTriggered",
            EventKind::AccountSettingUpdated { .. } => "AccountSettingUpdated",
            EventKind::AccountSettingFailed { .. } => "AccountSettingFailed",
            EventKind::CircuitBreakerTriggered { .. } => "CircuitBreakerTriggered",
            EventKind::ManualInterventionDetected { .. } => "ManualInterventionDetected",
            EventKind::ManualReviewAcknowledged { .. } => "ManualReviewAcknowledged",
            EventKind::ReconciliationCompleted { .. } => "ReconciliationCompleted",
            EventKind::ProtectiveOrdersVerified { .. } => "ProtectiveOrdersVerified",
            EventKind::ProtectiveOrdersMissing { .. } => "ProtectiveOrdersMissing",
            EventKind::ProtectiveOrdersReplaced { .. } => "ProtectiveOrdersReplaced",
            EventKind::FundingUpdate { .. } => "FundingUpdate",
            EventKind::FundingSettlement { .. } => "FundingSettlement",
        }
    }
}
