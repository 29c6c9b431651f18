//! Identifier newtypes.
//!
//! The teacher represents `OrderId` as an opaque wrapper (`u128` in the
//! zero-overhead `core::types` module, `String` in `execution::types`) rather
//! than a bare primitive, so call sites can't accidentally compare an order id
//! to a trade id. We follow the same shape for every id this crate hands out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-assigned idempotency key for an order. Unique across the ledger's
/// entire lifetime (spec.md invariant 5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a brand-new entry order.
    pub fn generate(symbol: &Symbol, side_tag: &str) -> Self {
        Self(format!("{}_{}_{}", symbol.as_str(), side_tag, uuid::Uuid::new_v4().simple()))
    }

    /// Derive a lineage id for a trailing-stop replacement:
    /// `<symbol>_SL-TRAIL-<side>-<counter>` (spec.md §4.7).
    pub fn trailing_stop(symbol: &Symbol, side_tag: &str, counter: u64) -> Self {
        Self(format!("{}_SL-TRAIL-{}-{}", symbol.as_str(), side_tag, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque unique identifier for an [`crate::event::Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(uuid::Uuid);

impl EventId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonically increasing, gap-free ledger position.
///
/// Newtype over `u64` rather than a bare integer so that "the next sequence"
/// and "an order's filled quantity" can never typecheck against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sequence(pub u64);

impl Sequence {
    pub const ZERO: Sequence = Sequence(0);

    pub fn next(self) -> Sequence {
        Sequence(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tradable instrument symbol (e.g. `BTCUSDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier correlating a [`crate::domain::Position`] back to the
/// `TradeProposal` that opened it, and to its row in the trade log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(String);

impl TradeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TradeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
