//! Error taxonomy shared across the crate's seams.
//!
//! Mirrors the teacher's two-tier approach: `thiserror`-derived enums at each
//! module boundary, composed under `anyhow::Result` once control reaches the
//! orchestrator. `TransportError` specifically encodes the retry taxonomy a
//! transport adapter must classify its failures into (spec.md §7): callers
//! match on the variant to decide whether to back off, re-authenticate, or
//! give up.

use thiserror::Error;

/// Errors raised by the core's own invariants (ledger, state, risk, execution)
/// as opposed to errors from talking to the exchange.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("sequence gap in event ledger: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("unknown event kind '{0}' encountered during replay, skipping")]
    UnknownEventKind(String),

    #[error("client_order_id '{0}' already exists in the ledger")]
    DuplicateClientOrderId(String),

    #[error("no open position for symbol '{0}'")]
    NoOpenPosition(String),

    #[error("order '{0}' is not in an active state")]
    OrderNotActive(String),

    #[error("fill quantity {fill} exceeds remaining order quantity {remaining}")]
    Overfill {
        fill: rust_decimal::Decimal,
        remaining: rust_decimal::Decimal,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Classification of a failed call to the exchange, used by the resilience
/// layer's backoff policy (spec.md §7). Transport adapters are expected to
/// map whatever underlying HTTP/WS error they hit into one of these variants
/// rather than leaking raw status codes past the crate boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network blip, timeout, 5xx: retry with backoff.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// 429 or exchange-specific throttle signal: back off for at least the
    /// advertised `retry_after`, if any.
    #[error("rate limited, retry after {retry_after_ms:?}ms: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// Expired or invalid credentials: requires operator intervention, not a
    /// retry.
    #[error("authentication failure: {0}")]
    Auth(String),

    /// Rejected request that will never succeed as-is (bad symbol, invalid
    /// size): surfaced to the caller, not retried.
    #[error("permanent transport failure: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Whether the resilience layer's backoff loop should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Transient(_) | TransportError::RateLimited { .. })
    }
}
