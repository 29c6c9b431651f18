//! The event-sourced substrate: the immutable [`Event`] envelope, the
//! durable append-only [`ledger::EventLedger`], and the in-process
//! [`bus::EventBus`] that sequences and fans events out to handlers.

mod bus;
mod kinds;
mod ledger;

pub use bus::{EventBus, Handler};
pub use kinds::{ErrorTag, EventKind, Metadata};
pub use ledger::{EventLedger, LedgerError};

use crate::domain::{EventId, Sequence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record produced by the bus. Fields mirror spec.md §3's `Event`
/// definition exactly: an opaque id, a tagged-union `kind`/`payload`
/// (flattened from [`EventKind`]), a UTC timestamp, a gap-free process-wide
/// `sequence`, and free-form `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub sequence: Sequence,
    #[serde(flatten)]
    pub kind: EventKind,
    pub metadata: Metadata,
}

impl Event {
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}
