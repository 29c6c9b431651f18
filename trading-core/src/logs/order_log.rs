//! CSV order log (spec.md §6): one append-only row per order lifecycle
//! event, for post-hoc execution-quality analysis.

use crate::domain::{ClientOrderId, OrderStatus, OrderType, Side, Symbol};
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::thread;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
pub struct OrderLogRow {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub client_order_id: String,
    pub order_id: Option<String>,
    pub status: String,
    pub filled_qty: Decimal,
    pub avg_price: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
}

impl OrderLogRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_type: impl Into<String>,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
        stop_price: Option<Decimal>,
        client_order_id: ClientOrderId,
        order_id: Option<String>,
        status: OrderStatus,
        filled_qty: Decimal,
        avg_price: Option<Decimal>,
        spread_pct: Option<Decimal>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type: event_type.into(),
            symbol: symbol.as_str().to_string(),
            side: side.to_string(),
            order_type: format!("{order_type:?}"),
            quantity,
            price,
            stop_price,
            client_order_id: client_order_id.as_str().to_string(),
            order_id,
            status: format!("{status:?}"),
            filled_qty,
            avg_price,
            spread_pct,
        }
    }
}

pub struct OrderLog {
    sender: Option<Sender<OrderLogRow>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl OrderLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = bounded(1024);
        let writer = thread::spawn(move || Self::writer_loop(path, receiver));
        Self { sender: Some(sender), writer: Some(writer) }
    }

    pub fn append(&self, row: OrderLogRow) {
        if let Some(sender) = &self.sender {
            if sender.try_send(row).is_err() {
                error!("order log writer channel full or disconnected");
            }
        }
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<OrderLogRow>) {
        let needs_header = !path.exists();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open order log");
                return;
            }
        };
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            if let Err(e) = writer.write_record(OrderLogRow::header()) {
                error!(error = %e, "failed to write order log header");
            }
        }
        for row in receiver {
            if let Err(e) = writer.serialize(&row) {
                error!(error = %e, "failed to append order log row");
            }
            if let Err(e) = writer.flush() {
                error!(error = %e, "failed to flush order log");
            }
        }
    }
}

impl OrderLogRow {
    fn header() -> &'static [&'static str] {
        &[
            "timestamp",
            "event_type",
            "symbol",
            "side",
            "order_type",
            "quantity",
            "price",
            "stop_price",
            "client_order_id",
            "order_id",
            "status",
            "filled_qty",
            "avg_price",
            "spread_pct",
        ]
    }
}

impl Drop for OrderLog {
    fn drop(&mut self) {
        let _ = self.sender.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn appends_row_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let log = OrderLog::open(&path);
        log.append(OrderLogRow::new(
            "OrderPlaced",
            Symbol::new("BTCUSDT"),
            Side::Long,
            OrderType::Market,
            dec!(0.1),
            None,
            None,
            ClientOrderId::new("entry-1"),
            None,
            OrderStatus::Pending,
            Decimal::ZERO,
            None,
            Some(dec!(0.02)),
        ));
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("timestamp,event_type"));
        assert!(contents.contains("OrderPlaced"));
    }
}
