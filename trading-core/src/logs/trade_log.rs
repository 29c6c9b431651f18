//! CSV trade log (spec.md §6): one row per position, appended on open and
//! updated on close.
//!
//! Persistence shape mirrors `pending::PendingEntryStore` / the teacher's
//! `AsyncJournal`: a bounded channel feeds a dedicated writer thread so
//! trade-log I/O never blocks the reducer or execution engine. Unlike the
//! ledger, this file is advisory (human/analyst-facing), so it is
//! rewritten wholesale on each update rather than append-only — the exact
//! rewrite-on-update behavior spec.md's "updated on close" calls for.

use crate::domain::{Side, Symbol, TradeId};
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
pub struct TradeLogRow {
    pub trade_id: String,
    pub symbol: String,
    pub side: String,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub leverage: Decimal,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub pnl_pct: Option<Decimal>,
    pub reason: Option<String>,
    pub holding_hours: Option<Decimal>,
    pub funding_cost: Decimal,
    pub fees: Decimal,
    pub spread_at_entry_pct: Decimal,
}

impl TradeLogRow {
    pub fn opened(
        trade_id: TradeId,
        symbol: Symbol,
        side: Side,
        entry_time: DateTime<Utc>,
        entry_price: Decimal,
        quantity: Decimal,
        leverage: Decimal,
        spread_at_entry_pct: Decimal,
    ) -> Self {
        Self {
            trade_id: trade_id.as_str().to_string(),
            symbol: symbol.as_str().to_string(),
            side: side.to_string(),
            entry_time,
            entry_price,
            quantity,
            leverage,
            exit_time: None,
            exit_price: None,
            pnl: None,
            pnl_pct: None,
            reason: None,
            holding_hours: None,
            funding_cost: Decimal::ZERO,
            fees: Decimal::ZERO,
            spread_at_entry_pct,
        }
    }

    pub fn close(&mut self, exit_time: DateTime<Utc>, exit_price: Decimal, pnl: Decimal, reason: impl Into<String>) {
        let holding_hours = (exit_time - self.entry_time).num_seconds() as f64 / 3600.0;
        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);
        self.pnl = Some(pnl);
        self.pnl_pct = Some(if self.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            pnl / (self.entry_price * self.quantity) * Decimal::ONE_HUNDRED
        });
        self.reason = Some(reason.into());
        self.holding_hours = Decimal::try_from(holding_hours).ok();
    }
}

enum Command {
    Upsert(TradeLogRow),
}

/// Writer thread owns the authoritative row set, keyed by `trade_id`, and
/// rewrites the whole CSV file after each mutation.
pub struct TradeLog {
    sender: Option<Sender<Command>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl TradeLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = bounded(1024);
        let writer = thread::spawn(move || Self::writer_loop(path, receiver));
        Self { sender: Some(sender), writer: Some(writer) }
    }

    pub fn upsert(&self, row: TradeLogRow) {
        if let Some(sender) = &self.sender {
            if sender.try_send(Command::Upsert(row)).is_err() {
                error!("trade log writer channel full or disconnected");
            }
        }
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<Command>) {
        let mut rows: BTreeMap<String, TradeLogRow> = BTreeMap::new();
        for command in receiver {
            match command {
                Command::Upsert(row) => {
                    rows.insert(row.trade_id.clone(), row);
                }
            }
            if let Err(e) = Self::rewrite(&path, rows.values()) {
                error!(error = %e, "failed to rewrite trade log");
            }
        }
    }

    fn rewrite<'a>(path: &PathBuf, rows: impl Iterator<Item = &'a TradeLogRow>) -> csv::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Drop for TradeLog {
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
    fn opened_row_then_closed_row_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        let log = TradeLog::open(&path);

        let mut row = TradeLogRow::opened(
            TradeId::generate(),
            Symbol::new("BTCUSDT"),
            Side::Long,
            Utc::now(),
            dec!(42000),
            dec!(0.1),
            dec!(5),
            dec!(0.02),
        );
        log.upsert(row.clone());
        row.close(Utc::now(), dec!(43000), dec!(100), "take_profit");
        log.upsert(row);
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("take_profit"));
    }
}
