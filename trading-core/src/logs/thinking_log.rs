//! JSON-lines "thinking" log (spec.md §6): one record per signal
//! evaluation, carrying the scoring diagnostics that don't belong in the
//! ledger (which only records decisions, not the reasoning behind them).

use crate::domain::{NewsRisk, Symbol};
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
pub struct ThinkingLogRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub candle_timestamp: DateTime<Utc>,
    pub composite_score: Decimal,
    pub factor_scores: HashMap<String, Decimal>,
    pub regime: String,
    pub blocks_entry: bool,
    pub entry_extension_atr: Decimal,
    pub news_risk: NewsRisk,
    pub funding_carry_estimate: Decimal,
}

pub struct ThinkingLog {
    sender: Option<Sender<ThinkingLogRecord>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl ThinkingLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = bounded(1024);
        let writer = thread::spawn(move || Self::writer_loop(path, receiver));
        Self { sender: Some(sender), writer: Some(writer) }
    }

    pub fn record(&self, record: ThinkingLogRecord) {
        if let Some(sender) = &self.sender {
            if let Err(crossbeam::channel::TrySendError::Full(dropped) | crossbeam::channel::TrySendError::Disconnected(dropped)) =
                sender.try_send(record)
            {
                error!(symbol = %dropped.symbol, "thinking log writer channel full or disconnected");
            }
        }
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<ThinkingLogRecord>) {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open thinking log");
                return;
            }
        };
        for record in receiver {
            match serde_json::to_string(&record) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        error!(error = %e, "failed to append thinking log record");
                    }
                    let _ = file.flush();
                }
                Err(e) => error!(error = %e, "failed to serialize thinking log record"),
            }
        }
    }
}

impl Drop for ThinkingLog {
    fn drop(&mut self) {
        let _ = self.sender.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

pub fn symbol_key(symbol: &Symbol) -> String {
    symbol.as_str().to_string()
}
