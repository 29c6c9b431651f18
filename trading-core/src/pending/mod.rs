//! The durable pending-entry store (L4): tracks in-flight entry contexts so
//! a restart can resume rather than re-propose or orphan a working order.
//!
//! Persistence shape is lifted directly from the teacher's
//! `execution::journal::AsyncJournal`: a bounded `crossbeam` channel feeding
//! a dedicated writer thread that appends one JSON record per line and
//! flushes on every write. The teacher's journal is write-only (a crash
//! recovery trail read by a human); this store additionally replays its own
//! log on `open` to rebuild the in-memory map, since the execution engine
//! needs to query pending entries at runtime, not just after the fact.

use crate::domain::{ClientOrderId, PendingEntry, Symbol};
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::thread;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PendingStoreError {
    #[error("failed to open pending-entry log {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },

    #[error("failed to read pending-entry log: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to deserialize pending-entry record: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
enum PendingRecord {
    Installed(PendingEntry),
    Removed(String),
}

pub struct PendingEntryStore {
    entries: DashMap<String, PendingEntry>,
    sender: Option<Sender<PendingRecord>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl PendingEntryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PendingStoreError> {
        let path = path.into();
        let entries = Self::replay(&path)?;

        let (sender, receiver) = bounded(1024);
        let writer_path = path.clone();
        let writer = thread::spawn(move || Self::writer_loop(writer_path, receiver));

        Ok(Self { entries, sender: Some(sender), writer: Some(writer) })
    }

    fn replay(path: &PathBuf) -> Result<DashMap<String, PendingEntry>, PendingStoreError> {
        let map = DashMap::new();
        if !path.exists() {
            return Ok(map);
        }
        let file = File::open(path).map_err(|source| PendingStoreError::Open { path: path.clone(), source })?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PendingRecord>(&line)? {
                PendingRecord::Installed(entry) => {
                    map.insert(entry.client_order_id.as_str().to_string(), entry);
                }
                PendingRecord::Removed(coid) => {
                    map.remove(&coid);
                }
            }
        }
        Ok(map)
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<PendingRecord>) {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open pending-entry log");
                return;
            }
        };
        for record in receiver {
            match serde_json::to_string(&record) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        error!(error = %e, "failed to append pending-entry record");
                    }
                    let _ = file.flush();
                }
                Err(e) => error!(error = %e, "failed to serialize pending-entry record"),
            }
        }
    }

    /// Install a new pending entry (spec.md §4.7 step 6: "install
    /// PendingEntry; persist").
    pub fn insert(&self, entry: PendingEntry) {
        let key = entry.client_order_id.as_str().to_string();
        let record = PendingRecord::Installed(entry.clone());
        self.entries.insert(key, entry);
        self.send(record);
    }

    /// Remove on fill finalization or explicit cancel/expiry.
    pub fn remove(&self, client_order_id: &ClientOrderId) {
        self.entries.remove(client_order_id.as_str());
        self.send(PendingRecord::Removed(client_order_id.as_str().to_string()));
    }

    pub fn get(&self, client_order_id: &ClientOrderId) -> Option<PendingEntry> {
        self.entries.get(client_order_id.as_str()).map(|e| e.clone())
    }

    /// The duplicate-proposal check of spec.md §4.7 step 1: is there already
    /// a working entry for this `(symbol, candle_timestamp)`?
    pub fn find_by_dedup_key(&self, symbol: &Symbol, candle_timestamp: DateTime<Utc>) -> Option<PendingEntry> {
        self.entries
            .iter()
            .find(|e| &e.symbol == symbol && e.candle_timestamp == candle_timestamp)
            .map(|e| e.clone())
    }

    pub fn all(&self) -> Vec<PendingEntry> {
        self.entries.iter().map(|e| e.clone()).collect()
    }

    fn send(&self, record: PendingRecord) {
        if let Some(sender) = &self.sender {
            if sender.try_send(record).is_err() {
                error!("pending-entry store writer channel full or disconnected");
            }
        }
    }
}

impl Drop for PendingEntryStore {
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
    use crate::domain::{PendingEntryState, Side, TradeId};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn sample_entry(coid: &str) -> PendingEntry {
        PendingEntry {
            client_order_id: ClientOrderId::new(coid),
            trade_id: TradeId::generate(),
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            intended_entry_price: dec!(42000),
            intended_stop: dec!(41000),
            intended_take_profit: None,
            quantity: dec!(0.1),
            leverage: dec!(5),
            lifecycle_state: PendingEntryState::Placed,
            candle_timestamp: crate::domain::now(),
            attempt_count: 1,
            original_client_order_id: None,
        }
    }

    #[test]
    fn insert_and_lookup_by_dedup_key() {
        let dir = tempdir().unwrap();
        let store = PendingEntryStore::open(dir.path().join("pending.jsonl")).unwrap();
        let entry = sample_entry("abc");
        let key = entry.candle_timestamp;
        store.insert(entry.clone());

        let found = store.find_by_dedup_key(&Symbol::new("BTCUSDT"), key);
        assert!(found.is_some());
    }

    #[test]
    fn remove_clears_entry() {
        let dir = tempdir().unwrap();
        let store = PendingEntryStore::open(dir.path().join("pending.jsonl")).unwrap();
        let entry = sample_entry("abc");
        store.insert(entry.clone());
        store.remove(&entry.client_order_id);
        assert!(store.get(&entry.client_order_id).is_none());
    }

    #[test]
    fn reopen_replays_prior_inserts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.jsonl");
        {
            let store = PendingEntryStore::open(&path).unwrap();
            store.insert(sample_entry("abc"));
        }

        let reopened = PendingEntryStore::open(&path).unwrap();
        assert!(reopened.get(&ClientOrderId::new("abc")).is_some());
    }
}
