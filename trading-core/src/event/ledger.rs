//! The append-only durable ledger.
//!
//! spec.md's publish contract requires persistence to complete before any
//! handler observes the event, so unlike the teacher's `AsyncJournal` (a
//! fire-and-forget writer thread that tolerates dropping events under
//! backpressure), the ledger append here is synchronous: the caller blocks
//! until the record is flushed. The file-handling shape — `OpenOptions`
//! append mode, one JSON record per line, `writeln!` plus an explicit flush —
//! is carried over from `execution::journal::AsyncJournal::writer_loop`.

use super::Event;
use crate::domain::Sequence;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open ledger file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to append ledger record: {0}")]
    Append(#[source] io::Error),

    #[error("failed to flush ledger to durable storage: {0}")]
    Flush(#[source] io::Error),

    #[error("failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize ledger record at line {line}: {source}")]
    Deserialize { line: usize, source: serde_json::Error },
}

struct Inner {
    file: File,
    next_sequence: Sequence,
    counter_path: PathBuf,
}

/// Append-only event log. One self-describing JSON record per line; a
/// sibling `sequence.txt` tracks the next sequence to assign so a fresh
/// process can resume numbering without rescanning the whole file.
pub struct EventLedger {
    inner: Mutex<Inner>,
    log_path: PathBuf,
}

impl EventLedger {
    /// Open (or create) the ledger at `log_path`. Truncates a torn final
    /// record, if any, and reconciles the sequence counter to the last
    /// intact record.
    pub fn open(log_path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let log_path = log_path.into();
        let counter_path = Self::counter_path(&log_path);

        let last_sequence = Self::recover(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| LedgerError::Open { path: log_path.clone(), source })?;

        let next_sequence = last_sequence.map(Sequence::next).unwrap_or(Sequence::ZERO);
        Self::write_counter(&counter_path, next_sequence)?;

        Ok(Self {
            inner: Mutex::new(Inner { file, next_sequence, counter_path }),
            log_path,
        })
    }

    fn counter_path(log_path: &Path) -> PathBuf {
        log_path.with_file_name(format!(
            "{}.sequence.txt",
            log_path.file_stem().and_then(|s| s.to_str()).unwrap_or("ledger")
        ))
    }

    /// Scan the file for a torn last line (incomplete JSON) and truncate it.
    /// Returns the sequence of the last intact record, if any.
    fn recover(log_path: &Path) -> Result<Option<Sequence>, LedgerError> {
        if !log_path.exists() {
            return Ok(None);
        }

        let file = File::open(log_path).map_err(|source| LedgerError::Open {
            path: log_path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(&file);

        let mut last_good_sequence = None;
        let mut valid_bytes: u64 = 0;
        let mut offset: u64 = 0;

        for line in reader.lines() {
            let line = line.map_err(LedgerError::Append)?;
            let line_len = line.len() as u64 + 1; // + newline
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => {
                    last_good_sequence = Some(event.sequence);
                    offset += line_len;
                    valid_bytes = offset;
                }
                Err(_) => {
                    warn!(path = %log_path.display(), "truncating torn ledger record");
                    break;
                }
            }
        }

        drop(file);

        let file = OpenOptions::new()
            .write(true)
            .open(log_path)
            .map_err(|source| LedgerError::Open { path: log_path.to_path_buf(), source })?;
        file.set_len(valid_bytes).map_err(LedgerError::Append)?;

        Ok(last_good_sequence)
    }

    fn write_counter(counter_path: &Path, next: Sequence) -> Result<(), LedgerError> {
        std::fs::write(counter_path, next.0.to_string()).map_err(LedgerError::Append)
    }

    /// Reserve the next sequence and durably append `event` (with that
    /// sequence already assigned) to the log. The caller is expected to have
    /// already stamped `event.sequence` via [`EventLedger::reserve`].
    pub(crate) fn reserve(&self) -> Sequence {
        self.inner.lock().next_sequence
    }

    pub(crate) fn append(&self, event: &Event) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let line = serde_json::to_string(event).map_err(LedgerError::Serialize)?;
        writeln!(inner.file, "{line}").map_err(LedgerError::Append)?;
        inner.file.flush().map_err(LedgerError::Flush)?;
        inner.file.sync_data().map_err(LedgerError::Flush)?;

        inner.next_sequence = event.sequence.next();
        let counter_path = inner.counter_path.clone();
        let next = inner.next_sequence;
        drop(inner);
        Self::write_counter(&counter_path, next)
    }

    /// Read every intact record back in order, for replay at startup.
    pub fn read_all(&self) -> Result<Vec<Event>, LedgerError> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_path).map_err(|source| LedgerError::Open {
            path: self.log_path.clone(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(LedgerError::Append)?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line)
                .map_err(|source| LedgerError::Deserialize { line: idx + 1, source })?;
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventId;
    use crate::event::{EventKind, Metadata};
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_event(sequence: u64) -> Event {
        Event {
            event_id: EventId::generate(),
            timestamp: Utc::now(),
            sequence: Sequence(sequence),
            kind: EventKind::SystemStarted,
            metadata: Metadata::source("test"),
        }
    }

    #[test]
    fn append_and_replay_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = EventLedger::open(&path).unwrap();

        for seq in 0..3 {
            let event = sample_event(seq);
            ledger.append(&event).unwrap();
        }

        let replayed = ledger.read_all().unwrap();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[2].sequence, Sequence(2));
    }

    #[test]
    fn reopen_resumes_sequence_counter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = EventLedger::open(&path).unwrap();
            ledger.append(&sample_event(0)).unwrap();
            ledger.append(&sample_event(1)).unwrap();
        }

        let reopened = EventLedger::open(&path).unwrap();
        assert_eq!(reopened.reserve(), Sequence(2));
    }

    #[test]
    fn torn_final_record_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = EventLedger::open(&path).unwrap();
            ledger.append(&sample_event(0)).unwrap();
        }
        // Simulate a crash mid-write: append a non-JSON trailing fragment.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            write!(file, "{{\"incomplete").unwrap();
        }

        let recovered = EventLedger::open(&path).unwrap();
        let events = recovered.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(recovered.reserve(), Sequence(1));
    }
}
