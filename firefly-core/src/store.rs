//! Durable persistence of undelivered batches
//!
//! Failed batches survive process restarts as a single JSON document: an
//! array of `StoredBatchRecord` at a well-known path. The log is bounded —
//! past `cap` records the oldest are evicted. Telemetry is best-effort, so
//! storage failures are logged and swallowed by the pipeline, never raised
//! to producers.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::event::{Batch, StoredBatchRecord};

/// Bounded circular log of failed batches on disk.
#[derive(Debug)]
pub struct OfflineStore {
    path: PathBuf,
    cap: usize,
}

impl OfflineStore {
    pub fn new(path: PathBuf, cap: usize) -> Self {
        Self { path, cap }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Persist a failed batch, trimming the log to the most recent `cap`
    /// records.
    pub fn save(&self, batch: Batch) -> Result<()> {
        let mut records = self.read_records();
        records.push(StoredBatchRecord::new(batch));

        if records.len() > self.cap {
            let excess = records.len() - self.cap;
            records.drain(..excess);
            tracing::warn!(
                evicted = excess,
                cap = self.cap,
                "Durable log over capacity, evicted oldest records"
            );
        }

        self.write_records(&records)
    }

    /// Read all stored records and clear the log immediately.
    ///
    /// Clearing before the caller retries means a failed retry that gets
    /// saved again can never duplicate events already in the log.
    pub fn drain(&self) -> Result<Vec<StoredBatchRecord>> {
        let records = self.read_records();
        if !records.is_empty() || self.path.exists() {
            self.clear()?;
        }
        Ok(records)
    }

    /// Number of records currently persisted.
    pub fn record_count(&self) -> usize {
        self.read_records().len()
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "failed to clear durable log {:?}: {}",
                self.path, e
            ))),
        }
    }

    /// Read the log, treating a missing or corrupt file as empty.
    fn read_records(&self) -> Vec<StoredBatchRecord> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to read durable log");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(records) => records,
            Err(e) => {
                // A corrupt log is unrecoverable; discard rather than wedge
                tracing::warn!(path = ?self.path, error = %e, "Durable log corrupt, discarding");
                Vec::new()
            }
        }
    }

    fn write_records(&self, records: &[StoredBatchRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("failed to create {:?}: {}", parent, e)))?;
        }

        let content = serde_json::to_vec(records)?;
        std::fs::write(&self.path, content).map_err(|e| {
            Error::Storage(format!(
                "failed to write durable log {:?}: {}",
                self.path, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TrackedEvent;
    use serde_json::json;
    use tempfile::TempDir;

    fn batch(tag: &str) -> Batch {
        Batch::from_events(vec![TrackedEvent::new(tag, json!({}))]).unwrap()
    }

    fn store_in(dir: &TempDir, cap: usize) -> OfflineStore {
        OfflineStore::new(dir.path().join("pending-batches.json"), cap)
    }

    #[test]
    fn test_save_and_drain_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 50);

        store.save(batch("click")).unwrap();
        store.save(batch("view")).unwrap();

        let records = store.drain().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].events[0].event_type, "click");
        assert_eq!(records[1].events[0].event_type, "view");

        // Drain clears the log
        assert_eq!(store.record_count(), 0);
        assert!(store.drain().unwrap().is_empty());
    }

    #[test]
    fn test_drain_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending-batches.json");

        OfflineStore::new(path.clone(), 50).save(batch("click")).unwrap();

        // A fresh handle over the same path sees the record
        let reopened = OfflineStore::new(path, 50);
        let records = reopened.drain().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].events[0].event_type, "click");
    }

    #[test]
    fn test_cap_evicts_oldest_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 3);

        for i in 0..8 {
            store.save(batch(&format!("e{}", i))).unwrap();
        }

        let records = store.drain().unwrap();
        assert_eq!(records.len(), 3);
        let tags: Vec<&str> = records
            .iter()
            .map(|r| r.events[0].event_type.as_str())
            .collect();
        assert_eq!(tags, vec!["e5", "e6", "e7"]);
    }

    #[test]
    fn test_corrupt_log_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending-batches.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = OfflineStore::new(path, 50);
        assert!(store.drain().unwrap().is_empty());

        // Store remains usable afterwards
        store.save(batch("click")).unwrap();
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 50);
        assert_eq!(store.record_count(), 0);
        assert!(store.drain().unwrap().is_empty());
    }
}
