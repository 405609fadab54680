//! Local record store.
//!
//! Keeps every consultation record in one serialized collection inside a
//! [`BlobStore`]. Under quota pressure the store evicts its oldest records
//! and retries once instead of refusing every later save.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::record::{AnalysisResult, ConsultationForm, ConsultationRecord, RecordId};
use crate::storage::{BlobError, BlobStore};

/// How many records to drop when a write hits the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Never evict fewer records than this.
    pub min_batch: usize,
    /// Share of the stored records to evict, in percent (rounded up).
    pub percent: u8,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            min_batch: 5,
            percent: 20,
        }
    }
}

impl EvictionPolicy {
    /// Number of records to evict from a store holding `stored` records.
    #[must_use]
    pub fn batch_size(&self, stored: usize) -> usize {
        let share = (stored * usize::from(self.percent)).div_ceil(100);
        self.min_batch.max(share)
    }
}

/// Drop the `count` oldest records, returning the survivors oldest first.
///
/// The sort is stable, so records sharing a timestamp leave in insertion order.
fn evict_oldest(mut records: Vec<ConsultationRecord>, count: usize) -> Vec<ConsultationRecord> {
    records.sort_by_key(|record| record.timestamp);
    let count = count.min(records.len());
    records.split_off(count)
}

/// Statistics about the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records stored.
    pub total_records: usize,
    /// Creation time of the oldest record.
    pub oldest_record: Option<DateTime<Utc>>,
    /// Creation time of the newest record.
    pub newest_record: Option<DateTime<Utc>>,
    /// Bytes used across the storage area.
    pub stored_bytes: u64,
    /// Configured quota in bytes, `None` when unlimited.
    pub quota_bytes: Option<u64>,
}

/// Size-bounded, append-only store of consultation records.
///
/// Saves and deletes are serialized within the process. Nothing coordinates
/// separate processes sharing the same storage area; the last writer wins.
#[derive(Debug)]
pub struct RecordStore {
    blobs: Box<dyn BlobStore>,
    key: String,
    policy: EvictionPolicy,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Create a store over `blobs` using the collection key and eviction
    /// policy from `config`.
    #[must_use]
    pub fn new(blobs: impl BlobStore + 'static, config: &StorageConfig) -> Self {
        Self::with_policy(blobs, config.blob_key.clone(), config.eviction_policy())
    }

    /// Create a store with an explicit collection key and eviction policy.
    #[must_use]
    pub fn with_policy(
        blobs: impl BlobStore + 'static,
        key: impl Into<String>,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            blobs: Box::new(blobs),
            key: key.into(),
            policy,
            write_lock: Mutex::new(()),
        }
    }

    /// The name of the blob holding the collection.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store a new record for a completed analysis.
    ///
    /// # Errors
    ///
    /// - [`Error::StorageUnavailable`] if the storage probe fails.
    /// - [`Error::StorageFull`] if the quota is still exceeded after evicting
    ///   old records.
    /// - [`Error::StorageWrite`] for any other write failure, including a
    ///   quota failure on an empty collection.
    pub fn save(&self, form: &ConsultationForm, result: &AnalysisResult) -> Result<RecordId> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::internal("record store write lock poisoned"))?;

        match self.blobs.probe() {
            // A full area is still writable; eviction below deals with it.
            Ok(()) | Err(BlobError::QuotaExceeded(_)) => {}
            Err(err) => {
                error!("Storage probe failed: {}", err);
                return Err(Error::StorageUnavailable {
                    reason: err.to_string(),
                });
            }
        }

        let existing = self.load().unwrap_or_default();
        let record = Self::new_record(&existing, form, result);
        let id = record.id.clone();

        let mut records = existing.clone();
        records.push(record.clone());

        match self.persist(&records) {
            Ok(()) => {
                info!("Saved consultation record {}", id);
                Ok(id)
            }
            Err(BlobError::QuotaExceeded(reason)) if !existing.is_empty() => {
                let evicted = self.policy.batch_size(existing.len()).min(existing.len());
                warn!(
                    "Storage quota exceeded ({}); evicting {} of {} records",
                    reason,
                    evicted,
                    existing.len()
                );
                let mut pruned = evict_oldest(existing, evicted);
                pruned.push(record);

                match self.persist(&pruned) {
                    Ok(()) => {
                        info!("Saved consultation record {} after evicting {} records", id, evicted);
                        Ok(id)
                    }
                    Err(err) => {
                        error!("Eviction did not free enough space: {}", err);
                        Err(Error::StorageFull { evicted })
                    }
                }
            }
            Err(err) => {
                error!("Failed to save consultation record: {}", err);
                Err(Error::storage_write(err.to_string()))
            }
        }
    }

    /// All stored records in insertion order.
    ///
    /// Unreadable or corrupted state is logged and reported as an empty collection.
    #[must_use]
    pub fn list(&self) -> Vec<ConsultationRecord> {
        self.load().unwrap_or_default()
    }

    /// All stored records, newest first.
    #[must_use]
    pub fn list_recent(&self) -> Vec<ConsultationRecord> {
        let mut records = self.list();
        records.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
        records
    }

    /// Records matching `query` in symptoms, issue type, role or core issue, newest first.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<ConsultationRecord> {
        self.list_recent()
            .into_iter()
            .filter(|record| record.matches(query))
            .collect()
    }

    /// Get a record by its id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<ConsultationRecord> {
        self.list().into_iter().find(|record| &record.id == id)
    }

    /// Delete a record by id.
    ///
    /// Returns `true` if a record was removed. Deleting a missing id, or
    /// deleting from a corrupted collection, changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] if the shortened collection cannot be written.
    pub fn delete(&self, id: &RecordId) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::internal("record store write lock poisoned"))?;

        let Some(records) = self.load() else {
            warn!("Skipping delete of {}: stored records are unreadable", id);
            return Ok(false);
        };

        let before = records.len();
        let remaining: Vec<_> = records.into_iter().filter(|r| &r.id != id).collect();
        if remaining.len() == before {
            debug!("Record {} not found; nothing to delete", id);
            return Ok(false);
        }

        self.persist(&remaining)
            .map_err(|err| Error::storage_write(err.to_string()))?;
        info!("Deleted consultation record {}", id);
        Ok(true)
    }

    /// Get store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let records = self.list();
        let oldest = records.iter().map(|r| r.timestamp).min();
        let newest = records.iter().map(|r| r.timestamp).max();
        let to_datetime = |millis: i64| DateTime::<Utc>::from_timestamp_millis(millis);

        StoreStats {
            total_records: records.len(),
            oldest_record: oldest.and_then(to_datetime),
            newest_record: newest.and_then(to_datetime),
            stored_bytes: self.blobs.total_size().unwrap_or(0),
            quota_bytes: self.blobs.quota(),
        }
    }

    /// Read the collection. `None` means the stored state could not be read
    /// or parsed; a missing blob is an empty collection.
    fn load(&self) -> Option<Vec<ConsultationRecord>> {
        let bytes = match self.blobs.read(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Some(Vec::new()),
            Err(err) => {
                warn!("Failed to read stored records, treating as empty: {}", err);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => Some(records),
            Err(err) => {
                warn!("Corrupted record collection in '{}', treating as empty: {}", self.key, err);
                None
            }
        }
    }

    fn persist(&self, records: &[ConsultationRecord]) -> std::result::Result<(), BlobError> {
        let bytes = serde_json::to_vec(records)
            .map_err(|err| BlobError::Backend(format!("failed to serialize records: {err}")))?;
        self.blobs.write(&self.key, &bytes)
    }

    fn new_record(
        existing: &[ConsultationRecord],
        form: &ConsultationForm,
        result: &AnalysisResult,
    ) -> ConsultationRecord {
        let mut id = RecordId::generate();
        while existing.iter().any(|r| r.id == id) {
            id = RecordId::generate();
        }

        // Keep timestamps non-decreasing even if the wall clock steps back.
        let newest = existing.iter().map(|r| r.timestamp).max().unwrap_or(i64::MIN);
        let timestamp = Utc::now().timestamp_millis().max(newest);

        ConsultationRecord::new(id, timestamp, form, result)
    }
}
