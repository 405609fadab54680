//! Storage capability for consultrec.
//!
//! The record store keeps its whole collection in a single named blob. This
//! module defines the [`BlobStore`] capability it writes through, the
//! normalized [`BlobError`] every adapter reports, and two adapters: a
//! `SQLite`-backed store for on-disk persistence and an in-memory store.

pub mod migrations;
pub mod schema;
mod sqlite;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub use sqlite::SqliteBlobStore;

/// Key written and removed by the default availability probe.
pub const PROBE_KEY: &str = "__storage_test__";

/// Errors reported by a [`BlobStore`].
///
/// Adapters decide once, at their own boundary, which of these kinds a
/// backend failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    /// The write would exceed the storage quota.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The storage area cannot be used at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl BlobError {
    /// Check if this error signals quota exhaustion.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

/// Result type for blob operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// A size-bounded key/value area holding whole serialized blobs.
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Read the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> BlobResult<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`.
    ///
    /// Either the new blob is stored in full or the previous one is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::QuotaExceeded`] if the write would exceed the
    /// quota, or another kind if the backend fails.
    fn write(&self, key: &str, bytes: &[u8]) -> BlobResult<()>;

    /// Remove the blob stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove(&self, key: &str) -> BlobResult<()>;

    /// Total bytes currently stored across all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn total_size(&self) -> BlobResult<u64>;

    /// The configured quota in bytes, or `None` when unlimited.
    fn quota(&self) -> Option<u64>;

    /// Check that the area is writable with a cheap write/remove cycle.
    ///
    /// # Errors
    ///
    /// Returns the error of whichever step failed.
    fn probe(&self) -> BlobResult<()> {
        self.write(PROBE_KEY, PROBE_KEY.as_bytes())?;
        self.remove(PROBE_KEY)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn read(&self, key: &str) -> BlobResult<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> BlobResult<()> {
        (**self).write(key, bytes)
    }

    fn remove(&self, key: &str) -> BlobResult<()> {
        (**self).remove(key)
    }

    fn total_size(&self) -> BlobResult<u64> {
        (**self).total_size()
    }

    fn quota(&self) -> Option<u64> {
        (**self).quota()
    }

    fn probe(&self) -> BlobResult<()> {
        (**self).probe()
    }
}

/// Check whether adding `incoming` bytes to `others` stays within `quota`.
pub(crate) fn check_quota(quota: Option<u64>, others: u64, incoming: usize) -> BlobResult<()> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let needed = others.saturating_add(u64::try_from(incoming).unwrap_or(u64::MAX));
    if needed > quota {
        return Err(BlobError::QuotaExceeded(format!(
            "{needed} bytes needed, quota is {quota} bytes"
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<u8>>,
    quota: Option<u64>,
}

/// An in-process [`BlobStore`] with an optional quota and an availability switch.
#[derive(Debug)]
pub struct MemoryBlobStore {
    state: Mutex<MemoryState>,
    available: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    /// Create an unlimited, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Create a store limited to `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: u64) -> Self {
        let store = Self::new();
        store.set_quota(Some(quota));
        store
    }

    /// Change the quota. Existing contents are kept even if they exceed it.
    pub fn set_quota(&self, quota: Option<u64>) {
        if let Ok(mut state) = self.state.lock() {
            state.quota = quota;
        }
    }

    /// Enable or disable the store, simulating storage blocked by the host.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Store raw bytes under `key`, bypassing the quota.
    pub fn seed(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(key.to_string(), bytes.into());
        }
    }

    fn state(&self) -> BlobResult<std::sync::MutexGuard<'_, MemoryState>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("storage is disabled".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| BlobError::Backend("memory store lock poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> BlobResult<Option<Vec<u8>>> {
        Ok(self.state()?.entries.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> BlobResult<()> {
        let mut state = self.state()?;
        let others: usize = state
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum();
        check_quota(
            state.quota,
            u64::try_from(others).unwrap_or(u64::MAX),
            bytes.len(),
        )?;
        state.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> BlobResult<()> {
        self.state()?.entries.remove(key);
        Ok(())
    }

    fn total_size(&self) -> BlobResult<u64> {
        let total: usize = self.state()?.entries.values().map(Vec::len).sum();
        Ok(u64::try_from(total).unwrap_or(u64::MAX))
    }

    fn quota(&self) -> Option<u64> {
        self.state.lock().ok().and_then(|state| state.quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_quota() {
        assert!(check_quota(None, u64::MAX, 10).is_ok());
        assert!(check_quota(Some(10), 5, 5).is_ok());
        let err = check_quota(Some(10), 5, 6).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(err.to_string().contains("11 bytes"));
    }

    #[test]
    fn test_memory_read_write_remove() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.read("k").unwrap(), None);

        store.write("k", b"hello").unwrap();
        assert_eq!(store.read("k").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.total_size().unwrap(), 5);

        store.remove("k").unwrap();
        assert_eq!(store.read("k").unwrap(), None);
        store.remove("k").unwrap();
    }

    #[test]
    fn test_memory_quota_counts_other_keys() {
        let store = MemoryBlobStore::with_quota(10);
        store.write("a", b"12345").unwrap();
        // Replacing a key does not count its old value.
        store.write("a", b"1234567890").unwrap();

        let err = store.write("b", b"x").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.read("b").unwrap(), None);
    }

    #[test]
    fn test_memory_failed_write_keeps_previous_value() {
        let store = MemoryBlobStore::with_quota(4);
        store.write("k", b"old").unwrap();
        assert!(store.write("k", b"too long").is_err());
        assert_eq!(store.read("k").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_memory_unavailable() {
        let store = MemoryBlobStore::new();
        store.set_available(false);

        assert!(matches!(store.probe(), Err(BlobError::Unavailable(_))));
        assert!(matches!(store.read("k"), Err(BlobError::Unavailable(_))));

        store.set_available(true);
        assert!(store.probe().is_ok());
    }

    #[test]
    fn test_probe_leaves_no_trace() {
        let store = MemoryBlobStore::new();
        store.probe().unwrap();
        assert_eq!(store.read(PROBE_KEY).unwrap(), None);
        assert_eq!(store.total_size().unwrap(), 0);
    }

    #[test]
    fn test_seed_bypasses_quota() {
        let store = MemoryBlobStore::with_quota(1);
        store.seed("k", "way more than one byte");
        assert!(store.read("k").unwrap().is_some());
        assert_eq!(store.quota(), Some(1));
    }
}
