//! `SQLite`-backed blob store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use super::{check_quota, migrations, BlobError, BlobResult, BlobStore};
use crate::error::{Error, Result};

/// A [`BlobStore`] persisted in a `SQLite` database.
///
/// The quota is enforced over the sum of all stored blobs, mirroring the
/// per-origin budget of browser local storage. A full disk is reported as
/// the same quota condition.
#[derive(Debug)]
pub struct SqliteBlobStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Maximum total bytes, `None` for unlimited.
    quota: Option<u64>,
}

impl SqliteBlobStore {
    /// Open or create a blob database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, quota: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
            quota,
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(quota: Option<u64>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
            quota,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> BlobResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BlobError::Backend("database connection lock poisoned".to_string()))
    }
}

/// Map a `SQLite` failure onto the normalized blob error kinds.
fn classify(err: &rusqlite::Error) -> BlobError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => BlobError::QuotaExceeded(err.to_string()),
        Some(
            ErrorCode::ReadOnly
            | ErrorCode::CannotOpen
            | ErrorCode::PermissionDenied
            | ErrorCode::NotADatabase,
        ) => BlobError::Unavailable(err.to_string()),
        _ => BlobError::Backend(err.to_string()),
    }
}

impl BlobStore for SqliteBlobStore {
    fn read(&self, key: &str) -> BlobResult<Option<Vec<u8>>> {
        self.conn()?
            .query_row("SELECT value FROM blobs WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| classify(&e))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> BlobResult<()> {
        let conn = self.conn()?;

        if self.quota.is_some() {
            let others: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(length(value)), 0) FROM blobs WHERE key != ?1",
                    [key],
                    |row| row.get(0),
                )
                .map_err(|e| classify(&e))?;
            check_quota(self.quota, u64::try_from(others).unwrap_or(0), bytes.len())?;
        }

        conn.execute(
            r"
            INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, bytes],
        )
        .map_err(|e| classify(&e))?;

        debug!("Wrote {} bytes to blob '{}'", bytes.len(), key);
        Ok(())
    }

    fn remove(&self, key: &str) -> BlobResult<()> {
        self.conn()?
            .execute("DELETE FROM blobs WHERE key = ?1", [key])
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    fn total_size(&self) -> BlobResult<u64> {
        let total: i64 = self
            .conn()?
            .query_row(
                "SELECT COALESCE(SUM(length(value)), 0) FROM blobs",
                [],
                |row| row.get(0),
            )
            .map_err(|e| classify(&e))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn quota(&self) -> Option<u64> {
        self.quota
    }
}
