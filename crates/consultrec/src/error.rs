//! Error types for consultrec.
//!
//! This module defines the error type shared by the record store, the remote
//! sync client and the supporting configuration and storage plumbing. Each
//! variant maps to a user-facing reason through [`Error::user_message`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for consultrec operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Local Record Store Errors ===
    /// The storage probe failed, so local storage is disabled or unusable.
    #[error("local storage is unavailable: {reason}")]
    StorageUnavailable {
        /// Why the probe failed.
        reason: String,
    },

    /// The quota was exceeded and evicting old records did not free enough space.
    #[error("storage quota exceeded after evicting {evicted} records")]
    StorageFull {
        /// How many records the eviction pass dropped before the retry.
        evicted: usize,
    },

    /// Writing the record collection failed for a reason other than recoverable quota pressure.
    #[error("failed to write record collection: {message}")]
    StorageWrite {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Remote Sync Errors ===
    /// No network connectivity when a send was requested.
    #[error("no network connectivity")]
    Offline,

    /// Connectivity dropped between delivery attempts.
    #[error("network connection lost after {attempts} attempt(s)")]
    ConnectionLost {
        /// Attempts made before the connection was found to be down.
        attempts: u32,
    },

    /// The final delivery attempt timed out.
    #[error("remote sync timed out after {attempts} attempt(s)")]
    SyncTimeout {
        /// Total attempts made.
        attempts: u32,
    },

    /// The final delivery attempt failed at the transport level.
    #[error("remote sync network failure after {attempts} attempt(s): {message}")]
    SyncNetwork {
        /// Total attempts made.
        attempts: u32,
        /// The transport error message.
        message: String,
    },

    /// The final delivery attempt failed for any other reason.
    #[error("remote sync failed after {attempts} attempt(s): {message}")]
    SyncFailed {
        /// Total attempts made.
        attempts: u32,
        /// Description of what went wrong.
        message: String,
    },

    // === Input Errors ===
    /// The submitted consultation form is incomplete.
    #[error("invalid consultation form: {message}")]
    InvalidForm {
        /// Which requirement was not met.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for consultrec operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new invalid form error.
    #[must_use]
    pub fn invalid_form(message: impl Into<String>) -> Self {
        Self::InvalidForm {
            message: message.into(),
        }
    }

    /// Create a new storage write error.
    #[must_use]
    pub fn storage_write(message: impl Into<String>) -> Self {
        Self::StorageWrite {
            message: message.into(),
        }
    }

    /// Check if this error came from the remote sync channel.
    #[must_use]
    pub fn is_sync_error(&self) -> bool {
        matches!(
            self,
            Self::Offline
                | Self::ConnectionLost { .. }
                | Self::SyncTimeout { .. }
                | Self::SyncNetwork { .. }
                | Self::SyncFailed { .. }
        )
    }

    /// Human-readable reason suitable for showing next to a completed analysis.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::StorageUnavailable { .. } => {
                "local storage is disabled on this device (privacy or security settings)".to_string()
            }
            Self::StorageFull { .. } => {
                "not enough storage space to keep this consultation".to_string()
            }
            Self::StorageWrite { .. }
            | Self::DatabaseOpen { .. }
            | Self::DatabaseQuery(_)
            | Self::DatabaseMigration { .. } => {
                "failed to save the consultation history on this device".to_string()
            }
            Self::Offline => {
                "no internet connection, so the consultation was not sent to the server".to_string()
            }
            Self::ConnectionLost { .. } => {
                "the network connection was lost during transfer".to_string()
            }
            Self::SyncTimeout { .. } => "server response timed out".to_string(),
            Self::SyncNetwork { .. } => "check your network connection".to_string(),
            Self::SyncFailed { .. } => "server save failed".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Offline;
        assert_eq!(err.to_string(), "no network connectivity");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_is_sync_error() {
        assert!(Error::Offline.is_sync_error());
        assert!(Error::SyncTimeout { attempts: 3 }.is_sync_error());
        assert!(Error::ConnectionLost { attempts: 1 }.is_sync_error());
        assert!(!Error::StorageFull { evicted: 5 }.is_sync_error());
        assert!(!Error::internal("x").is_sync_error());
    }

    #[test]
    fn test_sync_user_messages() {
        assert_eq!(
            Error::SyncTimeout { attempts: 3 }.user_message(),
            "server response timed out"
        );
        assert_eq!(
            Error::SyncNetwork {
                attempts: 3,
                message: "connection refused".to_string()
            }
            .user_message(),
            "check your network connection"
        );
        assert_eq!(
            Error::SyncFailed {
                attempts: 3,
                message: "status 500".to_string()
            }
            .user_message(),
            "server save failed"
        );
        assert!(Error::ConnectionLost { attempts: 2 }
            .user_message()
            .contains("lost"));
        assert!(Error::Offline.user_message().contains("internet"));
    }

    #[test]
    fn test_storage_user_messages() {
        assert!(Error::StorageUnavailable {
            reason: "probe".to_string()
        }
        .user_message()
        .contains("disabled"));
        assert!(Error::StorageFull { evicted: 5 }
            .user_message()
            .contains("storage space"));
        assert!(Error::storage_write("disk I/O")
            .user_message()
            .contains("failed to save"));
    }

    #[test]
    fn test_user_message_falls_back_to_display() {
        let err = Error::invalid_form("symptoms are required");
        assert_eq!(err.user_message(), err.to_string());
    }

    #[test]
    fn test_storage_full_display() {
        let err = Error::StorageFull { evicted: 6 };
        assert!(err.to_string().contains('6'));
    }

    #[test]
    fn test_sync_network_display() {
        let err = Error::SyncNetwork {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid endpoint".to_string(),
        };
        assert!(err.to_string().contains("invalid endpoint"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
