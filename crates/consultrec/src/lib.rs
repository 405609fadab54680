//! `consultrec` - Dual-sink persistence for analyzed consultations
//!
//! After an analysis succeeds, the consultation is kept in a quota-bounded
//! on-device history and forwarded to a remote collection endpoint. Either
//! sink may fail without affecting the other or the analysis itself.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod record;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use coordinator::{Coordinator, OutcomeHandle, SinkFailure, SinkKind, SyncWarning};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{AnalysisResult, ConsultationForm, ConsultationRecord, RecordId};
pub use storage::{BlobStore, MemoryBlobStore, SqliteBlobStore};
pub use store::{EvictionPolicy, RecordStore, StoreStats};
pub use sync::RemoteSyncClient;
