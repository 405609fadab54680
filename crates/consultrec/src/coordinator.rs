//! Dual-sink coordinator.
//!
//! After a successful analysis the consultation is written to the local
//! record store and sent to the remote endpoint at the same time. The two
//! sinks never wait on or cancel each other, and neither can fail the
//! analysis itself; their failures are folded into one [`SyncWarning`].

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::record::{AnalysisResult, ConsultationForm};
use crate::store::RecordStore;
use crate::sync::RemoteSyncClient;

/// The two places a consultation is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// The on-device record store.
    Local,
    /// The remote collection endpoint.
    Remote,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local history"),
            Self::Remote => write!(f, "remote sync"),
        }
    }
}

/// One sink that did not save the consultation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFailure {
    /// Which sink failed.
    pub sink: SinkKind,
    /// User-facing reason.
    pub message: String,
}

/// Combined, non-fatal report of every sink that failed.
///
/// Always holds at least one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    failures: Vec<SinkFailure>,
}

impl SyncWarning {
    fn from_failures(failures: Vec<SinkFailure>) -> Option<Self> {
        (!failures.is_empty()).then_some(Self { failures })
    }

    /// The failed sinks, local first.
    #[must_use]
    pub fn failures(&self) -> &[SinkFailure] {
        &self.failures
    }

    /// Whether `sink` is among the failures.
    #[must_use]
    pub fn has_failed(&self, sink: SinkKind) -> bool {
        self.failures.iter().any(|f| f.sink == sink)
    }
}

impl std::fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "The consultation was not fully saved:")?;
        for failure in &self.failures {
            writeln!(f, "  [{}] {}", failure.sink, failure.message)?;
        }
        write!(f, "The analysis result itself is still valid.")
    }
}

/// Handle to a background [`Coordinator::record_outcome`] run.
///
/// Dropping it leaves both sinks running to completion.
#[derive(Debug)]
pub struct OutcomeHandle(JoinHandle<Option<SyncWarning>>);

impl OutcomeHandle {
    /// Wait for both sinks and return the warning, if any.
    pub async fn warning(self) -> Option<SyncWarning> {
        match self.0.await {
            Ok(warning) => warning,
            Err(err) => {
                error!("Outcome task did not complete: {}", err);
                let unknown = |sink| SinkFailure {
                    sink,
                    message: "save status unknown".to_string(),
                };
                SyncWarning::from_failures(vec![unknown(SinkKind::Local), unknown(SinkKind::Remote)])
            }
        }
    }
}

/// Fans a finished analysis out to both sinks.
#[derive(Debug, Clone)]
pub struct Coordinator {
    store: Arc<RecordStore>,
    sync: Arc<RemoteSyncClient>,
}

impl Coordinator {
    /// Create a coordinator over the two sinks.
    #[must_use]
    pub fn new(store: Arc<RecordStore>, sync: Arc<RemoteSyncClient>) -> Self {
        Self { store, sync }
    }

    /// The local record store.
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// The remote sync client.
    #[must_use]
    pub fn sync(&self) -> &Arc<RemoteSyncClient> {
        &self.sync
    }

    /// Start saving the consultation to both sinks and return at once.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use = "dropping the handle detaches the save; await `warning()` to see failures"]
    pub fn record_outcome(&self, form: &ConsultationForm, result: &AnalysisResult) -> OutcomeHandle {
        let this = self.clone();
        let (form, result) = (form.clone(), result.clone());
        OutcomeHandle(tokio::spawn(async move { this.settle(&form, &result).await }))
    }

    /// Save the consultation to both sinks concurrently and wait for both.
    ///
    /// A failure or panic in one sink does not affect the other.
    pub async fn settle(
        &self,
        form: &ConsultationForm,
        result: &AnalysisResult,
    ) -> Option<SyncWarning> {
        let local = {
            let store = Arc::clone(&self.store);
            let (form, result) = (form.clone(), result.clone());
            tokio::task::spawn_blocking(move || store.save(&form, &result))
        };
        let remote = {
            let sync = Arc::clone(&self.sync);
            let (form, result) = (form.clone(), result.clone());
            tokio::spawn(async move { sync.send(&form, &result).await })
        };

        let (local, remote) = tokio::join!(local, remote);

        let failures: Vec<_> = [
            sink_failure(SinkKind::Local, local.map(|r| r.map(drop))),
            sink_failure(SinkKind::Remote, remote),
        ]
        .into_iter()
        .flatten()
        .collect();

        let warning = SyncWarning::from_failures(failures);
        if let Some(warning) = &warning {
            warn!("{} of 2 sinks failed", warning.failures().len());
        } else {
            info!("Consultation saved locally and remotely");
        }
        warning
    }
}

fn sink_failure(
    sink: SinkKind,
    joined: Result<crate::Result<()>, JoinError>,
) -> Option<SinkFailure> {
    let message = match joined {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => {
            warn!("{} failed: {}", sink, err);
            err.user_message()
        }
        Err(err) => {
            error!("{} task aborted: {}", sink, err);
            "an unexpected internal error occurred".to_string()
        }
    };
    Some(SinkFailure { sink, message })
}
