//! Remote sync client.
//!
//! Delivers a flattened copy of each consultation to a remote collection
//! endpoint on a best-effort basis. Every attempt is bounded by a timeout,
//! failed attempts are retried with exponential backoff, and connectivity
//! is checked before the first attempt and again after each failure.

mod connectivity;
mod payload;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::record::{AnalysisResult, ConsultationForm};

pub use connectivity::{Connectivity, ConnectivityFlag, InterfaceConnectivity};
pub use payload::PayloadFormat;
pub use transport::{Delivery, ReqwestTransport, Transport, TransportError};

/// What counts as a delivered consultation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Any response counts, whatever its status.
    #[default]
    Dispatched,
    /// Only a 2xx response counts.
    Acknowledged,
}

impl DeliveryMode {
    fn accepts(self, delivery: Delivery) -> bool {
        match self {
            Self::Dispatched => true,
            Self::Acknowledged => delivery.is_success(),
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatched => write!(f, "dispatched"),
            Self::Acknowledged => write!(f, "acknowledged"),
        }
    }
}

/// Timeout and retry schedule for remote delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub backoff_base: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptFailure {
    Timeout,
    Network(String),
    Rejected(u16),
    Other(String),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Rejected(status) => write!(f, "server responded with status {status}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl AttemptFailure {
    fn into_error(self, attempts: u32) -> Error {
        match self {
            Self::Timeout => Error::SyncTimeout { attempts },
            Self::Network(message) => Error::SyncNetwork { attempts, message },
            failure @ (Self::Rejected(_) | Self::Other(_)) => Error::SyncFailed {
                attempts,
                message: failure.to_string(),
            },
        }
    }
}

/// Best-effort delivery of consultations to a remote endpoint.
#[derive(Debug, Clone)]
pub struct RemoteSyncClient {
    endpoint: Option<Url>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    policy: RetryPolicy,
    payload: PayloadFormat,
    delivery: DeliveryMode,
}

impl RemoteSyncClient {
    /// Create a client with the default policy and payload format.
    ///
    /// Without an endpoint every send is skipped.
    #[must_use]
    pub fn new(
        endpoint: Option<Url>,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            endpoint,
            transport,
            connectivity,
            policy: RetryPolicy::default(),
            payload: PayloadFormat::default(),
            delivery: DeliveryMode::default(),
        }
    }

    /// Create a client from the `[sync]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured endpoint is not a valid http(s) URL.
    pub fn from_config(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        Ok(Self::new(config.endpoint_url()?, transport, connectivity)
            .with_policy(config.retry_policy())
            .with_payload_format(config.payload_format())
            .with_delivery(config.delivery))
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the payload format.
    #[must_use]
    pub fn with_payload_format(mut self, payload: PayloadFormat) -> Self {
        self.payload = payload;
        self
    }

    /// Replace the delivery mode.
    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// The configured endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Whether the connectivity check currently passes.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Deliver one consultation.
    ///
    /// Succeeds without any network activity when no endpoint is configured.
    ///
    /// # Errors
    ///
    /// - [`Error::Offline`] if the host is offline; nothing is sent.
    /// - [`Error::ConnectionLost`] if connectivity drops after a failed attempt.
    /// - [`Error::SyncTimeout`], [`Error::SyncNetwork`] or [`Error::SyncFailed`]
    ///   after the last attempt fails, classified by that attempt.
    pub async fn send(&self, form: &ConsultationForm, result: &AnalysisResult) -> Result<()> {
        let Some(url) = &self.endpoint else {
            warn!("No sync endpoint configured; skipping remote sync");
            return Ok(());
        };

        if !self.connectivity.is_online() {
            warn!("Host is offline; not sending consultation");
            return Err(Error::Offline);
        }

        let fields = self.payload.fields(form, result, Utc::now());
        let total = self.policy.total_attempts();
        let mut attempt = 1;

        loop {
            debug!("Sync attempt {}/{} to {}", attempt, total, url);

            let failure = match self.attempt(url, &fields).await {
                Ok(delivery) => {
                    info!(
                        "Consultation delivered on attempt {} (status {})",
                        attempt, delivery.status
                    );
                    return Ok(());
                }
                Err(failure) => failure,
            };
            warn!("Sync attempt {}/{} failed: {}", attempt, total, failure);

            if !self.connectivity.is_online() {
                warn!("Connection lost during sync");
                return Err(Error::ConnectionLost { attempts: attempt });
            }
            if attempt >= total {
                return Err(failure.into_error(attempt));
            }

            let delay = self.policy.backoff(attempt);
            debug!("Retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> std::result::Result<Delivery, AttemptFailure> {
        let request = self.transport.post_form(url, fields);
        match tokio::time::timeout(self.policy.attempt_timeout, request).await {
            Err(_) => Err(AttemptFailure::Timeout),
            Ok(Err(TransportError::Network(message))) => Err(AttemptFailure::Network(message)),
            Ok(Err(TransportError::Other(message))) => Err(AttemptFailure::Other(message)),
            Ok(Ok(delivery)) if self.delivery.accepts(delivery) => Ok(delivery),
            Ok(Ok(delivery)) => Err(AttemptFailure::Rejected(delivery.status)),
        }
    }
}

/// Scripted transport for tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::Url;
    use tokio::time::Instant;

    use super::{ConnectivityFlag, Delivery, Transport, TransportError};

    /// One scripted reaction to a request.
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Answer with this status.
        Respond(u16),
        /// Fail with a network error.
        Network,
        /// Fail with a non-network error.
        Fail,
        /// Never answer.
        Hang,
        /// Fail with a network error and switch the flag offline.
        Disconnect(ConnectivityFlag),
        /// Panic inside the request.
        Panic,
    }

    /// Plays back a fixed script, then answers 200 to everything.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<Instant>>,
        bodies: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedTransport {
        pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }

        pub fn bodies(&self) -> Vec<Vec<(String, String)>> {
            self.bodies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_form(
            &self,
            _url: &Url,
            fields: &[(String, String)],
        ) -> Result<Delivery, TransportError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.bodies.lock().unwrap().push(fields.to_vec());
            let step = self.script.lock().unwrap().pop_front();

            match step {
                None => Ok(Delivery { status: 200 }),
                Some(Step::Respond(status)) => Ok(Delivery { status }),
                Some(Step::Network) => Err(TransportError::Network("connection reset".into())),
                Some(Step::Fail) => Err(TransportError::Other("bad request".into())),
                Some(Step::Hang) => std::future::pending().await,
                Some(Step::Disconnect(flag)) => {
                    flag.set_online(false);
                    Err(TransportError::Network("network is unreachable".into()))
                }
                Some(Step::Panic) => panic!("scripted transport panic"),
            }
        }
    }
}
