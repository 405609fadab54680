//! HTTP transport for remote sync.

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::error::{Error, Result};

/// Errors reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never reached the server or the connection broke.
    #[error("network error: {0}")]
    Network(String),

    /// Any other request failure.
    #[error("request failed: {0}")]
    Other(String),
}

/// What came back from a delivered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// HTTP status code of the response.
    pub status: u16,
}

impl Delivery {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Posts url-encoded forms to a remote endpoint.
///
/// Implementations must not apply their own overall timeout; the sync
/// client bounds every attempt and drops the future when it expires.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Post `fields` as an `application/x-www-form-urlencoded` body.
    ///
    /// The response body is not read.
    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> std::result::Result<Delivery, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a fresh connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("consultrec/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_builder() || err.is_redirect() || err.is_status() || err.is_decode() {
        TransportError::Other(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> std::result::Result<Delivery, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .form(fields)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status().as_u16();
        debug!("POST {} answered with status {}", url, status);
        Ok(Delivery { status })
    }
}
