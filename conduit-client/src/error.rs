//! Error type shared by every provider client implementation.

use std::time::Duration;

use conduit_core::FlowError;

/// Errors a [`crate::client::Client`] implementation may return from
/// [`crate::client::Client::chat`].
///
/// Mirrors the retryable/terminal split used elsewhere in this family so
/// callers can decide whether to back off and retry without parsing
/// error text.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network-level failure (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Provider is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Authentication or authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No client is registered under the requested name.
    #[error("no client registered as '{0}'")]
    UnknownClient(String),

    /// Underlying carrier/flow failure (cancellation, I/O).
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),

    /// Catch-all for provider-specific failures.
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    /// Whether the request can reasonably be retried as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }
}
