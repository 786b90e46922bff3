//! Error type for health checks.

/// Error surfaced by a [`crate::health::HealthChecker`].
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// The check itself reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The check did not complete within its timeout.
    #[error("health check timed out after {0:?}")]
    Timeout(std::time::Duration),
}
