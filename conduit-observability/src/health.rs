//! Health checks: a checker contract, a concurrent runner, and a registry
//! for dynamic registration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use conduit_core::Context;
use serde::Serialize;

use crate::error::HealthError;

/// A single named probe. `timeout`, when set, overrides the runner's
/// global timeout for this check only.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, ctx: &Context) -> Result<(), HealthError>;

    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Status of one check in a [`HealthReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Overall rollup status of a [`HealthReport`]. `Degraded` is carried for
/// forward compatibility but the current rollup rule never produces it:
/// the report is `Unhealthy` if any check is non-ok, else `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of a single check. Serializes as `latency`, a nanosecond
/// value, matching the wire report's field name.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub error: Option<String>,
    #[serde(rename = "latency")]
    pub latency_ns: u128,
}

/// The JSON-serializable result of running a batch of checks, keyed by
/// check name as the wire shape requires.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub checks: BTreeMap<String, HealthCheckResult>,
    #[serde(rename = "uptime")]
    pub uptime_ns: u128,
    pub timestamp: String,
}

/// Options for [`run_health_checks`].
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckOptions {
    /// Timeout applied to a check that doesn't declare its own.
    pub global_timeout: Duration,
    /// Process start instant `uptime_ns` is measured against. Defaults to
    /// the instant the options were constructed, which is close enough
    /// to process start for any caller that builds its options once at
    /// startup and reuses them.
    pub started_at: Instant,
}

impl Default for HealthCheckOptions {
    fn default() -> Self {
        Self {
            global_timeout: Duration::from_secs(5),
            started_at: Instant::now(),
        }
    }
}

/// Runs every checker concurrently, each bounded by its own timeout (or
/// `options.global_timeout` when it declares none), and collects the
/// results into a report. Results are sorted by name so the report is
/// deterministic regardless of completion order.
pub async fn run_health_checks(
    checks: &[Arc<dyn HealthChecker>],
    ctx: &Context,
    options: &HealthCheckOptions,
) -> HealthReport {
    let (tx, mut rx) = tokio::sync::mpsc::channel(checks.len().max(1));

    for checker in checks {
        let checker = checker.clone();
        let tx = tx.clone();
        let check_ctx = ctx.child();
        let timeout = checker.timeout().unwrap_or(options.global_timeout);

        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = tokio::time::timeout(timeout, checker.check(&check_ctx)).await;
            let latency_ns = start.elapsed().as_nanos();

            let result = match outcome {
                Ok(Ok(())) => HealthCheckResult {
                    name: checker.name().to_string(),
                    status: CheckStatus::Ok,
                    error: None,
                    latency_ns,
                },
                Ok(Err(e)) => HealthCheckResult {
                    name: checker.name().to_string(),
                    status: CheckStatus::Error,
                    error: Some(e.to_string()),
                    latency_ns,
                },
                Err(_) => HealthCheckResult {
                    name: checker.name().to_string(),
                    status: CheckStatus::Error,
                    error: Some(HealthError::Timeout(timeout).to_string()),
                    latency_ns,
                },
            };

            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut checks_by_name = BTreeMap::new();
    while let Some(result) = rx.recv().await {
        checks_by_name.insert(result.name.clone(), result);
    }

    let status = if checks_by_name.values().any(|r| r.status == CheckStatus::Error) {
        OverallStatus::Unhealthy
    } else {
        OverallStatus::Healthy
    };

    HealthReport {
        status,
        checks: checks_by_name,
        uptime_ns: options.started_at.elapsed().as_nanos(),
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// A registry supporting dynamic registration of checkers, reusing
/// [`run_health_checks`] as its runner.
pub struct HealthCheckRegistry {
    checkers: RwLock<Vec<Arc<dyn HealthChecker>>>,
    options: HealthCheckOptions,
    next_anonymous_id: AtomicU64,
}

impl HealthCheckRegistry {
    #[must_use]
    pub fn new(options: HealthCheckOptions) -> Self {
        Self {
            checkers: RwLock::new(Vec::new()),
            options,
            next_anonymous_id: AtomicU64::new(0),
        }
    }

    pub fn register(&self, checker: impl HealthChecker + 'static) {
        self.next_anonymous_id.fetch_add(1, Ordering::Relaxed);
        self.checkers.write().unwrap().push(Arc::new(checker));
    }

    pub async fn run(&self, ctx: &Context) -> HealthReport {
        let checkers = self.checkers.read().unwrap().clone();
        run_health_checks(&checkers, ctx, &self.options).await
    }
}
