//! Metrics, tracing, and health-check providers for conduit.
//!
//! Each provider contract ships a noop implementation for runs that don't
//! want the overhead, and an in-memory implementation for tests and
//! examples. Middleware in [`middleware`] wires a provider into a flow as
//! either a passthrough stage or a wrapper around a specific handler.

pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use error::HealthError;
pub use health::{
    run_health_checks, CheckStatus, HealthCheckOptions, HealthCheckRegistry, HealthCheckResult, HealthChecker,
    HealthReport, OverallStatus,
};
pub use metrics::{compose_metric_name, labels, InMemoryMetrics, Labels, MetricsProvider, NoopMetrics};
pub use middleware::{Metrics, MetricsHandler, ObservabilityOptions, Tracing, TracingHandler};
pub use tracer::{
    truncate_with_ellipsis, InMemoryTracer, NoopTracer, RecordedEvent, RecordedSpan, Span, SpanContext, SpanKind,
    SpanStatus, TracerProvider,
};
