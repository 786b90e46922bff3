#![deny(missing_docs)]
//! # conduit — umbrella crate
//!
//! Single import surface for the conduit family. Re-exports each member
//! crate behind a feature flag, plus a [`prelude`] for the happy path of
//! wiring a provider client into an agent loop with observability
//! attached.

#[cfg(feature = "core")]
pub use conduit_core;
#[cfg(feature = "tool")]
pub use conduit_tool;
#[cfg(feature = "client")]
pub use conduit_client;
#[cfg(feature = "agent")]
pub use conduit_agent;
#[cfg(feature = "observability")]
pub use conduit_observability;

/// Happy-path imports for composing a conduit flow.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use conduit_core::{chain, read_to_string, read_to_vec, write_bytes, write_string};
    #[cfg(feature = "core")]
    pub use conduit_core::{BoxError, Context, Flow, FlowError, Handler, PassThrough, Request, Response};

    #[cfg(feature = "tool")]
    pub use conduit_tool::{
        default_string_schema, format_tools_as_openai, parse_tool_calls, registry_handler, tools_from_context,
        Detect, Execute, ExecuteOptions, Registry, Tool, ToolCall, ToolError, ToolResult, DEFAULT_DETECT_BUFFER,
        TOOL_CALLS_MARKER,
    };

    #[cfg(feature = "client")]
    pub use conduit_client::{
        ChatOptions, Client, ClientError, ClientManager, HealthCheckConfig, MockClient, MockToolCall, ResponseFormat,
        ResponseFormatKind, RetryConfig, UsageHandler, UsageMetadata,
    };

    #[cfg(feature = "agent")]
    pub use conduit_agent::{
        classify, Agent, AgentError, AgentOptions, ClassifiedInput, ClassifiedKind, ContentPart, ContentPartKind,
        MultimodalInput, ToolResultFormatter,
    };

    #[cfg(feature = "observability")]
    pub use conduit_observability::{
        compose_metric_name, labels, run_health_checks, truncate_with_ellipsis, CheckStatus, HealthCheckOptions,
        HealthCheckRegistry, HealthCheckResult, HealthChecker, HealthError, HealthReport, InMemoryMetrics,
        InMemoryTracer, Labels, Metrics, MetricsHandler, MetricsProvider, NoopMetrics, NoopTracer,
        ObservabilityOptions, OverallStatus, RecordedEvent, RecordedSpan, Span, SpanContext, SpanKind, SpanStatus,
        TracerProvider, Tracing, TracingHandler,
    };
}
