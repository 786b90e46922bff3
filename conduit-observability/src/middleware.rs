//! Passthrough and handler-wrapping middleware built on the metrics and
//! tracing provider contracts.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use conduit_core::{read_to_vec, write_bytes, FlowError, Handler, PassThrough, Request, Response};
use serde_json::json;

use crate::metrics::{compose_metric_name, Labels, MetricsProvider};
use crate::tracer::{truncate_with_ellipsis, SpanKind, SpanStatus, TracerProvider};

/// Options shared by the tracing middlewares: whether to capture request
/// and response bodies as span attributes, and how long a captured body
/// may be before it's truncated.
#[derive(Debug, Clone)]
pub struct ObservabilityOptions {
    pub record_input: bool,
    pub record_output: bool,
    pub max_attribute_length: usize,
}

impl Default for ObservabilityOptions {
    fn default() -> Self {
        Self {
            record_input: false,
            record_output: false,
            max_attribute_length: 1024,
        }
    }
}

impl ObservabilityOptions {
    #[must_use]
    pub fn with_record_input(mut self) -> Self {
        self.record_input = true;
        self
    }

    #[must_use]
    pub fn with_record_output(mut self) -> Self {
        self.record_output = true;
        self
    }

    #[must_use]
    pub fn with_max_attribute_length(mut self, max_len: usize) -> Self {
        self.max_attribute_length = max_len;
        self
    }
}

fn error_type_name(e: &FlowError) -> String {
    match e {
        FlowError::Io(_) => "io",
        FlowError::Cancelled => "cancelled",
        FlowError::DeadlineExceeded => "deadline_exceeded",
        FlowError::Handler(_) => "handler",
    }
    .to_string()
}

async fn run_with_metrics(
    provider: &dyn MetricsProvider,
    namespace: &str,
    subsystem: &str,
    labels: &Labels,
    req: Request,
    res: Response,
    inner: &dyn Handler,
) -> Result<(), FlowError> {
    let in_flight = compose_metric_name(namespace, subsystem, "in_flight_requests");
    provider.gauge(&in_flight, 1.0, labels);

    let start = Instant::now();
    let result = inner.call(req, res).await;
    let elapsed = start.elapsed();

    provider.counter(&compose_metric_name(namespace, subsystem, "requests_total"), 1.0, labels);
    provider.record_duration(
        &compose_metric_name(namespace, subsystem, "request_duration_seconds"),
        elapsed,
        labels,
    );
    provider.gauge(&in_flight, -1.0, labels);

    if let Err(e) = &result {
        let mut error_type = Labels::new();
        error_type.insert("error_type", error_type_name(e));
        let error_labels = labels.merge(&error_type);
        provider.counter(&compose_metric_name(namespace, subsystem, "errors_total"), 1.0, &error_labels);
    }

    result
}

/// A passthrough handler that records request-count, in-flight, duration,
/// and error metrics around whatever runs next in the flow.
pub struct Metrics {
    provider: Arc<dyn MetricsProvider>,
    namespace: String,
    subsystem: String,
    labels: Labels,
}

impl Metrics {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        namespace: impl Into<String>,
        subsystem: impl Into<String>,
        labels: Labels,
    ) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
            subsystem: subsystem.into(),
            labels,
        }
    }
}

#[async_trait]
impl Handler for Metrics {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        run_with_metrics(
            self.provider.as_ref(),
            &self.namespace,
            &self.subsystem,
            &self.labels,
            req,
            res,
            &PassThrough,
        )
        .await
    }
}

/// Wraps a specific handler with the same accounting [`Metrics`] applies
/// as a passthrough.
pub struct MetricsHandler {
    provider: Arc<dyn MetricsProvider>,
    namespace: String,
    subsystem: String,
    labels: Labels,
    inner: Arc<dyn Handler>,
}

impl MetricsHandler {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        namespace: impl Into<String>,
        subsystem: impl Into<String>,
        labels: Labels,
        inner: impl Handler + 'static,
    ) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
            subsystem: subsystem.into(),
            labels,
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl Handler for MetricsHandler {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        run_with_metrics(
            self.provider.as_ref(),
            &self.namespace,
            &self.subsystem,
            &self.labels,
            req,
            res,
            self.inner.as_ref(),
        )
        .await
    }
}

async fn run_with_tracing(
    provider: &dyn TracerProvider,
    name: &str,
    options: &ObservabilityOptions,
    mut req: Request,
    mut res: Response,
    inner: &dyn Handler,
) -> Result<(), FlowError> {
    let span = provider.start_span(name, SpanKind::Internal, json!({}));

    let captured_input = if options.record_input {
        let ctx = req.context().clone();
        let bytes = read_to_vec(&mut req).await?;
        req = Request::from_bytes(ctx, bytes.clone());
        Some(bytes)
    } else {
        None
    };

    let result = if options.record_output {
        let mut buf = Vec::new();
        let inner_result = inner.call(req, Response::new(&mut buf)).await;
        if inner_result.is_ok() {
            let forward_result = write_bytes(&mut res, &buf).await;
            record_output(span.as_ref(), &buf, options.max_attribute_length);
            forward_result
        } else {
            record_output(span.as_ref(), &buf, options.max_attribute_length);
            inner_result
        }
    } else {
        inner.call(req, res).await
    };

    if let Some(input) = &captured_input {
        let text = String::from_utf8_lossy(input);
        span.set_attribute("input", json!(truncate_with_ellipsis(&text, options.max_attribute_length)));
    }

    match &result {
        Ok(()) => span.set_status(SpanStatus::Ok, ""),
        Err(e) => {
            span.set_status(SpanStatus::Error, &e.to_string());
            span.set_attribute("error", json!(e.to_string()));
        }
    }
    let error_text = result.as_ref().err().map(std::string::ToString::to_string);
    span.end(error_text.as_deref());

    result
}

fn record_output(span: &dyn crate::tracer::Span, buf: &[u8], max_len: usize) {
    let text = String::from_utf8_lossy(buf);
    span.set_attribute("output", json!(truncate_with_ellipsis(&text, max_len)));
}

/// A passthrough handler that wraps whatever runs next in a span.
pub struct Tracing {
    provider: Arc<dyn TracerProvider>,
    name: String,
    options: ObservabilityOptions,
}

impl Tracing {
    #[must_use]
    pub fn new(provider: Arc<dyn TracerProvider>, name: impl Into<String>, options: ObservabilityOptions) -> Self {
        Self {
            provider,
            name: name.into(),
            options,
        }
    }
}

#[async_trait]
impl Handler for Tracing {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        run_with_tracing(self.provider.as_ref(), &self.name, &self.options, req, res, &PassThrough).await
    }
}

/// Wraps a specific handler in a span the same way [`Tracing`] wraps a
/// passthrough.
pub struct TracingHandler {
    provider: Arc<dyn TracerProvider>,
    name: String,
    options: ObservabilityOptions,
    inner: Arc<dyn Handler>,
}

impl TracingHandler {
    pub fn new(
        provider: Arc<dyn TracerProvider>,
        name: impl Into<String>,
        options: ObservabilityOptions,
        inner: impl Handler + 'static,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            options,
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl Handler for TracingHandler {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        run_with_tracing(self.provider.as_ref(), &self.name, &self.options, req, res, self.inner.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{labels, InMemoryMetrics};
    use crate::tracer::InMemoryTracer;
    use conduit_core::Context;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
            let body = read_to_vec(&mut req).await?;
            write_bytes(&mut res, &body).await
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Handler for AlwaysFails {
        async fn call(&self, _req: Request, _res: Response) -> Result<(), FlowError> {
            Err(FlowError::from_handler(std::io::Error::other("boom")))
        }
    }

    #[tokio::test]
    async fn metrics_records_requests_total_and_duration_on_success() {
        let provider = Arc::new(InMemoryMetrics::new());
        let handler = MetricsHandler::new(provider.clone(), "conduit", "agent", Labels::new(), Echo);
        let mut out = Vec::new();
        handler
            .call(Request::from_string(Context::new(), "hi"), Response::new(&mut out))
            .await
            .unwrap();

        assert_eq!(provider.counter_value("conduit_agent_requests_total", &Labels::new()), 1.0);
        assert_eq!(provider.gauge_value("conduit_agent_in_flight_requests", &Labels::new()), 0.0);
        assert_eq!(provider.histogram_values("conduit_agent_request_duration_seconds", &Labels::new()).len(), 1);
    }

    #[tokio::test]
    async fn metrics_records_errors_total_with_error_type_label_on_failure() {
        let provider = Arc::new(InMemoryMetrics::new());
        let handler = MetricsHandler::new(provider.clone(), "conduit", "", Labels::new(), AlwaysFails);
        let mut out = Vec::new();
        let result = handler
            .call(Request::from_string(Context::new(), "hi"), Response::new(&mut out))
            .await;
        assert!(result.is_err());

        let error_labels = labels([("error_type", "handler")]);
        assert_eq!(provider.counter_value("conduit_errors_total", &error_labels), 1.0);
    }

    #[tokio::test]
    async fn tracing_handler_records_a_span_with_ok_status() {
        let tracer = Arc::new(InMemoryTracer::new());
        let handler = TracingHandler::new(tracer.clone(), "agent.turn", ObservabilityOptions::default(), Echo);
        let mut out = Vec::new();
        handler
            .call(Request::from_string(Context::new(), "hi"), Response::new(&mut out))
            .await
            .unwrap();

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "agent.turn");
        assert_eq!(spans[0].status, crate::tracer::SpanStatus::Ok);
        assert!(spans[0].attributes.get("input").is_none());
    }

    #[tokio::test]
    async fn tracing_handler_captures_input_and_output_when_enabled() {
        let tracer = Arc::new(InMemoryTracer::new());
        let options = ObservabilityOptions::default().with_record_input().with_record_output();
        let handler = TracingHandler::new(tracer.clone(), "agent.turn", options, Echo);
        let mut out = Vec::new();
        handler
            .call(Request::from_string(Context::new(), "hello there"), Response::new(&mut out))
            .await
            .unwrap();

        let spans = tracer.spans();
        assert_eq!(spans[0].attributes["input"], "hello there");
        assert_eq!(spans[0].attributes["output"], "hello there");
        assert_eq!(String::from_utf8(out).unwrap(), "hello there");
    }

    #[tokio::test]
    async fn tracing_handler_sets_error_status_on_failure() {
        let tracer = Arc::new(InMemoryTracer::new());
        let handler = TracingHandler::new(tracer.clone(), "agent.turn", ObservabilityOptions::default(), AlwaysFails);
        let mut out = Vec::new();
        let result = handler
            .call(Request::from_string(Context::new(), "hi"), Response::new(&mut out))
            .await;
        assert!(result.is_err());

        let spans = tracer.spans();
        assert_eq!(spans[0].status, crate::tracer::SpanStatus::Error);
        assert!(spans[0].ended);
    }

    #[tokio::test]
    async fn metrics_middleware_passthrough_copies_bytes_unchanged() {
        let provider = Arc::new(InMemoryMetrics::new());
        let middleware = Metrics::new(provider, "conduit", "", Labels::new());
        let mut out = Vec::new();
        middleware
            .call(Request::from_string(Context::new(), "passthrough body"), Response::new(&mut out))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "passthrough body");
    }
}
