//! Tracing provider contract plus a noop and an in-memory implementation.

use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

/// The kind of work a span represents, mirroring the OTel span-kind
/// vocabulary closely enough to be familiar without pulling in an OTel
/// dependency this crate doesn't otherwise need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Internal,
    Client,
    Server,
    Producer,
    Consumer,
}

/// Terminal status a span is closed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

/// Identifies a span for correlation with an external trace backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
}

/// A single open span. Every mutating method takes `&self`: spans are
/// handed out as `Box<dyn Span>` and held across `.await` points by
/// handler code, so interior mutability is required.
pub trait Span: Send + Sync {
    fn set_attribute(&self, key: &str, value: serde_json::Value);
    fn add_event(&self, name: &str, attributes: serde_json::Value);
    fn set_status(&self, status: SpanStatus, description: &str);
    /// Close the span. `error` is recorded as the terminal status cause
    /// when set; otherwise the span's `set_status` calls stand as-is.
    fn end(&self, error: Option<&str>);
    fn span_context(&self) -> SpanContext;
}

/// Starts spans. Implementations are process-wide and must be safe for
/// concurrent use.
pub trait TracerProvider: Send + Sync {
    fn start_span(&self, name: &str, kind: SpanKind, initial_attributes: serde_json::Value) -> Box<dyn Span>;
}

/// Discards every span operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl TracerProvider for NoopTracer {
    fn start_span(&self, _name: &str, _kind: SpanKind, _initial_attributes: serde_json::Value) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct NoopSpan;

impl Span for NoopSpan {
    fn set_attribute(&self, _key: &str, _value: serde_json::Value) {}
    fn add_event(&self, _name: &str, _attributes: serde_json::Value) {}
    fn set_status(&self, _status: SpanStatus, _description: &str) {}
    fn end(&self, _error: Option<&str>) {}
    fn span_context(&self) -> SpanContext {
        SpanContext {
            trace_id: "0".repeat(32),
            span_id: "0".repeat(16),
        }
    }
}

/// A span event captured by [`InMemoryTracer`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub name: String,
    pub attributes: serde_json::Value,
}

/// A completed (or in-flight) span captured by [`InMemoryTracer`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordedSpan {
    pub name: String,
    pub kind: SpanKind,
    pub attributes: serde_json::Value,
    pub events: Vec<RecordedEvent>,
    pub status: SpanStatus,
    pub status_description: String,
    pub error: Option<String>,
    pub ended: bool,
    pub trace_id: String,
    pub span_id: String,
}

/// Records every span emitted by a run, for tests and examples.
#[derive(Default)]
pub struct InMemoryTracer {
    spans: Mutex<Vec<std::sync::Arc<Mutex<RecordedSpan>>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every span started so far, in start order. Spans that
    /// are still open have `ended == false`.
    #[must_use]
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans.lock().unwrap().iter().map(|s| s.lock().unwrap().clone()).collect()
    }
}

impl TracerProvider for InMemoryTracer {
    fn start_span(&self, name: &str, kind: SpanKind, initial_attributes: serde_json::Value) -> Box<dyn Span> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let record = std::sync::Arc::new(Mutex::new(RecordedSpan {
            name: name.to_string(),
            kind,
            attributes: initial_attributes,
            events: Vec::new(),
            status: SpanStatus::Unset,
            status_description: String::new(),
            error: None,
            ended: false,
            trace_id: format!("{id:032x}"),
            span_id: format!("{id:016x}"),
        }));
        self.spans.lock().unwrap().push(record.clone());
        Box::new(InMemorySpan { record })
    }
}

struct InMemorySpan {
    record: std::sync::Arc<Mutex<RecordedSpan>>,
}

impl Span for InMemorySpan {
    fn set_attribute(&self, key: &str, value: serde_json::Value) {
        let mut record = self.record.lock().unwrap();
        if let Some(map) = record.attributes.as_object_mut() {
            map.insert(key.to_string(), value);
        } else {
            record.attributes = serde_json::json!({ key: value });
        }
    }

    fn add_event(&self, name: &str, attributes: serde_json::Value) {
        self.record.lock().unwrap().events.push(RecordedEvent {
            name: name.to_string(),
            attributes,
        });
    }

    fn set_status(&self, status: SpanStatus, description: &str) {
        let mut record = self.record.lock().unwrap();
        record.status = status;
        record.status_description = description.to_string();
    }

    fn end(&self, error: Option<&str>) {
        let mut record = self.record.lock().unwrap();
        if let Some(err) = error {
            record.error = Some(err.to_string());
            record.status = SpanStatus::Error;
        }
        record.ended = true;
    }

    fn span_context(&self) -> SpanContext {
        let record = self.record.lock().unwrap();
        SpanContext {
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
        }
    }
}

/// Truncate `s` to at most `max_len` bytes (on a `char` boundary),
/// appending an ellipsis when truncated. Used to bound span attribute
/// sizes before recording request/response bodies.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_tracer_produces_usable_span_context() {
        let tracer = NoopTracer;
        let span = tracer.start_span("op", SpanKind::Internal, serde_json::json!({}));
        span.set_attribute("k", serde_json::json!("v"));
        span.end(None);
        let ctx = span.span_context();
        assert_eq!(ctx.trace_id.len(), 32);
    }

    #[test]
    fn in_memory_tracer_records_attributes_events_and_status() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("gen_ai.chat", SpanKind::Client, serde_json::json!({"model": "mock"}));
        span.set_attribute("gen_ai.usage.input_tokens", serde_json::json!(10));
        span.add_event("retry", serde_json::json!({"attempt": 1}));
        span.set_status(SpanStatus::Ok, "done");
        span.end(None);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        let recorded = &spans[0];
        assert_eq!(recorded.name, "gen_ai.chat");
        assert!(recorded.ended);
        assert_eq!(recorded.status, SpanStatus::Ok);
        assert_eq!(recorded.events.len(), 1);
        assert_eq!(recorded.attributes["gen_ai.usage.input_tokens"], 10);
    }

    #[test]
    fn ending_with_an_error_forces_error_status() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("op", SpanKind::Internal, serde_json::json!({}));
        span.end(Some("boom"));
        let spans = tracer.spans();
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(spans[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn truncate_with_ellipsis_respects_char_boundaries() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello…");
    }

    #[test]
    fn tracer_is_safe_for_concurrent_span_creation() {
        let tracer = std::sync::Arc::new(InMemoryTracer::new());
        std::thread::scope(|scope| {
            for i in 0..8 {
                let tracer = tracer.clone();
                scope.spawn(move || {
                    let span = tracer.start_span(&format!("span-{i}"), SpanKind::Internal, serde_json::json!({}));
                    span.end(None);
                });
            }
        });
        assert_eq!(tracer.spans().len(), 8);
    }
}
