//! Request/Response carriers: byte-stream producer/consumer pairs plus a
//! cancellation-aware, read-only context value map.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;

/// A type-keyed, read-only snapshot of values carried on a [`Context`].
///
/// Modelled on `http::Extensions`: values are stored type-erased and
/// retrieved by downcasting. This is how the request context carries the
/// tool registry, observability handles, and similar capability objects
/// without a generic parameter threading through every handler.
#[derive(Clone, Default)]
struct Extensions(HashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl Extensions {
    fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    fn with<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut map = self.0.clone();
        map.insert(TypeId::of::<T>(), Arc::new(value) as Arc<dyn Any + Send + Sync>);
        Extensions(map)
    }
}

/// The cancellation/deadline/value-map context threaded through a flow.
///
/// Cloning a `Context` is cheap: the cancellation token and the value map
/// are both reference-counted. [`Context::with_value`] returns a new
/// context derived from the current one; it never mutates values visible
/// to handlers that already hold a copy, which is what makes placing a
/// tool registry on the context safe to read concurrently.
#[derive(Clone)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    extensions: Extensions,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A fresh, non-cancelled context with no deadline and no values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            extensions: Extensions::default(),
        }
    }

    /// Returns a child context: cancelling the parent cancels the child,
    /// but cancelling the child does not affect the parent. Flow uses this
    /// to cancel downstream stages on the first error without disturbing
    /// the caller's own token.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            extensions: self.extensions.clone(),
        }
    }

    /// Returns a new context carrying `value` in addition to everything
    /// already on `self`. A value of the same type replaces the previous
    /// one (last-writer-wins), matching the registry's conflict policy.
    #[must_use]
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            extensions: self.extensions.with(value),
        }
    }

    /// Returns a new context with the given deadline, replacing any
    /// previous one.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
            extensions: self.extensions.clone(),
        }
    }

    /// Returns a new context with a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Look up a value placed on this context (or an ancestor) by type.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.extensions.get::<T>()
    }

    /// The cancellation token backing this context. Handlers performing a
    /// long-running or blocking operation should race it against
    /// cancellation.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some(error)` if the context has been cancelled or its deadline has
    /// passed, mirroring Go's `ctx.Err()`. Handlers should check this at
    /// blocking-I/O boundaries and return promptly when it is `Some`.
    #[must_use]
    pub fn err(&self) -> Option<FlowError> {
        if self.cancel.is_cancelled() {
            return Some(FlowError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(FlowError::DeadlineExceeded);
            }
        }
        None
    }
}

/// A request flowing through a handler chain: a once-readable byte source
/// plus the context.
///
/// A `Request` is moved into [`crate::handler::Handler::call`] and is
/// consumed at most once per handler; handlers that need random access to
/// the body must read it fully into a buffer first (see [`read_to_vec`]
/// and [`read_to_string`]).
pub struct Request {
    source: Box<dyn AsyncRead + Send + Unpin>,
    context: Context,
}

impl Request {
    /// Build a request from an existing context and byte source.
    pub fn new(context: Context, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            source: Box::new(source),
            context,
        }
    }

    /// A request over an in-memory buffer, for tests and for handlers that
    /// construct a scratch request (e.g. the tool executor feeding a
    /// tool's arguments as its body).
    pub fn from_bytes(context: Context, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(context, std::io::Cursor::new(bytes.into()))
    }

    /// A request over a UTF-8 string body.
    pub fn from_string(context: Context, s: impl Into<String>) -> Self {
        Self::from_bytes(context, s.into().into_bytes())
    }

    /// The request's context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Return a new request with the supplied context; the byte source is
    /// retained unchanged.
    #[must_use]
    pub fn with_context(self, context: Context) -> Self {
        Self {
            source: self.source,
            context,
        }
    }

    /// Mutable access to the underlying reader, for handlers that want to
    /// stream rather than buffer.
    pub fn reader_mut(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        &mut self.source
    }

    /// Split the request into its reader and context, consuming it.
    pub fn into_parts(self) -> (Box<dyn AsyncRead + Send + Unpin>, Context) {
        (self.source, self.context)
    }
}

/// A response sink: the byte-consuming half of a handler's output.
///
/// Handlers must write all output bytes to a `Response` in the order
/// intended for the next stage; a `Response` is dropped (closing the
/// underlying pipe) when the handler that owns it returns.
pub struct Response {
    sink: Box<dyn AsyncWrite + Send + Unpin>,
}

impl Response {
    /// Build a response over an existing byte sink.
    pub fn new(sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Mutable access to the underlying writer, for handlers that want to
    /// stream rather than buffer.
    pub fn writer_mut(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        &mut self.sink
    }

    /// Consume the response, returning the underlying writer.
    pub fn into_writer(self) -> Box<dyn AsyncWrite + Send + Unpin> {
        self.sink
    }
}

/// Drain `req` fully into a `Vec<u8>`. This is a literal read, not a
/// decode; handlers that accept arbitrary byte payloads use this.
pub async fn read_to_vec(req: &mut Request) -> Result<Vec<u8>, FlowError> {
    let mut buf = Vec::new();
    req.reader_mut().read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Drain `req` fully and interpret it as UTF-8. Returns an I/O error if
/// the bytes are not valid UTF-8 (mirroring invalid-data I/O errors rather
/// than introducing a separate encoding error kind).
pub async fn read_to_string(req: &mut Request) -> Result<String, FlowError> {
    let mut buf = String::new();
    req.reader_mut().read_to_string(&mut buf).await?;
    Ok(buf)
}

/// Write `bytes` to `res` verbatim and flush.
pub async fn write_bytes(res: &mut Response, bytes: &[u8]) -> Result<(), FlowError> {
    res.writer_mut().write_all(bytes).await?;
    res.writer_mut().flush().await?;
    Ok(())
}

/// Write `s` to `res` verbatim (no quoting/escaping) and flush.
pub async fn write_string(res: &mut Response, s: &str) -> Result<(), FlowError> {
    write_bytes(res, s.as_bytes()).await
}
