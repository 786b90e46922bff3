//! Error type shared by every handler and flow in conduit-core.

use std::fmt;

/// Errors produced while driving a [`crate::flow::Flow`] or a single
/// [`crate::handler::Handler`].
///
/// Every conduit crate keeps one error enum per crate boundary; this is
/// the one for the streaming runtime itself. Provider, tool, and agent
/// errors live in their own crates and wrap a `FlowError` with `#[source]`
/// when they cross back into a flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Reading from or writing to a carrier failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request context was cancelled before the handler finished.
    #[error("request cancelled")]
    Cancelled,

    /// The request context's deadline elapsed before the handler finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A handler in the chain failed; the boxed error is the handler's own
    /// error, preserved as the cause.
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
    /// Wrap an arbitrary handler error, preserving it as the cause.
    pub fn from_handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FlowError::Handler(Box::new(err))
    }

    /// Whether this error represents the downstream reader having gone
    /// away (a broken pipe). Detector-style handlers use this to
    /// distinguish "nobody wanted the rest of my output" from a genuine
    /// I/O failure.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, FlowError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

/// A boxed, erased error used where a handler's concrete error type would
/// otherwise need to be threaded through a generic parameter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) fn broken_pipe(msg: impl fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, msg.to_string())
}
