//! The provider client contract every backend (real or mock) implements.

use async_trait::async_trait;
use conduit_core::{Context, Request, Response};

use crate::error::ClientError;
use crate::options::ChatOptions;

/// A single-method, object-safe contract for talking to a model
/// provider. Implementations are expected to:
///
/// - honor `req`'s [`Context`] deadline and cancellation, stopping any
///   in-flight streaming write as soon as the context is done;
/// - respect `opts.schema` when set, constraining the reply to the
///   requested shape rather than ignoring it;
/// - emit tool invocations as the canonical `{"tool_calls": [...]}`
///   envelope rather than embedding them in prose, so
///   [`conduit_tool::Detect`](../conduit_tool/struct.Detect.html) can
///   find them;
/// - stream the reply into `res` incrementally rather than buffering
///   the whole completion before writing anything.
///
/// Kept to one method, unlike a richer provider trait, specifically so
/// it stays object-safe: callers hold clients as `Arc<dyn Client>` in a
/// [`crate::manager::ClientManager`] keyed by name.
#[async_trait]
pub trait Client: Send + Sync {
    /// Send `req`'s body as a prompt and stream the reply into `res`.
    async fn chat(&self, req: Request, res: Response, opts: &ChatOptions) -> Result<(), ClientError>;

    /// Release any held resources (connections, background tasks).
    /// Default is a no-op; implementations backed by a real connection
    /// pool should override it.
    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }

    /// Cheap liveness probe used by [`crate::manager::ClientManager`].
    /// Default is a no-op success; real implementations should issue a
    /// minimal round trip and honor `ctx`'s deadline.
    async fn health_check(&self, _ctx: &Context) -> Result<(), ClientError> {
        Ok(())
    }
}
