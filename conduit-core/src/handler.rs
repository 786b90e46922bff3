//! The single trait every stage in a flow implements.

use async_trait::async_trait;

use crate::carrier::{Request, Response};
use crate::error::FlowError;

/// A single stage in a flow: consumes a [`Request`], produces output
/// through a [`Response`], and returns once it has written everything it
/// intends to write.
///
/// Handlers own their request and response for the duration of the call;
/// returning drops the response, which closes the pipe to the next
/// stage. A handler that wants to pass bytes through unmodified should
/// copy from the request's reader to the response's writer rather than
/// buffering the whole body, so that streaming stages compose without
/// introducing a full-body delay at every hop.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run this stage. Implementations should check
    /// `req.context().err()` before any blocking operation and return
    /// promptly when it is `Some`.
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError>;
}
