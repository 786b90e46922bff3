//! Bounded-prefix sniff that routes a response to a tool-call handler or
//! a plain-text handler without buffering the whole stream in the
//! common case.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use conduit_core::{FlowError, Handler, Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::parser::TOOL_CALLS_MARKER;

/// Default number of bytes sniffed from the start of the input before
/// deciding whether it contains a tool-call envelope.
pub const DEFAULT_DETECT_BUFFER: usize = 200;

/// Reads the request body up to a bounded prefix and routes to
/// `if_handler` when the prefix contains the tool-call marker, or to
/// `else_handler` otherwise, streaming the already-read prefix back in
/// ahead of the remainder so `else_handler` sees the full, untouched
/// body.
pub struct Detect {
    if_handler: std::sync::Arc<dyn Handler>,
    else_handler: std::sync::Arc<dyn Handler>,
    buffer_size: usize,
}

impl Detect {
    /// Build a detector using [`DEFAULT_DETECT_BUFFER`] bytes of sniff.
    pub fn new(if_handler: impl Handler + 'static, else_handler: impl Handler + 'static) -> Self {
        Self::with_buffer_size(if_handler, else_handler, DEFAULT_DETECT_BUFFER)
    }

    /// Build a detector with an explicit sniff size. A size of `0` falls
    /// back to [`DEFAULT_DETECT_BUFFER`].
    pub fn with_buffer_size(
        if_handler: impl Handler + 'static,
        else_handler: impl Handler + 'static,
        buffer_size: usize,
    ) -> Self {
        Self {
            if_handler: std::sync::Arc::new(if_handler),
            else_handler: std::sync::Arc::new(else_handler),
            buffer_size: if buffer_size == 0 {
                DEFAULT_DETECT_BUFFER
            } else {
                buffer_size
            },
        }
    }
}

fn contains_marker(prefix: &[u8]) -> bool {
    let marker = TOOL_CALLS_MARKER.as_bytes();
    prefix.windows(marker.len()).any(|w| w == marker)
}

#[async_trait]
impl Handler for Detect {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        let (mut reader, ctx) = req.into_parts();

        let mut prefix = vec![0u8; self.buffer_size];
        let mut filled = 0usize;
        while filled < prefix.len() {
            let n = reader.read(&mut prefix[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        prefix.truncate(filled);
        let has_tool_calls = contains_marker(&prefix);
        tracing::debug!(has_tool_calls, prefix_len = prefix.len(), "tool call sniff complete");

        if has_tool_calls {
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest).await?;
            let mut full = prefix;
            full.extend_from_slice(&rest);
            let full_req = Request::new(ctx, std::io::Cursor::new(full));
            self.if_handler.call(full_req, res).await
        } else {
            let chained = ChainedReader {
                first: Some(Box::new(std::io::Cursor::new(prefix))),
                second: reader,
            };
            let chained_req = Request::new(ctx, chained);
            self.else_handler.call(chained_req, res).await
        }
    }
}

/// Reads `first` to exhaustion, then `second`. Used to hand back the
/// already-sniffed prefix ahead of the rest of the original stream
/// without copying the remainder into memory.
struct ChainedReader {
    first: Option<Box<dyn AsyncRead + Send + Unpin>>,
    second: Box<dyn AsyncRead + Send + Unpin>,
}

impl AsyncRead for ChainedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if let Some(first) = this.first.as_mut() {
            let before = buf.filled().len();
            match Pin::new(first.as_mut()).poll_read(cx, buf) {
                Poll::Ready(Ok(())) => {
                    if buf.filled().len() > before {
                        return Poll::Ready(Ok(()));
                    }
                    this.first = None;
                }
                other => return other,
            }
        }
        Pin::new(this.second.as_mut()).poll_read(cx, buf)
    }
}
