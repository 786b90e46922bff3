//! Ordered chains of handlers connected by in-memory byte pipes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{self, AsyncWriteExt};
use tracing::Instrument;

use crate::carrier::{Context, Request, Response};
use crate::error::FlowError;
use crate::handler::Handler;

/// Size of each in-memory pipe connecting adjacent stages. Chosen to hold
/// a few typical JSON tool-call payloads without forcing a writer to
/// block on a slow downstream reader for small messages.
const PIPE_CAPACITY: usize = 64 * 1024;

/// An ordered sequence of handlers, each stage's output becoming the next
/// stage's input.
///
/// Stages run concurrently on their own tasks, connected by
/// [`tokio::io::duplex`] pipes: stage `i` writes into the pipe that stage
/// `i+1` reads from. When any stage returns an error, the flow cancels a
/// child of the driving context so the remaining stages unwind promptly
/// instead of blocking forever on a half that will never be written to
/// or read from again; dropping a pipe half also closes it, so a stage
/// that simply returns early surfaces as EOF or a broken-pipe error to
/// its neighbor without any extra bookkeeping.
#[derive(Default)]
pub struct Flow {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Flow {
    /// An empty flow. Running it copies the request body to the response
    /// unchanged (see [`PassThrough`]).
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a stage to the end of the flow.
    #[must_use]
    pub fn use_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Number of stages currently in the flow.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every stage concurrently, feeding `input` into the first stage
    /// and draining the last stage's output into `output`.
    ///
    /// Returns the first error raised by any stage or by the final copy
    /// into `output`.
    pub async fn run<R, W>(&self, ctx: Context, input: R, mut output: W) -> Result<(), FlowError>
    where
        R: io::AsyncRead + Send + Unpin + 'static,
        W: io::AsyncWrite + Send + Unpin,
    {
        if self.handlers.is_empty() {
            let mut input = input;
            io::copy(&mut input, &mut output).await.map_err(FlowError::Io)?;
            output.flush().await.map_err(FlowError::Io)?;
            return Ok(());
        }

        let run_ctx = ctx.child();
        let n = self.handlers.len();

        // `pipes[i]` is the duplex pair sitting between stage `i` and
        // stage `i + 1`. The last stage's writer side feeds a final
        // duplex whose reader half is copied into `output` below, so
        // every handler task gets fully owned, 'static pipe halves.
        let mut next_reader: Box<dyn io::AsyncRead + Send + Unpin> = Box::new(input);
        let mut join_set = tokio::task::JoinSet::new();
        let mut final_reader: Option<Box<dyn io::AsyncRead + Send + Unpin>> = None;

        for (idx, handler) in self.handlers.iter().cloned().enumerate() {
            let (writer_half, reader_half): (Box<dyn io::AsyncWrite + Send + Unpin>, _) = {
                let (a, b) = io::duplex(PIPE_CAPACITY);
                (Box::new(a), Box::new(b))
            };

            let reader = std::mem::replace(&mut next_reader, reader_half);
            let stage_ctx = run_ctx.child();
            let req = Request::new(stage_ctx, reader);
            let res = Response::new(writer_half);

            if idx + 1 == n {
                final_reader = Some(std::mem::replace(
                    &mut next_reader,
                    Box::new(io::empty()),
                ));
            }

            let span = tracing::debug_span!("flow.stage", stage = idx);
            join_set.spawn(
                async move { (idx, handler.call(req, res).await) }.instrument(span),
            );
        }

        let mut final_reader = final_reader.expect("final stage always assigns final_reader");

        let copy_fut = async {
            let result = io::copy(&mut final_reader, &mut output)
                .await
                .map_err(FlowError::Io);
            if result.is_ok() {
                output.flush().await.map_err(FlowError::Io)?;
            }
            result.map(|_| ())
        };

        let drain_fut = async {
            let mut first_err: Option<FlowError> = None;
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((_, Err(e))) => {
                        run_ctx.cancel();
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                    Err(join_err) => {
                        run_ctx.cancel();
                        if first_err.is_none() {
                            first_err = Some(FlowError::from_handler(JoinError(join_err.to_string())));
                        }
                    }
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        };

        let (copy_res, drain_res) = tokio::join!(copy_fut, drain_fut);
        drain_res?;
        copy_res
    }
}

#[derive(Debug, thiserror::Error)]
#[error("handler task failed: {0}")]
struct JoinError(String);

/// Compose `handlers` into a single [`Handler`] that runs them as a
/// sub-flow. Useful for nesting a reusable sequence of stages as one
/// entry in an outer [`Flow`].
#[must_use]
pub fn chain(handlers: Vec<Arc<dyn Handler>>) -> impl Handler {
    ChainHandler { flow: Arc::new({
        let mut flow = Flow::new();
        flow.handlers = handlers;
        flow
    }) }
}

struct ChainHandler {
    flow: Arc<Flow>,
}

#[async_trait]
impl Handler for ChainHandler {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        let (reader, ctx) = req.into_parts();
        self.flow.run(ctx, reader, res.into_writer()).await
    }
}

/// A handler that copies its request body to its response unchanged.
/// Useful as a default no-op stage or as a building block in tests.
pub struct PassThrough;

#[async_trait]
impl Handler for PassThrough {
    async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
        io::copy(req.reader_mut(), res.writer_mut())
            .await
            .map_err(FlowError::Io)?;
        res.writer_mut().flush().await.map_err(FlowError::Io)?;
        Ok(())
    }
}
