//! Builds the handler that runs a full agent turn: classification,
//! schema injection, provider dispatch, tool-call detection, execution,
//! and answer synthesis.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_client::{ChatOptions, Client};
use conduit_core::{chain, read_to_string, Context, FlowError, Handler, PassThrough, Request, Response};
use conduit_tool::{format_tools_as_openai, Detect, Execute, Registry, Tool};

use crate::classifier::classify;
use crate::error::AgentError;
use crate::options::AgentOptions;
use crate::types::{ClassifiedKind, MultimodalInput};

/// `Agent(client, options)` produces a [`Handler`] running one full
/// turn: chat-only when `options.tools` is empty, otherwise the full
/// register → inject-schema → dispatch → detect → execute → synthesize
/// sequence described for this crate.
///
/// Internally this is plain sequential `async` code rather than a
/// literal multi-stage [`conduit_core::Flow`]: each step needs to see
/// context values (the tool registry) written by the step before it,
/// and `Flow` runs its stages as concurrent siblings that all derive
/// from the same parent context up front, so a value one stage writes
/// is never visible to the next. Single-owner, sequential threading of
/// one `Context` value is the only shape that satisfies that
/// requirement here; `Flow` is still used for the two-step
/// execute-then-synthesize chain below, which has no such dependency.
pub struct Agent {
    client: Arc<dyn Client>,
    options: AgentOptions,
}

impl Agent {
    #[must_use]
    pub fn new(client: Arc<dyn Client>, options: AgentOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl Handler for Agent {
    async fn call(&self, mut req: Request, res: Response) -> Result<(), FlowError> {
        let span = tracing::info_span!("agent.turn", has_tools = self.options.has_tools());
        let _guard = span.enter();
        tracing::debug!("agent turn starting");

        let ctx = req.context().clone();
        let classified = classify(&mut req, &self.options)
            .await
            .map_err(AgentError::into_flow_error)?;
        let dispatch_body = dispatch_body(&classified.kind, &classified.original);

        let result = if !self.options.has_tools() {
            let chat_opts = ChatOptions {
                schema: self.options.schema.clone(),
                tools_present: false,
                usage_handler: self.options.usage_handler.clone(),
            };
            let chat_req = Request::from_bytes(ctx, dispatch_body);
            self.client.chat(chat_req, res, &chat_opts).await.map_err(FlowError::from_handler)
        } else {
            self.run_tool_calling(ctx, dispatch_body, classified.original, res)
                .await
                .map_err(AgentError::into_flow_error)
        };

        match &result {
            Ok(()) => tracing::debug!("agent turn completed"),
            Err(e) => tracing::debug!(error = %e, "agent turn failed"),
        }
        result
    }
}

impl Agent {
    async fn run_tool_calling(
        &self,
        ctx: Context,
        dispatch_body: Vec<u8>,
        original_input: Vec<u8>,
        res: Response,
    ) -> Result<(), AgentError> {
        let registry: Registry = self.options.tools.clone().into_iter().collect();
        let ctx = ctx.with_value(registry);

        let mut with_schema = dispatch_body;
        let tool_arcs: Vec<Arc<Tool>> = self.options.tools.iter().cloned().map(Arc::new).collect();
        let schema_block = format_tools_as_openai(&tool_arcs);
        if !schema_block.is_empty() {
            with_schema.extend_from_slice(b"\n\n");
            with_schema.extend_from_slice(schema_block.as_bytes());
        }

        let mut model_output = Vec::new();
        {
            let chat_opts = ChatOptions {
                schema: self.options.schema.clone(),
                tools_present: true,
                usage_handler: self.options.usage_handler.clone(),
            };
            let chat_req = Request::from_bytes(ctx.clone(), with_schema);
            self.client
                .chat(chat_req, Response::new(&mut model_output), &chat_opts)
                .await?;
        }

        let synthesis_client = self.options.tool_formatter_client.clone().unwrap_or_else(|| self.client.clone());
        let synthesis: Arc<dyn Handler> = match &self.options.tool_result_formatter {
            Some(formatter) => formatter(Some(synthesis_client), &original_input),
            None => Arc::new(DefaultSynthesis {
                client: synthesis_client,
                original: original_input,
                usage_handler: self.options.usage_handler.clone(),
            }),
        };

        let on_tool_calls: Arc<dyn Handler> = Arc::new(chain(vec![
            Arc::new(Execute::with_options(self.options.tools_config.clone())),
            synthesis,
        ]));
        let detect = Detect::new(PassThroughHandler(on_tool_calls), PassThrough);

        let detect_req = Request::new(ctx, std::io::Cursor::new(model_output));
        detect.call(detect_req, res).await?;
        Ok(())
    }
}

/// Adapts an `Arc<dyn Handler>` so it can be passed where
/// [`Detect::new`] wants an owned `impl Handler`.
struct PassThroughHandler(Arc<dyn Handler>);

#[async_trait]
impl Handler for PassThroughHandler {
    async fn call(&self, req: Request, res: Response) -> Result<(), FlowError> {
        self.0.call(req, res).await
    }
}

fn dispatch_body(kind: &ClassifiedKind, original: &[u8]) -> Vec<u8> {
    match kind {
        ClassifiedKind::Text | ClassifiedKind::MultimodalJson(_) => original.to_vec(),
        ClassifiedKind::MultimodalStreaming(data) => serialize_multimodal(data),
    }
}

fn serialize_multimodal(data: &MultimodalInput) -> Vec<u8> {
    serde_json::to_vec(data).unwrap_or_default()
}

/// The default synthesis handler: takes the tool executor's formatted
/// result text as its request body, rebuilds the documented prompt
/// around the original question, and asks the client for a final
/// answer with no schema or tools in play.
struct DefaultSynthesis {
    client: Arc<dyn Client>,
    original: Vec<u8>,
    usage_handler: Option<conduit_client::UsageHandler>,
}

#[async_trait]
impl Handler for DefaultSynthesis {
    async fn call(&self, mut req: Request, res: Response) -> Result<(), FlowError> {
        let ctx = req.context().clone();
        let tool_results = read_to_string(&mut req).await?;
        let original = String::from_utf8_lossy(&self.original);
        let prompt = format!(
            "Original question: {original}\n\nTool execution results:\n{tool_results}\n\nPlease provide a complete answer to the original question using the tool results above. Be concise and direct."
        );
        let chat_req = Request::from_string(ctx, prompt);
        let chat_opts = ChatOptions {
            usage_handler: self.usage_handler.clone(),
            ..Default::default()
        };
        self.client.chat(chat_req, res, &chat_opts).await.map_err(FlowError::from_handler)
    }
}
