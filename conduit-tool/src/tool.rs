//! Tool definitions and the per-request tool registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{read_to_string, write_string, Context, FlowError, Handler, Request, Response};
use serde_json::json;

use crate::error::ToolError;

/// A named, schema-described operation that can be invoked by a model's
/// tool call.
///
/// The executor consumes the call's arguments string as its request body
/// and writes the tool's textual result as its response.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    schema: serde_json::Value,
    executor: Arc<dyn Handler>,
}

/// The default schema used by [`Tool::simple`] and [`Tool::handler_func`]:
/// a single required string parameter named `input`.
#[must_use]
pub fn default_string_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "input": { "type": "string" }
        },
        "required": ["input"]
    })
}

impl Tool {
    /// Build a tool from an explicit name, description, schema, and
    /// executor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        executor: impl Handler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            executor: Arc::new(executor),
        }
    }

    /// Build a tool from a plain `String -> Result<String, ToolError>`
    /// async function, using the default single-string-parameter schema.
    pub fn simple<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self::new(
            name,
            description,
            default_string_schema(),
            SimpleHandler::new(f),
        )
    }

    /// Build a tool from a full [`Handler`], using the default
    /// single-string-parameter schema. Use [`Tool::new`] instead when the
    /// tool needs a richer schema.
    pub fn handler_func(
        name: impl Into<String>,
        description: impl Into<String>,
        executor: impl Handler + 'static,
    ) -> Self {
        Self::new(name, description, default_string_schema(), executor)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }

    /// Run this tool's executor against `arguments`, returning its
    /// textual result.
    pub async fn call(&self, ctx: Context, arguments: String) -> Result<String, ToolError> {
        let req = Request::from_string(ctx, arguments);
        let mut out = Vec::new();
        {
            let res = Response::new(&mut out);
            self.executor.call(req, res).await?;
        }
        String::from_utf8(out)
            .map_err(|e| ToolError::ExecutionFailed(format!("tool produced non-utf8 output: {e}")))
    }
}

type SimpleFn = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>
        + Send
        + Sync,
>;

struct SimpleHandler {
    f: SimpleFn,
}

impl SimpleHandler {
    fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |input| Box::pin(f(input))),
        }
    }
}

#[async_trait]
impl Handler for SimpleHandler {
    async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
        let input = read_to_string(&mut req).await?;
        let output = (self.f)(input)
            .await
            .map_err(FlowError::from_handler)?;
        write_string(&mut res, &output).await
    }
}

/// Tool registry placed on a request context by [`registry_handler`] and
/// consulted by the detector/executor.
///
/// Registration is last-writer-wins on name conflicts, matching a plain
/// `HashMap::insert`.
#[derive(Default, Clone)]
pub struct Registry {
    tools: HashMap<String, Arc<Tool>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn list_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Arc<Tool>> {
        let mut tools: Vec<Arc<Tool>> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<Tool> for Registry {
    fn from_iter<I: IntoIterator<Item = Tool>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

/// Look up the registry on a context, if one was placed there.
#[must_use]
pub fn tools_from_context(ctx: &Context) -> Option<Arc<Registry>> {
    ctx.get::<Registry>()
}

struct RegistryHandler {
    registry: Registry,
}

#[async_trait]
impl Handler for RegistryHandler {
    async fn call(&self, mut req: Request, res: Response) -> Result<(), FlowError> {
        // The registry is attached to this handler's own context so that
        // direct callers of `.call()` (decorator-style composition, as
        // the agent loop does) see it; see the crate-level docs for why
        // context values do not cross concurrent Flow stage boundaries.
        let ctx = req.context().with_value(self.registry.clone());
        req = req.with_context(ctx);
        conduit_core::PassThrough.call(req, res).await
    }
}

/// Build a handler that places `tools` on the request context and passes
/// the request body through unchanged. Intended to be called directly
/// (e.g. by the agent loop) rather than composed as a sibling stage of a
/// multi-stage [`conduit_core::Flow`], since Flow stages are spawned
/// concurrently from a common parent context and do not observe values
/// set by earlier sibling stages.
pub fn registry_handler(tools: impl IntoIterator<Item = Tool>) -> impl Handler {
    RegistryHandler {
        registry: tools.into_iter().collect(),
    }
}
