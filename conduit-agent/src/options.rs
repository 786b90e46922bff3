//! Per-run configuration accepted by [`crate::agent::Agent`].

use std::sync::Arc;

use conduit_client::{Client, ResponseFormat, UsageHandler};
use conduit_core::Handler;
use conduit_tool::{ExecuteOptions, Tool};
use schemars::JsonSchema;

use crate::types::MultimodalInput;

/// Builds the handler that turns tool results into a final answer, given
/// the tool-formatter client (if one was configured) and the run's
/// original input bytes. Returning `None` falls back to the default
/// synthesis prompt.
pub type ToolResultFormatter = Arc<dyn Fn(Option<Arc<dyn Client>>, &[u8]) -> Arc<dyn Handler> + Send + Sync>;

/// Configuration accepted by a single [`crate::agent::Agent`] run.
///
/// The zero value runs in chat-only mode: no tools, no schema, no
/// multimodal override, default synthesis.
#[derive(Clone, Default)]
pub struct AgentOptions {
    /// Constrains the provider's reply to a structured shape.
    pub schema: Option<ResponseFormat>,
    /// Tools registered for this run. An empty list means chat-only
    /// mode.
    pub tools: Vec<Tool>,
    /// Worker-pool and formatting knobs for the tool executor.
    pub tools_config: ExecuteOptions,
    /// Takes priority over a JSON-parsed multimodal payload when set.
    pub multimodal_data: Option<MultimodalInput>,
    /// Overrides the default synthesis handler.
    pub tool_result_formatter: Option<ToolResultFormatter>,
    /// Alternate client used for the synthesis call, if set; otherwise
    /// the main client is reused.
    pub tool_formatter_client: Option<Arc<dyn Client>>,
    /// Invoked once per underlying `Chat` call with that call's token
    /// usage.
    pub usage_handler: Option<UsageHandler>,
}

impl AgentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.tools = tools.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_tools_config(mut self, config: ExecuteOptions) -> Self {
        self.tools_config = config;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ResponseFormat) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Resolves `T`'s JSON Schema by reflection and sets it as the
    /// run's response format. Reflection happens once, here, not per
    /// request.
    #[must_use]
    pub fn with_schema_for<T: JsonSchema>(mut self) -> Self {
        let schema = schemars::schema_for!(T);
        self.schema = Some(ResponseFormat::json_schema(
            serde_json::to_value(schema).unwrap_or(serde_json::Value::Null),
        ));
        self
    }

    #[must_use]
    pub fn with_multimodal_data(mut self, data: MultimodalInput) -> Self {
        self.multimodal_data = Some(data);
        self
    }

    #[must_use]
    pub fn with_usage_handler(mut self, handler: UsageHandler) -> Self {
        self.usage_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("schema", &self.schema)
            .field("tool_count", &self.tools.len())
            .field("tools_config", &self.tools_config)
            .field("has_multimodal_data", &self.multimodal_data.is_some())
            .field("has_tool_result_formatter", &self.tool_result_formatter.is_some())
            .field("has_tool_formatter_client", &self.tool_formatter_client.is_some())
            .field("has_usage_handler", &self.usage_handler.is_some())
            .finish()
    }
}
