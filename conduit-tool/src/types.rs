//! Normalized tool-call and tool-result shapes.

use serde::{Deserialize, Serialize};

/// A single normalized tool invocation extracted from a provider's
/// tool-call envelope.
///
/// `error` is set (with `name` forced to `"_parse_error"`) when the
/// parser could not make sense of the raw entry; this lets the failure
/// flow through the ordinary execution path as a failed [`ToolResult`]
/// rather than aborting parsing outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier for this call, unique within a single parse (`call_0`,
    /// `call_1`, ...).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw arguments string passed as the tool's request body.
    pub arguments: String,
    /// Set when this call is a synthetic parse-error placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    /// Whether this call is a synthetic parse-error placeholder rather
    /// than a real invocation.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The outcome of executing a single [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call this result corresponds to.
    pub tool_call: ToolCall,
    /// The tool's textual output, empty on failure.
    #[serde(default)]
    pub result: String,
    /// Set when the call failed, either during parsing, lookup, or
    /// execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    #[must_use]
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}
