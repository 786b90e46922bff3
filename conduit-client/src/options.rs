//! Per-call options passed to [`crate::client::Client::chat`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Requests a specific shape for the model's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub kind: ResponseFormatKind,
    /// JSON schema backing `kind == JsonSchema`. Ignored otherwise.
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    Text,
    JsonObject,
    JsonSchema,
}

impl ResponseFormat {
    #[must_use]
    pub fn json_schema(schema: serde_json::Value) -> Self {
        Self {
            kind: ResponseFormatKind::JsonSchema,
            schema: Some(schema),
        }
    }

    #[must_use]
    pub fn json_object() -> Self {
        Self {
            kind: ResponseFormatKind::JsonObject,
            schema: None,
        }
    }
}

/// Token accounting reported by a single [`crate::client::Client::chat`]
/// call. A multi-step agent run may receive several of these, one per
/// underlying call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Invoked once per [`crate::client::Client::chat`] call with that call's
/// token usage. Cheap to clone; typically an `Arc` around a closure that
/// forwards into an aggregator or metrics sink.
pub type UsageHandler = Arc<dyn Fn(UsageMetadata) + Send + Sync>;

/// Options threaded through a single chat call.
///
/// This is deliberately narrower than an agent run's configuration: it
/// carries only what a provider client itself needs to honor, not tool
/// definitions or synthesis behavior, which are orchestrated above the
/// client boundary.
#[derive(Clone, Default)]
pub struct ChatOptions {
    /// Requests a structured or constrained reply shape.
    pub schema: Option<ResponseFormat>,
    /// Set by the caller when a tool registry is in play, so a client
    /// (or the mock) knows whether to ever emit a tool-call envelope.
    pub tools_present: bool,
    /// Receives usage accounting after the call completes.
    pub usage_handler: Option<UsageHandler>,
}

impl std::fmt::Debug for ChatOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOptions")
            .field("schema", &self.schema)
            .field("tools_present", &self.tools_present)
            .field("usage_handler", &self.usage_handler.is_some())
            .finish()
    }
}
