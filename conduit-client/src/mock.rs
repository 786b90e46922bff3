//! A deterministic, in-process [`Client`] for tests and examples. Never
//! talks to the network; every reply is either a canned string, a
//! simulated tool-call envelope, or a simulated structured-output blob.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::{read_to_string, write_string, Context, Request, Response};
use serde_json::json;

use crate::client::Client;
use crate::error::ClientError;
use crate::options::{ChatOptions, ResponseFormatKind, UsageMetadata};

/// One simulated tool invocation the mock client should emit.
#[derive(Debug, Clone)]
pub struct MockToolCall {
    pub name: String,
    pub arguments: String,
}

/// Deterministic stand-in for a real provider client.
///
/// Canned responses are consumed in order and then cycled, so a test can
/// configure exactly as many as it needs without worrying about a final
/// call running out. When `tools_present` is set on the options passed
/// to [`Client::chat`] and mock tool calls are configured, the *first*
/// call returns a tool-call envelope instead of a canned response;
/// every call after that behaves as if no tools were configured.
pub struct MockClient {
    canned_responses: Vec<String>,
    mock_tool_calls: Vec<MockToolCall>,
    word_delay: Duration,
    call_count: AtomicUsize,
    seen_inputs: Mutex<Vec<String>>,
}

impl MockClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            canned_responses: Vec::new(),
            mock_tool_calls: Vec::new(),
            word_delay: Duration::ZERO,
            call_count: AtomicUsize::new(0),
            seen_inputs: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_responses(mut self, responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.canned_responses = responses.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_tool_calls(mut self, calls: impl IntoIterator<Item = MockToolCall>) -> Self {
        self.mock_tool_calls = calls.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_word_delay(mut self, delay: Duration) -> Self {
        self.word_delay = delay;
        self
    }

    /// Prompts this client has been called with, in call order. Useful
    /// for asserting a synthesis prompt was built correctly.
    #[must_use]
    pub fn seen_inputs(&self) -> Vec<String> {
        self.seen_inputs.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn tool_call_envelope(&self) -> String {
        let calls: Vec<_> = self
            .mock_tool_calls
            .iter()
            .map(|c| {
                json!({
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
        json!({ "tool_calls": calls }).to_string()
    }

    fn next_response(&self, index: usize, opts: &ChatOptions, input: &str) -> String {
        if index == 0 && opts.tools_present && !self.mock_tool_calls.is_empty() {
            return self.tool_call_envelope();
        }
        if !self.canned_responses.is_empty() {
            return self.canned_responses[index % self.canned_responses.len()].clone();
        }
        if let Some(format) = &opts.schema {
            if format.kind == ResponseFormatKind::JsonObject || format.kind == ResponseFormatKind::JsonSchema {
                return json!({ "mock": true }).to_string();
            }
        }
        format!("mock response to: {input}")
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Client for MockClient {
    async fn chat(&self, mut req: Request, mut res: Response, opts: &ChatOptions) -> Result<(), ClientError> {
        let ctx: Context = req.context().clone();
        let input = read_to_string(&mut req).await?;
        self.seen_inputs.lock().unwrap().push(input.clone());

        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_response(index, opts, &input);

        for (i, word) in reply.split_inclusive(' ').enumerate() {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }
            write_string(&mut res, word).await?;
            if i > 0 && !self.word_delay.is_zero() {
                tokio::time::sleep(self.word_delay).await;
            }
        }

        if let Some(handler) = &opts.usage_handler {
            let prompt_tokens = input.split_whitespace().count() as u64;
            let completion_tokens = reply.split_whitespace().count() as u64;
            handler(UsageMetadata {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            });
        }

        Ok(())
    }
}
