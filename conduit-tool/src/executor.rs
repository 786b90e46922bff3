//! Parses and runs the tool calls found in a model response, writing a
//! formatted result (or failing) based on the outcome of every call.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{read_to_vec, write_bytes, Context, FlowError, Handler, Request, Response};
use futures::FutureExt;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ToolError;
use crate::parser::parse_tool_calls;
use crate::tool::{tools_from_context, Registry};
use crate::types::{ToolCall, ToolResult};

/// Options controlling tool-call execution and result formatting.
///
/// The zero value matches the documented defaults: unlimited worker
/// concurrency (one worker per call), no original-output echo, and
/// human-readable text formatting.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// `0` means one worker per call; otherwise the number of calls run
    /// concurrently is `min(max_concurrent_tools, calls.len())`.
    pub max_concurrent_tools: usize,
    /// Prepend the original model output ahead of the formatted results.
    pub include_original_output: bool,
    /// Emit JSON instead of the human-readable text format.
    pub raw_output: bool,
}

/// Reads the full request body, parses it as a tool-call envelope,
/// executes every call against the registry found on the context, and
/// writes the formatted outcome.
pub struct Execute {
    options: ExecuteOptions,
}

impl Execute {
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ExecuteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(options: ExecuteOptions) -> Self {
        Self { options }
    }
}

impl Default for Execute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for Execute {
    async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
        let ctx = req.context().clone();
        let input = read_to_vec(&mut req).await?;

        let calls = parse_tool_calls(&input);

        let registry = tools_from_context(&ctx)
            .ok_or_else(|| FlowError::from_handler(ToolError::NoToolsAvailable))?;

        tracing::debug!(calls = calls.len(), "executing tool calls");
        let results = run_calls(&registry, &ctx, calls, self.options.max_concurrent_tools).await;

        if let Some(first_failure) = results.iter().find_map(|r| r.error.clone()) {
            return Err(FlowError::from_handler(ToolError::ExecutionFailed(
                first_failure,
            )));
        }

        let output = if self.options.raw_output {
            serde_json::to_vec(&format_raw(
                &input,
                &results,
                self.options.include_original_output,
            ))
            .unwrap_or_default()
        } else {
            format_text(&input, &results, self.options.include_original_output).into_bytes()
        };

        write_bytes(&mut res, &output).await
    }
}

async fn run_calls(
    registry: &Arc<Registry>,
    ctx: &Context,
    calls: Vec<ToolCall>,
    max_concurrent: usize,
) -> Vec<ToolResult> {
    let n = calls.len();

    if n == 1 {
        let call = calls.into_iter().next().expect("checked len == 1");
        return vec![execute_one(registry, ctx.clone(), call).await];
    }

    let workers = if max_concurrent == 0 {
        n
    } else {
        max_concurrent.min(n)
    }
    .max(1);

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut slots: Vec<Option<ToolResult>> = (0..n).map(|_| None).collect();
    let mut join_set = JoinSet::new();

    for (idx, call) in calls.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        let registry = registry.clone();
        let ctx = ctx.clone();
        join_set.spawn(async move {
            let _permit = permit;
            (idx, execute_one(&registry, ctx, call).await)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        if let Ok((idx, result)) = joined {
            slots[idx] = Some(result);
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.expect("every index is written by its worker before we return"))
        .collect()
}

async fn execute_one(registry: &Registry, ctx: Context, call: ToolCall) -> ToolResult {
    if let Some(err) = call.error.clone() {
        return ToolResult {
            tool_call: call,
            result: String::new(),
            error: Some(err),
        };
    }

    let Some(tool) = registry.get(&call.name) else {
        let message = format!("Tool '{}' not found", call.name);
        return ToolResult {
            tool_call: call,
            result: String::new(),
            error: Some(message),
        };
    };

    let arguments = call.arguments.clone();
    match AssertUnwindSafe(tool.call(ctx, arguments)).catch_unwind().await {
        Ok(Ok(output)) => ToolResult {
            tool_call: call,
            result: output,
            error: None,
        },
        Ok(Err(e)) => ToolResult {
            tool_call: call,
            result: String::new(),
            error: Some(e.to_string()),
        },
        Err(panic_payload) => {
            let message = panic_message(&panic_payload);
            ToolResult {
                tool_call: call,
                result: String::new(),
                error: Some(format!("tool panicked: {message}")),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn format_text(original: &[u8], results: &[ToolResult], include_original: bool) -> String {
    let mut out = String::new();
    if include_original {
        out.push_str("Original LLM Output:\n");
        out.push_str(&String::from_utf8_lossy(original));
        out.push_str("\n\n");
    }
    out.push_str("Tool execution results:\n\n");
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("Tool {}: {}\n", i + 1, result.tool_call.name));
        out.push_str(&format!("Arguments: {}\n", result.tool_call.arguments));
        match &result.error {
            Some(err) => out.push_str(&format!("Error: {err}\n\n")),
            None => out.push_str(&format!("Result: {}\n\n", result.result)),
        }
    }
    out
}

fn format_raw(
    original: &[u8],
    results: &[ToolResult],
    include_original: bool,
) -> serde_json::Value {
    if include_original {
        json!({
            "originalOutput": String::from_utf8_lossy(original),
            "results": results,
        })
    } else {
        serde_json::to_value(results).unwrap_or_else(|_| json!([]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{registry_handler, Tool};
    use conduit_core::Context;

    fn envelope(calls: &str) -> Vec<u8> {
        format!(r#"{{"tool_calls":[{calls}]}}"#).into_bytes()
    }

    async fn ctx_with_tools(tools: Vec<Tool>) -> Context {
        let ctx = Context::new();
        let registry: Registry = tools.into_iter().collect();
        ctx.with_value(registry)
    }

    #[tokio::test]
    async fn fails_when_no_tool_calls_present() {
        let ctx = ctx_with_tools(vec![]).await;
        let req = Request::from_bytes(ctx, b"plain text".to_vec());
        let mut out = Vec::new();
        let result = Execute::new().call(req, Response::new(&mut out)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_tool_calls_array_fails_through_the_normal_per_call_error_path() {
        let ctx = ctx_with_tools(vec![]).await;
        let req = Request::from_bytes(ctx, b"{\"tool_calls\":[]}".to_vec());
        let mut out = Vec::new();
        let result = Execute::new().call(req, Response::new(&mut out)).await;
        match result {
            Err(FlowError::Handler(e)) => {
                assert!(e.to_string().contains("JSON parsed successfully but contains no tool calls"));
            }
            other => panic!("expected a handler error carrying the parse-error message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fails_when_registry_missing_from_context() {
        let input = envelope(r#"{"type":"function","function":{"name":"a","arguments":"1"}}"#);
        let req = Request::from_bytes(Context::new(), input);
        let mut out = Vec::new();
        let result = Execute::new().call(req, Response::new(&mut out)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn single_call_executes_inline_and_formats_result() {
        let tools = vec![Tool::simple("double", "doubles a number", |s: String| async move {
            let n: i64 = s.parse().map_err(|_| crate::error::ToolError::InvalidInput("not a number".into()))?;
            Ok((n * 2).to_string())
        })];
        let ctx = ctx_with_tools(tools).await;
        let input = envelope(r#"{"type":"function","function":{"name":"double","arguments":"21"}}"#);
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        Execute::new().call(req, Response::new(&mut out)).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Tool 1: double"));
        assert!(text.contains("Result: 42"));
    }

    #[tokio::test]
    async fn missing_tool_fails_the_whole_execution() {
        let ctx = ctx_with_tools(vec![Tool::simple("known", "", |s: String| async move { Ok(s) })]).await;
        let input = envelope(r#"{"type":"function","function":{"name":"unknown","arguments":"x"}}"#);
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        let result = Execute::new().call(req, Response::new(&mut out)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn many_calls_run_concurrently_and_preserve_order_in_output() {
        let tools = vec![
            Tool::simple("a", "", |s: String| async move { Ok(format!("a:{s}")) }),
            Tool::simple("b", "", |s: String| async move { Ok(format!("b:{s}")) }),
            Tool::simple("c", "", |s: String| async move { Ok(format!("c:{s}")) }),
        ];
        let ctx = ctx_with_tools(tools).await;
        let input = envelope(
            r#"{"type":"function","function":{"name":"a","arguments":"1"}},
               {"type":"function","function":{"name":"b","arguments":"2"}},
               {"type":"function","function":{"name":"c","arguments":"3"}}"#,
        );
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        Execute::new().call(req, Response::new(&mut out)).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let a_pos = text.find("Tool 1: a").unwrap();
        let b_pos = text.find("Tool 2: b").unwrap();
        let c_pos = text.find("Tool 3: c").unwrap();
        assert!(a_pos < b_pos && b_pos < c_pos);
    }

    #[tokio::test]
    async fn five_slow_calls_with_bounded_concurrency_preserve_order_within_the_expected_wall_time() {
        let sleeping = |label: &'static str| {
            Tool::simple(label, "", move |s: String| async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok(format!("{label}:{s}"))
            })
        };
        let tools = vec![sleeping("a"), sleeping("b"), sleeping("c"), sleeping("d"), sleeping("e")];
        let ctx = ctx_with_tools(tools).await;
        let input = envelope(
            r#"{"type":"function","function":{"name":"a","arguments":"1"}},
               {"type":"function","function":{"name":"b","arguments":"2"}},
               {"type":"function","function":{"name":"c","arguments":"3"}},
               {"type":"function","function":{"name":"d","arguments":"4"}},
               {"type":"function","function":{"name":"e","arguments":"5"}}"#,
        );
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        let start = std::time::Instant::now();
        Execute::with_options(ExecuteOptions {
            max_concurrent_tools: 2,
            ..Default::default()
        })
        .call(req, Response::new(&mut out))
        .await
        .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= std::time::Duration::from_millis(100), "took {elapsed:?}, expected >= 100ms");
        assert!(elapsed < std::time::Duration::from_millis(300), "took {elapsed:?}, expected < 300ms");

        let text = String::from_utf8(out).unwrap();
        let positions: Vec<usize> = ["Tool 1: a", "Tool 2: b", "Tool 3: c", "Tool 4: d", "Tool 5: e"]
            .iter()
            .map(|marker| text.find(marker).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "results should stay in call order: {text}");
    }

    #[tokio::test]
    async fn panicking_tool_is_recovered_as_a_failed_result() {
        let tools = vec![Tool::simple("boom", "", |_s: String| async move {
            panic!("kaboom");
            #[allow(unreachable_code)]
            Ok(String::new())
        })];
        let ctx = ctx_with_tools(tools).await;
        let input = envelope(r#"{"type":"function","function":{"name":"boom","arguments":"x"}}"#);
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        let result = Execute::new().call(req, Response::new(&mut out)).await;
        assert!(matches!(result, Err(FlowError::Handler(_))));
    }

    #[tokio::test]
    async fn raw_output_emits_json_array_of_results() {
        let ctx = ctx_with_tools(vec![Tool::simple("echo", "", |s: String| async move { Ok(s) })]).await;
        let input = envelope(r#"{"type":"function","function":{"name":"echo","arguments":"hi"}}"#);
        let req = Request::from_bytes(ctx, input);
        let mut out = Vec::new();
        Execute::with_options(ExecuteOptions {
            raw_output: true,
            ..Default::default()
        })
        .call(req, Response::new(&mut out))
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["result"], "hi");
    }

    #[test]
    fn registry_handler_is_constructible_from_tool_list() {
        let _handler = registry_handler([Tool::simple("x", "", |s: String| async move { Ok(s) })]);
    }
}
