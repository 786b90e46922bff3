//! End-to-end composability check: agent loop, mock client, tool
//! execution, and observability middleware wired together without any
//! live provider.

use std::sync::Arc;

use async_trait::async_trait;
use conduit::prelude::*;
use conduit_core::FlowError;
use serde_json::json;

struct UppercaseTool;

#[async_trait]
impl Handler for UppercaseTool {
    async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
        let body = read_to_string(&mut req).await?;
        let args: serde_json::Value = serde_json::from_str(&body).unwrap_or(json!({}));
        let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
        write_string(&mut res, &text.to_uppercase()).await
    }
}

fn uppercase_tool() -> Tool {
    Tool::new(
        "uppercase",
        "Uppercases the given text",
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }),
        UppercaseTool,
    )
}

#[tokio::test]
async fn chat_only_turn_runs_through_metrics_and_tracing_middleware() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let tracer = Arc::new(InMemoryTracer::new());

    let client: Arc<dyn Client> = Arc::new(MockClient::new().with_responses(vec!["hello from mock".to_string()]));
    let agent = Agent::new(client, AgentOptions::new());

    let instrumented = MetricsHandler::new(
        metrics.clone(),
        "conduit",
        "agent",
        Labels::new(),
        TracingHandler::new(tracer.clone(), "agent.turn", ObservabilityOptions::default(), agent),
    );

    let mut out = Vec::new();
    instrumented
        .call(Request::from_string(Context::new(), "hi there"), Response::new(&mut out))
        .await
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "hello from mock");
    assert_eq!(metrics.counter_value("conduit_agent_requests_total", &Labels::new()), 1.0);
    assert_eq!(tracer.spans().len(), 1);
}

#[tokio::test]
async fn tool_calling_turn_executes_the_tool_and_synthesizes_an_answer() {
    let client: Arc<dyn Client> = Arc::new(
        MockClient::new()
            .with_tool_calls(vec![MockToolCall {
                name: "uppercase".to_string(),
                arguments: json!({ "text": "shout this" }).to_string(),
            }])
            .with_responses(vec!["THE ANSWER IS: SHOUT THIS".to_string()]),
    );

    let options = AgentOptions::new().with_tools(vec![uppercase_tool()]);
    let agent = Agent::new(client, options);

    let mut out = Vec::new();
    agent
        .call(Request::from_string(Context::new(), "please shout this"), Response::new(&mut out))
        .await
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "THE ANSWER IS: SHOUT THIS");
}

#[tokio::test]
async fn health_report_reflects_a_registered_mock_client() {
    let manager = ClientManager::new();
    manager
        .register_client(
            "primary",
            Arc::new(MockClient::new()),
            RetryConfig::default(),
            HealthCheckConfig::default(),
        )
        .await;

    let report = manager.health_check(&Context::new()).await;
    assert!(report.values().all(Option::is_none), "mock client should always report healthy");
}
