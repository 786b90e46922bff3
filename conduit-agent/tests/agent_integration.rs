use std::sync::Arc;
use std::time::Duration;

use conduit_agent::{Agent, AgentOptions, ContentPart, ContentPartKind, MultimodalInput};
use conduit_client::MockClient;
use conduit_core::{Context, Handler, Request, Response};

#[tokio::test]
async fn multimodal_data_option_is_serialized_and_dispatched_to_the_client() {
    let client = Arc::new(MockClient::new().with_responses(["described"]));
    let multimodal = MultimodalInput::new(vec![
        ContentPart::text("what is this"),
        ContentPart::inline(ContentPartKind::Image, vec![9, 9, 9], "image/png"),
    ]);
    let options = AgentOptions::new().with_multimodal_data(multimodal);
    let agent = Agent::new(client.clone(), options);

    let req = Request::from_string(Context::new(), "ignored, multimodal_data wins");
    let mut out = Vec::new();
    agent.call(req, Response::new(&mut out)).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "described");

    let seen = client.seen_inputs();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("\"parts\""));
}

#[tokio::test]
async fn cancelled_context_aborts_the_dispatch_call() {
    let client = Arc::new(
        MockClient::new()
            .with_responses(["one two three four five"])
            .with_word_delay(Duration::from_millis(30)),
    );
    let agent = Agent::new(client, AgentOptions::default());

    let ctx = Context::new();
    ctx.cancel();
    let req = Request::from_string(ctx, "hello");
    let mut out = Vec::new();
    let result = agent.call(req, Response::new(&mut out)).await;
    assert!(result.is_err());
}
