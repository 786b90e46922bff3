//! Integration tests for multi-stage flows driven through the public API
//! only (no access to `Flow`'s internals).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{read_to_vec, write_bytes, Context, Flow, FlowError, Handler, Request, Response};

struct RecordOrder {
    label: &'static str,
    order: Arc<std::sync::Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Handler for RecordOrder {
    async fn call(&self, mut req: Request, mut res: Response) -> Result<(), FlowError> {
        let body = read_to_vec(&mut req).await?;
        self.order.lock().unwrap().push(self.label);
        write_bytes(&mut res, &body).await
    }
}

#[tokio::test]
async fn three_stage_flow_runs_each_stage_exactly_once_in_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let flow = Flow::new()
        .use_handler(RecordOrder {
            label: "first",
            order: order.clone(),
        })
        .use_handler(RecordOrder {
            label: "second",
            order: order.clone(),
        })
        .use_handler(RecordOrder {
            label: "third",
            order: order.clone(),
        });

    let mut out = Vec::new();
    flow.run(Context::new(), std::io::Cursor::new(b"payload".to_vec()), &mut out)
        .await
        .unwrap();

    assert_eq!(out, b"payload");
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

struct EarlyReturn;

#[async_trait]
impl Handler for EarlyReturn {
    async fn call(&self, _req: Request, _res: Response) -> Result<(), FlowError> {
        // Returns immediately without reading the request body; the
        // response is dropped here, closing the pipe to the next stage.
        Ok(())
    }
}

struct ReadFully {
    observed_error: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for ReadFully {
    async fn call(&self, mut req: Request, _res: Response) -> Result<(), FlowError> {
        match read_to_vec(&mut req).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(e, FlowError::Io(_)) {
                    self.observed_error.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }
    }
}

#[tokio::test]
async fn downstream_stage_sees_empty_input_when_upstream_returns_early() {
    let observed_error = Arc::new(AtomicUsize::new(0));
    let flow = Flow::new().use_handler(EarlyReturn).use_handler(ReadFully {
        observed_error: observed_error.clone(),
    });

    let mut out = Vec::new();
    flow.run(Context::new(), std::io::Cursor::new(b"anything".to_vec()), &mut out)
        .await
        .unwrap();

    assert_eq!(out, Vec::<u8>::new());
}

struct AlwaysFails;

#[async_trait]
impl Handler for AlwaysFails {
    async fn call(&self, _req: Request, _res: Response) -> Result<(), FlowError> {
        Err(FlowError::from_handler(std::io::Error::other("deliberate failure")))
    }
}

#[tokio::test]
async fn error_in_first_stage_is_surfaced_and_downstream_does_not_hang() {
    let flow = Flow::new().use_handler(AlwaysFails).use_handler(
        RecordOrder {
            label: "never runs output",
            order: Arc::new(std::sync::Mutex::new(Vec::new())),
        },
    );

    let mut out = Vec::new();
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        flow.run(Context::new(), std::io::Cursor::new(Vec::new()), &mut out),
    )
    .await
    .expect("flow run must not hang when a stage errors");

    assert!(result.is_err());
}
