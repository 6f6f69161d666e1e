//! Wire-level tests of the REST axum adapter.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use a2a_sdk::server::{A2aRestApp, DefaultRequestHandler, InMemoryTaskStore, RequestHandler};
use a2a_sdk::types::AgentCard;

use common::*;

async fn serve(handler: Arc<dyn RequestHandler>, card: AgentCard) -> String {
    let router = A2aRestApp::new(handler, card).router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn handler_with(executor: Arc<dyn a2a_sdk::server::AgentExecutor>) -> Arc<dyn RequestHandler> {
    Arc::new(DefaultRequestHandler::new(
        executor,
        Arc::new(InMemoryTaskStore::new()),
    ))
}

fn send_body(text: &str) -> Value {
    json!({
        "message": {
            "messageId": "m1",
            "role": "user",
            "kind": "message",
            "parts": [{"kind": "text", "text": text}]
        }
    })
}

#[tokio::test]
async fn message_send_then_get_task() {
    let base = serve(
        handler_with(Arc::new(CompletingExecutor::new("done"))),
        test_card(true, false),
    )
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/v1/message:send"))
        .json(&send_body("Run agent"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let task: Value = response.json().await.unwrap();
    assert_eq!(task["kind"], "task");
    assert_eq!(task["status"]["state"], "completed");

    let task_id = task["id"].as_str().unwrap();
    let fetched: Value = client
        .get(format!("{base}/v1/tasks/{task_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], task["id"]);
}

#[tokio::test]
async fn unknown_task_is_404_with_problem_details() {
    let base = serve(
        handler_with(Arc::new(CompletingExecutor::new("x"))),
        test_card(true, false),
    )
    .await;

    let response = reqwest::get(format!("{base}/v1/tasks/missing")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], -32001);
    assert!(body["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn list_tasks_with_query_filters() {
    let store = Arc::new(InMemoryTaskStore::new());
    let handler: Arc<dyn RequestHandler> = Arc::new(DefaultRequestHandler::new(
        Arc::new(CompletingExecutor::new("x")),
        store.clone(),
    ));
    let base = serve(handler, test_card(true, false)).await;
    let client = reqwest::Client::new();

    for i in 0..3 {
        client
            .post(format!("{base}/v1/message:send"))
            .json(&send_body(&format!("job {i}")))
            .send()
            .await
            .unwrap();
    }

    let listed: Value = client
        .get(format!("{base}/v1/tasks"))
        .query(&[("status", "completed"), ("pageSize", "2")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(listed["totalSize"], 3);
    assert!(listed["nextPageToken"].as_str().is_some());
}

#[tokio::test]
async fn cancel_uses_verb_suffix_route() {
    let base = serve(handler_with(Arc::new(HangingExecutor)), test_card(true, false)).await;
    let client = reqwest::Client::new();

    let task: Value = client
        .post(format!("{base}/v1/message:send"))
        .json(&json!({
            "message": {
                "messageId": "m1",
                "role": "user",
                "kind": "message",
                "parts": [{"kind": "text", "text": "long job"}]
            },
            "configuration": {"blocking": false}
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = task["id"].as_str().unwrap();

    let canceled: Value = client
        .post(format!("{base}/v1/tasks/{task_id}:cancel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(canceled["status"]["state"], "canceled");

    // Cancelling again conflicts.
    let response = client
        .post(format!("{base}/v1/tasks/{task_id}:cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn subscribe_streams_sse_frames() {
    let store = Arc::new(InMemoryTaskStore::new());
    let handler: Arc<dyn RequestHandler> = Arc::new(DefaultRequestHandler::new(
        Arc::new(CompletingExecutor::new("done")),
        store.clone(),
    ));
    let base = serve(handler, test_card(true, false)).await;
    let client = reqwest::Client::new();

    // Create a finished task, then subscribe: the snapshot is replayed.
    let task: Value = client
        .post(format!("{base}/v1/message:send"))
        .json(&send_body("run"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = task["id"].as_str().unwrap();

    let response = client
        .get(format!("{base}/v1/tasks/{task_id}:subscribe"))
        .send()
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/event-stream"));

    let body = response.text().await.unwrap();
    let frames: Vec<Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|data| serde_json::from_str(data).ok())
        .collect();
    // REST frames are raw stream responses, not JSON-RPC envelopes.
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["kind"], "task");
    assert_eq!(frames[0]["status"]["state"], "completed");
}

#[tokio::test]
async fn card_served_under_v1() {
    let base = serve(
        handler_with(Arc::new(CompletingExecutor::new("x"))),
        test_card(true, false),
    )
    .await;

    let card: Value = reqwest::get(format!("{base}/v1/card"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(card["name"], "Test Agent");
}

#[tokio::test]
async fn streaming_disabled_is_501() {
    let base = serve(
        handler_with(Arc::new(CompletingExecutor::new("x"))),
        test_card(false, false),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/message:stream"))
        .json(&send_body("x"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 501);
}
