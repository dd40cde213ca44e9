mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{post_chat, service, spawn_app, stream_turn, ScriptedAgent};

#[tokio::test]
async fn health_reports_service_and_version() {
    let base = spawn_app(service(None)).await;

    let body: Value = reqwest::get(format!("{base}/api/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "chat-api");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let agent = Arc::new(ScriptedAgent::answering(&["ok"], "ok"));
    let base = spawn_app(service(Some(agent.clone()))).await;

    let response = post_chat(&base, json!({ "message": "   ", "conversation_id": "c-1" })).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Field 'message' cannot be empty");
    assert!(agent.calls().is_empty());
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    let agent = Arc::new(ScriptedAgent::answering(&["ok"], "ok"));
    let base = spawn_app(service(Some(agent)).with_max_message_length(10)).await;

    let response = post_chat(&base, json!({ "message": "x".repeat(11), "stream": false })).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Field 'message' exceeds max length of 10 (actual: 11)");
}

#[tokio::test]
async fn missing_agent_is_service_unavailable() {
    let base = spawn_app(service(None)).await;

    let response = post_chat(&base, json!({ "message": "hi", "conversation_id": "c-1" })).await;
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn buffered_mode_returns_one_payload() {
    let agent = Arc::new(ScriptedAgent::answering(&["Hel", "lo"], "Hello there!"));
    let base = spawn_app(service(Some(agent))).await;

    let response = post_chat(&base, json!({ "message": "hi", "conversation_id": "c-1", "stream": false })).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("application/json"));
    let first: Value = response.json().await.unwrap();
    assert_eq!(first["conversation_id"], "c-1");
    assert_eq!(first["message"], "hi");
    assert_eq!(first["response"], "Hello there!");
    assert_eq!(first["agent_id"], "scripted");
    assert_eq!(first["is_new_conversation"], true);
    assert!(first["timestamp"].is_string());

    let thread_id = first["thread_id"].as_str().unwrap();
    let second: Value = post_chat(
        &base,
        json!({ "message": "again", "conversation_id": "c-1", "thread_id": thread_id, "stream": false }),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(second["thread_id"], thread_id);
    assert_eq!(second["is_new_conversation"], false);
}

#[tokio::test]
async fn buffered_producer_failure_is_a_server_error() {
    let agent = Arc::new(ScriptedAgent::failing(&[], "model crashed"));
    let base = spawn_app(service(Some(agent))).await;

    let response = post_chat(&base, json!({ "message": "hi", "stream": false })).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Agent run failed: Inference error: model crashed");
}

#[tokio::test]
async fn missing_conversation_id_is_generated() {
    let agent = Arc::new(ScriptedAgent::answering(&["ok"], "ok"));
    let base = spawn_app(service(Some(agent))).await;

    let events = stream_turn(&base, json!({ "message": "hi" })).await;
    assert!(!events[0]["conversation_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn thread_history_lists_both_sides_of_each_turn() {
    let agent = Arc::new(ScriptedAgent::answering(&["He", "llo"], "Hello"));
    let base = spawn_app(service(Some(agent))).await;

    let events = stream_turn(&base, json!({ "message": "hi", "conversation_id": "c-1" })).await;
    let thread_id = events[0]["thread_id"].as_str().unwrap();

    let messages: Vec<Value> = reqwest::get(format!("{base}/api/threads/{thread_id}/messages"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let summary: Vec<_> = messages
        .iter()
        .map(|m| (m["role"].as_str().unwrap(), m["content"].as_str().unwrap()))
        .collect();
    assert_eq!(summary, [("USER", "hi"), ("ASSISTANT", "Hello")]);
}

#[tokio::test]
async fn history_of_unknown_thread_is_not_found() {
    let base = spawn_app(service(None)).await;

    let response = reqwest::get(format!("{base}/api/threads/thread_missing/messages")).await.unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Thread 'thread_missing' not found");
}
