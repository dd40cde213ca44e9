#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use chat_stream::agent::AnswerProducer;
use chat_stream::errors::AppError;
use chat_stream::models::Message;
use chat_stream::service::chat_service::ChatService;
use chat_stream::store::MemoryThreadStore;

/// What the producer saw for one turn.
#[derive(Debug, Clone)]
pub struct Call {
    pub thread_id: String,
    pub history: Vec<Message>,
    pub user_message: String,
}

/// Answer producer that replays a fixed script and records every call.
pub struct ScriptedAgent {
    chunks: Vec<String>,
    outcome: Result<String, String>,
    chunk_delay: Duration,
    calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    completed: AtomicUsize,
}

/// Counts a turn as running until dropped, so aborted turns are released too.
struct Running<'a>(&'a ScriptedAgent);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAgent {
    pub fn answering(chunks: &[&str], full: &str) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            outcome: Ok(full.to_string()),
            chunk_delay: Duration::ZERO,
            calls: Mutex::default(),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn failing(chunks: &[&str], message: &str) -> Self {
        Self { outcome: Err(message.to_string()), ..Self::answering(chunks, "") }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of turns that were running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Turns that ran to the end of their script instead of being aborted.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn enter(&self, thread_id: &str, history: &[Message], user_message: &str) -> Running<'_> {
        self.calls.lock().unwrap().push(Call {
            thread_id: thread_id.to_string(),
            history: history.to_vec(),
            user_message: user_message.to_string(),
        });
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Running(self)
    }

    fn finish(&self) -> Result<String, AppError> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(|message| AppError::InferenceError { message })
    }
}

#[async_trait]
impl AnswerProducer for ScriptedAgent {
    async fn stream_chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, AppError> {
        let _running = self.enter(thread_id, history, user_message);
        for chunk in &self.chunks {
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            if tx.send(chunk.clone()).await.is_err() {
                break;
            }
        }
        self.finish()
    }

    async fn chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<String, AppError> {
        let _running = self.enter(thread_id, history, user_message);
        if !self.chunk_delay.is_zero() {
            tokio::time::sleep(self.chunk_delay * self.chunks.len() as u32).await;
        }
        self.finish()
    }

    fn agent_id(&self) -> &str {
        "scripted"
    }
}

pub fn service(agent: Option<Arc<ScriptedAgent>>) -> ChatService {
    let agent = agent.map(|a| a as Arc<dyn AnswerProducer>);
    ChatService::new(Arc::new(MemoryThreadStore::new()), agent)
}

/// Serves the app on an ephemeral local port and returns its base URL.
pub async fn spawn_app(service: ChatService) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, chat_stream::app(service)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Parses every `data:` line of an event-stream body.
pub fn parse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| serde_json::from_str(payload.trim_start()).unwrap())
        .collect()
}

pub fn kinds(events: &[Value]) -> Vec<&str> {
    events.iter().map(|e| e["type"].as_str().unwrap()).collect()
}

pub async fn post_chat(base: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// Runs one streaming turn and returns its decoded events.
pub async fn stream_turn(base: &str, body: Value) -> Vec<Value> {
    let response = post_chat(base, body).await;
    assert_eq!(response.status(), 200);
    parse_events(&response.text().await.unwrap())
}
