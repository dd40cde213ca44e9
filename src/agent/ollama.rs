use async_trait::async_trait;
use futures_util::StreamExt;
use rig::client::Nothing;
use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::ollama;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::AnswerProducer;
use crate::config::AgentConfig;
use crate::errors::AppError;
use crate::models::{Message, MessageRole};

const PREAMBLE: &str = "You are a helpful AI assistant. \
                        Be concise, accurate, and friendly. \
                        If you don't know something, say so.";

/// Builds a rig [`RigMessage`] history list from stored [`Message`] records.
fn to_rig_history(messages: &[Message]) -> Vec<RigMessage> {
    messages
        .iter()
        .filter_map(|m| match m.role {
            MessageRole::User => Some(RigMessage::user(&m.content)),
            MessageRole::Assistant => Some(RigMessage::assistant(&m.content)),
            MessageRole::System => None, // system prompt is set via preamble
        })
        .collect()
}

// ── Ollama `/api/chat` wire types (streaming path) ────────────────────────────

#[derive(Debug, Serialize)]
struct OllamaChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamLine {
    #[serde(default)]
    message: Option<OllamaStreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamMessage {
    #[serde(default)]
    content: String,
}

fn to_ollama_messages<'a>(history: &'a [Message], user_message: &'a str) -> Vec<OllamaChatMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(OllamaChatMessage { role: "system", content: PREAMBLE });
    messages.extend(history.iter().filter_map(|m| match m.role {
        MessageRole::User => Some(OllamaChatMessage { role: "user", content: &m.content }),
        MessageRole::Assistant => Some(OllamaChatMessage { role: "assistant", content: &m.content }),
        MessageRole::System => None,
    }));
    messages.push(OllamaChatMessage { role: "user", content: user_message });
    messages
}

/// Parses one NDJSON line from Ollama's streaming chat endpoint.
/// Returns the text increment (possibly empty) and whether the stream is done.
fn parse_stream_line(line: &[u8]) -> Result<(String, bool), AppError> {
    let parsed: OllamaStreamLine = serde_json::from_slice(line).map_err(|e| AppError::InferenceError {
        message: format!("Malformed stream line from Ollama: {e}"),
    })?;
    if let Some(message) = parsed.error {
        return Err(AppError::InferenceError { message });
    }
    let content = parsed.message.map(|m| m.content).unwrap_or_default();
    Ok((content, parsed.done))
}

/// Answer producer backed by a local Ollama server.
///
/// Buffered turns go through the rig [`ollama::Client`]; streamed turns read
/// Ollama's NDJSON chat stream directly so each delta can be forwarded as it
/// arrives.
#[derive(Clone)]
pub struct OllamaAgentService {
    client: ollama::Client,
    http: reqwest::Client,
    base_url: String,
    model: String,
    agent_id: String,
}

impl OllamaAgentService {
    pub fn new(config: &AgentConfig) -> Result<Self, AppError> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(&config.base_url)
            .build()
            .map_err(|e| AppError::Unexpected(format!("Failed to build Ollama client: {e}")))?;
        Ok(Self {
            client,
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            agent_id: config.agent_id.clone(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn map_inference_error(&self, thread_id: &str, msg: String) -> AppError {
        error!("Ollama inference failed for thread {thread_id}: {msg}");
        if msg.contains("Connection refused") || msg.contains("connect") {
            AppError::OllamaUnavailable { host: self.base_url.clone() }
        } else if msg.contains("model") {
            AppError::ModelNotFound { model_name: self.model.clone() }
        } else {
            AppError::InferenceError { message: msg }
        }
    }
}

#[async_trait]
impl AnswerProducer for OllamaAgentService {
    async fn stream_chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, AppError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: to_ollama_messages(history, user_message),
            stream: true,
        };

        let response = self
            .http
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AppError::OllamaUnavailable { host: self.base_url.clone() }
                } else {
                    self.map_inference_error(thread_id, e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_inference_error(thread_id, format!("Ollama returned {status}: {text}")));
        }

        let mut bytes = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut full_response = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| self.map_inference_error(thread_id, e.to_string()))?;
            pending.extend_from_slice(&chunk);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = line.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                let (delta, done) = parse_stream_line(line)?;
                if !delta.is_empty() {
                    full_response.push_str(&delta);
                    if tx.send(delta).await.is_err() {
                        warn!("Listener for thread {thread_id} went away; stopping generation");
                        return Ok(full_response);
                    }
                }
                if done {
                    debug!("Ollama stream for thread {thread_id} complete");
                    return Ok(full_response);
                }
            }
        }

        // Some servers close without a trailing newline on the final line.
        let tail = pending.trim_ascii();
        if !tail.is_empty() {
            let (delta, _) = parse_stream_line(tail)?;
            if !delta.is_empty() {
                full_response.push_str(&delta);
                let _ = tx.send(delta).await;
            }
        }
        Ok(full_response)
    }

    async fn chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<String, AppError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .build();

        let rig_history = to_rig_history(history);

        agent
            .chat(user_message, rig_history)
            .await
            .map_err(|e| self.map_inference_error(thread_id, e.to_string()))
    }

    fn agent_id(&self) -> &str {
        &self.agent_id
    }
}
