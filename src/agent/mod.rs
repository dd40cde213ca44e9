pub mod ollama;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::AppError;
use crate::models::Message;

pub use ollama::OllamaAgentService;

/// The language-model backend, seen as an opaque producer of answer text.
///
/// Implementations receive the stored history of the thread (excluding the
/// new user message) and the new user message.
#[async_trait]
pub trait AnswerProducer: Send + Sync {
    /// Streams the answer as text increments on `tx` and returns the
    /// producer's own authoritative final text.
    ///
    /// A closed `tx` means nobody is listening anymore; implementations
    /// should stop generating and return.
    async fn stream_chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, AppError>;

    /// Runs one turn to completion and returns the full answer.
    async fn chat(
        &self,
        thread_id: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<String, AppError>;

    /// Identifier echoed back to clients in buffered responses.
    fn agent_id(&self) -> &str;
}
