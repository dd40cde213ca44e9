use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::AnswerProducer;
use crate::config::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse, Message, MessageRole};
use crate::service::continuity::{ConversationContinuity, ThreadLease};
use crate::store::ThreadStore;

/// Everything a turn needs once it has been accepted: the leased thread, the
/// prior history, and the producer that will answer.
pub struct TurnContext {
    pub lease: ThreadLease,
    pub history: Vec<Message>,
    pub user_message: String,
    pub agent: Arc<dyn AnswerProducer>,
}

impl TurnContext {
    pub fn conversation_id(&self) -> &str {
        &self.lease.conversation_id
    }

    pub fn thread_id(&self) -> &str {
        &self.lease.thread_id
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ThreadStore>,
    continuity: ConversationContinuity,
    agent: Option<Arc<dyn AnswerProducer>>,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(store: Arc<dyn ThreadStore>, agent: Option<Arc<dyn AnswerProducer>>) -> Self {
        Self {
            continuity: ConversationContinuity::new(store.clone()),
            store,
            agent,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }

    pub fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    pub async fn get_messages(&self, thread_id: &str) -> Result<Vec<Message>, AppError> {
        self.store.history(thread_id).await
    }

    /// Validates the request, resolves (or creates) the thread, and records
    /// the user message. Nothing is sent upstream yet.
    pub async fn prepare_turn(&self, request: ChatRequest) -> Result<TurnContext, AppError> {
        // ── Validation ────────────────────────────────────────────────────────
        if request.message.trim().is_empty() {
            return Err(AppError::EmptyField { field_name: "message".to_string() });
        }
        if request.message.len() > self.max_message_length {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: self.max_message_length,
                actual_length: request.message.len(),
            });
        }
        let agent = self.agent.clone().ok_or(AppError::AgentNotConfigured)?;

        // ── Resolve thread ────────────────────────────────────────────────────
        let conversation_id = request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let lease = self
            .continuity
            .resolve(&conversation_id, request.thread_id.as_deref())
            .await?;

        // ── History, then persist the new user message ────────────────────────
        let history = self.store.history(&lease.thread_id).await?;
        let user_message = Message::new(lease.thread_id.clone(), MessageRole::User, request.message);
        self.store.append_message(&user_message).await?;

        info!(
            "Accepted turn for conversation {} on thread {} (new thread: {}, {} prior messages)",
            lease.conversation_id,
            lease.thread_id,
            lease.is_new,
            history.len()
        );

        Ok(TurnContext { lease, history, user_message: user_message.content, agent })
    }

    /// Buffered mode: runs the producer to completion and returns one payload.
    pub async fn complete_turn(&self, ctx: TurnContext) -> Result<ChatResponse, AppError> {
        let response = ctx
            .agent
            .chat(ctx.thread_id(), &ctx.history, &ctx.user_message)
            .await?;

        self.save_assistant_message(ctx.thread_id(), &response).await?;

        Ok(ChatResponse {
            conversation_id: ctx.conversation_id().to_string(),
            thread_id: ctx.thread_id().to_string(),
            message: ctx.user_message.clone(),
            response,
            timestamp: Utc::now(),
            agent_id: ctx.agent.agent_id().to_string(),
            is_new_conversation: ctx.lease.is_new,
        })
    }

    pub async fn save_assistant_message(&self, thread_id: &str, content: &str) -> Result<Message, AppError> {
        let message = Message::new(thread_id.to_string(), MessageRole::Assistant, content.to_string());
        self.store.append_message(&message).await.map_err(|e| {
            error!("Failed to save assistant message for thread {thread_id}: {e}");
            e
        })?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MemoryThreadStore;

    fn request(message: String) -> ChatRequest {
        ChatRequest { message, conversation_id: Some("c-1".into()), thread_id: None, stream: false }
    }

    #[test]
    fn service_and_config_share_the_length_limit() {
        let service = ChatService::new(Arc::new(MemoryThreadStore::new()), None);
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(service.max_message_length, config.max_message_length);
        assert_eq!(service.max_message_length, DEFAULT_MAX_MESSAGE_LENGTH);
    }

    #[tokio::test]
    async fn default_limit_rejects_one_byte_too_many() {
        let service = ChatService::new(Arc::new(MemoryThreadStore::new()), None);
        let err = service
            .prepare_turn(request("x".repeat(DEFAULT_MAX_MESSAGE_LENGTH + 1)))
            .await
            .err()
            .expect("over-long message rejected");
        assert!(err.is_validation());
    }
}
