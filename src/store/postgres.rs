use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use super::ThreadStore;
use crate::db::message_repository::MessageRepository;
use crate::db::thread_repository::ThreadRepository;
use crate::errors::AppError;
use crate::models::{Message, Thread};

/// Postgres-backed thread store; threads and messages survive restarts.
#[derive(Clone)]
pub struct PgThreadStore {
    threads: ThreadRepository,
    messages: MessageRepository,
}

impl PgThreadStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            threads: ThreadRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }
}

#[async_trait]
impl ThreadStore for PgThreadStore {
    async fn create_thread(&self, conversation_id: &str) -> Result<Thread, AppError> {
        self.threads.save(&Thread::new(conversation_id.to_string())).await
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>, AppError> {
        self.threads.find_by_id(thread_id).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), AppError> {
        self.messages.save(message).await?;
        if let Err(e) = self.threads.update_timestamp(&message.thread_id).await {
            error!("Failed to update thread timestamp: {e}");
        }
        Ok(())
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Message>, AppError> {
        self.threads
            .find_by_id(thread_id)
            .await?
            .ok_or_else(|| AppError::ThreadNotFound { id: thread_id.to_string() })?;
        self.messages.find_by_thread_id(thread_id).await
    }
}
