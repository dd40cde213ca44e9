use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::ThreadStore;
use crate::errors::AppError;
use crate::models::{Message, Thread};

#[derive(Debug)]
struct ThreadEntry {
    thread: Thread,
    messages: Vec<Message>,
}

/// Process-local thread store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryThreadStore {
    threads: DashMap<String, ThreadEntry>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn create_thread(&self, conversation_id: &str) -> Result<Thread, AppError> {
        let thread = Thread::new(conversation_id.to_string());
        self.threads.insert(
            thread.id.clone(),
            ThreadEntry { thread: thread.clone(), messages: Vec::new() },
        );
        Ok(thread)
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>, AppError> {
        Ok(self.threads.get(thread_id).map(|entry| entry.thread.clone()))
    }

    async fn append_message(&self, message: &Message) -> Result<(), AppError> {
        let mut entry = self
            .threads
            .get_mut(&message.thread_id)
            .ok_or_else(|| AppError::ThreadNotFound { id: message.thread_id.clone() })?;
        entry.messages.push(message.clone());
        entry.thread.updated_at = Utc::now();
        Ok(())
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Message>, AppError> {
        self.threads
            .get(thread_id)
            .map(|entry| entry.messages.clone())
            .ok_or_else(|| AppError::ThreadNotFound { id: thread_id.to_string() })
    }
}
