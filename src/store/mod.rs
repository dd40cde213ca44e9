//! Thread/dialogue storage: which threads exist, who owns them, and what was said on each.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Message, Thread};

pub use memory::MemoryThreadStore;
pub use postgres::PgThreadStore;

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Creates a fresh thread owned by `conversation_id`.
    async fn create_thread(&self, conversation_id: &str) -> Result<Thread, AppError>;

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>, AppError>;

    /// Appends a message to its thread and bumps the thread's `updated_at`.
    async fn append_message(&self, message: &Message) -> Result<(), AppError>;

    /// Messages of a thread in insertion order.
    async fn history(&self, thread_id: &str) -> Result<Vec<Message>, AppError>;
}
