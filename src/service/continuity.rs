//! Maps a client's conversation (and, after the first turn, its thread id) to
//! the upstream dialogue context that should answer the next message.
//!
//! A presented thread id that is unknown, or that belongs to a different
//! conversation, is treated as a new-thread condition rather than an error.
//! Turns on the same thread are serialized through a per-thread lock held by
//! the returned [`ThreadLease`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::store::ThreadStore;

type ThreadLocks = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive right to run one turn against a thread. Dropping it lets the
/// next queued turn on the same thread proceed.
pub struct ThreadLease {
    pub conversation_id: String,
    pub thread_id: String,
    pub is_new: bool,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<ThreadLocks>,
}

impl std::fmt::Debug for ThreadLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLease")
            .field("conversation_id", &self.conversation_id)
            .field("thread_id", &self.thread_id)
            .field("is_new", &self.is_new)
            .finish()
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the lock once nobody holds or waits on it.
        self.locks
            .remove_if(&self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct ConversationContinuity {
    store: Arc<dyn ThreadStore>,
    locks: Arc<ThreadLocks>,
}

impl ConversationContinuity {
    pub fn new(store: Arc<dyn ThreadStore>) -> Self {
        Self { store, locks: Arc::new(DashMap::new()) }
    }

    /// Resolves the thread for this turn and waits for exclusive access to it.
    pub async fn resolve(
        &self,
        conversation_id: &str,
        thread_id: Option<&str>,
    ) -> Result<ThreadLease, AppError> {
        if let Some(id) = thread_id {
            match self.store.find_thread(id).await? {
                Some(thread) if thread.conversation_id == conversation_id => {
                    info!("Continuing conversation {conversation_id} with thread {id}");
                    return Ok(self.lease(conversation_id, thread.id, false).await);
                }
                Some(_) => {
                    warn!("Thread {id} belongs to another conversation; starting a new thread for {conversation_id}");
                }
                None => {
                    warn!("Unknown thread {id}; starting a new thread for {conversation_id}");
                }
            }
        }

        let thread = self.store.create_thread(conversation_id).await?;
        info!("Created new thread {} for conversation {conversation_id}", thread.id);
        Ok(self.lease(conversation_id, thread.id, true).await)
    }

    async fn lease(&self, conversation_id: &str, thread_id: String, is_new: bool) -> ThreadLease {
        let lock = self
            .locks
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ThreadLease {
            conversation_id: conversation_id.to_string(),
            thread_id,
            is_new,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}
