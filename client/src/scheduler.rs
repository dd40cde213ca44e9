//! Paces the visible application of streamed text.
//!
//! Chunks can arrive in bursts; the scheduler queues them and hands them out
//! one at a time with a fixed delay between releases, so the transcript
//! grows steadily. Fragments are released strictly in the order pushed.
//!
//! There is a single owner of the queue (the session controller's receive
//! loop), so only one pacing loop can exist per request.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(30);

#[derive(Debug)]
pub struct DeliveryScheduler {
    queue: VecDeque<String>,
    delay: Duration,
    next_release: Instant,
}

impl DeliveryScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            delay,
            next_release: Instant::now(),
        }
    }

    pub fn push(&mut self, fragment: String) {
        self.queue.push_back(fragment);
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waits out the pacing delay since the previous release, then pops the
    /// next fragment. Returns `None` at once if nothing is queued.
    ///
    /// Cancel-safe: the queue is only touched after the wait completes, so
    /// dropping the future loses nothing.
    pub async fn release(&mut self) -> Option<String> {
        if self.queue.is_empty() {
            return None;
        }
        tokio::time::sleep_until(self.next_release).await;
        let fragment = self.queue.pop_front();
        self.next_release = Instant::now() + self.delay;
        fragment
    }

    /// Drops everything still queued; returns how many fragments were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl Default for DeliveryScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_DELAY)
    }
}
