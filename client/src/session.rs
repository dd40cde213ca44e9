//! Per-session conversation state: identifiers and the visible transcript.
//!
//! All mutation goes through the methods here; presentation layers read
//! snapshots and listen for updates from the controller.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Only ever true for the single pending assistant turn.
    pub is_streaming: bool,
}

impl Turn {
    fn user(text: &str) -> Self {
        Self { role: Role::User, text: text.to_string(), timestamp: Utc::now(), is_streaming: false }
    }

    fn pending_assistant() -> Self {
        Self { role: Role::Assistant, text: String::new(), timestamp: Utc::now(), is_streaming: true }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    conversation_id: String,
    thread_id: Option<String>,
    transcript: Vec<Turn>,
    /// Index of the assistant turn still being streamed, if any.
    pending: Option<usize>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::with_conversation_id(Uuid::new_v4().to_string())
    }

    pub fn with_conversation_id(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            thread_id: None,
            transcript: Vec::new(),
            pending: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn pending_turn(&self) -> Option<&Turn> {
        self.pending.and_then(|i| self.transcript.get(i))
    }

    pub fn set_thread_id(&mut self, thread_id: impl Into<String>) {
        self.thread_id = Some(thread_id.into());
    }

    /// Records the user's message and opens an empty assistant placeholder.
    /// Refused while another assistant turn is still pending.
    pub fn begin_turn(&mut self, user_text: &str) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.transcript.push(Turn::user(user_text));
        self.transcript.push(Turn::pending_assistant());
        self.pending = Some(self.transcript.len() - 1);
        true
    }

    /// Appends streamed text to the pending assistant turn.
    pub fn apply_fragment(&mut self, fragment: &str) -> bool {
        match self.pending_mut() {
            Some(turn) => {
                turn.text.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Replaces the pending turn's text with the authoritative answer and
    /// closes it.
    pub fn finalize_turn(&mut self, full_text: &str) -> bool {
        self.close_pending(full_text)
    }

    /// Replaces the pending turn with an error message and closes it.
    pub fn fail_turn(&mut self, message: &str) -> bool {
        self.close_pending(message)
    }

    /// Removes the pending assistant turn without finalizing it.
    pub fn discard_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(i) if i < self.transcript.len() => {
                self.transcript.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Starts over with a fresh conversation id and no thread.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn pending_mut(&mut self) -> Option<&mut Turn> {
        let i = self.pending?;
        self.transcript.get_mut(i)
    }

    fn close_pending(&mut self, text: &str) -> bool {
        let Some(turn) = self.pending_mut() else {
            return false;
        };
        turn.text = text.to_string();
        turn.is_streaming = false;
        turn.timestamp = Utc::now();
        self.pending = None;
        true
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}
