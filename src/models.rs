use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An upstream dialogue context. Owned by exactly one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(conversation_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: format!("thread_{}", uuid::Uuid::new_v4().simple()),
            conversation_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
            MessageRole::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(MessageRole::User),
            "ASSISTANT" => Ok(MessageRole::Assistant),
            "SYSTEM" => Ok(MessageRole::System),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(thread_id: String, role: MessageRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id,
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

fn default_stream() -> bool {
    true
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Buffered-mode reply; same content as the terminal `done` event plus the turn's identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub thread_id: String,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub is_new_conversation: bool,
}

/// One event of the streaming protocol, serialized as the JSON after `data: `.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Metadata { conversation_id: String, thread_id: String },
    Chunk { content: String },
    Done { full_response: String, timestamp: DateTime<Utc> },
    Error { error: String },
}

impl WireEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WireEvent::Done { .. } | WireEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_events_use_snake_case_type_tags() {
        let chunk = serde_json::to_value(WireEvent::Chunk { content: "Hel".into() }).unwrap();
        assert_eq!(chunk, json!({ "type": "chunk", "content": "Hel" }));

        let meta = serde_json::to_value(WireEvent::Metadata {
            conversation_id: "c1".into(),
            thread_id: "t1".into(),
        })
        .unwrap();
        assert_eq!(meta, json!({ "type": "metadata", "conversation_id": "c1", "thread_id": "t1" }));

        let err = serde_json::to_value(WireEvent::Error { error: "boom".into() }).unwrap();
        assert_eq!(err, json!({ "type": "error", "error": "boom" }));
    }

    #[test]
    fn serialized_events_fit_on_one_line() {
        let event = WireEvent::Chunk { content: "line one\nline two".into() };
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains('\n'));
    }

    #[test]
    fn chat_request_defaults_to_streaming() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.stream);
        assert!(req.conversation_id.is_none());
        assert!(req.thread_id.is_none());

        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","thread_id":null,"stream":false}"#).unwrap();
        assert!(!req.stream);
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(WireEvent::Error { error: "x".into() }.is_terminal());
        assert!(WireEvent::Done { full_response: String::new(), timestamp: Utc::now() }.is_terminal());
        assert!(!WireEvent::Chunk { content: "x".into() }.is_terminal());
    }
}
