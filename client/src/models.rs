use serde::{Deserialize, Serialize};

/// Request body for `POST /api/chat`.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    /// Serialized as `null` on the first turn.
    pub thread_id: Option<String>,
    pub stream: bool,
}

/// Buffered-mode reply. Matches the backend `ChatResponse`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub thread_id: String,
    #[serde(default)]
    pub message: String,
    pub response: String,
    pub timestamp: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub is_new_conversation: Option<bool>,
}

/// Streaming event received from the server.
/// Matches the backend `WireEvent` enum (internally tagged). Unknown kinds
/// decode to [`WireEvent::Unknown`] and are ignored by the controller.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Metadata {
        conversation_id: String,
        thread_id: String,
    },
    Chunk {
        content: String,
    },
    Done {
        full_response: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Error {
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl WireEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WireEvent::Done { .. } | WireEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_kinds_are_not_fatal() {
        let event: WireEvent = serde_json::from_str(r#"{"type":"usage","tokens":12}"#).unwrap();
        assert_eq!(event, WireEvent::Unknown);
        assert!(!event.is_terminal());
    }

    #[test]
    fn first_turn_request_sends_null_thread() {
        let req = ChatRequest {
            message: "hi".into(),
            conversation_id: "c1".into(),
            thread_id: None,
            stream: true,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "message": "hi", "conversation_id": "c1", "thread_id": null, "stream": true })
        );
    }

    #[test]
    fn buffered_payload_tolerates_missing_optional_fields() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"conversation_id":"c","thread_id":"t","response":"Hello","timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(resp.response, "Hello");
        assert_eq!(resp.agent_id, None);
    }
}
