use thiserror::Error;

/// Errors that end (or prevent) a request.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Chat endpoint is not configured (set CHAT_API_URL)")]
    NotConfigured,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Server error: {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("A request is already in flight for this session")]
    Busy,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Why one `data:` line could not become a wire event. Recovered locally:
/// the line is skipped and decoding continues.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("invalid event payload: {message} (line: {line})")]
    InvalidPayload { line: String, message: String },
}
