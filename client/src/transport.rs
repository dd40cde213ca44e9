use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::errors::ClientError;
use crate::models::ChatRequest;

pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Response head plus an unread body.
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the server negotiated the streaming protocol.
    pub fn is_event_stream(&self) -> bool {
        is_event_stream(self.content_type.as_deref())
    }
}

pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
        .unwrap_or(false)
}

/// Sends one chat request and hands back the response as soon as its head
/// arrives.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, ClientError>;
}

/// [`ChatTransport`] over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpTransport {
    /// `endpoint` is the server's base URL; `None` makes every send fail
    /// with [`ClientError::NotConfigured`] without touching the network.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        }
    }

    fn chat_url(&self) -> Result<String, ClientError> {
        self.endpoint
            .as_deref()
            .map(|base| format!("{base}/api/chat"))
            .ok_or(ClientError::NotConfigured)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, ClientError> {
        let url = self.chat_url()?;
        debug!("POST {url} (stream: {})", request.stream);

        let response = self.client.post(&url).json(request).send().await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(TransportResponse {
            status: response.status().as_u16(),
            content_type,
            body: response.bytes_stream().map(|r| r.map_err(ClientError::from)).boxed(),
        })
    }
}
