//! Drives one request/response cycle per submission for a single session.
//!
//! ```text
//! Idle → Sending → Streaming | Buffering → Finalizing → Idle
//!          └──────────── any failure ───────────────→ Idle (error turn)
//! ```
//!
//! At most one request is in flight per session. A streamed response is fed
//! through the [`decoder`](crate::decoder) and paced by the
//! [`DeliveryScheduler`]; the terminal `done` payload always replaces the
//! streamed text. Anything else is read once as a buffered payload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::decoder::decode_events;
use crate::errors::ClientError;
use crate::models::{ChatRequest, ChatResponse, WireEvent};
use crate::scheduler::DeliveryScheduler;
use crate::session::{ConversationSession, Turn};
use crate::transport::{ChatTransport, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Sending,
    Streaming,
    Buffering,
    Finalizing,
}

/// Notifications for a presentation layer. The session itself is the source
/// of truth; these only say what changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    TurnStarted { user_text: String },
    ThreadAssigned { thread_id: String },
    Fragment { text: String },
    Finalized { text: String },
    Failed { message: String },
    Cancelled,
}

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed { text: String },
    Failed { message: String },
    Cancelled,
}

enum Ending {
    Done(String),
    Failed(String),
    Cancelled,
}

pub struct SessionController {
    session: Mutex<ConversationSession>,
    state: Mutex<ControllerState>,
    in_flight: AtomicBool,
    transport: Arc<dyn ChatTransport>,
    pacing_delay: Duration,
    stream: bool,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

/// Clears the in-flight flag and returns to `Idle` however the submission ends,
/// including when its future is dropped.
struct InFlight<'a>(&'a SessionController);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.session.lock().discard_pending();
        self.0.set_state(ControllerState::Idle);
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl SessionController {
    pub fn new(transport: Arc<dyn ChatTransport>, config: &ClientConfig) -> Self {
        Self::with_session(transport, config, ConversationSession::new())
    }

    pub fn with_session(
        transport: Arc<dyn ChatTransport>,
        config: &ClientConfig,
        session: ConversationSession,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            state: Mutex::new(ControllerState::Idle),
            in_flight: AtomicBool::new(false),
            transport,
            pacing_delay: config.pacing_delay,
            stream: config.stream,
            updates: None,
        }
    }

    /// Attaches an update channel and returns its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of the session.
    pub fn session(&self) -> ConversationSession {
        self.session.lock().clone()
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.session.lock().transcript().to_vec()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.session.lock().thread_id().map(str::to_string)
    }

    /// Starts a new conversation. Refused while a request is in flight.
    pub fn reset(&self) -> Result<(), ClientError> {
        if self.is_in_flight() {
            return Err(ClientError::Busy);
        }
        self.session.lock().reset();
        Ok(())
    }

    /// Sends `text` and drives the response to completion.
    ///
    /// Returns [`ClientError::Busy`] without sending anything if another
    /// submission is still in flight or the session already has a pending
    /// assistant turn. Every other failure is surfaced as a
    /// failed turn in the transcript and as [`TurnOutcome::Failed`].
    pub async fn submit(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ClientError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::Busy);
        }
        let request = {
            let mut session = self.session.lock();
            if !session.begin_turn(text) {
                // A turn left pending on a supplied session is not ours to discard.
                self.in_flight.store(false, Ordering::Release);
                return Err(ClientError::Busy);
            }
            ChatRequest {
                message: text.to_string(),
                conversation_id: session.conversation_id().to_string(),
                thread_id: session.thread_id().map(str::to_string),
                stream: self.stream,
            }
        };
        let _in_flight = InFlight(self);
        self.set_state(ControllerState::Sending);
        self.notify(SessionUpdate::TurnStarted { user_text: text.to_string() });

        let outcome = match self.exchange(&request, cancel).await {
            Ending::Done(full_text) => {
                self.set_state(ControllerState::Finalizing);
                self.session.lock().finalize_turn(&full_text);
                self.notify(SessionUpdate::Finalized { text: full_text.clone() });
                TurnOutcome::Completed { text: full_text }
            }
            Ending::Failed(message) => {
                error!("Chat turn failed: {message}");
                self.session.lock().fail_turn(&message);
                self.notify(SessionUpdate::Failed { message: message.clone() });
                TurnOutcome::Failed { message }
            }
            Ending::Cancelled => {
                info!("Chat turn cancelled");
                self.session.lock().discard_pending();
                self.notify(SessionUpdate::Cancelled);
                TurnOutcome::Cancelled
            }
        };
        Ok(outcome)
    }

    async fn exchange(&self, request: &ChatRequest, cancel: &CancellationToken) -> Ending {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ending::Cancelled,
            sent = self.transport.send(request) => sent,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => return Ending::Failed(e.to_string()),
        };

        if !response.is_success() {
            return self.read_error_status(response, cancel).await;
        }

        if response.is_event_stream() {
            self.set_state(ControllerState::Streaming);
            self.receive_stream(response, cancel).await
        } else {
            self.set_state(ControllerState::Buffering);
            self.receive_buffered(response, cancel).await
        }
    }

    async fn receive_stream(&self, response: TransportResponse, cancel: &CancellationToken) -> Ending {
        let events = decode_events(response.body);
        let mut events = std::pin::pin!(events);
        let mut scheduler = DeliveryScheduler::new(self.pacing_delay);

        let terminal: Result<String, String> = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ending::Cancelled,
                next = events.next() => match next {
                    Some(Ok(WireEvent::Metadata { thread_id, .. })) => {
                        self.session.lock().set_thread_id(thread_id.clone());
                        self.notify(SessionUpdate::ThreadAssigned { thread_id });
                    }
                    Some(Ok(WireEvent::Chunk { content })) => scheduler.push(content),
                    Some(Ok(WireEvent::Done { full_response, .. })) => break Ok(full_response),
                    Some(Ok(WireEvent::Error { error })) => break Err(error),
                    Some(Ok(WireEvent::Unknown)) => debug!("Ignoring unknown event kind"),
                    Some(Err(e)) => break Err(e.to_string()),
                    None => break Err("Connection closed before the answer was complete".to_string()),
                },
                Some(fragment) = scheduler.release(), if scheduler.has_pending() => {
                    self.apply_fragment(fragment);
                }
            }
        };

        match terminal {
            Ok(full_response) => {
                if !self.drain(&mut scheduler, cancel).await {
                    return Ending::Cancelled;
                }
                Ending::Done(full_response)
            }
            Err(message) => {
                let dropped = scheduler.clear();
                if dropped > 0 {
                    debug!("Dropped {dropped} queued fragments after stream failure");
                }
                Ending::Failed(message)
            }
        }
    }

    /// Applies every fragment still queued, keeping the pacing. Returns false
    /// if cancelled part-way.
    async fn drain(&self, scheduler: &mut DeliveryScheduler, cancel: &CancellationToken) -> bool {
        while scheduler.has_pending() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                Some(fragment) = scheduler.release() => self.apply_fragment(fragment),
            }
        }
        true
    }

    async fn receive_buffered(&self, response: TransportResponse, cancel: &CancellationToken) -> Ending {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ending::Cancelled,
            body = read_body(response) => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => return Ending::Failed(e.to_string()),
        };

        match serde_json::from_slice::<ChatResponse>(&body) {
            Ok(payload) => {
                self.session.lock().set_thread_id(payload.thread_id.clone());
                self.notify(SessionUpdate::ThreadAssigned { thread_id: payload.thread_id });
                Ending::Done(payload.response)
            }
            Err(e) => Ending::Failed(ClientError::InvalidResponse(e.to_string()).to_string()),
        }
    }

    async fn read_error_status(&self, response: TransportResponse, cancel: &CancellationToken) -> Ending {
        let status = response.status;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ending::Cancelled,
            body = read_body(response) => body.unwrap_or_default(),
        };
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
        Ending::Failed(ClientError::Status { status, message }.to_string())
    }

    fn apply_fragment(&self, fragment: String) {
        if self.session.lock().apply_fragment(&fragment) {
            self.notify(SessionUpdate::Fragment { text: fragment });
        }
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock() = state;
    }

    fn notify(&self, update: SessionUpdate) {
        if let Some(tx) = &self.updates {
            let _ = tx.send(update);
        }
    }
}

async fn read_body(response: TransportResponse) -> Result<Vec<u8>, ClientError> {
    let mut body = response.body;
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.to_vec())
}
