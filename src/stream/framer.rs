//! Turns one accepted chat turn into the ordered sequence of [`WireEvent`]s
//! sent on a single response body.
//!
//! Order on the wire: one `metadata`, zero or more `chunk`, then exactly one
//! `done` or `error`. A spawned task is the only writer of events for the turn.

use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::models::WireEvent;
use crate::service::chat_service::{ChatService, TurnContext};

// A slow reader holds the producer back instead of queueing its output.
const EVENT_CHANNEL_CAPACITY: usize = 1;
const TOKEN_CHANNEL_CAPACITY: usize = 1;

/// Starts the turn and returns the stream of events to put on the wire.
///
/// Dropping the returned stream (client went away) aborts the producer; the
/// partial answer is not persisted.
pub fn frame_turn(service: ChatService, ctx: TurnContext) -> ReceiverStream<WireEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(run_turn(service, ctx, tx));
    ReceiverStream::new(rx)
}

async fn run_turn(service: ChatService, ctx: TurnContext, events: mpsc::Sender<WireEvent>) {
    let started = Instant::now();
    let thread_id = ctx.thread_id().to_string();

    let metadata = WireEvent::Metadata {
        conversation_id: ctx.conversation_id().to_string(),
        thread_id: thread_id.clone(),
    };
    if events.send(metadata).await.is_err() {
        warn!("Client for thread {thread_id} disconnected before the stream started");
        return;
    }

    let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_CHANNEL_CAPACITY);
    let producer = {
        let agent = ctx.agent.clone();
        let thread_id = thread_id.clone();
        let history = ctx.history.clone();
        let user_message = ctx.user_message.clone();
        tokio::spawn(async move {
            agent.stream_chat(&thread_id, &history, &user_message, token_tx).await
        })
    };

    let mut chunks = 0usize;
    loop {
        tokio::select! {
            fragment = token_rx.recv() => {
                let Some(content) = fragment else { break };
                if chunks == 0 {
                    info!("First chunk for thread {thread_id} after {:?}", started.elapsed());
                }
                chunks += 1;
                if events.send(WireEvent::Chunk { content }).await.is_err() {
                    warn!("Client for thread {thread_id} disconnected mid-stream; aborting producer");
                    producer.abort();
                    return;
                }
            }
            _ = events.closed() => {
                warn!("Client for thread {thread_id} disconnected mid-stream; aborting producer");
                producer.abort();
                return;
            }
        }
    }

    let terminal = match producer.await {
        Ok(Ok(full_response)) => match service.save_assistant_message(&thread_id, &full_response).await {
            Ok(_) => {
                info!(
                    "Stream for thread {thread_id} complete: {chunks} chunks in {:?}",
                    started.elapsed()
                );
                WireEvent::Done { full_response, timestamp: Utc::now() }
            }
            Err(e) => WireEvent::Error { error: format!("Failed to save response: {e}") },
        },
        Ok(Err(e)) => {
            error!("Producer failed for thread {thread_id}: {e}");
            WireEvent::Error { error: e.to_string() }
        }
        Err(e) => {
            error!("Producer task for thread {thread_id} panicked: {e}");
            WireEvent::Error { error: "Internal error during streaming".to_string() }
        }
    };

    if events.send(terminal).await.is_err() {
        error!("Transport for thread {thread_id} closed before the terminal event could be sent");
    } else {
        debug!("Terminal event sent for thread {thread_id}");
    }
    // The lease inside `ctx` is released here, after the terminal event.
    drop(ctx);
}
