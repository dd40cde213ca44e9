pub mod framer;

use axum::http::{header, HeaderName};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};

use crate::models::WireEvent;

pub use framer::frame_turn;

/// Puts a stream of [`WireEvent`]s on an event-stream response.
///
/// Each event becomes one `data: <json>` line followed by a blank line and is
/// written as its own body frame.
pub fn event_stream_response<S>(events: S) -> Response
where
    S: Stream<Item = WireEvent> + Send + 'static,
{
    let frames = events.map(|event| Event::default().json_data(&event));
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(frames),
    )
        .into_response()
}
