//! Adapts [`SessionQaFacade`]'s callback-style poller into an axum SSE body.
//!
//! `poll`/`continue_stream` drive `on_event` synchronously from within their
//! own loop; bridged into a `Stream` the same way the facade itself bridges
//! synchronous bus handlers into async code — a bounded `mpsc::channel` fed
//! by a background task, drained here by the HTTP response body.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use ragflow_core::facade::SessionQaFacade;
use tokio_stream::wrappers::ReceiverStream;

fn event_for(stream_event: &ragflow_core::stream::StreamEvent) -> Event {
    Event::default().event("message").json_data(stream_event).unwrap_or_else(|err| {
        Event::default().event("message").data(format!("{{\"response_type\":\"error\",\"content\":\"{err}\"}}"))
    })
}

/// Runs `poll` (or `continue_stream`, via `from_offset = 0`) in a background
/// task, forwarding every [`StreamEvent`](ragflow_core::stream::StreamEvent)
/// onto the returned SSE body as it is produced.
pub fn poll_to_sse(
    facade: SessionQaFacade,
    session_id: String,
    message_id: String,
    from_offset: u64,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel(64);

    tokio::spawn(async move {
        let result = facade
            .poll(&session_id, &message_id, from_offset, |event| {
                let _ = tx.try_send(Ok(event_for(event)));
            })
            .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, session_id, message_id, "sse poll loop ended with error");
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}
