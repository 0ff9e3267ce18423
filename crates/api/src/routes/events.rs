//! Event endpoints: recent listing and the live SSE stream

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;

use stargate_coordination::models::Event;

use crate::error::Result;
use crate::models::{Envelope, EventListParams};
use crate::state::AppState;

/// Recent events, reverse-chronological.
pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventListParams>,
) -> Result<Json<Envelope<Vec<Event>>>> {
    let events = state
        .coordination
        .recent_events(params.entity_id.as_deref(), params.limit.unwrap_or(50))
        .await?;
    Ok(Json(Envelope::new(events)))
}

/// Live event stream as `data: <json>\n\n` SSE frames.  A subscriber that
/// falls behind loses the oldest events (drop-oldest) and the stream keeps
/// going.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let subscriber = state.coordination.bus().subscribe();

    let stream = futures::stream::unfold(subscriber, |mut subscriber| async move {
        let event = subscriber.recv().await?;
        let frame = match serde_json::to_string(&event) {
            Ok(json) => SseEvent::default().data(json),
            Err(_) => return Some((Ok(SseEvent::default().comment("serialization error")), subscriber)),
        };
        Some((Ok(frame), subscriber))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
