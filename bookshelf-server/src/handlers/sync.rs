//! Server-Sent Events for cache lifecycle updates

use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use bookshelf_core::cache::CacheEvent;
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// SSE event name and JSON payload for a lifecycle event
pub fn event_payload(event: &CacheEvent) -> (&'static str, String) {
    match event {
        CacheEvent::Installing { generation } => (
            "installing",
            serde_json::json!({ "generation": generation }).to_string(),
        ),
        CacheEvent::Installed { generation, assets } => (
            "installed",
            serde_json::json!({ "generation": generation, "assets": assets }).to_string(),
        ),
        CacheEvent::InstallFailed {
            generation,
            message,
        } => (
            "install_failed",
            serde_json::json!({ "generation": generation, "message": message }).to_string(),
        ),
        CacheEvent::GenerationDeleted { generation } => (
            "generation_deleted",
            serde_json::json!({ "generation": generation }).to_string(),
        ),
        CacheEvent::Activated { generation } => (
            "activated",
            serde_json::json!({ "generation": generation }).to_string(),
        ),
    }
}

/// SSE endpoint for lifecycle events
pub async fn cache_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx);

    let event_stream = stream.filter_map(|result| match result {
        Ok(event) => {
            let (event_type, data) = event_payload(&event);
            Some(Ok(Event::default().event(event_type).data(data)))
        }
        Err(_) => None, // Lagged, skip
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
