use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    api::state::AppState,
    error::Result,
    sync::PushMessage,
};

fn to_event(message: &PushMessage) -> Option<Event> {
    match Event::default().event(&message.event).json_data(&message.payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Failed to encode push event {}: {}", message.event, e);
            None
        }
    }
}

/// Push stream: the `initialAgentData` snapshot first, then every broadcast.
pub async fn subscribe(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    // Subscribe before reading the snapshot so nothing written in between is lost.
    let rx = state.service_context.hub.subscribe();
    let snapshot = state.service_context.announcement_service.snapshot().await?;
    tracing::info!(
        "Push subscriber connected ({} total)",
        state.service_context.hub.subscriber_count()
    );

    let initial = stream::iter(to_event(&snapshot).map(Ok::<Event, Infallible>));
    let updates = stream::unfold(rx, |mut rx: broadcast::Receiver<PushMessage>| async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if let Some(event) = to_event(&message) {
                        return Some((Ok(event), rx));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Push subscriber lagged, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(futures_util::StreamExt::chain(initial, updates))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Best-effort hint relay. Always accepted.
pub async fn publish_hint(
    State(state): State<AppState>,
    Json(message): Json<PushMessage>,
) -> StatusCode {
    state.service_context.announcement_service.relay_hint(message);
    StatusCode::ACCEPTED
}
