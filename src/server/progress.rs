//! Server-sent progress stream for one download session

use crate::downloader::ProgressEvent;
use crate::server::AppState;
use crate::session::ProgressReceiver;
use crate::utils::error::VidfetchError;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// `GET /progress/{download_id}`
///
/// Unknown ids get a single error event. Otherwise events are relayed until
/// a terminal one, the session ending, or `idle_timeout` without news.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(download_id): Path<String>,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let receiver = Uuid::parse_str(&download_id)
        .ok()
        .and_then(|id| state.orchestrator.registry().subscribe(&id));

    let stream = match receiver {
        Some(receiver) => {
            debug!("Streaming progress for {}", download_id);
            progress_events(receiver, state.idle_timeout).boxed()
        }
        None => {
            warn!("Progress requested for unknown download {}", download_id);
            let event = ProgressEvent::error(VidfetchError::SessionUnknown.to_string());
            stream::once(async move { Ok(to_sse_event(&event)) }).boxed()
        }
    };

    Sse::new(stream)
}

/// Drain a receiver into SSE events, ending after a terminal event
pub fn progress_events(
    receiver: ProgressReceiver,
    idle: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold(Some(receiver), move |receiver| async move {
        let mut receiver = receiver?;
        let event = receiver.next_event(idle).await?;
        let next = if event.is_terminal() {
            None
        } else {
            Some(receiver)
        };
        Some((Ok(to_sse_event(&event)), next))
    })
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            error!("Failed to encode progress event: {}", e);
            Event::default().data(r#"{"error":"Failed to encode progress"}"#)
        }
    }
}
