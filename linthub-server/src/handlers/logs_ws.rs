//! Live log streaming over WebSocket.
//!
//! `GET /ws/logs/{id}` upgrades and forwards the job's events as JSON
//! text frames until the topic retires. History is not replayed here;
//! clients read `GET /api/logs/{id}` for everything up to the moment
//! they subscribed.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use uuid::Uuid;

use crate::infra::app_state::AppState;

/// Handle the WebSocket upgrade for a job's event stream.
pub async fn job_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| stream_job_events(socket, state, id))
}

async fn stream_job_events(socket: WebSocket, state: AppState, id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    if !job_is_live(&state, id).await {
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let mut events = state.events.subscribe(id);
    // The job may have finished between the check and the subscription,
    // in which case the subscribe recreated a topic nobody publishes to.
    if !job_is_live(&state, id).await {
        drop(events);
        state.events.prune(id);
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(frame) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(job_id = %id, skipped, "event stream lagged, frames dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

/// A job is live while it exists and has not reached a terminal state.
/// Lookup failures close the stream rather than surface an error frame.
async fn job_is_live(state: &AppState, id: Uuid) -> bool {
    match state.orchestrator.job(id).await {
        Ok(Some(job)) => !job.status.is_terminal(),
        Ok(None) => false,
        Err(error) => {
            debug!(job_id = %id, %error, "job lookup failed, closing event stream");
            false
        }
    }
}
