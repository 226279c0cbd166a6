// src/handlers/chat.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::Path;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{self, TurnEvent};
use crate::error::ServiceError;
use crate::models::dataset::DatasetSummary;
use crate::AppState;

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/sessions/:session_id/messages", get(get_messages))
        .route(
            "/api/sessions/:session_id/datasets/:index",
            delete(remove_dataset),
        )
}

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub session_id: Option<Uuid>,
    pub message: String,
}

/// Runs one assistant turn and answers with an event stream of turn events.
///
/// The handler opens the upstream stream, then hands the read loop to a
/// spawned task and returns; deltas flow through the channel while the loop
/// is still running. Submitting again while the session's turn is in flight
/// is rejected with a conflict.
async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let text = body.message.trim().to_string();
    if text.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }
    let client = state
        .completions
        .clone()
        .ok_or(ServiceError::UpstreamNotConfigured)?;

    let (session_id, session) = state.sessions.get_or_create(body.session_id).await;
    let input = session.lock().await.begin_turn(&text)?;
    tracing::info!(
        session = %session_id,
        datasets = input.datasets.len(),
        "starting assistant turn"
    );

    // Request-phase failures (429, 402, other non-2xx, connection errors)
    // surface as the status of this request; the event stream only starts
    // once the upstream stream is open.
    let response = agent::start_turn(&client, &session, &input).await?;

    let (events_tx, events_rx) = tokio::sync::mpsc::channel::<TurnEvent>(32);
    let _ = events_tx.send(TurnEvent::Session { session_id }).await;

    let cancel = CancellationToken::new();
    tokio::spawn(agent::relay_turn(
        response,
        state.relay.clone(),
        session,
        events_tx,
        cancel,
    ));

    let stream = ReceiverStream::new(events_rx).map(|event| {
        Ok::<_, Infallible>(
            Event::default()
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data("{}")),
        )
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Snapshot of a session for page restores: transcript, datasets and
/// whether a reply is still streaming.
async fn get_messages(
    Path(session_id): Path<Uuid>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let session = state.sessions.get(session_id).await?;
    let session = session.lock().await;
    let datasets: Vec<DatasetSummary> = session.datasets.iter().map(DatasetSummary::from).collect();
    Ok(Json(json!({
        "success": true,
        "session_id": session_id,
        "messages": session.transcript.messages(),
        "datasets": datasets,
        "in_flight": session.is_in_flight(),
    })))
}

async fn remove_dataset(
    Path((session_id, index)): Path<(Uuid, usize)>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let session = state.sessions.get(session_id).await?;
    let removed = session.lock().await.remove_dataset(index)?;
    tracing::info!(session = %session_id, "removed dataset '{}'", removed.filename);
    Ok(Json(json!({
        "success": true,
        "removed": removed.filename,
    })))
}
