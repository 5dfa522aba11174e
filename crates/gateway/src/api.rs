//! HTTP API for the lanes.
//!
//! Endpoints:
//!
//! - `GET    /api/status`: note count, lanes and model
//! - `POST   /api/chat/{lane}`: send a message, get an SSE stream
//! - `POST   /api/standup`: run the standup, get an SSE stream
//! - `GET    /api/history/{lane}`: display history (text turns only)
//! - `DELETE /api/history/{lane}`: reset a lane's history
//! - `POST   /api/remember`: log a note in a lane's conversation log
//! - `GET    /api/search?q=`: case-insensitive search over vault notes

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use dispatch_agent::{DispatchEngine, DisplayTurn, SearchHit, StatusReport};
use dispatch_core::{DispatchEvent, Lane};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

pub type SharedState = Arc<DispatchEngine>;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub lane: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

fn parse_lane(id: &str) -> Result<Lane, ApiError> {
    Lane::parse(id).ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Unknown lane: {id}")))
}

/// One `data: <json>` frame per event.
fn event_stream(
    rx: mpsc::Receiver<DispatchEvent>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| Ok(SseEvent::default().data(event.to_json().to_string())));
    Sse::new(stream)
}

/// Build the `/api` router.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/chat/{lane}", post(chat_handler))
        .route("/standup", post(standup_handler))
        .route("/history/{lane}", get(history_handler).delete(clear_history_handler))
        .route("/remember", post(remember_handler))
        .route("/search", get(search_handler))
        .with_state(state)
}

async fn status_handler(State(engine): State<SharedState>) -> Result<Json<StatusReport>, ApiError> {
    engine
        .status()
        .await
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn chat_handler(
    State(engine): State<SharedState>,
    Path(lane): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let lane = parse_lane(&lane)?;
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }
    info!(lane = %lane, message_len = message.len(), "Chat stream request");
    Ok(event_stream(engine.chat(lane, message)))
}

async fn standup_handler(
    State(engine): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    info!("Standup stream request");
    event_stream(engine.standup())
}

async fn history_handler(
    State(engine): State<SharedState>,
    Path(lane): Path<String>,
) -> Result<Json<Vec<DisplayTurn>>, ApiError> {
    let lane = parse_lane(&lane)?;
    Ok(Json(engine.display_history(lane).await))
}

async fn clear_history_handler(
    State(engine): State<SharedState>,
    Path(lane): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    let lane = parse_lane(&lane)?;
    engine.clear_history(lane).await;
    Ok(Json(OkResponse { ok: true }))
}

async fn remember_handler(
    State(engine): State<SharedState>,
    Json(payload): Json<RememberRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let lane = parse_lane(&payload.lane)?;
    if payload.note.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Note cannot be empty"));
    }
    engine.remember(lane, &payload.note).await.map_err(|e| {
        warn!(lane = %lane, error = %e, "Remember failed");
        error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(OkResponse { ok: true }))
}

async fn search_handler(
    State(engine): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    if params.q.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Query cannot be empty"));
    }
    engine
        .search(&params.q)
        .await
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
