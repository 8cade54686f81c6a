use super::state::AppState;
use crate::session::{SessionClosed, WindowEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EditResponseRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct WindowEventRequest {
    pub event: WindowEvent,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn accepted(command: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
            command: command.to_string(),
        }),
    )
        .into_response()
}

fn session_gone(err: SessionClosed) -> Response {
    warn!("Control request after session end: {}", err);
    (
        StatusCode::GONE,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn reply(command: &str, result: Result<(), SessionClosed>) -> Response {
    match result {
        Ok(()) => accepted(command),
        Err(e) => session_gone(e),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Enter fullscreen and begin the first question
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Start requested");
    reply("start", state.session.enable_safe_mode().await)
}

/// POST /session/advance
/// Submit the current answer and move to the next question
pub async fn advance(State(state): State<AppState>) -> impl IntoResponse {
    reply("advance", state.session.advance().await)
}

/// POST /session/toggle
/// Pause or resume dictation
pub async fn toggle_recording(State(state): State<AppState>) -> impl IntoResponse {
    reply("toggle", state.session.toggle_recording().await)
}

/// POST /session/response
/// Replace the current answer with typed text
pub async fn edit_response(
    State(state): State<AppState>,
    Json(req): Json<EditResponseRequest>,
) -> impl IntoResponse {
    reply("response", state.session.edit_response(req.text).await)
}

/// POST /session/window-event
/// Forward a window event to the integrity monitor
pub async fn window_event(
    State(state): State<AppState>,
    Json(req): Json<WindowEventRequest>,
) -> impl IntoResponse {
    reply("window-event", state.session.window_event(req.event).await)
}

/// GET /session/status
/// Get status of the interview session
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => session_gone(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
