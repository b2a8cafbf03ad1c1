use super::state::AppState;
use crate::error::EngineError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    /// The typed message to forward into the conversation
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn engine_error_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidState { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Open the live session: claim devices, connect, start streaming
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.start().await {
        Ok(()) => {
            info!("session started via HTTP");
            (
                StatusCode::OK,
                Json(SessionActionResponse {
                    status: "connected".to_string(),
                    message: "Session started".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start session: {}", e);
            (
                engine_error_status(&e),
                Json(ErrorResponse {
                    error: format!("Failed to start session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/stop
/// Tear the session down; a no-op when nothing is running
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.stop().await;
    (
        StatusCode::OK,
        Json(SessionActionResponse {
            status: "disconnected".to_string(),
            message: "Session stopped".to_string(),
        }),
    )
        .into_response()
}

/// POST /session/toggle
/// Start when idle, stop when running
pub async fn toggle_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.toggle().await {
        Ok(()) => {
            let status = state.engine.status().await;
            (
                StatusCode::OK,
                Json(SessionActionResponse {
                    status: status.name().to_string(),
                    message: "Session toggled".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to toggle session: {}", e);
            (
                engine_error_status(&e),
                Json(ErrorResponse {
                    error: format!("Failed to toggle session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/text
/// Forward a typed message into the live conversation
pub async fn send_text(
    State(state): State<AppState>,
    Json(req): Json<SendTextRequest>,
) -> impl IntoResponse {
    match state.engine.send_text(&req.message).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionActionResponse {
                status: "connected".to_string(),
                message: "Message sent".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to send text: {}", e);
            (
                engine_error_status(&e),
                Json(ErrorResponse {
                    error: format!("Failed to send text: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /session/status
/// Snapshot of the observable engine state
pub async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.snapshot().await;
    (StatusCode::OK, Json(snapshot)).into_response()
}

/// GET /session/transcript
/// Ordered conversation history finalized so far
pub async fn session_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript = state.engine.transcript().await;
    (StatusCode::OK, Json(transcript)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
